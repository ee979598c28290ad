use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use deal_board_sync::app::server::{router, AppState};
use deal_board_sync::config::toml_config::{BoardConfig, CrmConfig};
use deal_board_sync::domain::model::EligibilityCriteria;
use deal_board_sync::{BoardClient, CrmClient, SyncRunner, Synchronizer};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app_state(crm: &MockServer, boards: &MockServer) -> AppState {
    let criteria = EligibilityCriteria {
        kickoff_stage: "Project Kickoff".to_string(),
        project_type: "New Implementation Project".to_string(),
    };
    let crm_config = CrmConfig {
        api_base: crm.base_url(),
        accounts_url: crm.base_url(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        refresh_token: "refresh".to_string(),
        access_token: Some("seed".to_string()),
        module: "Deals".to_string(),
        board_field: "Trello_Board_ID".to_string(),
        board_field_label: "Trello Board ID".to_string(),
        ensure_field: false,
    };
    let board_config = BoardConfig {
        api_base: boards.base_url(),
        api_key: "key".to_string(),
        token: "token".to_string(),
    };
    let timeout = Duration::from_secs(5);

    let synchronizer = Synchronizer::new(
        Arc::new(CrmClient::from_config(&crm_config, criteria.clone(), timeout).unwrap()),
        Arc::new(BoardClient::from_config(&board_config, timeout).unwrap()),
        criteria,
    );
    AppState {
        runner: Arc::new(SyncRunner::new(synchronizer)),
        interval_seconds: 300,
    }
}

async fn send(state: AppState, method: &str, uri: &str) -> Result<(StatusCode, Value)> {
    let response = router(state)
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

#[tokio::test]
async fn test_health_ok_when_both_systems_reachable() -> Result<()> {
    let crm = MockServer::start_async().await;
    let boards = MockServer::start_async().await;
    crm.mock_async(|when, then| {
        when.method(GET).path("/crm/v2/org");
        then.status(200).json_body(json!({ "org": [] }));
    })
    .await;
    boards
        .mock_async(|when, then| {
            when.method(GET).path("/1/members/me");
            then.status(200).json_body(json!({ "id": "me" }));
        })
        .await;

    let (status, body) = send(app_state(&crm, &boards), "GET", "/health").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["crm"]["reachable"], true);
    assert_eq!(body["board"]["reachable"], true);
    Ok(())
}

#[tokio::test]
async fn test_health_degraded_when_board_service_fails() -> Result<()> {
    let crm = MockServer::start_async().await;
    let boards = MockServer::start_async().await;
    crm.mock_async(|when, then| {
        when.method(GET).path("/crm/v2/org");
        then.status(200).json_body(json!({ "org": [] }));
    })
    .await;
    boards
        .mock_async(|when, then| {
            when.method(GET).path("/1/members/me");
            then.status(401).body("invalid key");
        })
        .await;

    let (status, body) = send(app_state(&crm, &boards), "GET", "/health").await?;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["crm"]["reachable"], true);
    assert_eq!(body["board"]["reachable"], false);
    assert!(body["board"]["error"].as_str().unwrap().contains("invalid key"));
    Ok(())
}

#[tokio::test]
async fn test_manual_sync_returns_result_and_updates_status() -> Result<()> {
    let crm = MockServer::start_async().await;
    let boards = MockServer::start_async().await;
    crm.mock_async(|when, then| {
        when.method(GET).path("/crm/v2/Deals/search");
        then.status(204);
    })
    .await;

    let state = app_state(&crm, &boards);

    let (status, body) = send(state.clone(), "GET", "/status").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["last_run"], Value::Null);
    assert_eq!(body["data"]["interval_seconds"], 300);

    let (status, body) = send(state.clone(), "POST", "/sync").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["processed"], 0);
    assert_eq!(body["data"]["details"], json!([]));

    let (_, body) = send(state, "GET", "/status").await?;
    assert_eq!(body["data"]["sync_in_progress"], false);
    assert_eq!(body["data"]["last_run"]["trigger"], "manual");
    assert_eq!(body["data"]["last_run"]["outcome"], "completed");
    assert_eq!(body["data"]["last_run"]["result"]["created"], 0);
    Ok(())
}

#[tokio::test]
async fn test_manual_sync_reports_fetch_failure() -> Result<()> {
    let crm = MockServer::start_async().await;
    let boards = MockServer::start_async().await;
    crm.mock_async(|when, then| {
        when.method(GET).path("/crm/v2/Deals/search");
        then.status(500).body("internal error");
    })
    .await;

    let (status, body) = send(app_state(&crm, &boards), "POST", "/sync").await?;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("internal error"));
    Ok(())
}

#[tokio::test]
async fn test_abandoned_manual_sync_still_links_the_board() -> Result<()> {
    let crm = MockServer::start_async().await;
    let boards = MockServer::start_async().await;
    crm.mock_async(|when, then| {
        when.method(GET).path("/crm/v2/Deals/search");
        then.status(200).json_body(json!({
            "data": [{
                "id": "300",
                "Deal_Name": "Slow Corp",
                "Stage": "Project Kickoff",
                "Type": "New Implementation Project"
            }],
            "info": { "more_records": false }
        }));
    })
    .await;
    let write_back = crm
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/crm/v2/Deals/300")
                .json_body(json!({ "data": [{ "Trello_Board_ID": "board-slow" }] }));
            then.status(200).json_body(json!({
                "data": [{ "code": "SUCCESS", "message": "record updated", "status": "success" }]
            }));
        })
        .await;
    let board = boards
        .mock_async(|when, then| {
            when.method(POST).path("/1/boards/");
            then.status(200).json_body(json!({
                "id": "board-slow",
                "name": "Project: Slow Corp",
                "url": "https://trello.com/b/slow"
            }));
        })
        .await;
    boards
        .mock_async(|when, then| {
            when.method(POST).path("/1/lists");
            then.status(200).json_body(json!({ "id": "list-todo", "name": "To Do" }));
        })
        .await;
    boards
        .mock_async(|when, then| {
            when.method(POST).path("/1/cards");
            then.status(200)
                .delay(Duration::from_millis(300))
                .json_body(json!({ "id": "card", "name": "card", "idList": "list-todo" }));
        })
        .await;

    let state = app_state(&crm, &boards);

    // The caller gives up while cards are still being created.
    let abandoned =
        tokio::time::timeout(Duration::from_millis(100), send(state.clone(), "POST", "/sync"))
            .await;
    assert!(abandoned.is_err());

    let mut report = None;
    for _ in 0..100 {
        report = state.runner.last_run().await;
        if report.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let report = serde_json::to_value(report.expect("run recorded after the caller left"))?;

    assert_eq!(report["outcome"], "completed");
    assert_eq!(report["result"]["created"], 1);
    board.assert_hits_async(1).await;
    write_back.assert_hits_async(1).await;
    assert!(!state.runner.is_running());
    Ok(())
}

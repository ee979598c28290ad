use anyhow::Result;
use deal_board_sync::config::toml_config::BoardConfig;
use deal_board_sync::domain::ports::BoardProvisioner;
use deal_board_sync::{BoardClient, SyncError};
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

fn board_client(server: &MockServer) -> BoardClient {
    let config = BoardConfig {
        api_base: server.base_url(),
        api_key: "key".to_string(),
        token: "token".to_string(),
    };
    BoardClient::from_config(&config, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_create_project_board_builds_fixed_template() -> Result<()> {
    let server = MockServer::start_async().await;

    let board = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/1/boards/")
                .query_param("key", "key")
                .query_param("token", "token")
                .query_param("name", "Project: Acme Rollout")
                .query_param("desc", "Project board for CRM deal 4150868000001")
                .query_param("defaultLists", "false")
                .query_param("prefs_permissionLevel", "private");
            then.status(200).json_body(json!({
                "id": "board-1",
                "name": "Project: Acme Rollout",
                "url": "https://trello.com/b/abc/project-acme-rollout",
                "shortUrl": "https://trello.com/b/abc"
            }));
        })
        .await;

    let mut list_mocks = Vec::new();
    for (position, (name, id)) in [
        ("To Do", "list-todo"),
        ("In Progress", "list-doing"),
        ("Done", "list-done"),
    ]
    .into_iter()
    .enumerate()
    {
        let pos = (position + 1).to_string();
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/1/lists")
                    .query_param("idBoard", "board-1")
                    .query_param("name", name)
                    .query_param("pos", pos.as_str());
                then.status(200).json_body(json!({ "id": id, "name": name }));
            })
            .await;
        list_mocks.push(mock);
    }

    let mut card_mocks = Vec::new();
    for (name, id) in [
        ("Kickoff Meeting Scheduled", "card-kickoff"),
        ("Requirements Gathering", "card-requirements"),
        ("System Setup", "card-setup"),
    ] {
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/1/cards")
                    .query_param("idList", "list-todo")
                    .query_param("name", name)
                    .query_param_exists("desc");
                then.status(200).json_body(json!({
                    "id": id,
                    "name": name,
                    "idList": "list-todo",
                    "url": format!("https://trello.com/c/{}", id)
                }));
            })
            .await;
        card_mocks.push(mock);
    }

    let project = board_client(&server)
        .create_project_board("Acme Rollout", "4150868000001")
        .await?;

    board.assert_async().await;
    for mock in list_mocks.iter().chain(card_mocks.iter()) {
        mock.assert_hits_async(1).await;
    }

    assert_eq!(project.board.id, "board-1");
    assert_eq!(project.board.url, "https://trello.com/b/abc/project-acme-rollout");

    let lists: Vec<(&str, &str, u32)> = project
        .lists
        .iter()
        .map(|l| (l.id.as_str(), l.name.as_str(), l.position))
        .collect();
    assert_eq!(
        lists,
        vec![
            ("list-todo", "To Do", 1),
            ("list-doing", "In Progress", 2),
            ("list-done", "Done", 3)
        ]
    );

    let cards: Vec<&str> = project.cards.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        cards,
        vec![
            "Kickoff Meeting Scheduled",
            "Requirements Gathering",
            "System Setup"
        ]
    );
    assert!(project.cards.iter().all(|c| c.list_id == "list-todo"));
    Ok(())
}

#[tokio::test]
async fn test_failed_list_creation_aborts_without_cards() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/1/boards/");
            then.status(200).json_body(json!({
                "id": "board-1",
                "name": "Project: Acme",
                "url": "https://trello.com/b/abc"
            }));
        })
        .await;
    let todo = server
        .mock_async(|when, then| {
            when.method(POST).path("/1/lists").query_param("name", "To Do");
            then.status(200)
                .json_body(json!({ "id": "list-todo", "name": "To Do" }));
        })
        .await;
    let in_progress = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/1/lists")
                .query_param("name", "In Progress");
            then.status(400).body("invalid value for idBoard");
        })
        .await;
    let done = server
        .mock_async(|when, then| {
            when.method(POST).path("/1/lists").query_param("name", "Done");
            then.status(200)
                .json_body(json!({ "id": "list-done", "name": "Done" }));
        })
        .await;
    let cards = server
        .mock_async(|when, then| {
            when.method(POST).path("/1/cards");
            then.status(200).json_body(json!({ "id": "c", "name": "c" }));
        })
        .await;

    let err = board_client(&server)
        .create_project_board("Acme", "1")
        .await
        .unwrap_err();

    match err {
        SyncError::RemoteRejection {
            operation,
            status,
            message,
            ..
        } => {
            assert_eq!(operation, "create list");
            assert_eq!(status, "400");
            assert_eq!(message, "invalid value for idBoard");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    todo.assert_hits_async(1).await;
    in_progress.assert_hits_async(1).await;
    done.assert_hits_async(0).await;
    cards.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_board_rejection_surfaces_before_lists() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/1/boards/");
            then.status(401).body("invalid token");
        })
        .await;
    let lists = server
        .mock_async(|when, then| {
            when.method(POST).path("/1/lists");
            then.status(200).json_body(json!({ "id": "l", "name": "l" }));
        })
        .await;

    let result = board_client(&server).create_project_board("Acme", "1").await;

    assert!(matches!(result, Err(SyncError::RemoteRejection { .. })));
    lists.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_check_connection() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/1/members/me")
                .query_param("key", "key")
                .query_param("token", "token");
            then.status(200).json_body(json!({ "id": "member-1" }));
        })
        .await;

    tokio_test::assert_ok!(board_client(&server).check_connection().await);
}

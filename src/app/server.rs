use crate::app::scheduler::{RunReport, SyncRunner, Trigger};
use crate::utils::error::{Result, SyncError};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<SyncRunner>,
    pub interval_seconds: u64,
}

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Serialize)]
struct SystemHealth {
    reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SystemHealth {
    fn from_check(check: Result<()>) -> Self {
        match check {
            Ok(()) => Self {
                reachable: true,
                error: None,
            },
            Err(e) => Self {
                reachable: false,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
    crm: SystemHealth,
    board: SystemHealth,
}

#[derive(Serialize)]
struct StatusReport {
    sync_in_progress: bool,
    interval_seconds: u64,
    last_run: Option<RunReport>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(sync_status))
        .route("/sync", post(trigger_sync))
        .with_state(state)
}

/// GET /health - reachability of both remote systems
async fn health_check(State(state): State<AppState>) -> Response {
    let synchronizer = state.runner.synchronizer();
    let (crm, board) = tokio::join!(
        synchronizer.source().check_connection(),
        synchronizer.boards().check_connection()
    );

    let report = HealthReport {
        status: "ok",
        crm: SystemHealth::from_check(crm),
        board: SystemHealth::from_check(board),
    };

    if report.crm.reachable && report.board.reachable {
        (StatusCode::OK, Json(report)).into_response()
    } else {
        tracing::warn!("Health check failed: one or both remote systems unreachable");
        let report = HealthReport {
            status: "degraded",
            ..report
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(report)).into_response()
    }
}

/// GET /status - last run and scheduler settings
async fn sync_status(State(state): State<AppState>) -> Response {
    let report = StatusReport {
        sync_in_progress: state.runner.is_running(),
        interval_seconds: state.interval_seconds,
        last_run: state.runner.last_run().await,
    };
    (StatusCode::OK, Json(ApiResponse::ok(report))).into_response()
}

/// POST /sync - run a sync now
async fn trigger_sync(State(state): State<AppState>) -> Response {
    match state.runner.trigger(Trigger::Manual).await {
        Ok(result) => (StatusCode::OK, Json(ApiResponse::ok(result))).into_response(),
        Err(e @ SyncError::SyncInProgress) => (
            StatusCode::CONFLICT,
            Json(ApiResponse::<()>::err(e.to_string())),
        )
            .into_response(),
        Err(e @ SyncError::TaskFailed(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::err(e.to_string())),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::<()>::err(e.to_string())),
        )
            .into_response(),
    }
}

pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("🚀 HTTP server listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(SyncError::IoError)
}

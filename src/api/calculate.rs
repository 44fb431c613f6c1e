use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    app::AppState,
    ranking::{ContentScope, RunSummary},
    scheduler::{JobContext, RunTrigger, SchedulerError},
};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CalculateRequest {
    #[serde(default, rename = "contentType")]
    content_type: ContentScope,
}

#[derive(Debug, Serialize)]
struct CalculateResponse {
    success: bool,
    #[serde(flatten)]
    summary: RunSummary,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    let body = Json(ErrorResponse {
        success: false,
        error: error.into(),
    });
    (status, body).into_response()
}

/// 空ボディは `{"contentType": "all"}` と同じ扱い。
fn parse_request(body: &[u8]) -> Result<CalculateRequest, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CalculateRequest::default());
    }
    serde_json::from_slice(body)
}

/// ランキング計算を同期的に実行し、結果のサマリーを返す。
pub(crate) async fn trigger(State(state): State<AppState>, body: Bytes) -> Response {
    state.telemetry().record_manual_run_invocation();

    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(error) => {
            return failure(StatusCode::BAD_REQUEST, format!("invalid request body: {error}"));
        }
    };

    let context = JobContext::new(request.content_type, RunTrigger::Manual);
    match state.scheduler().run_job(context).await {
        Ok(summary) => {
            let body = Json(CalculateResponse {
                success: true,
                summary,
            });
            (StatusCode::OK, body).into_response()
        }
        Err(SchedulerError::Busy) => failure(StatusCode::CONFLICT, SchedulerError::Busy.to_string()),
        Err(error) => failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{:#}", anyhow::Error::new(error)),
        ),
    }
}

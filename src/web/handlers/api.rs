use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::pipeline::{PipelineError, QueryOutcome};
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, kind: &'static str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            kind,
            message: message.into(),
        }),
    )
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::MissingInput(_) | PipelineError::Connection(_) => StatusCode::BAD_REQUEST,
            PipelineError::GenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::GenerationEmpty(_)
            | PipelineError::Validation(_)
            | PipelineError::Execution(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        api_error(status, err.kind(), err.to_string())
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    let status = err.status();
    warn!("Rejected multipart upload ({}): {}", status, err);
    let kind = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "payload_too_large"
    } else {
        "bad_request"
    };
    api_error(status, kind, err.body_text())
}

// System status

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub backend: String,
    pub model: String,
    pub validation: String,
}

// API Implementations

/// `POST /api/ask`: multipart with a `database` file part and a `question` text part.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<QueryOutcome>, ApiError> {
    let mut database: Option<Vec<u8>> = None;
    let mut question: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("database") => {
                let bytes = field.bytes().await.map_err(multipart_error)?;
                database = Some(bytes.to_vec());
            }
            Some("question") => {
                let text = field.text().await.map_err(multipart_error)?;
                question = Some(text);
            }
            other => warn!("Ignoring unexpected multipart field {:?}", other),
        }
    }

    let question = question.unwrap_or_default();
    let database = database.unwrap_or_default();
    info!("Question over {} byte database: {}", database.len(), question);

    match state.pipeline.run(database, &question).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            error!("Pipeline failed ({}): {}", e.kind(), e);
            Err(e.into())
        }
    }
}

// System status
pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        backend: state.pipeline.backend_name().to_string(),
        model: state.config.llm.model.clone(),
        validation: state.pipeline.validation_mode().to_string(),
    })
}

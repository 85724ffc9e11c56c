//! Thin HTTP façade over the pipeline.
//!
//! Each request constructs a fresh pipeline from the shared configuration
//! and runs exactly one entry mode. Configuration failures map to 400;
//! everything else is a 500 with the error message in the body.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{AppConfig, ConfigError};
use crate::core::PromptPipeline;
use crate::domain::PipelineOutcome;

#[derive(Debug, Deserialize)]
struct EnhanceTextRequest {
    text: String,
    story_id: Option<String>,
    story_title: Option<String>,
    #[serde(default)]
    promote: bool,
}

#[derive(Debug, Deserialize)]
struct ProcessAudioRequest {
    path: PathBuf,
    story_id: Option<String>,
    story_title: Option<String>,
    #[serde(default)]
    promote: bool,
}

#[derive(Debug, Deserialize, Default)]
struct ListenOnceRequest {
    story_id: Option<String>,
    story_title: Option<String>,
    #[serde(default)]
    promote: bool,
}

#[derive(Debug, Serialize)]
struct OutcomeResponse {
    story_id: String,
    prompt_path: PathBuf,
    work_type: String,
    summary: String,
    transcription_text: String,
}

impl From<PipelineOutcome> for OutcomeResponse {
    fn from(outcome: PipelineOutcome) -> Self {
        Self {
            story_id: outcome.saved_prompt.story_id,
            prompt_path: outcome.saved_prompt.prompt_path,
            work_type: outcome.plan.work_type.as_str().to_string(),
            summary: outcome.plan.summary,
            transcription_text: outcome.transcription.text,
        }
    }
}

struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<ConfigError>().is_some() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

pub fn router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/enhance-text", post(enhance_text))
        .route("/process-audio", post(process_audio))
        .route("/listen-once", post(listen_once))
        .with_state(config)
}

/// Bind and serve until the process exits.
pub async fn serve(addr: SocketAddr, config: AppConfig) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "http server listening");
    axum::serve(listener, router(Arc::new(config))).await?;
    Ok(())
}

async fn enhance_text(
    State(config): State<Arc<AppConfig>>,
    Json(req): Json<EnhanceTextRequest>,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let mut pipeline = PromptPipeline::from_config(&config)?;
    let outcome = pipeline
        .enhance_text(
            &req.text,
            req.story_id.as_deref(),
            req.story_title.as_deref(),
            req.promote,
        )
        .await?;
    Ok(Json(outcome.into()))
}

async fn process_audio(
    State(config): State<Arc<AppConfig>>,
    Json(req): Json<ProcessAudioRequest>,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let mut pipeline = PromptPipeline::from_config(&config)?;
    let outcome = pipeline
        .process_audio_file(
            &req.path,
            req.story_id.as_deref(),
            req.story_title.as_deref(),
            req.promote,
        )
        .await?;
    Ok(Json(outcome.into()))
}

async fn listen_once(
    State(config): State<Arc<AppConfig>>,
    Json(req): Json<ListenOnceRequest>,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let mut pipeline = PromptPipeline::from_config(&config)?;
    let outcome = pipeline
        .listen_once(
            req.story_id.as_deref(),
            req.story_title.as_deref(),
            req.promote,
        )
        .await?;
    Ok(Json(outcome.into()))
}

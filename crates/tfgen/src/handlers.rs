//! HTTP Handlers

use std::path::PathBuf;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use agent_core::{AgentError, ProtocolViolation};
use terraform_gen::{GenerationReport, GeneratorConfig, GeneratorError};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider_connected: bool,
}

/// Body of `POST /api/generate`. Script execution stays a server setting.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub max_rounds: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptEntry {
    pub sender: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub termination: String,
    pub rounds: usize,
    pub terraform_dir: PathBuf,
    pub messages: Vec<TranscriptEntry>,
    pub modules: Vec<String>,
    pub missing_files: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_violation: Option<ProtocolViolation>,
}

impl From<GenerationReport> for GenerateResponse {
    fn from(report: GenerationReport) -> Self {
        Self {
            termination: report.termination().to_string(),
            rounds: report.result.state.rounds,
            protocol_violation: report.result.protocol_violation().cloned(),
            messages: report
                .result
                .transcript
                .iter()
                .map(|m| TranscriptEntry {
                    sender: m.sender.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            terraform_dir: report.terraform_dir,
            modules: report.layout.modules,
            missing_files: report.layout.missing,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Status and code for a failed generation
pub fn error_response(err: &GeneratorError) -> ApiError {
    let (status, code) = match err {
        e if e.is_configuration() => (StatusCode::BAD_REQUEST, "CONFIGURATION_ERROR"),
        GeneratorError::Agent(
            AgentError::Provider(_)
            | AgentError::ProviderUnavailable(_)
            | AgentError::RateLimited(_)
            | AgentError::Auth(_),
        ) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "GENERATION_ERROR"),
    };
    
    let error = match err {
        GeneratorError::Agent(e) => e.user_message(),
        other => other.to_string(),
    };
    
    (status, Json(ErrorResponse { error, code: code.into() }))
}

/// Server defaults with the request's directories and round limit applied
pub fn request_config(defaults: &GeneratorConfig, payload: &GenerateRequest) -> GeneratorConfig {
    GeneratorConfig {
        source_dir: payload.source_dir.clone(),
        dest_dir: payload.dest_dir.clone(),
        max_rounds: payload.max_rounds.unwrap_or(defaults.max_rounds),
        ..defaults.clone()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider_connected = state.provider.health_check().await.unwrap_or(false);
    
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider_connected,
    })
}

/// Run one generation for the given directories
pub async fn generate_handler(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let config = request_config(&state.defaults, &payload);
    
    let report = terraform_gen::generate(&config, state.provider.clone(), payload.message.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Generation failed: {}", e);
            error_response(&e)
        })?;
    
    Ok(Json(report.into()))
}

//! API Handler implementations for the tool operations.

use axum::extract::{Json, State};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::tools::types::{
    DownloadRequest, EditFileRequest, OutputResponse, RunCodeRequest, RunEphemeralRequest,
    RunFileRequest, UploadRequest,
};
use crate::host::HostState;

fn required(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::ValidationError(format!("{field} is required")));
    }
    Ok(())
}

/// POST /api/v1/run
pub async fn run_code(
    State(state): State<Arc<HostState>>,
    Json(req): Json<RunCodeRequest>,
) -> Result<Json<OutputResponse>, ApiError> {
    let output = state.run_code(&req.code, req.session_id.as_deref()).await?;
    Ok(Json(output.into()))
}

/// POST /api/v1/run/ephemeral
pub async fn run_code_ephemeral(
    State(state): State<Arc<HostState>>,
    Json(req): Json<RunEphemeralRequest>,
) -> Result<Json<OutputResponse>, ApiError> {
    let output = state.run_code_ephemeral(&req.code).await?;
    Ok(Json(output.into()))
}

/// POST /api/v1/run/file
pub async fn run_file(
    State(state): State<Arc<HostState>>,
    Json(req): Json<RunFileRequest>,
) -> Result<Json<OutputResponse>, ApiError> {
    required("path", &req.path)?;
    let output = state.run_file(&req.path, req.session_id.as_deref()).await?;
    Ok(Json(output.into()))
}

/// POST /api/v1/files/upload
pub async fn upload(
    State(state): State<Arc<HostState>>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<OutputResponse>, ApiError> {
    required("local_path", &req.local_path)?;
    let output = state
        .cp_in(
            &req.local_path,
            req.container_path.as_deref(),
            req.session_id.as_deref(),
        )
        .await?;
    Ok(Json(output.into()))
}

/// POST /api/v1/files/download
pub async fn download(
    State(state): State<Arc<HostState>>,
    Json(req): Json<DownloadRequest>,
) -> Result<Json<OutputResponse>, ApiError> {
    required("container_path", &req.container_path)?;
    let output = state
        .cp_out(
            &req.container_path,
            req.local_path.as_deref(),
            req.session_id.as_deref(),
        )
        .await?;
    Ok(Json(output.into()))
}

/// PUT /api/v1/files
pub async fn edit_file(
    State(state): State<Arc<HostState>>,
    Json(req): Json<EditFileRequest>,
) -> Result<Json<OutputResponse>, ApiError> {
    required("container_path", &req.container_path)?;
    let output = state
        .edit_file(&req.container_path, &req.content, req.session_id.as_deref())
        .await?;
    Ok(Json(output.into()))
}

/// GET /api/v1/packages
pub async fn list_packages(
    State(state): State<Arc<HostState>>,
) -> Result<Json<OutputResponse>, ApiError> {
    Ok(Json(state.list_packages().await?.into()))
}

/// POST /api/v1/reset
pub async fn reset(State(state): State<Arc<HostState>>) -> Result<Json<OutputResponse>, ApiError> {
    Ok(Json(state.reset().await?.into()))
}

//! REST API routes for the tool operations.

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::api::tools::handlers::{
    download, edit_file, list_packages, reset, run_code, run_code_ephemeral, run_file, upload,
};
use crate::host::HostState;

/// API routes for code execution, file transfer and environment control,
/// mounted at `/api/v1`.
pub fn routes() -> Router<Arc<HostState>> {
    Router::new()
        .route("/api/v1/run", post(run_code))
        .route("/api/v1/run/ephemeral", post(run_code_ephemeral))
        .route("/api/v1/run/file", post(run_file))
        .route("/api/v1/files", put(edit_file))
        .route("/api/v1/files/upload", post(upload))
        .route("/api/v1/files/download", post(download))
        .route("/api/v1/packages", get(list_packages))
        .route("/api/v1/reset", post(reset))
}

//! REST API for the kernel.
//!
//! This module provides HTTP endpoints for sessions, code execution, file
//! transfer and environment control.

pub mod error;
pub mod sessions;
pub mod tools;

use axum::Router;
use std::sync::Arc;

use crate::host::HostState;

pub use error::ApiError;
pub use sessions::routes as session_routes;
pub use tools::routes as tool_routes;

/// Every API route.
pub fn routes() -> Router<Arc<HostState>> {
    session_routes().merge(tool_routes())
}

//! pyexec kernel - session-scoped Python execution over a shared sandbox.
//!
//! This crate provides the session lifecycle layer of a code interpreter:
//! a concurrent, self-cleaning registry of isolated workspaces inside one
//! long-lived execution environment, a current-session pointer per
//! connection, path confinement on both sides of the sandbox boundary, and
//! the tool operations and HTTP API built on top of them.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// REST API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Execution environment backends.
pub mod environment;
/// Host state and tool operations.
pub mod host;
/// Infrastructure components (config, server, telemetry).
pub mod infrastructure;
/// Rendering of command results.
pub mod report;
/// Path confinement.
pub mod sandbox;
/// Session lifecycle.
pub mod session;

//! Integration tests for the HTTP API.
//!
//! Drives session lifecycle, code execution, file transfer and error mapping
//! through a real server bound to an ephemeral port.

use anyhow::Result;
use pyexec_kernel::infrastructure::config::SessionSettings;
use serde_json::json;

mod common;

/// Health reports the live session count.
#[tokio::test]
async fn test_health() -> Result<()> {
    let ctx = common::IntegrationTestContext::new().await?;

    let (status, body) = ctx.get("/health").await?;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["sessions"], 0);

    ctx.shutdown().await
}

/// Create, list, inspect current, close.
#[tokio::test]
async fn test_session_lifecycle() -> Result<()> {
    let ctx = common::IntegrationTestContext::new().await?;

    let (status, body) = ctx.post("/api/v1/sessions", json!({})).await?;
    assert_eq!(status, 200);
    let sid = body["session_id"].as_str().unwrap_or_default().to_string();
    assert_eq!(sid.len(), 32);

    let (_, current) = ctx.get("/api/v1/sessions/current").await?;
    assert_eq!(current["session_id"], sid.as_str());

    let (status, list) = ctx.get("/api/v1/sessions").await?;
    assert_eq!(status, 200);
    let sessions = list["sessions"].as_array().cloned().unwrap_or_default();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["session_id"], sid.as_str());
    assert_eq!(sessions[0]["current"], true);

    let (status, closed) = ctx.delete(&format!("/api/v1/sessions/{sid}")).await?;
    assert_eq!(status, 200);
    assert_eq!(closed["message"], format!("closed {sid}"));

    let (_, current) = ctx.get("/api/v1/sessions/current").await?;
    assert_eq!(current["session_id"], "");
    assert!(ctx.host.registry().is_empty());

    ctx.shutdown().await
}

/// Closing the current session through its own endpoint.
#[tokio::test]
async fn test_close_current_session() -> Result<()> {
    let ctx = common::IntegrationTestContext::new().await?;

    let (_, closed) = ctx.delete("/api/v1/sessions/current").await?;
    assert_eq!(closed["message"], "no current session");

    let (_, created) = ctx.post("/api/v1/sessions", json!({})).await?;
    let sid = created["session_id"].as_str().unwrap_or_default().to_string();
    let (_, closed) = ctx.delete("/api/v1/sessions/current").await?;
    assert_eq!(closed["message"], format!("closed {sid}"));

    ctx.shutdown().await
}

/// Code runs in the current session; ephemeral runs leave no trace.
#[tokio::test]
async fn test_run_code_and_ephemeral() -> Result<()> {
    let ctx = common::IntegrationTestContext::new().await?;

    let (status, body) = ctx
        .post("/api/v1/run", json!({ "code": "print('hi')" }))
        .await?;
    assert_eq!(status, 200);
    let output = body["output"].as_str().unwrap_or_default().to_string();
    assert!(output.contains("/workspace/sessions/"));
    assert!(output.ends_with("Exit code: 0"));
    assert_eq!(ctx.host.registry().len(), 1);

    let (status, _) = ctx
        .post("/api/v1/run/ephemeral", json!({ "code": "print('once')" }))
        .await?;
    assert_eq!(status, 200);
    assert_eq!(ctx.host.registry().len(), 1);

    ctx.shutdown().await
}

/// Write a script, run it, copy files across the boundary.
#[tokio::test]
async fn test_files_round_trip() -> Result<()> {
    let ctx = common::IntegrationTestContext::new().await?;
    let (_, created) = ctx.post("/api/v1/sessions", json!({})).await?;
    let sid = created["session_id"].as_str().unwrap_or_default().to_string();

    let (status, _) = ctx
        .put(
            "/api/v1/files",
            json!({ "container_path": "code/main.py", "content": "print(1)\n", "session_id": sid }),
        )
        .await?;
    assert_eq!(status, 200);

    let (status, ran) = ctx
        .post("/api/v1/run/file", json!({ "path": "code/main.py" }))
        .await?;
    assert_eq!(status, 200);
    assert!(ran["output"]
        .as_str()
        .unwrap_or_default()
        .contains(&format!("/workspace/sessions/{sid}/code/main.py")));

    ctx.create_input_file("input.txt", "hello")?;
    let (status, uploaded) = ctx
        .post("/api/v1/files/upload", json!({ "local_path": "input.txt" }))
        .await?;
    assert_eq!(status, 200);
    assert!(uploaded["output"]
        .as_str()
        .unwrap_or_default()
        .contains(&format!("container:/workspace/sessions/{sid}/input.txt")));

    let (status, _) = ctx
        .post(
            "/api/v1/files/download",
            json!({ "container_path": "input.txt", "local_path": "out/copy.txt" }),
        )
        .await?;
    assert_eq!(status, 200);
    assert_eq!(
        std::fs::read_to_string(ctx.outbound.path().join("out/copy.txt"))?,
        "hello"
    );

    ctx.shutdown().await
}

/// Error kinds map onto distinct status codes.
#[tokio::test]
async fn test_error_mapping() -> Result<()> {
    let ctx = common::IntegrationTestContext::new().await?;

    let (status, body) = ctx
        .post("/api/v1/run/file", json!({ "path": "../escape.py" }))
        .await?;
    assert_eq!(status, 403);
    assert_eq!(body["error_type"], "path_escape");

    let (status, body) = ctx
        .post(
            "/api/v1/run",
            json!({ "code": "print(1)", "session_id": "0123456789abcdef0123456789abcdef" }),
        )
        .await?;
    assert_eq!(status, 404);
    assert_eq!(body["error_type"], "unknown_session");

    let (status, body) = ctx
        .post("/api/v1/run/file", json!({ "path": "  " }))
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["error_type"], "validation");

    let (status, _) = ctx
        .post("/api/v1/files/download", json!({ "container_path": "absent.txt" }))
        .await?;
    assert_eq!(status, 502);

    ctx.shutdown().await
}

/// Strict mode demands an explicit session id.
#[tokio::test]
async fn test_require_explicit_session() -> Result<()> {
    let ctx = common::IntegrationTestContext::with_session(SessionSettings {
        require_explicit: true,
        ..SessionSettings::default()
    })
    .await?;

    let (status, body) = ctx.post("/api/v1/run", json!({ "code": "1" })).await?;
    assert_eq!(status, 400);
    assert_eq!(body["error_type"], "session_required");

    ctx.shutdown().await
}

/// Packages and reset.
#[tokio::test]
async fn test_packages_and_reset() -> Result<()> {
    let ctx = common::IntegrationTestContext::new().await?;
    ctx.post("/api/v1/sessions", json!({})).await?;

    let (status, packages) = ctx.get("/api/v1/packages").await?;
    assert_eq!(status, 200);
    assert!(packages["output"]
        .as_str()
        .unwrap_or_default()
        .ends_with("Exit code: 0"));

    let (status, reset) = ctx.post("/api/v1/reset", json!({})).await?;
    assert_eq!(status, 200);
    assert_eq!(reset["output"], "reset");
    assert!(ctx.host.registry().is_empty());
    assert_eq!(ctx.env.resets(), 1);

    ctx.shutdown().await
}

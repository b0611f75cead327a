use crate::api;
use crate::host::HostState;
use crate::infrastructure::config::Settings;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builds the full HTTP application.
///
/// `/metrics` is only mounted when a Prometheus handle is supplied.
pub fn app(state: Arc<HostState>, metrics: Option<PrometheusHandle>) -> Router {
    let mut router = api::routes().with_state(state);
    if let Some(handle) = metrics {
        router = router.route("/metrics", get(move || std::future::ready(handle.render())));
    }
    router
}

/// Serves `app` on an already bound listener until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails while running.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!("Control Plane listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Runs the control plane HTTP server.
///
/// # Errors
///
/// Returns an error if the metrics recorder cannot be installed, or the
/// server fails to start or encounters an error while running.
pub async fn run_server<F>(
    config: &Settings,
    state: Arc<HostState>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {e}"))?;

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;

    serve(listener, app(state, Some(handle)), shutdown).await
}

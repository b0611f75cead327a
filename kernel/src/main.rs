//! pyexec kernel binary: loads settings, starts the janitor and serves the HTTP API.

use anyhow::Context;
use clap::Parser;
use pyexec_kernel::cli::Cli;
use pyexec_kernel::environment::{DockerEnvironment, ExecutionEnvironment, MemoryEnvironment};
use pyexec_kernel::host::HostState;
use pyexec_kernel::infrastructure::config::{Backend, Settings};
use pyexec_kernel::infrastructure::{audit, server, telemetry::TelemetryBuilder};
use pyexec_kernel::session::SystemClock;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Settings::load(&cli.overrides()).context("Failed to load configuration")?;

    let _telemetry = TelemetryBuilder::from_settings(&config.telemetry, env!("CARGO_PKG_VERSION"))
        .init()
        .context("Failed to initialize telemetry")?;

    info!("pyexec kernel starting...");
    audit::log_audit(&audit::AuditEvent::SystemStartup {
        component: "Kernel".into(),
    });

    for dir in [config.workdirs.input_dir(), config.workdirs.output_dir()] {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create workdir {}", dir.display()))?;
    }

    let environment: Arc<dyn ExecutionEnvironment> = match config.docker.backend {
        Backend::Docker => Arc::new(DockerEnvironment::new(config.docker.clone())),
        Backend::Memory => {
            warn!("Using the in-memory backend; code will not be executed");
            Arc::new(MemoryEnvironment::new())
        }
    };
    info!(
        backend = environment.name(),
        base_dir = %config.session.base_dir,
        ttl_secs = config.session.ttl_secs,
        max_sessions = config.session.max_sessions,
        persist_current = config.session.persist_current,
        "Execution environment selected"
    );

    let state = Arc::new(
        HostState::new(
            environment,
            Arc::new(SystemClock),
            &config.session,
            &config.workdirs,
        )
        .context("Failed to initialize host state")?,
    );
    state.start_janitor();

    if let Err(e) = server::run_server(&config, state.clone(), shutdown_signal()).await {
        error!("Control Plane failed: {:?}", e);
    }

    info!("Shutdown signal received, cleaning up...");
    state.shutdown().await;
    audit::log_audit(&audit::AuditEvent::SystemShutdown {
        reason: "Signal received".into(),
    });

    info!("pyexec kernel shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

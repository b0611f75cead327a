//! Background expiry of idle sessions.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::registry::SessionRegistry;
use super::types::SessionId;

/// Periodically sweeps a [`SessionRegistry`] for expired sessions.
#[derive(Debug)]
pub struct Janitor;

impl Janitor {
    /// Starts the sweep loop on the current runtime.
    ///
    /// A sweep that panics is logged and the loop keeps going.
    #[must_use]
    pub fn spawn(
        registry: Arc<SessionRegistry>,
        ttl: Duration,
        interval: Duration,
    ) -> JanitorHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let loop_registry = registry.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            info!(
                ttl_secs = ttl.as_secs(),
                interval_secs = interval.as_secs(),
                "Session janitor started"
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let registry = loop_registry.clone();
                        let sweep = tokio::spawn(async move { registry.sweep_expired(ttl).await });
                        match sweep.await {
                            Ok(removed) if !removed.is_empty() => {
                                debug!(count = removed.len(), "Janitor removed expired sessions");
                            }
                            Ok(_) => {}
                            Err(e) => error!(error = %e, "Janitor sweep failed"),
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Session janitor stopped");
        });

        JanitorHandle {
            registry,
            ttl,
            stop: stop_tx,
            task: Some(task),
        }
    }
}

/// Controls a running [`Janitor`].
#[derive(Debug)]
pub struct JanitorHandle {
    registry: Arc<SessionRegistry>,
    ttl: Duration,
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl JanitorHandle {
    /// Runs one sweep immediately, outside the schedule.
    pub async fn sweep_once(&self) -> Vec<SessionId> {
        self.registry.sweep_expired(self.ttl).await
    }

    /// Stops the loop and waits for it to finish. A sweep in progress is
    /// allowed to complete.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "Janitor task ended abnormally");
            }
        }
    }
}

impl Drop for JanitorHandle {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MemoryEnvironment;
    use crate::infrastructure::config::SessionSettings;
    use crate::session::clock::ManualClock;

    fn registry() -> (Arc<ManualClock>, Arc<SessionRegistry>) {
        let clock = Arc::new(ManualClock::new(0.0));
        let registry = Arc::new(SessionRegistry::new(
            Arc::new(MemoryEnvironment::new()),
            clock.clone(),
            &SessionSettings::default(),
        ));
        (clock, registry)
    }

    #[tokio::test]
    async fn test_sweep_once_uses_configured_ttl() -> anyhow::Result<()> {
        let (clock, registry) = registry();
        let id = registry.create().await?;
        let janitor = Janitor::spawn(
            registry.clone(),
            Duration::from_secs(600),
            Duration::from_secs(3600),
        );

        clock.set(600.0);
        assert!(janitor.sweep_once().await.is_empty());
        clock.set(601.0);
        assert_eq!(janitor.sweep_once().await, vec![id]);

        janitor.shutdown().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_loop_expires_sessions_and_stops() -> anyhow::Result<()> {
        let (clock, registry) = registry();
        let id = registry.create().await?;
        let janitor = Janitor::spawn(
            registry.clone(),
            Duration::from_secs(10),
            Duration::from_millis(20),
        );

        clock.set(20.0);
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if !registry.contains(&id) {
                break;
            }
        }
        assert!(!registry.contains(&id));

        janitor.shutdown().await;
        Ok(())
    }
}

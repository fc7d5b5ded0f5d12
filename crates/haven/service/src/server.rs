//! Daemon wiring: storage, service, scheduler, HTTP server.

use crate::api::{create_router, AppState};
use crate::config::HavenConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::service::HavenService;
use haven_ledger::{CommitLog, InMemoryCommitLog};
use haven_scheduler::EscalationScheduler;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

pub struct Server {
    config: HavenConfig,
    state: AppState,
    trigger_rx: Option<mpsc::Receiver<()>>,
}

impl Server {
    pub fn new(config: HavenConfig) -> Self {
        let log: Arc<dyn CommitLog> = Arc::new(InMemoryCommitLog::new());
        let service = Arc::new(HavenService::new(log, config.service_options()));
        let (scheduler, trigger_rx) =
            EscalationScheduler::new(config.scheduler, service.clone());

        let state = AppState::new(service, scheduler);
        Self {
            config,
            state,
            trigger_rx: Some(trigger_rx),
        }
    }

    pub async fn run(mut self) -> DaemonResult<()> {
        if self.config.scheduler.enabled {
            if let Some(trigger_rx) = self.trigger_rx.take() {
                let scheduler = self.state.scheduler.clone();
                tokio::spawn(scheduler.start(trigger_rx));
            }
        } else {
            info!("escalation scheduler disabled by configuration");
        }

        let router = create_router(self.state.clone(), self.config.server.enable_cors);
        let listener = tokio::net::TcpListener::bind(self.config.server.listen_addr).await?;
        info!(addr = %self.config.server.listen_addr, "haven daemon listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        self.state.scheduler.stop().await;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

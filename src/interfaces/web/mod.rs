mod handlers;
mod router;

pub use router::build_api_router;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::lifecycle::LifecycleComponent;
use crate::core::scheduler::JobScheduler;

pub const SERVICE_NAME: &str = "Estado de Eventos";

#[derive(Clone)]
pub struct AppState {
    pub service: String,
    pub version: String,
    pub scheduler_interval_seconds: u64,
    pub scheduler: JobScheduler,
}

pub struct ApiServerConfig {
    pub bind_addr: String,
    pub scheduler_interval_seconds: u64,
    pub scheduler: JobScheduler,
}

/// Serves the liveness and status endpoints next to the scheduler.
pub struct ApiServer {
    bind_addr: String,
    state: AppState,
    stop: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig) -> Self {
        Self {
            bind_addr: config.bind_addr,
            state: AppState {
                service: SERVICE_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                scheduler_interval_seconds: config.scheduler_interval_seconds,
                scheduler: config.scheduler,
            },
            stop: CancellationToken::new(),
            handle: None,
        }
    }
}

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        info!("API Server Interface initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind API server to {}", self.bind_addr))?;
        let app = build_api_router(self.state.clone());
        let stop = self.stop.clone();
        let addr = self.bind_addr.clone();

        self.handle = Some(tokio::spawn(async move {
            info!("API Server running at http://{addr}");
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await
            {
                tracing::error!("API Server crashed: {}", e);
            }
        }));
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("API Server Interface shutting down...");
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        Ok(())
    }
}

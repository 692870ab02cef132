use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::core::client::{ClientConfig, EventBackend, RemoteEventClient};
use crate::core::config::Settings;
use crate::core::jobs::{CleanupJob, EventLifecycleJob};
use crate::core::lifecycle::LifecycleManager;
use crate::core::scheduler::{JobOptions, JobScheduler};
use crate::core::terminal::{self, GuideSection};
use crate::interfaces::web::{ApiServer, ApiServerConfig};

/// Registers the lifecycle sweep and the expired-event cleanup with the
/// intervals and misfire policy from `settings`.
pub(crate) async fn build_scheduler(
    settings: &Settings,
    backend: Arc<dyn EventBackend>,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new();
    let options = |interval| {
        JobOptions::every(interval)
            .misfire_grace(settings.misfire_grace())
            .coalesce(settings.scheduler_coalesce)
    };

    scheduler
        .add(
            Arc::new(EventLifecycleJob::new(backend.clone())),
            options(settings.lifecycle_interval()),
        )
        .await?;
    scheduler
        .add(
            Arc::new(CleanupJob::new(backend)),
            options(settings.cleanup_interval()),
        )
        .await?;
    Ok(scheduler)
}

pub(crate) async fn run_service(settings: Settings) -> Result<()> {
    info!("=== Starting event status service ===");
    info!("Backend URL: {}", settings.backend_url);
    info!(
        "Scheduler interval: {} seconds",
        settings.scheduler_interval_seconds
    );

    let client = RemoteEventClient::new(ClientConfig::from_settings(&settings))?;
    let backend: Arc<dyn EventBackend> = Arc::new(client);
    let scheduler = build_scheduler(&settings, backend).await?;

    let mut lifecycle = LifecycleManager::new(scheduler.clone());
    lifecycle.attach(Arc::new(Mutex::new(ApiServer::new(ApiServerConfig {
        bind_addr: settings.bind_addr(),
        scheduler_interval_seconds: settings.scheduler_interval_seconds,
        scheduler,
    }))));

    if let Err(e) = lifecycle.start().await {
        error!("Startup failed: {:#}", e);
        lifecycle.shutdown().await?;
        return Err(e);
    }
    info!("=== Service started ===");

    terminal::print_banner();
    terminal::print_link("Status API", &format!("http://{}", settings.bind_addr()));
    GuideSection::new("Service")
        .text(&format!("Backend:        {}", settings.backend_url))
        .text(&format!(
            "Lifecycle job:  every {}s",
            settings.scheduler_interval_seconds
        ))
        .text(&format!(
            "Cleanup job:    every {}s",
            settings.cleanup_interval_seconds
        ))
        .blank()
        .text("Press Ctrl+C to stop.")
        .print();
    println!();

    tokio::signal::ctrl_c().await?;

    info!("=== Stopping event status service ===");
    lifecycle.shutdown().await?;
    info!("=== Service stopped ===");
    Ok(())
}

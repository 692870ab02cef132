use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::client::EventBackend;
use crate::core::scheduler::ScheduledJob;

pub const CLEANUP_JOB_NAME: &str = "cleanup_expired_events";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub token_ok: bool,
    pub found: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Deletes scheduled events the backend reports as expired. Nothing is
/// fetched or deleted unless a superadmin token was re-established first.
pub async fn cleanup_expired_events(backend: &dyn EventBackend) -> CleanupReport {
    info!("Running job: {}", CLEANUP_JOB_NAME);
    let mut report = CleanupReport::default();

    if !backend.ensure_token().await {
        warn!("Could not obtain a superadmin token; skipping cleanup");
        return report;
    }
    report.token_ok = true;

    let expired = backend.fetch_expired().await;
    report.found = expired.len();
    if expired.is_empty() {
        info!("No expired events");
        return report;
    }
    info!("Found {} expired event(s)", expired.len());

    for event in &expired {
        info!(
            "Deleting event {} (status: {}, scheduled start: {})",
            event.id,
            event.status_label(),
            event.start_label()
        );
        if backend.delete(event.id).await {
            report.deleted += 1;
            info!("Event {} deleted", event.id);
        } else {
            report.failed += 1;
            warn!("Could not delete event {}", event.id);
        }
    }

    info!(
        "Cleanup done: {} deleted, {} failed",
        report.deleted, report.failed
    );
    report
}

pub struct CleanupJob {
    backend: Arc<dyn EventBackend>,
}

impl CleanupJob {
    pub fn new(backend: Arc<dyn EventBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ScheduledJob for CleanupJob {
    fn name(&self) -> &str {
        CLEANUP_JOB_NAME
    }

    async fn run(&self) {
        cleanup_expired_events(self.backend.as_ref()).await;
    }
}

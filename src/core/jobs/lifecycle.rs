use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::client::EventBackend;
use crate::core::scheduler::ScheduledJob;

pub const LIFECYCLE_JOB_NAME: &str = "process_events";

/// Outcome counters for one sweep over a batch of events.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub found: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub completion_triggered: usize,
    pub completion_failed: usize,
}

/// `None` marks a phase that aborted before finishing its batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LifecycleReport {
    pub start: Option<PhaseReport>,
    pub finish: Option<PhaseReport>,
}

/// Moves every due `scheduled` event to `in_progress`, in backend order.
pub async fn start_pending_events(backend: &dyn EventBackend) -> PhaseReport {
    let mut report = PhaseReport::default();
    let pending = backend.fetch_due_to_start().await;
    report.found = pending.len();

    if pending.is_empty() {
        info!("No events pending start");
        return report;
    }
    info!("Found {} event(s) to start", pending.len());

    let total = pending.len();
    for (idx, event) in pending.iter().enumerate() {
        info!(
            "[{}/{}] Starting event {} (scheduled start: {})",
            idx + 1,
            total,
            event.id,
            event.start_label()
        );
        if backend.start(event.id).await {
            report.succeeded += 1;
            info!("Event {} started", event.id);
        } else {
            report.failed += 1;
            warn!("Could not start event {}", event.id);
        }
    }
    report
}

/// Moves every due `in_progress` event to `completed`. Completion processing
/// is requested only for events whose finish the backend confirmed.
pub async fn finish_pending_events(backend: &dyn EventBackend) -> PhaseReport {
    let mut report = PhaseReport::default();
    let pending = backend.fetch_due_to_finish().await;
    report.found = pending.len();

    if pending.is_empty() {
        info!("No events pending finish");
        return report;
    }
    info!("Found {} event(s) to finish", pending.len());

    let total = pending.len();
    for (idx, event) in pending.iter().enumerate() {
        info!(
            "[{}/{}] Finishing event {} (scheduled end: {})",
            idx + 1,
            total,
            event.id,
            event.end_label()
        );
        if !backend.finish(event.id).await {
            report.failed += 1;
            warn!("Could not finish event {}; skipping completion processing", event.id);
            continue;
        }
        report.succeeded += 1;
        info!("Event {} finished; requesting completion processing", event.id);

        if backend.trigger_completion_processing(event.id).await {
            report.completion_triggered += 1;
            info!("Completion processing started for event {}", event.id);
        } else {
            report.completion_failed += 1;
            warn!("Could not start completion processing for event {}", event.id);
        }
    }
    report
}

/// Runs the start sweep, then the finish sweep. Each phase runs on its own
/// task so that a panic in one is contained and the other still runs.
pub async fn process_events(backend: Arc<dyn EventBackend>) -> LifecycleReport {
    info!("=== Processing events ===");

    info!("Step 1/2: events pending start");
    let phase_backend = backend.clone();
    let start = match tokio::spawn(async move { start_pending_events(phase_backend.as_ref()).await })
        .await
    {
        Ok(report) => {
            info!(
                "Step 1/2 done: {} found, {} started, {} failed",
                report.found, report.succeeded, report.failed
            );
            Some(report)
        }
        Err(e) => {
            error!("Step 1/2 (start events) aborted: {}", e);
            None
        }
    };

    info!("Step 2/2: events pending finish");
    let phase_backend = backend.clone();
    let finish = match tokio::spawn(async move { finish_pending_events(phase_backend.as_ref()).await })
        .await
    {
        Ok(report) => {
            info!(
                "Step 2/2 done: {} found, {} finished, {} failed, {} completion(s) started",
                report.found, report.succeeded, report.failed, report.completion_triggered
            );
            Some(report)
        }
        Err(e) => {
            error!("Step 2/2 (finish events) aborted: {}", e);
            None
        }
    };

    info!("=== Event processing complete ===");
    LifecycleReport { start, finish }
}

pub struct EventLifecycleJob {
    backend: Arc<dyn EventBackend>,
}

impl EventLifecycleJob {
    pub fn new(backend: Arc<dyn EventBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ScheduledJob for EventLifecycleJob {
    fn name(&self) -> &str {
        LIFECYCLE_JOB_NAME
    }

    async fn run(&self) {
        process_events(self.backend.clone()).await;
    }
}

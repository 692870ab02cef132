mod cleanup;
mod lifecycle;
#[cfg(test)]
pub(crate) mod testing;

pub use cleanup::{CLEANUP_JOB_NAME, CleanupJob, CleanupReport, cleanup_expired_events};
pub use lifecycle::{
    EventLifecycleJob, LIFECYCLE_JOB_NAME, LifecycleReport, PhaseReport, finish_pending_events,
    process_events, start_pending_events,
};

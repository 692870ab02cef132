mod overlap;
mod trigger;

pub use overlap::{OverlapGuard, RunGuard};
pub use trigger::{FirePolicy, IntervalTrigger};

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// A named unit of periodic work. `run` must absorb its own failures; a
/// panic is caught and logged by the scheduler.
#[async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    fn name(&self) -> &str;
    async fn run(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    pub interval: Duration,
    pub misfire_grace: Duration,
    pub coalesce: bool,
}

impl JobOptions {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            misfire_grace: Duration::from_secs(5),
            coalesce: true,
        }
    }

    pub fn misfire_grace(mut self, grace: Duration) -> Self {
        self.misfire_grace = grace;
        self
    }

    pub fn coalesce(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    fn policy(&self) -> FirePolicy {
        FirePolicy {
            misfire_grace: self.misfire_grace,
            coalesce: self.coalesce,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub interval_seconds: u64,
    pub running: bool,
}

struct JobEntry {
    job: Arc<dyn ScheduledJob>,
    options: JobOptions,
    guard: OverlapGuard,
    finished: Notify,
}

struct SchedulerInner {
    entries: RwLock<Vec<Arc<JobEntry>>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    started: AtomicBool,
}

/// Runs each registered job on its own fixed interval, at most one instance
/// per job at a time. Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<SchedulerInner>,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl JobScheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                entries: RwLock::new(Vec::new()),
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
                started: AtomicBool::new(false),
            }),
        }
    }

    pub async fn add(&self, job: Arc<dyn ScheduledJob>, options: JobOptions) -> Result<()> {
        if self.inner.started.load(Ordering::Acquire) {
            bail!("Cannot add job '{}' after the scheduler started", job.name());
        }
        if options.interval.is_zero() {
            bail!("Job '{}' needs a non-zero interval", job.name());
        }

        let mut entries = self.inner.entries.write().await;
        if entries.iter().any(|e| e.job.name() == job.name()) {
            bail!("Job '{}' is already registered", job.name());
        }
        info!(
            "Job '{}' scheduled every {}s (misfire grace {}s, coalesce {})",
            job.name(),
            options.interval.as_secs(),
            options.misfire_grace.as_secs(),
            options.coalesce
        );
        entries.push(Arc::new(JobEntry {
            job,
            options,
            guard: OverlapGuard::new(),
            finished: Notify::new(),
        }));
        Ok(())
    }

    pub async fn start(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            bail!("Scheduler already started");
        }
        let entries = self.inner.entries.read().await;
        for entry in entries.iter() {
            let driver = Driver {
                entry: entry.clone(),
                tracker: self.inner.tracker.clone(),
                shutdown: self.inner.shutdown.clone(),
                deferred: VecDeque::new(),
            };
            self.inner.tracker.spawn(driver.run());
        }
        info!("Scheduler started with {} job(s)", entries.len());
        Ok(())
    }

    /// Fires `name` immediately unless it is unknown, already running, or
    /// the scheduler is shutting down.
    pub async fn run_now(&self, name: &str) -> bool {
        if self.inner.shutdown.is_cancelled() {
            return false;
        }
        let entry = {
            let entries = self.inner.entries.read().await;
            entries.iter().find(|e| e.job.name() == name).cloned()
        };
        match entry {
            Some(entry) => {
                let launched = launch(&entry, &self.inner.tracker);
                if !launched {
                    info!("Job '{}' is already running; manual trigger ignored", name);
                }
                launched
            }
            None => {
                warn!("No job named '{}'", name);
                false
            }
        }
    }

    pub async fn is_running(&self, name: &str) -> bool {
        self.inner
            .entries
            .read()
            .await
            .iter()
            .any(|e| e.job.name() == name && e.guard.is_running())
    }

    pub async fn statuses(&self) -> Vec<JobStatus> {
        self.inner
            .entries
            .read()
            .await
            .iter()
            .map(|e| JobStatus {
                name: e.job.name().to_string(),
                interval_seconds: e.options.interval.as_secs(),
                running: e.guard.is_running(),
            })
            .collect()
    }

    /// Stops all timers and waits for in-flight runs to finish on their own.
    pub async fn shutdown(&self) {
        info!("Stopping scheduler; waiting for running jobs to finish");
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("Scheduler stopped");
    }
}

/// Starts a run of `entry` on the tracker if nobody else holds it.
fn launch(entry: &Arc<JobEntry>, tracker: &TaskTracker) -> bool {
    let Some(run_guard) = entry.guard.try_acquire() else {
        return false;
    };
    let entry = entry.clone();
    tracker.spawn(async move {
        let name = entry.job.name().to_string();
        let started = Instant::now();
        info!("Job '{}' started", name);

        let job = entry.job.clone();
        match tokio::spawn(async move { job.run().await }).await {
            Ok(()) => info!("Job '{}' finished in {:?}", name, started.elapsed()),
            Err(e) => error!("Job '{}' crashed: {}", name, e),
        }

        drop(run_guard);
        entry.finished.notify_one();
    });
    true
}

/// Timer loop for one job.
struct Driver {
    entry: Arc<JobEntry>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    deferred: VecDeque<Instant>,
}

impl Driver {
    async fn run(mut self) {
        let options = self.entry.options;
        let policy = options.policy();
        let mut trigger = IntervalTrigger::new(options.interval, Instant::now() + options.interval);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = self.entry.finished.notified(), if !self.deferred.is_empty() => {
                    self.drain_deferred(&policy);
                }
                _ = sleep_until(trigger.next_fire()) => {
                    let now = Instant::now();
                    self.drain_deferred(&policy);
                    for fire_time in policy.collapse(trigger.take_due(now)) {
                        self.fire(&policy, fire_time, now);
                    }
                }
            }
        }

        if !self.deferred.is_empty() {
            info!(
                "Job '{}': {} deferred trigger(s) dropped at shutdown",
                self.entry.job.name(),
                self.deferred.len()
            );
        }
    }

    fn fire(&mut self, policy: &FirePolicy, fire_time: Instant, now: Instant) {
        let name = self.entry.job.name();
        if policy.is_misfire(fire_time, now) {
            warn!(
                "Job '{}' missed its fire time by {:?}; skipping this run",
                name,
                now.saturating_duration_since(fire_time)
            );
            return;
        }
        if !self.deferred.is_empty() {
            self.deferred.push_back(fire_time);
            return;
        }
        if launch(&self.entry, &self.tracker) {
            return;
        }
        if policy.coalesce {
            info!("Job '{}' is still running; trigger coalesced into the current run", name);
        } else {
            info!("Job '{}' is still running; trigger deferred", name);
            self.deferred.push_back(fire_time);
        }
    }

    /// Starts the oldest deferred trigger that is still within the grace window.
    fn drain_deferred(&mut self, policy: &FirePolicy) {
        let now = Instant::now();
        while let Some(&fire_time) = self.deferred.front() {
            if policy.is_misfire(fire_time, now) {
                self.deferred.pop_front();
                warn!(
                    "Job '{}' deferred run expired after waiting {:?}; skipping it",
                    self.entry.job.name(),
                    now.saturating_duration_since(fire_time)
                );
                continue;
            }
            if launch(&self.entry, &self.tracker) {
                self.deferred.pop_front();
            }
            break;
        }
    }
}

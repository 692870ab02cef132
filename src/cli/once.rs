use anyhow::{Result, bail};
use std::str::FromStr;
use std::sync::Arc;

use crate::core::client::{ClientConfig, EventBackend, RemoteEventClient};
use crate::core::config::Settings;
use crate::core::jobs::{
    PhaseReport, cleanup_expired_events, finish_pending_events, process_events,
    start_pending_events,
};
use crate::core::terminal::{print_info, print_status, print_success, print_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnceTarget {
    Lifecycle,
    Start,
    Finish,
    Cleanup,
}

impl FromStr for OnceTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lifecycle" | "process" => Ok(Self::Lifecycle),
            "start" => Ok(Self::Start),
            "finish" => Ok(Self::Finish),
            "cleanup" => Ok(Self::Cleanup),
            other => bail!(
                "Unknown run-once target '{}'. Expected: lifecycle, start, finish, cleanup",
                other
            ),
        }
    }
}

/// Runs a single sweep against the configured backend, then returns.
pub(crate) async fn run_once(settings: &Settings, target: OnceTarget) -> Result<()> {
    let client = RemoteEventClient::new(ClientConfig::from_settings(settings))?;
    let backend: Arc<dyn EventBackend> = Arc::new(client);
    print_info(&format!("Running {:?} sweep against {}", target, settings.backend_url));

    match target {
        OnceTarget::Lifecycle => {
            let report = process_events(backend).await;
            print_phase("Start", report.start.as_ref());
            print_phase("Finish", report.finish.as_ref());
        }
        OnceTarget::Start => {
            let report = start_pending_events(backend.as_ref()).await;
            print_phase("Start", Some(&report));
        }
        OnceTarget::Finish => {
            let report = finish_pending_events(backend.as_ref()).await;
            print_phase("Finish", Some(&report));
        }
        OnceTarget::Cleanup => {
            let report = cleanup_expired_events(backend.as_ref()).await;
            if !report.token_ok {
                print_warn("Cleanup skipped: no superadmin token could be obtained.");
                return Ok(());
            }
            print_status(
                "Cleanup",
                &format!(
                    "{} expired, {} deleted, {} failed",
                    report.found, report.deleted, report.failed
                ),
            );
        }
    }
    print_success("Sweep finished.");
    Ok(())
}

fn print_phase(label: &str, report: Option<&PhaseReport>) {
    match report {
        Some(r) => print_status(
            label,
            &format!(
                "{} due, {} ok, {} failed, {} completion(s) started",
                r.found, r.succeeded, r.failed, r.completion_triggered
            ),
        ),
        None => print_warn(&format!("{} phase aborted; see log output.", label)),
    }
}

/// Effective settings as pretty JSON with secrets masked.
pub(crate) fn render_config(settings: &Settings) -> Result<String> {
    Ok(serde_json::to_string_pretty(&settings.redacted())?)
}

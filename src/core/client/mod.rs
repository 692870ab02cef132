mod error;
mod types;

pub use error::CallError;
pub use types::{Event, EventStatus};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::core::config::Settings;
use types::{
    CompletionRequest, CompletionSummary, LoginRequest, RefreshRequest, events_from_listing,
};

/// Completion kickoff answers with a per-participant summary, which can take
/// far longer than the ordinary calls.
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

const PENDING_START_PATH: &str = "/events/api/events-status/pending-start/";
const PENDING_FINISH_PATH: &str = "/events/api/events-status/pending-finish/";
const EXPIRED_PATH: &str = "/events/api/events-status/expired/";
const COMPLETION_PATH: &str = "/analysis/process-event-completion/";
const LOGIN_PATH: &str = "/auth/login/";
const REFRESH_PATH: &str = "/auth/refresh-token/";

/// Everything the jobs need from the backend. Implementations never fail:
/// errors are logged and reported as `false` or an empty list.
#[async_trait]
pub trait EventBackend: Send + Sync {
    /// `scheduled` events whose start time has passed.
    async fn fetch_due_to_start(&self) -> Vec<Event>;
    /// `in_progress` events whose end time has passed.
    async fn fetch_due_to_finish(&self) -> Vec<Event>;
    /// Scheduled events past the backend's expiration threshold.
    async fn fetch_expired(&self) -> Vec<Event>;
    async fn start(&self, event_id: i64) -> bool;
    async fn finish(&self, event_id: i64) -> bool;
    /// Kicks off video merge and analysis for a finished event.
    async fn trigger_completion_processing(&self, event_id: i64) -> bool;
    /// Privileged; needs a superadmin token.
    async fn delete(&self, event_id: i64) -> bool;
    /// Refresh the held token, or log in when there is none or refresh fails.
    async fn ensure_token(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub completion_timeout: Duration,
    pub email: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

impl ClientConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            base_url: settings.backend_url.clone(),
            timeout: settings.http_timeout(),
            completion_timeout: COMPLETION_TIMEOUT,
            email: settings.superadmin_email.clone(),
            password: settings.superadmin_password.clone(),
            token: settings.superadmin_token.clone(),
        }
    }
}

#[derive(Clone, Copy)]
enum Transition {
    Start,
    Finish,
}

impl Transition {
    fn path(self, event_id: i64) -> String {
        match self {
            Transition::Start => format!("/events/api/events-status/{}/start/", event_id),
            Transition::Finish => format!("/events/api/events-status/{}/finish/", event_id),
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Finish => "finish",
        }
    }
}

/// HTTP client for the events backend. Holds the superadmin bearer token for
/// the lifetime of the instance; share it behind an `Arc`.
pub struct RemoteEventClient {
    http: Client,
    base_url: String,
    completion_timeout: Duration,
    email: Option<String>,
    password: Option<String>,
    token: RwLock<Option<String>>,
}

impl RemoteEventClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            completion_timeout: config.completion_timeout,
            email: config.email,
            password: config.password,
            token: RwLock::new(config.token.filter(|t| !t.is_empty())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn store_token(&self, token: String) {
        *self.token.write().await = Some(token);
    }

    /// Sends the request and returns the JSON body; an empty 2xx body is `Null`.
    async fn call(&self, request: RequestBuilder) -> Result<Value, CallError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CallError::from_status(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| CallError::Unexpected(format!("invalid JSON body: {}", e)))
    }

    async fn fetch_events(&self, path: &str, what: &str) -> Vec<Event> {
        let request = self.authorize(self.http.get(self.url(path))).await;
        match self.call(request).await {
            Ok(body) => match events_from_listing(&body) {
                Some(events) => {
                    debug!("Fetched {} {} event(s)", events.len(), what);
                    events
                }
                None => {
                    error!(
                        "Unexpected response while fetching {} events: no `results` array in {}",
                        what, body
                    );
                    Vec::new()
                }
            },
            Err(e) => {
                error!("Failed to fetch {} events ({}): {}", what, e.kind(), e);
                Vec::new()
            }
        }
    }

    async fn transition(&self, event_id: i64, transition: Transition) -> bool {
        let verb = transition.verb();
        let request = self
            .authorize(self.http.post(self.url(&transition.path(event_id))))
            .await;

        match self.call(request).await {
            Ok(body) => {
                if body.get("success").and_then(Value::as_bool) == Some(true) {
                    let status = body
                        .get("status")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    info!("Backend accepted {} of event {}; new status: {}", verb, event_id, status);
                    true
                } else {
                    warn!("Backend rejected {} of event {}: {}", verb, event_id, body);
                    false
                }
            }
            Err(e) => {
                error!("Failed to {} event {} ({}): {}", verb, event_id, e.kind(), e);
                false
            }
        }
    }

    async fn login(&self) -> Result<String, CallError> {
        let (Some(email), Some(password)) = (self.email.as_deref(), self.password.as_deref())
        else {
            return Err(CallError::MissingCredentials);
        };
        let request = self
            .http
            .post(self.url(LOGIN_PATH))
            .json(&LoginRequest { email, password });
        let body = self.call(request).await?;
        token_from(&body)
            .ok_or_else(|| CallError::Unexpected("login response carried no token".to_string()))
    }

    /// `Ok(None)` when the backend answered but handed back no token.
    async fn refresh(&self, token: &str) -> Result<Option<String>, CallError> {
        let request = self
            .http
            .post(self.url(REFRESH_PATH))
            .json(&RefreshRequest { token });
        let body = self.call(request).await?;
        Ok(token_from(&body))
    }

    async fn delete_once(&self, event_id: i64) -> Result<bool, CallError> {
        let url = self.url(&format!("/events/api/events/{}", event_id));
        let request = self.authorize(self.http.delete(url)).await;
        let body = self.call(request).await?;
        Ok(delete_succeeded(&body))
    }
}

fn token_from(body: &Value) -> Option<String> {
    body.get("token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Only an explicit `success: false` counts as a refusal.
fn delete_succeeded(body: &Value) -> bool {
    !matches!(body.get("success"), Some(Value::Bool(false)))
}

fn log_completion_summary(event_id: i64, summary: &CompletionSummary) {
    info!(
        "Completion processing for event {} acknowledged: {}",
        event_id,
        summary.message.as_deref().unwrap_or("")
    );

    if let Some(total) = summary.total_participants {
        info!(
            "Event {} participants: {} total, {} successful, {} failed",
            event_id,
            total,
            summary.successful.unwrap_or(0),
            summary.failed.unwrap_or(0)
        );
    }

    if summary.failed.unwrap_or(0) > 0 {
        for outcome in summary.results.iter().filter(|r| !r.success) {
            warn!(
                "Event {} participant '{}' failed: {}",
                event_id,
                outcome.participant_name.as_deref().unwrap_or("unknown"),
                outcome.error.as_deref().unwrap_or("no details")
            );
        }
    }
}

#[async_trait]
impl EventBackend for RemoteEventClient {
    async fn fetch_due_to_start(&self) -> Vec<Event> {
        self.fetch_events(PENDING_START_PATH, "pending-start").await
    }

    async fn fetch_due_to_finish(&self) -> Vec<Event> {
        self.fetch_events(PENDING_FINISH_PATH, "pending-finish").await
    }

    async fn fetch_expired(&self) -> Vec<Event> {
        self.fetch_events(EXPIRED_PATH, "expired").await
    }

    async fn start(&self, event_id: i64) -> bool {
        self.transition(event_id, Transition::Start).await
    }

    async fn finish(&self, event_id: i64) -> bool {
        self.transition(event_id, Transition::Finish).await
    }

    async fn trigger_completion_processing(&self, event_id: i64) -> bool {
        let request = self
            .http
            .post(self.url(COMPLETION_PATH))
            .json(&CompletionRequest { event_id })
            .timeout(self.completion_timeout);
        let request = self.authorize(request).await;

        match self.call(request).await {
            Ok(body) => {
                if body.get("message").is_none() {
                    warn!(
                        "Completion processing for event {} was not acknowledged: {}",
                        event_id, body
                    );
                    return false;
                }
                let summary: CompletionSummary = serde_json::from_value(body).unwrap_or_default();
                log_completion_summary(event_id, &summary);
                true
            }
            Err(e) => {
                error!(
                    "Failed to start completion processing for event {} ({}): {}",
                    event_id,
                    e.kind(),
                    e
                );
                false
            }
        }
    }

    async fn delete(&self, event_id: i64) -> bool {
        let outcome = match self.delete_once(event_id).await {
            Err(e) if e.is_unauthorized() => {
                warn!(
                    "Delete of event {} was refused ({}); re-establishing token and retrying once",
                    event_id, e
                );
                if !self.ensure_token().await {
                    error!("Could not re-establish token; giving up on event {}", event_id);
                    return false;
                }
                self.delete_once(event_id).await
            }
            other => other,
        };

        match outcome {
            Ok(true) => true,
            Ok(false) => {
                warn!("Backend refused to delete event {}", event_id);
                false
            }
            Err(e) => {
                error!("Failed to delete event {} ({}): {}", event_id, e.kind(), e);
                false
            }
        }
    }

    async fn ensure_token(&self) -> bool {
        let held = self.token().await;
        match held {
            Some(current) => match self.refresh(&current).await {
                Ok(Some(fresh)) => {
                    self.store_token(fresh).await;
                    info!("Superadmin token refreshed");
                    return true;
                }
                Ok(None) => warn!("Token refresh returned no token; falling back to login"),
                Err(e) => warn!(
                    "Token refresh failed ({}): {}; falling back to login",
                    e.kind(),
                    e
                ),
            },
            None => info!("No superadmin token held; logging in"),
        }

        match self.login().await {
            Ok(token) => {
                self.store_token(token).await;
                info!("Superadmin login succeeded");
                true
            }
            Err(e) => {
                error!("Superadmin login failed ({}): {}", e.kind(), e);
                false
            }
        }
    }
}

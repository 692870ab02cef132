use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::core::client::{Event, EventBackend};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchStart,
    FetchFinish,
    FetchExpired,
    Start(i64),
    Finish(i64),
    Completion(i64),
    Delete(i64),
    EnsureToken,
}

/// Scripted backend that records every call in order.
#[derive(Default)]
pub struct MockBackend {
    calls: Mutex<Vec<Call>>,
    pending_start: Vec<i64>,
    pending_finish: Vec<i64>,
    expired: Vec<i64>,
    failing_start: HashSet<i64>,
    failing_finish: HashSet<i64>,
    failing_completion: HashSet<i64>,
    failing_delete: HashSet<i64>,
    token_fails: bool,
    panic_fetch_start: bool,
    panic_fetch_finish: bool,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn edit(self: Arc<Self>, f: impl FnOnce(&mut Self)) -> Arc<Self> {
        let mut inner = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("mock already shared"));
        f(&mut inner);
        Arc::new(inner)
    }
}

pub trait MockBackendExt {
    fn pending_start(self, ids: &[i64]) -> Self;
    fn pending_finish(self, ids: &[i64]) -> Self;
    fn expired(self, ids: &[i64]) -> Self;
    fn failing_start(self, ids: &[i64]) -> Self;
    fn failing_finish(self, ids: &[i64]) -> Self;
    fn failing_completion(self, ids: &[i64]) -> Self;
    fn failing_delete(self, ids: &[i64]) -> Self;
    fn token_fails(self) -> Self;
    fn panic_on_fetch_start(self) -> Self;
    fn panic_on_fetch_finish(self) -> Self;
}

impl MockBackendExt for Arc<MockBackend> {
    fn pending_start(self, ids: &[i64]) -> Self {
        self.edit(|m| m.pending_start = ids.to_vec())
    }
    fn pending_finish(self, ids: &[i64]) -> Self {
        self.edit(|m| m.pending_finish = ids.to_vec())
    }
    fn expired(self, ids: &[i64]) -> Self {
        self.edit(|m| m.expired = ids.to_vec())
    }
    fn failing_start(self, ids: &[i64]) -> Self {
        self.edit(|m| m.failing_start.extend(ids))
    }
    fn failing_finish(self, ids: &[i64]) -> Self {
        self.edit(|m| m.failing_finish.extend(ids))
    }
    fn failing_completion(self, ids: &[i64]) -> Self {
        self.edit(|m| m.failing_completion.extend(ids))
    }
    fn failing_delete(self, ids: &[i64]) -> Self {
        self.edit(|m| m.failing_delete.extend(ids))
    }
    fn token_fails(self) -> Self {
        self.edit(|m| m.token_fails = true)
    }
    fn panic_on_fetch_start(self) -> Self {
        self.edit(|m| m.panic_fetch_start = true)
    }
    fn panic_on_fetch_finish(self) -> Self {
        self.edit(|m| m.panic_fetch_finish = true)
    }
}

fn events(ids: &[i64]) -> Vec<Event> {
    ids.iter()
        .map(|id| Event::new(*id).with_start_date("2025-01-01T00:00:00"))
        .collect()
}

fn running_events(ids: &[i64]) -> Vec<Event> {
    events(ids)
        .into_iter()
        .map(|e| e.with_end_date("2025-01-01T02:00:00"))
        .collect()
}

#[async_trait]
impl EventBackend for MockBackend {
    async fn fetch_due_to_start(&self) -> Vec<Event> {
        self.record(Call::FetchStart);
        if self.panic_fetch_start {
            panic!("boom");
        }
        events(&self.pending_start)
    }

    async fn fetch_due_to_finish(&self) -> Vec<Event> {
        self.record(Call::FetchFinish);
        if self.panic_fetch_finish {
            panic!("boom");
        }
        running_events(&self.pending_finish)
    }

    async fn fetch_expired(&self) -> Vec<Event> {
        self.record(Call::FetchExpired);
        events(&self.expired)
    }

    async fn start(&self, event_id: i64) -> bool {
        self.record(Call::Start(event_id));
        !self.failing_start.contains(&event_id)
    }

    async fn finish(&self, event_id: i64) -> bool {
        self.record(Call::Finish(event_id));
        !self.failing_finish.contains(&event_id)
    }

    async fn trigger_completion_processing(&self, event_id: i64) -> bool {
        self.record(Call::Completion(event_id));
        !self.failing_completion.contains(&event_id)
    }

    async fn delete(&self, event_id: i64) -> bool {
        self.record(Call::Delete(event_id));
        !self.failing_delete.contains(&event_id)
    }

    async fn ensure_token(&self) -> bool {
        self.record(Call::EnsureToken);
        !self.token_fails
    }
}

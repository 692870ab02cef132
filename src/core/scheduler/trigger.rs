use std::time::Duration;
use tokio::time::Instant;

/// Fixed-rate trigger. Fire times stay on the original grid no matter how
/// late they are observed.
#[derive(Debug, Clone)]
pub struct IntervalTrigger {
    interval: Duration,
    next_fire: Instant,
}

impl IntervalTrigger {
    pub fn new(interval: Duration, first_fire: Instant) -> Self {
        Self {
            interval,
            next_fire: first_fire,
        }
    }

    pub fn next_fire(&self) -> Instant {
        self.next_fire
    }

    /// Every fire time at or before `now`, oldest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<Instant> {
        let mut due = Vec::new();
        while self.next_fire <= now {
            due.push(self.next_fire);
            self.next_fire += self.interval;
        }
        due
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirePolicy {
    pub misfire_grace: Duration,
    pub coalesce: bool,
}

impl FirePolicy {
    /// With coalescing, a backlog of fire times collapses into the latest.
    pub fn collapse(&self, mut due: Vec<Instant>) -> Vec<Instant> {
        if self.coalesce && due.len() > 1 {
            let stale = due.len() - 1;
            due.drain(..stale);
        }
        due
    }

    pub fn is_misfire(&self, fire_time: Instant, now: Instant) -> bool {
        now.saturating_duration_since(fire_time) > self.misfire_grace
    }
}

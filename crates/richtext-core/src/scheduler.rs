//! Cancellable single-shot timers.
//!
//! The engine needs exactly three delays: the commit debounce, a short
//! settle after pointer-up before the host selection is read, and a grace
//! window after blur. All are single-shot and cancellable; none implies a
//! thread or an event loop. The host owns time: it implements [`Scheduler`]
//! (or uses [`ManualScheduler`]) and delivers expiry back to the surface,
//! which ignores stale identifiers.

use std::time::Duration;

/// Which delay a timer implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// The typing commit debounce.
    CommitDebounce,
    /// Waiting for the platform selection to settle after pointer-up.
    PointerSettle,
    /// The grace window between blur and finalizing the unfocused state.
    BlurGrace,
}

/// Identifier of one scheduled timer. Identifiers are never reused by a
/// scheduler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// A source of cancellable single-shot timers.
pub trait Scheduler {
    /// Arrange for a timer of `kind` to fire after `delay`. The host must
    /// eventually report expiry to the surface that scheduled it.
    fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerId;

    /// Cancel a pending timer. Cancelling an already-fired or unknown
    /// timer is a no-op.
    fn cancel(&mut self, id: TimerId);
}

#[derive(Debug, Clone)]
struct Pending {
    id: TimerId,
    kind: TimerKind,
    due: Duration,
}

/// Deterministic scheduler for tests and poll-driven hosts: time only
/// moves when [`ManualScheduler::advance`] is called.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_id: u64,
    pending: Vec<Pending>,
}

impl ManualScheduler {
    /// Create a scheduler at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock, returning every timer that came due, in due
    /// order. The caller feeds these back into the surface.
    pub fn advance(&mut self, by: Duration) -> Vec<(TimerId, TimerKind)> {
        self.now += by;
        let now = self.now;
        let mut due: Vec<Pending> = self
            .pending
            .iter()
            .filter(|p| p.due <= now)
            .cloned()
            .collect();
        self.pending.retain(|p| p.due > now);
        due.sort_by_key(|p| p.due);
        due.into_iter().map(|p| (p.id, p.kind)).collect()
    }

    /// Number of timers still pending.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.push(Pending {
            id,
            kind,
            due: self.now + delay,
        });
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.pending.retain(|p| p.id != id);
    }
}

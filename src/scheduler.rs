//! Cancellable deferred checks.
//!
//! The state machine never sleeps. When it wants to re-check silence later it hands a
//! [`PendingCheck`] to a [`Scheduler`] and gets a [`CancelToken`] back. Whoever drives the
//! machine is responsible for handing due checks back via `VadStateMachine::confirm`.

use std::time::{Duration, Instant};

/// Identifies one `start()`..`stop()` session of a state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

/// Identifies one speech segment within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub(crate) u64);

/// The payload of a deferred silence confirmation.
///
/// A check only ever applies to the exact session and segment it was scheduled for. When it
/// fires against anything else it is stale and must do nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCheck {
    pub session: SessionId,
    pub segment: SegmentId,
}

/// Handle returned by [`Scheduler::schedule_after`], used to cancel the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CancelToken(u64);

/// "Run this check after a delay, cancellably."
pub trait Scheduler {
    /// Arrange for `check` to be delivered once `delay` has elapsed past `now`.
    ///
    /// A delay too large to represent never fires, but still yields a usable token.
    fn schedule_after(&mut self, now: Instant, delay: Duration, check: PendingCheck)
    -> CancelToken;

    /// Cancel a timer. Unknown or already-fired tokens are ignored.
    fn cancel(&mut self, token: CancelToken);
}

impl<T: Scheduler + ?Sized> Scheduler for &mut T {
    fn schedule_after(
        &mut self,
        now: Instant,
        delay: Duration,
        check: PendingCheck,
    ) -> CancelToken {
        (**self).schedule_after(now, delay, check)
    }

    fn cancel(&mut self, token: CancelToken) {
        (**self).cancel(token);
    }
}

#[derive(Debug, Clone)]
struct Timer {
    deadline: Instant,
    token: CancelToken,
    check: PendingCheck,
}

/// A deterministic timer queue running on caller-supplied time.
///
/// Nothing fires on its own: the driver polls [`TimerQueue::pop_due`] with the current time.
/// Timers come out in deadline order; equal deadlines come out in scheduling order.
#[derive(Debug, Clone, Default)]
pub struct TimerQueue {
    // Kept sorted by (deadline, token).
    timers: Vec<Timer>,
    next_token: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the earliest timer whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(Instant, CancelToken, PendingCheck)> {
        let first = self.timers.first()?;
        if first.deadline > now {
            return None;
        }

        let timer = self.timers.remove(0);
        Some((timer.deadline, timer.token, timer.check))
    }

    /// Deadline of the earliest outstanding timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.first().map(|t| t.deadline)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}

impl Scheduler for TimerQueue {
    fn schedule_after(
        &mut self,
        now: Instant,
        delay: Duration,
        check: PendingCheck,
    ) -> CancelToken {
        let token = CancelToken(self.next_token);
        self.next_token += 1;

        // A deadline past the end of `Instant`'s range is never due.
        let Some(deadline) = now.checked_add(delay) else {
            return token;
        };
        // Insert after every timer with a deadline <= ours to keep FIFO order on ties.
        let idx = self.timers.partition_point(|t| t.deadline <= deadline);
        self.timers.insert(
            idx,
            Timer {
                deadline,
                token,
                check,
            },
        );

        token
    }

    fn cancel(&mut self, token: CancelToken) {
        self.timers.retain(|t| t.token != token);
    }
}

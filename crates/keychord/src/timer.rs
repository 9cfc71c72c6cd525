//! Scheduling port used for chord confirmation timeouts.
//!
//! [SequenceMachine](crate::SequenceMachine) never reads a clock itself. When it needs a
//! timeout, it asks its [TimerPort] to schedule one, and the host delivers the expiry back
//! via [SequenceMachine::timer_fired](crate::SequenceMachine::timer_fired) on the same
//! queue that key events arrive on. This keeps the machine's logic synchronous and lets
//! tests drive timeouts without real wall-clock waits.

use std::time::Duration;

/// Identifies one scheduled timeout.
///
/// Tokens are unique for the lifetime of a machine, so a late expiry delivered for an
/// already-superseded timer never matches the currently outstanding one.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TimerToken(u64);

impl TimerToken {
    pub(crate) fn new(id: u64) -> Self {
        TimerToken(id)
    }
}

/// Environment hook for scheduling one-shot timeouts.
pub trait TimerPort {
    /// Handle used to cancel a scheduled timeout before it fires.
    type Handle;

    /// Schedule a one-shot timeout.
    ///
    /// When `after` elapses, the host must deliver `token` back to
    /// [SequenceMachine::timer_fired](crate::SequenceMachine::timer_fired).
    fn schedule_once(&mut self, after: Duration, token: TimerToken) -> Self::Handle;

    /// Cancel a previously scheduled timeout.
    ///
    /// Cancellation is best-effort: a host may already have queued the expiry, in which
    /// case the token check in `timer_fired` discards it.
    fn cancel(&mut self, handle: Self::Handle);
}

/// A [TimerPort] that never fires on its own.
///
/// Hosts that drive their own event loop inspect the outstanding timeout with
/// [armed](ManualTimer::armed), and deliver its token once their clock says it has
/// elapsed. Tests use it the same way, without waiting.
#[derive(Debug, Default)]
pub struct ManualTimer {
    armed: Vec<(TimerToken, Duration)>,
}

impl ManualTimer {
    /// Create a timer with nothing scheduled.
    pub fn new() -> Self {
        ManualTimer::default()
    }

    /// Timeouts that have been scheduled and not yet cancelled or fired, oldest first.
    pub fn armed(&self) -> &[(TimerToken, Duration)] {
        &self.armed
    }

    /// The most recently scheduled timeout still outstanding.
    pub fn last_armed(&self) -> Option<TimerToken> {
        self.armed.last().map(|(token, _)| *token)
    }

    /// Remove and return the oldest outstanding timeout, as a host's timer facility
    /// would when it fires.
    pub fn pop_armed(&mut self) -> Option<(TimerToken, Duration)> {
        if self.armed.is_empty() {
            None
        } else {
            Some(self.armed.remove(0))
        }
    }
}

impl TimerPort for ManualTimer {
    type Handle = TimerToken;

    fn schedule_once(&mut self, after: Duration, token: TimerToken) -> TimerToken {
        self.armed.push((token, after));

        token
    }

    fn cancel(&mut self, handle: TimerToken) {
        self.armed.retain(|(token, _)| *token != handle);
    }
}

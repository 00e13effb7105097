//! Single-pending-trigger debouncer.
//!
//! State is either `Idle` or `Armed { deadline }`. Only [`ChangeDebouncer::on_event`]
//! and the fire path mutate it, and both run on the task that owns the
//! debouncer, so there is no window in which a cancelled trigger can still
//! fire.

use std::time::Duration;

use tokio::time::Instant;

/// Quiet period after the last change before a sync is attempted.
pub const QUIET_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Armed { deadline: Instant },
}

#[derive(Debug, Clone)]
pub struct ChangeDebouncer {
    window: Duration,
    state: DebounceState,
}

impl Default for ChangeDebouncer {
    fn default() -> Self {
        Self::new(QUIET_WINDOW)
    }
}

impl ChangeDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a change at `now`, replacing any pending trigger.
    pub fn on_event(&mut self, now: Instant) {
        self.state = DebounceState::Armed {
            deadline: now + self.window,
        };
    }

    /// Fire if the pending trigger's deadline has passed. Returns `true`
    /// exactly once per armed period.
    pub fn poll_fire(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Armed { deadline } if now >= deadline => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Wait for the pending trigger to fire. Pending forever while idle, so
    /// it can sit in a `select!` next to the event source; dropping the
    /// future leaves the state untouched.
    pub async fn fired(&mut self) {
        loop {
            match self.state {
                DebounceState::Idle => std::future::pending::<()>().await,
                DebounceState::Armed { deadline } => {
                    tokio::time::sleep_until(deadline).await;
                    if self.poll_fire(Instant::now()) {
                        return;
                    }
                }
            }
        }
    }
}

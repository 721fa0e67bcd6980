//! Outbound request budget for the discovery API.

use super::clock::Clock;
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};

const LOG_TARGET: &str = "     quota";

/// How often a progress line is logged, in requests.
const LOG_EVERY: u32 = 100;

/// Request accounting for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaState {
    pub request_count: u32,
    pub window_reset_at: DateTime<Utc>,
}

/// The request ceiling for the current window has been reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaExceeded {
    pub ceiling: u32,
    pub resets_at: DateTime<Utc>,
}

impl Display for QuotaExceeded {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "request quota of {} per window exhausted, window resets at {}",
            self.ceiling,
            self.resets_at.to_rfc3339()
        )
    }
}

impl core::error::Error for QuotaExceeded {}

/// Caps outbound requests at `ceiling` per fixed window.
///
/// The guard never sleeps. Once the ceiling is reached every [`consume`](Self::consume)
/// fails until the clock passes the end of the window, at which point the counter
/// starts over from zero.
#[derive(Debug)]
pub struct QuotaGuard {
    ceiling: u32,
    window: chrono::Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<QuotaState>,
}

impl QuotaGuard {
    #[must_use]
    pub fn new(ceiling: u32, window: core::time::Duration, clock: Arc<dyn Clock>) -> Self {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        let now = clock.now();

        Self {
            ceiling,
            window,
            state: Mutex::new(QuotaState {
                request_count: 0,
                window_reset_at: now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC),
            }),
            clock,
        }
    }

    /// Account for one outbound request.
    pub fn consume(&self) -> Result<(), QuotaExceeded> {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if now > state.window_reset_at {
            state.request_count = 0;
            state.window_reset_at = now.checked_add_signed(self.window).unwrap_or(DateTime::<Utc>::MAX_UTC);
        }

        if state.request_count >= self.ceiling {
            log::error!(target: LOG_TARGET, "Request ceiling reached ({}/{})", state.request_count, self.ceiling);
            return Err(QuotaExceeded {
                ceiling: self.ceiling,
                resets_at: state.window_reset_at,
            });
        }

        state.request_count += 1;
        if state.request_count.is_multiple_of(LOG_EVERY) {
            log::info!(target: LOG_TARGET, "API request count: {}/{} for this window", state.request_count, self.ceiling);
        }

        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> QuotaState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub const fn ceiling(&self) -> u32 {
        self.ceiling
    }
}

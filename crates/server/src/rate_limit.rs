use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use parley_shared::constants::{RATE_LIMIT_MAX_SENDS, RATE_LIMIT_WINDOW_MS};

use crate::models::UserKey;

/// Sliding-window send limit per sender.
pub struct RateLimiter {
    max_sends: usize,
    window: Duration,
    sends: Mutex<HashMap<UserKey, VecDeque<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RATE_LIMIT_MAX_SENDS, Duration::from_millis(RATE_LIMIT_WINDOW_MS))
    }
}

impl RateLimiter {
    pub fn new(max_sends: usize, window: Duration) -> Self {
        Self {
            max_sends,
            window,
            sends: Mutex::new(HashMap::new()),
        }
    }

    pub fn allow(&self, sender: &UserKey) -> bool {
        self.allow_at(sender, Instant::now())
    }

    /// Records the attempt at `now` if it fits the window. Rejected attempts leave
    /// no trace.
    pub fn allow_at(&self, sender: &UserKey, now: Instant) -> bool {
        let mut sends = match self.sends.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let recent = sends.entry(sender.clone()).or_default();
        while let Some(&oldest) = recent.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                recent.pop_front();
            } else {
                break;
            }
        }

        if recent.len() >= self.max_sends {
            return false;
        }
        recent.push_back(now);
        true
    }

    /// Drops senders whose window has fully expired.
    pub fn prune(&self, now: Instant) {
        let mut sends = match self.sends.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = self.window;
        sends.retain(|_, recent| {
            recent
                .back()
                .is_some_and(|&last| now.saturating_duration_since(last) < window)
        });
    }
}

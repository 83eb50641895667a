use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};

// Rate limit entry - tracks requests per IP/key
#[derive(Debug, Clone, Copy)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_reset_at: Instant,
}

/// Fixed-window limiter keyed by client identifier.
///
/// Records live for the whole process. A record whose window has passed is
/// replaced on the next check, never incremented.
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub const DEFAULT_MAX_REQUESTS: u32 = 5;
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    // number of identifiers seen so far
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    pub fn check_limit(&self, identifier: &str) -> bool {
        self.check_limit_at(identifier, Instant::now())
    }

    pub fn check_limit_at(&self, identifier: &str, now: Instant) -> bool {
        let fresh = RateLimitEntry {
            count: 1,
            window_reset_at: now + self.window,
        };

        // entry() holds the shard lock for the whole read-modify-write
        let mut entry = match self.entries.entry(identifier.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                return true;
            }
            Entry::Occupied(slot) => slot.into_ref(),
        };

        //window expired..? Replace it
        if now > entry.window_reset_at {
            *entry = fresh;
            return true;
        }

        if entry.count >= self.max_requests {
            return false;
        }

        entry.count += 1;
        true
    }

    pub fn remaining_requests(&self, identifier: &str) -> u32 {
        match self.entries.get(identifier) {
            Some(entry) => self.max_requests.saturating_sub(entry.count),
            None => self.max_requests,
        }
    }

    pub fn remaining_window(&self, identifier: &str) -> Duration {
        self.remaining_window_at(identifier, Instant::now())
    }

    pub fn remaining_window_at(&self, identifier: &str, now: Instant) -> Duration {
        self.entries
            .get(identifier)
            .map(|entry| entry.window_reset_at.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_REQUESTS, Self::DEFAULT_WINDOW)
    }
}

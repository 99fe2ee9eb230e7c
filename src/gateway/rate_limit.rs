//! Fixed-window request limiter keyed by client IP.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    /// Limit reached; retry once the window has elapsed
    Limited { retry_after: Duration },
}

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<IpAddr, Window>>,
    max: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            max,
            window,
        }
    }

    pub fn check(&self, ip: IpAddr) -> Decision {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Decision {
        let mut entry = self.windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max {
            let retry_after = self
                .window
                .saturating_sub(now.saturating_duration_since(entry.started));
            return Decision::Limited { retry_after };
        }
        entry.count += 1;
        Decision::Allowed {
            remaining: self.max - entry.count,
        }
    }

    /// Forget windows that have run out, keeping the map bounded.
    pub fn prune(&self) {
        let window = self.window;
        self.windows.retain(|_, w| w.started.elapsed() < window);
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

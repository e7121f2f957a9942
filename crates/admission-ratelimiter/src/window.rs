//! Sliding-window accounting, grounded on
//! `tower_resilience_ratelimiter::limiter::SlidingLogState`
//! (`VecDeque<Instant>` eviction against `now - window`), extended with a
//! nested 60-second burst sub-window that has no equivalent there.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const BURST_WINDOW: Duration = Duration::from_secs(60);

/// One key's sliding window plus its nested burst sub-window.
struct SlidingWindow {
    timestamps: VecDeque<Instant>,
    burst_timestamps: VecDeque<Instant>,
    capacity: u64,
    window: Duration,
    burst_limit: u64,
}

/// The outcome of a single admission check against a window.
pub struct WindowDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_after: Duration,
}

impl SlidingWindow {
    fn new(capacity: u64, window: Duration, burst_limit: u64) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(capacity as usize),
            burst_timestamps: VecDeque::new(),
            capacity,
            window,
            burst_limit,
        }
    }

    /// Evicts expired entries, then checks capacity, then the burst
    /// sub-window, then appends on admission, in that fixed order. A denial
    /// reports the reset time of whichever constraint is actually binding:
    /// the primary window's `oldest + window` when the window itself is
    /// full, or the burst sub-window's `oldest + 60s` when the window still
    /// has room but the burst cap doesn't.
    fn try_admit(&mut self, now: Instant) -> WindowDecision {
        evict(&mut self.timestamps, now, self.window);
        evict(&mut self.burst_timestamps, now, BURST_WINDOW);

        let window_has_room = (self.timestamps.len() as u64) < self.capacity;
        let burst_has_room = self.burst_limit == 0 || (self.burst_timestamps.len() as u64) < self.burst_limit;

        if window_has_room && burst_has_room {
            self.timestamps.push_back(now);
            self.burst_timestamps.push_back(now);
            let reset_after = self
                .timestamps
                .front()
                .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
                .unwrap_or(Duration::ZERO);
            WindowDecision {
                allowed: true,
                limit: self.capacity,
                remaining: self.capacity - self.timestamps.len() as u64,
                reset_after,
            }
        } else {
            let reset_after = if !window_has_room {
                self.timestamps
                    .front()
                    .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
                    .unwrap_or(Duration::ZERO)
            } else {
                self.burst_timestamps
                    .front()
                    .map(|&oldest| (oldest + BURST_WINDOW).saturating_duration_since(now))
                    .unwrap_or(BURST_WINDOW)
            };
            WindowDecision {
                allowed: false,
                limit: self.capacity,
                remaining: self.capacity.saturating_sub(self.timestamps.len() as u64),
                reset_after,
            }
        }
    }

    fn is_empty(&self, now: Instant) -> bool {
        self.timestamps
            .back()
            .map(|&last| now.duration_since(last) >= self.window)
            .unwrap_or(true)
    }

    fn last_activity(&self) -> Option<Instant> {
        self.timestamps.back().copied()
    }
}

fn evict(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = timestamps.front() {
        if now.duration_since(front) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

/// The maximum number of distinct keys held before the janitor starts
/// evicting the oldest-idle quarter to bound memory use.
const DEFAULT_MAX_KEYS: usize = 100_000;

/// Process-scoped store of sliding windows, one per rate-limit key.
pub struct WindowStore {
    windows: Mutex<HashMap<String, SlidingWindow>>,
    max_keys: usize,
}

impl WindowStore {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_keys: DEFAULT_MAX_KEYS,
        }
    }

    pub fn with_max_keys(max_keys: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_keys,
        }
    }

    pub fn try_admit(&self, key: &str, capacity: u64, window: Duration, burst_limit: u64) -> WindowDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();
        let entry = windows
            .entry(key.to_string())
            .or_insert_with(|| SlidingWindow::new(capacity, window, burst_limit));
        let decision = entry.try_admit(now);
        if windows.len() > self.max_keys {
            evict_oldest_quarter(&mut windows, now);
        }
        decision
    }

    /// Removes windows that have been empty for a full window. Intended to
    /// run on a periodic janitor tick.
    pub fn reap_idle(&self) {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();
        windows.retain(|_, w| !w.is_empty(now));
    }

    pub fn len(&self) -> usize {
        self.windows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WindowStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Evicts the 25% oldest-idle windows, used when the store exceeds its
/// hard key cap rather than letting memory grow unbounded under a
/// high-cardinality key space.
fn evict_oldest_quarter(windows: &mut HashMap<String, SlidingWindow>, now: Instant) {
    let to_evict = windows.len() / 4;
    if to_evict == 0 {
        return;
    }
    let mut by_age: Vec<(String, Duration)> = windows
        .iter()
        .map(|(k, w)| {
            let age = w
                .last_activity()
                .map(|t| now.duration_since(t))
                .unwrap_or(Duration::MAX);
            (k.clone(), age)
        })
        .collect();
    by_age.sort_by(|a, b| b.1.cmp(&a.1));
    for (key, _) in by_age.into_iter().take(to_evict) {
        windows.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_capacity_then_denies() {
        let store = WindowStore::new();
        for _ in 0..3 {
            let decision = store.try_admit("k", 3, Duration::from_secs(1), 0);
            assert!(decision.allowed);
        }
        let decision = store.try_admit("k", 3, Duration::from_secs(1), 0);
        assert!(!decision.allowed);
    }

    #[test]
    fn burst_limit_caps_admissions_independent_of_window_capacity() {
        let store = WindowStore::new();
        for _ in 0..2 {
            let decision = store.try_admit("k", 100, Duration::from_secs(60), 2);
            assert!(decision.allowed);
        }
        let decision = store.try_admit("k", 100, Duration::from_secs(60), 2);
        assert!(!decision.allowed);
    }

    #[test]
    fn burst_denial_reports_the_burst_sub_window_not_the_primary_window() {
        let store = WindowStore::new();
        for _ in 0..2 {
            let decision = store.try_admit("k", 100, Duration::from_secs(3600), 2);
            assert!(decision.allowed);
        }
        let decision = store.try_admit("k", 100, Duration::from_secs(3600), 2);
        assert!(!decision.allowed);
        assert!(decision.reset_after <= BURST_WINDOW);
    }

    #[test]
    fn distinct_keys_do_not_interfere() {
        let store = WindowStore::new();
        for _ in 0..3 {
            assert!(store.try_admit("a", 3, Duration::from_secs(1), 0).allowed);
        }
        assert!(store.try_admit("b", 3, Duration::from_secs(1), 0).allowed);
    }

    #[test]
    fn reap_idle_removes_windows_past_their_window_duration() {
        let store = WindowStore::new();
        assert!(store.try_admit("k", 3, Duration::from_millis(1), 0).allowed);
        std::thread::sleep(Duration::from_millis(5));
        store.reap_idle();
        assert!(store.is_empty());
    }

    #[test]
    fn oversized_key_space_evicts_the_oldest_quarter() {
        let store = WindowStore::with_max_keys(4);
        for i in 0..6 {
            store.try_admit(&format!("k{i}"), 10, Duration::from_secs(60), 0);
        }
        assert!(store.len() <= 5);
    }
}

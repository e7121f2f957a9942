//! The four priority lanes: bounded deques so a
//! `DropOldest` policy can evict the head instead of only refusing the
//! tail, which a plain bounded channel cannot do.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::job::Job;
use crate::priority::Priority;

pub(crate) struct Lane<T, R, E> {
    jobs: Mutex<VecDeque<Job<T, R, E>>>,
    capacity: usize,
}

impl<T, R, E> Lane<T, R, E> {
    fn new(capacity: usize) -> Self {
        Self {
            jobs: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    fn len(&self) -> usize {
        self.jobs.lock().expect("lane mutex poisoned").len()
    }

    fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    fn push_back(&self, job: Job<T, R, E>) {
        self.jobs.lock().expect("lane mutex poisoned").push_back(job);
    }

    fn pop_front_evicted(&self) -> Option<Job<T, R, E>> {
        self.jobs.lock().expect("lane mutex poisoned").pop_front()
    }

    fn pop_front(&self) -> Option<Job<T, R, E>> {
        self.jobs.lock().expect("lane mutex poisoned").pop_front()
    }
}

/// The four lanes plus a doorbell workers wait on when every lane is empty.
pub(crate) struct Lanes<T, R, E> {
    lanes: [Lane<T, R, E>; 4],
    pub(crate) notify: Notify,
}

impl<T, R, E> Lanes<T, R, E> {
    pub fn new(capacity_per_lane: usize) -> Self {
        Self {
            lanes: [
                Lane::new(capacity_per_lane),
                Lane::new(capacity_per_lane),
                Lane::new(capacity_per_lane),
                Lane::new(capacity_per_lane),
            ],
            notify: Notify::new(),
        }
    }

    fn lane(&self, priority: Priority) -> &Lane<T, R, E> {
        &self.lanes[priority.as_index()]
    }

    pub fn depth(&self, priority: Priority) -> usize {
        self.lane(priority).len()
    }

    pub fn is_full(&self, priority: Priority) -> bool {
        self.lane(priority).is_full()
    }

    pub fn push(&self, job: Job<T, R, E>) {
        self.lane(job.priority).push_back(job);
        self.notify.notify_one();
    }

    /// Evicts and returns the oldest job in `priority`'s own lane, to make
    /// room for a new arrival under a `DropOldest` policy.
    pub fn evict_oldest(&self, priority: Priority) -> Option<Job<T, R, E>> {
        self.lane(priority).pop_front_evicted()
    }

    /// Scans lanes highest-priority first and pops the first available job.
    pub fn pop_highest(&self) -> Option<Job<T, R, E>> {
        for priority in Priority::ALL {
            if let Some(job) = self.lane(priority).pop_front() {
                return Some(job);
            }
        }
        None
    }

    pub fn total_depth(&self) -> usize {
        Priority::ALL.iter().map(|p| self.depth(*p)).sum()
    }
}

//! A passive, pull-only metrics bus shared by every admission-pipeline stage.
//!
//! A metrics recorder consumed by
//! every stage must never re-enter the ingress path it observes (a flush
//! must not itself trigger a rate-limit check). [`MetricsBus`] is therefore
//! write-only from the stages' perspective (`incr`/`set`) and read-only from
//! the `/metrics` handler's perspective (`snapshot`) — nothing here calls
//! back into admission logic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Counter(AtomicU64);

#[derive(Default)]
struct Gauge(AtomicI64);

/// Shared, cloneable handle to the process-wide metrics bus.
#[derive(Clone, Default)]
pub struct MetricsBus {
    counters: Arc<Mutex<HashMap<String, Arc<Counter>>>>,
    gauges: Arc<Mutex<HashMap<String, Arc<Gauge>>>>,
}

impl MetricsBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments a named counter by `delta`, creating it at zero if absent.
    pub fn incr(&self, name: &str, delta: u64) {
        let counter = {
            let mut counters = self.counters.lock().unwrap();
            counters
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Counter::default()))
                .clone()
        };
        counter.0.fetch_add(delta, Ordering::Relaxed);
    }

    /// Sets a named gauge to `value`, creating it if absent.
    pub fn set_gauge(&self, name: &str, value: i64) {
        let gauge = {
            let mut gauges = self.gauges.lock().unwrap();
            gauges
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Gauge::default()))
                .clone()
        };
        gauge.0.store(value, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of every counter and gauge.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self
            .counters
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.0.load(Ordering::Relaxed)))
            .collect();
        let gauges = self
            .gauges
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.0.load(Ordering::Relaxed)))
            .collect();
        MetricsSnapshot { counters, gauges }
    }
}

/// A point-in-time read of the bus, renderable as Prometheus text exposition.
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, i64>,
}

impl MetricsSnapshot {
    /// Renders the snapshot in Prometheus text exposition format.
    pub fn to_prometheus_text(&self) -> String {
        let mut out = String::new();
        let mut counter_names: Vec<_> = self.counters.keys().collect();
        counter_names.sort();
        for name in counter_names {
            out.push_str(&format!("# TYPE {name} counter\n"));
            out.push_str(&format!("{name} {}\n", self.counters[name]));
        }
        let mut gauge_names: Vec<_> = self.gauges.keys().collect();
        gauge_names.sort();
        for name in gauge_names {
            out.push_str(&format!("# TYPE {name} gauge\n"));
            out.push_str(&format!("{name} {}\n", self.gauges[name]));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_across_calls() {
        let bus = MetricsBus::new();
        bus.incr("requests_total", 1);
        bus.incr("requests_total", 4);
        let snap = bus.snapshot();
        assert_eq!(snap.counters["requests_total"], 5);
    }

    #[test]
    fn gauges_hold_the_latest_value() {
        let bus = MetricsBus::new();
        bus.set_gauge("queue_depth", 3);
        bus.set_gauge("queue_depth", 7);
        let snap = bus.snapshot();
        assert_eq!(snap.gauges["queue_depth"], 7);
    }

    #[test]
    fn prometheus_text_includes_type_and_value_lines() {
        let bus = MetricsBus::new();
        bus.incr("a_total", 2);
        bus.set_gauge("b_gauge", 5);
        let text = bus.snapshot().to_prometheus_text();
        assert!(text.contains("# TYPE a_total counter"));
        assert!(text.contains("a_total 2"));
        assert!(text.contains("# TYPE b_gauge gauge"));
        assert!(text.contains("b_gauge 5"));
    }
}

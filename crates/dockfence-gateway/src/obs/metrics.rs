//! Minimal metrics registry for the gateway.
//!
//! Labels are flattened into sorted key vectors so rendering order is
//! deterministic. Latency buckets are fixed in milliseconds; runtime calls
//! range from sub-millisecond pings to stop calls bounded by a grace period.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn render_labels(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{}{{{}}} {}", name, render_labels(r.key()), val);
        }
    }
}

// 1ms .. 30s
const BUCKETS_MILLIS: [u64; 10] = [1, 5, 10, 50, 100, 500, 1_000, 5_000, 10_000, 30_000];

#[derive(Default)]
struct AtomicHistogram {
    count: AtomicU64,
    sum_millis: AtomicU64,
    buckets: [AtomicU64; BUCKETS_MILLIS.len()],
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self.map.entry(label_key(labels)).or_default();
        let millis = duration.as_millis() as u64;

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum_millis.fetch_add(millis, Ordering::Relaxed);
        // cumulative
        for (i, &b) in BUCKETS_MILLIS.iter().enumerate() {
            if millis <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for r in self.map.iter() {
            let hist = r.value();
            let labels = render_labels(r.key());
            let prefix = if labels.is_empty() { String::new() } else { format!("{},", labels) };

            for (i, &le) in BUCKETS_MILLIS.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, count);
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, labels, hist.sum_millis.load(Ordering::Relaxed));
            let _ = writeln!(out, "{}_count{{{}}} {}", name, labels, count);
        }
    }
}

#[derive(Default)]
pub struct GatewayMetrics {
    /// outcome = created | rejected | invalid | failed
    pub create_requests: CounterVec,
    pub policy_rejections: CounterVec,
    /// Lookups that resolved to a container this instance does not own.
    pub ownership_denials: CounterVec,
    pub runtime_calls: CounterVec,
    pub runtime_call_duration: HistogramVec,
}

impl GatewayMetrics {
    pub fn record_runtime_call(&self, op: &str, outcome: &str, elapsed: Duration) {
        self.runtime_calls.inc(&[("op", op), ("outcome", outcome)]);
        self.runtime_call_duration.observe(&[("op", op)], elapsed);
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.create_requests.render("dockfence_create_requests_total", &mut out);
        self.policy_rejections.render("dockfence_policy_rejections_total", &mut out);
        self.ownership_denials.render("dockfence_ownership_denials_total", &mut out);
        self.runtime_calls.render("dockfence_runtime_calls_total", &mut out);
        self.runtime_call_duration.render("dockfence_runtime_call_duration_millis", &mut out);
        out
    }
}

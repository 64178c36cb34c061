use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const REQUESTS_TOTAL: &str = "onboarding_requests_total";
pub const FAILURES_TOTAL: &str = "onboarding_failures_total";
pub const IN_FLIGHT: &str = "onboarding_in_flight";
pub const QUOTA_SKIPPED_TOTAL: &str = "onboarding_quota_skipped_total";

/// Counter name for a namespace or quota outcome, e.g.
/// `outcome_counter("namespace", "created")` is `onboarding_namespace_created_total`.
pub fn outcome_counter(subject: &str, outcome: &str) -> String {
    format!("onboarding_{}_{}_total", subject, outcome)
}

/// Thread-safe counters and gauges rendered in Prometheus text exposition format.
///
/// Unknown names are ignored by the update methods, so callers only pay for
/// what was registered.
pub struct MetricsRegistry {
    counters: RwLock<BTreeMap<String, Counter>>,
    gauges: RwLock<BTreeMap<String, Gauge>>,
}

struct Counter {
    value: AtomicU64,
    help: String,
}

struct Gauge {
    value: AtomicI64,
    help: String,
}

// The maps only ever gain entries and values are atomics, so a poisoned lock
// still guards consistent data.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(BTreeMap::new()),
            gauges: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registry with every onboarding counter and gauge registered at zero.
    pub fn onboarding() -> Self {
        let registry = Self::new();
        registry.register_counter(REQUESTS_TOTAL, "Onboarding requests received");
        registry.register_counter(FAILURES_TOTAL, "Onboarding requests that failed");
        registry.register_gauge(IN_FLIGHT, "Onboarding requests currently being processed");
        for outcome in ["created", "already_exists", "annotations_updated"] {
            registry.register_counter(
                &outcome_counter("namespace", outcome),
                &format!("Namespaces ensured with result {}", outcome),
            );
        }
        for outcome in ["created", "updated", "unchanged", "ignored"] {
            registry.register_counter(
                &outcome_counter("quota", outcome),
                &format!("Quotas reconciled with result {}", outcome),
            );
        }
        registry.register_counter(
            QUOTA_SKIPPED_TOTAL,
            "Onboarding requests for which no quota tier applied",
        );
        registry
    }

    /// Register a counter. If it already exists, this is a no-op.
    pub fn register_counter(&self, name: &str, help: &str) {
        write(&self.counters)
            .entry(name.to_string())
            .or_insert_with(|| Counter {
                value: AtomicU64::new(0),
                help: help.to_string(),
            });
    }

    /// Register a gauge. If it already exists, this is a no-op.
    pub fn register_gauge(&self, name: &str, help: &str) {
        write(&self.gauges)
            .entry(name.to_string())
            .or_insert_with(|| Gauge {
                value: AtomicI64::new(0),
                help: help.to_string(),
            });
    }

    pub fn counter_inc(&self, name: &str) {
        self.counter_add(name, 1);
    }

    pub fn counter_add(&self, name: &str, val: u64) {
        if let Some(c) = read(&self.counters).get(name) {
            c.value.fetch_add(val, Ordering::Relaxed);
        }
    }

    pub fn counter_get(&self, name: &str) -> Option<u64> {
        read(&self.counters)
            .get(name)
            .map(|c| c.value.load(Ordering::Relaxed))
    }

    pub fn gauge_inc(&self, name: &str) {
        if let Some(g) = read(&self.gauges).get(name) {
            g.value.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn gauge_dec(&self, name: &str) {
        if let Some(g) = read(&self.gauges).get(name) {
            g.value.fetch_sub(1, Ordering::Relaxed);
        }
    }

    pub fn gauge_get(&self, name: &str) -> Option<i64> {
        read(&self.gauges)
            .get(name)
            .map(|g| g.value.load(Ordering::Relaxed))
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut output = String::new();

        for (name, counter) in read(&self.counters).iter() {
            let _ = writeln!(output, "# HELP {} {}", name, counter.help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}", name, counter.value.load(Ordering::Relaxed));
        }

        for (name, gauge) in read(&self.gauges).iter() {
            let _ = writeln!(output, "# HELP {} {}", name, gauge.help);
            let _ = writeln!(output, "# TYPE {} gauge", name);
            let _ = writeln!(output, "{} {}", name, gauge.value.load(Ordering::Relaxed));
        }

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_names_are_ignored() {
        let registry = MetricsRegistry::new();
        registry.counter_inc("nope");
        registry.gauge_inc("nope");
        assert_eq!(registry.counter_get("nope"), None);
        assert!(registry.render().is_empty());
    }

    #[test]
    fn register_is_idempotent() {
        let registry = MetricsRegistry::new();
        registry.register_counter("c", "first");
        registry.counter_add("c", 3);
        registry.register_counter("c", "second");
        assert_eq!(registry.counter_get("c"), Some(3));
        assert!(registry.render().contains("# HELP c first"));
    }

    #[test]
    fn gauge_moves_both_ways() {
        let registry = MetricsRegistry::new();
        registry.register_gauge("g", "gauge");
        registry.gauge_inc("g");
        registry.gauge_inc("g");
        registry.gauge_dec("g");
        assert_eq!(registry.gauge_get("g"), Some(1));
        registry.gauge_dec("g");
        registry.gauge_dec("g");
        assert_eq!(registry.gauge_get("g"), Some(-1));
    }

    #[test]
    fn onboarding_registry_renders_all_series() {
        let registry = MetricsRegistry::onboarding();
        registry.counter_inc(REQUESTS_TOTAL);
        registry.counter_inc(&outcome_counter("quota", "unchanged"));

        let text = registry.render();
        assert!(text.contains("# TYPE onboarding_requests_total counter\nonboarding_requests_total 1\n"));
        assert!(text.contains("onboarding_quota_unchanged_total 1\n"));
        assert!(text.contains("onboarding_namespace_annotations_updated_total 0\n"));
        assert!(text.contains("onboarding_quota_skipped_total 0\n"));
        assert!(text.contains("# TYPE onboarding_in_flight gauge\nonboarding_in_flight 0\n"));
    }
}

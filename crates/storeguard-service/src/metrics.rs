//! Lightweight Prometheus-compatible metrics using atomic counters.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::detector::Category;
use crate::policy::ActionKind;

/// Per-action admission statistics.
struct ActionMetrics {
    checks_total: AtomicU64,
    denied_total: AtomicU64,
    blocks_total: AtomicU64,
}

impl ActionMetrics {
    const fn new() -> Self {
        Self {
            checks_total: AtomicU64::new(0),
            denied_total: AtomicU64::new(0),
            blocks_total: AtomicU64::new(0),
        }
    }
}

const ACTION_COUNT: usize = ActionKind::ALL.len();

/// Defense-layer metrics collected via atomic counters.
pub struct Metrics {
    actions: [ActionMetrics; ACTION_COUNT],
    malicious_sql: AtomicU64,
    malicious_xss: AtomicU64,
    swept_total: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            actions: [const { ActionMetrics::new() }; ACTION_COUNT],
            malicious_sql: AtomicU64::new(0),
            malicious_xss: AtomicU64::new(0),
            swept_total: AtomicU64::new(0),
        }
    }

    fn action(&self, kind: ActionKind) -> &ActionMetrics {
        &self.actions[kind as usize]
    }

    /// Record one admission check.
    pub fn record_check(&self, kind: ActionKind) {
        self.action(kind).checks_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a denied admission check.
    pub fn record_denied(&self, kind: ActionKind) {
        self.action(kind).denied_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transition into the blocked state.
    pub fn record_block(&self, kind: ActionKind) {
        self.action(kind).blocks_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected payload.
    pub fn record_malicious(&self, category: Category) {
        let counter = match category {
            Category::Sql => &self.malicious_sql,
            Category::Xss => &self.malicious_xss,
            Category::None => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record entries evicted by a sweep.
    pub fn record_swept(&self, removed: usize) {
        self.swept_total
            .fetch_add(removed as u64, Ordering::Relaxed);
    }

    pub fn checks_total(&self, kind: ActionKind) -> u64 {
        self.action(kind).checks_total.load(Ordering::Relaxed)
    }

    pub fn denied_total(&self, kind: ActionKind) -> u64 {
        self.action(kind).denied_total.load(Ordering::Relaxed)
    }

    pub fn blocks_total(&self, kind: ActionKind) -> u64 {
        self.action(kind).blocks_total.load(Ordering::Relaxed)
    }

    pub fn swept_total(&self) -> u64 {
        self.swept_total.load(Ordering::Relaxed)
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self, tracked_entries: usize, uptime_seconds: u64) -> String {
        let mut out = String::with_capacity(2048);

        gauge(
            &mut out,
            "storeguard_tracked_entries",
            "Rate-limit entries currently held in memory",
            tracked_entries,
        );
        gauge(
            &mut out,
            "storeguard_uptime_seconds",
            "Server uptime in seconds",
            uptime_seconds,
        );

        per_action(
            &mut out,
            "storeguard_checks_total",
            "Admission checks performed.",
            |kind| self.checks_total(kind),
        );
        per_action(
            &mut out,
            "storeguard_denied_total",
            "Admission checks denied.",
            |kind| self.denied_total(kind),
        );
        per_action(
            &mut out,
            "storeguard_blocks_total",
            "Identifiers moved into the blocked state.",
            |kind| self.blocks_total(kind),
        );

        writeln!(
            out,
            "# HELP storeguard_malicious_input_total Payloads rejected by the attack detector."
        )
        .unwrap();
        writeln!(out, "# TYPE storeguard_malicious_input_total counter").unwrap();
        for (category, counter) in [
            (Category::Sql, &self.malicious_sql),
            (Category::Xss, &self.malicious_xss),
        ] {
            let value = counter.load(Ordering::Relaxed);
            writeln!(
                out,
                "storeguard_malicious_input_total{{category=\"{category}\"}} {value}"
            )
            .unwrap();
        }

        writeln!(
            out,
            "# HELP storeguard_swept_total Rate-limit entries evicted by the sweeper."
        )
        .unwrap();
        writeln!(out, "# TYPE storeguard_swept_total counter").unwrap();
        writeln!(out, "storeguard_swept_total {}", self.swept_total()).unwrap();

        out
    }
}

fn gauge(out: &mut String, name: &str, help: &str, value: impl std::fmt::Display) {
    writeln!(out, "# HELP {name} {help}").unwrap();
    writeln!(out, "# TYPE {name} gauge").unwrap();
    writeln!(out, "{name} {value}").unwrap();
}

fn per_action(out: &mut String, name: &str, help: &str, value: impl Fn(ActionKind) -> u64) {
    writeln!(out, "# HELP {name} {help}").unwrap();
    writeln!(out, "# TYPE {name} counter").unwrap();
    for kind in ActionKind::ALL {
        writeln!(out, "{name}{{action=\"{kind}\"}} {}", value(kind)).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_per_action() {
        let m = Metrics::new();
        m.record_check(ActionKind::Login);
        m.record_check(ActionKind::Login);
        m.record_denied(ActionKind::Login);
        m.record_block(ActionKind::Checkout);

        assert_eq!(m.checks_total(ActionKind::Login), 2);
        assert_eq!(m.denied_total(ActionKind::Login), 1);
        assert_eq!(m.blocks_total(ActionKind::Login), 0);
        assert_eq!(m.blocks_total(ActionKind::Checkout), 1);
    }

    #[test]
    fn render_exposition_format() {
        let m = Metrics::new();
        m.record_check(ActionKind::PasswordReset);
        m.record_malicious(Category::Xss);
        m.record_malicious(Category::None);
        m.record_swept(3);

        let text = m.render(7, 42);
        assert!(text.contains("storeguard_tracked_entries 7"));
        assert!(text.contains("storeguard_uptime_seconds 42"));
        assert!(text.contains("storeguard_checks_total{action=\"passwordReset\"} 1"));
        assert!(text.contains("storeguard_checks_total{action=\"login\"} 0"));
        assert!(text.contains("storeguard_malicious_input_total{category=\"xss\"} 1"));
        assert!(text.contains("storeguard_malicious_input_total{category=\"sql\"} 0"));
        assert!(text.contains("storeguard_swept_total 3"));
        assert!(text.contains("# TYPE storeguard_blocks_total counter"));
    }
}

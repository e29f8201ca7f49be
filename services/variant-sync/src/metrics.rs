use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::report::SyncOutcome;

/// Prometheus collectors for the sync service, on their own registry so
/// every `AppState` can be built in isolation.
#[derive(Clone)]
pub struct SyncMetrics {
    registry: Registry,
    hook_requests: IntCounterVec,
    synced_boms: IntCounter,
    failed_boms: IntCounter,
    blocked_saves: IntCounter,
    hook_duration: Histogram,
}

impl SyncMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let hook_requests = IntCounterVec::new(
            Opts::new("bomsync_hook_requests_total", "BOM hook invocations by outcome"),
            &["outcome"],
        )?;
        let synced_boms = IntCounter::new(
            "bomsync_variant_boms_synced_total",
            "Variant BOMs rewritten and committed",
        )?;
        let failed_boms = IntCounter::new(
            "bomsync_variant_boms_failed_total",
            "Variant BOMs rolled back after a sync error",
        )?;
        let blocked_saves = IntCounter::new(
            "bomsync_blocked_saves_total",
            "Template saves rejected with a blocking error",
        )?;
        let hook_duration = Histogram::with_opts(HistogramOpts::new(
            "bomsync_hook_duration_seconds",
            "Time spent handling one BOM hook",
        ))?;

        registry.register(Box::new(hook_requests.clone()))?;
        registry.register(Box::new(synced_boms.clone()))?;
        registry.register(Box::new(failed_boms.clone()))?;
        registry.register(Box::new(blocked_saves.clone()))?;
        registry.register(Box::new(hook_duration.clone()))?;

        Ok(Self {
            registry,
            hook_requests,
            synced_boms,
            failed_boms,
            blocked_saves,
            hook_duration,
        })
    }

    pub fn observe_outcome(&self, outcome: &SyncOutcome, seconds: f64) {
        self.hook_requests.with_label_values(&["ok"]).inc();
        self.synced_boms.inc_by(outcome.synced.len() as u64);
        self.failed_boms.inc_by(outcome.failed.len() as u64);
        self.hook_duration.observe(seconds);
    }

    pub fn observe_error(&self, blocking: bool, seconds: f64) {
        if blocking {
            self.blocked_saves.inc();
            self.hook_requests.with_label_values(&["blocked"]).inc();
        } else {
            self.hook_requests.with_label_values(&["error"]).inc();
        }
        self.hook_duration.observe(seconds);
    }

    /// Text exposition format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&self.registry.gather(), &mut buffer).is_err() {
            return "Error encoding metrics".to_string();
        }
        String::from_utf8(buffer).unwrap_or_else(|_| "Error encoding metrics".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_are_counted() {
        let metrics = SyncMetrics::new().unwrap();
        let mut outcome = SyncOutcome::new("BOM-SHIRT-001");
        outcome.synced = vec!["BOM-SHIRT-S-001".into(), "BOM-SHIRT-M-001".into()];

        metrics.observe_outcome(&outcome, 0.01);
        metrics.observe_error(true, 0.02);

        let text = metrics.render();
        assert!(text.contains("bomsync_variant_boms_synced_total 2"));
        assert!(text.contains("bomsync_blocked_saves_total 1"));
        assert!(text.contains("bomsync_hook_requests_total{outcome=\"blocked\"} 1"));
        assert!(text.contains("bomsync_hook_duration_seconds_count 2"));
    }
}

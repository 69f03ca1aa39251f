//! Usage ledger interface.
//!
//! Cost accounting lives outside this crate; the dispatch facade only needs
//! somewhere to hand a normalized metrics record. The in-memory accumulator
//! below is the default collaborator and doubles as a reference
//! implementation for external ledgers.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::UsageMetrics;

/// Metrics-ingest interface consumed by the dispatch facade.
///
/// `record` must accept well-formed metrics with zero counts without
/// complaint; the facade calls it once per gateway-routed invocation.
pub trait UsageLedger: Send + Sync {
    fn record(&self, metrics: &UsageMetrics);
}

/// Running totals for one logical model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelTotals {
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// In-memory accumulator keyed by logical model name.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    totals: Mutex<HashMap<String, ModelTotals>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the accumulated totals.
    pub fn snapshot(&self) -> HashMap<String, ModelTotals> {
        self.totals.lock().expect("ledger mutex poisoned").clone()
    }
}

impl UsageLedger for InMemoryLedger {
    fn record(&self, metrics: &UsageMetrics) {
        let mut totals = self.totals.lock().expect("ledger mutex poisoned");
        let entry = totals.entry(metrics.model.clone()).or_default();
        entry.requests += 1;
        entry.input_tokens += metrics.input_token_count;
        entry.output_tokens += metrics.output_token_count;
        tracing::debug!(
            model = %metrics.model,
            input_tokens = metrics.input_token_count,
            output_tokens = metrics.output_token_count,
            "usage recorded"
        );
    }
}

//! Correlation IDs and cost tracking for agent runs.
//!
//! Assigns a unique `trace_id` to each harness run and a `span_id` to each
//! round within it. Tracks cumulative token usage and estimated cost.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Generate a unique trace ID for an agent run.
pub fn generate_trace_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("tr-{ts:x}-{count:04x}")
}

/// Generate a span ID for a round within a run.
pub fn generate_span_id(trace_id: &str, round: u32) -> String {
    format!("{trace_id}:r{round}")
}

/// Per-model pricing for cost estimation (USD per 1M tokens).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Estimate cost for given token counts.
    pub fn estimate_cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (completion_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self::new(2.0, 8.0)
    }
}

// Longest prefix first: "gpt-4.1" must not shadow "gpt-4.1-mini".
const PRICING: &[(&str, ModelPricing)] = &[
    ("gpt-4.1-nano", ModelPricing::new(0.10, 0.40)),
    ("gpt-4.1-mini", ModelPricing::new(0.40, 1.60)),
    ("gpt-4.1", ModelPricing::new(2.00, 8.00)),
    ("gpt-4o-mini", ModelPricing::new(0.15, 0.60)),
    ("gpt-4o", ModelPricing::new(2.50, 10.00)),
    ("o4-mini", ModelPricing::new(1.10, 4.40)),
    ("o3-mini", ModelPricing::new(1.10, 4.40)),
    ("o3", ModelPricing::new(2.00, 8.00)),
];

/// Lookup approximate pricing for a model by name.
///
/// Dated snapshots (`gpt-4.1-mini-2025-04-14`) match their family prefix.
/// Unknown models get [`ModelPricing::default`].
pub fn pricing_for_model(model: &str) -> ModelPricing {
    let name = model.rsplit('/').next().unwrap_or(model).to_lowercase();
    PRICING
        .iter()
        .find(|(prefix, _)| name.starts_with(prefix))
        .map(|(_, pricing)| pricing.clone())
        .unwrap_or_default()
}

/// Cumulative cost tracker for a harness run.
#[derive(Debug, Default)]
pub struct CostTracker {
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub estimated_cost_usd: f64,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record token usage for a round.
    pub fn record(&mut self, prompt_tokens: u32, completion_tokens: u32, pricing: &ModelPricing) {
        self.total_prompt_tokens += prompt_tokens as u64;
        self.total_completion_tokens += completion_tokens as u64;
        self.estimated_cost_usd += pricing.estimate_cost(prompt_tokens, completion_tokens);
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_prompt_tokens + self.total_completion_tokens
    }

    /// Format as a short summary string.
    pub fn summary(&self) -> String {
        format!(
            "tokens: {} prompt + {} completion = {} total, est. cost: ${:.4}",
            self.total_prompt_tokens,
            self.total_completion_tokens,
            self.total_tokens(),
            self.estimated_cost_usd,
        )
    }
}

//! Per-model pricing and run cost telemetry.
//!
//! Costs are advisory: they are logged and reported but never feed a
//! control decision.

use std::sync::{Arc, Mutex};

use tracing::debug;

use super::message::TokenUsage;
use super::model::{
    FIREWORKS_LLAMA_4_MAVERICK, FIREWORKS_LLAMA_4_SCOUT, GROQ_DEEPSEEK_R1_LLAMA,
    GROQ_LLAMA_3_VERSATILE, GROQ_LLAMA_4_MAVERICK, GROQ_LLAMA_4_SCOUT, GROQ_QWEN_QWQ,
    OPENAI_GPT_4O, OPENAI_O1_MINI, OPENAI_O3_MINI, PERPLEXITY_SONAR, PERPLEXITY_SONAR_PRO,
    Service, TOGETHER_DEEPSEEK_V3, TOGETHER_LLAMA_4_MAVERICK,
};

/// Prices for one model, in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pricing {
    /// Price per million prompt tokens.
    pub input_per_million: f64,
    /// Price per million completion tokens.
    pub output_per_million: f64,
    /// Flat surcharge per request.
    pub per_request: f64,
}

impl Pricing {
    /// Cost of one call with the given usage.
    #[must_use]
    pub fn cost(&self, usage: TokenUsage) -> f64 {
        f64::from(usage.prompt_tokens) / 1_000_000.0 * self.input_per_million
            + f64::from(usage.completion_tokens) / 1_000_000.0 * self.output_per_million
            + self.per_request
    }
}

/// Looks up prices for a `(service, model)` pair.
///
/// Unknown pairs return [`Pricing::default`] (all zeros).
pub trait PricingLookup: Send + Sync {
    /// Prices for the pair; `size_tier` selects a per-request surcharge
    /// tier where the service has one.
    fn pricing(&self, service: Service, model: &str, size_tier: Option<&str>) -> Pricing;
}

/// Token prices: `(service, model, input, output)` per million tokens.
const TOKEN_PRICES: &[(Service, &str, f64, f64)] = &[
    (Service::Fireworks, FIREWORKS_LLAMA_4_MAVERICK, 0.22, 0.88),
    (Service::Fireworks, FIREWORKS_LLAMA_4_SCOUT, 0.15, 0.60),
    (Service::Perplexity, PERPLEXITY_SONAR, 1.0, 1.0),
    (Service::Perplexity, PERPLEXITY_SONAR_PRO, 3.0, 15.0),
    (Service::Groq, GROQ_LLAMA_4_SCOUT, 0.11, 0.34),
    (Service::Groq, GROQ_LLAMA_4_MAVERICK, 0.50, 0.77),
    (Service::Groq, GROQ_DEEPSEEK_R1_LLAMA, 0.75, 0.99),
    (Service::Groq, GROQ_QWEN_QWQ, 0.29, 0.39),
    (Service::Groq, GROQ_LLAMA_3_VERSATILE, 0.59, 0.79),
    (Service::OpenAi, OPENAI_O1_MINI, 1.10, 4.40),
    (Service::OpenAi, OPENAI_O3_MINI, 1.10, 4.40),
    (Service::OpenAi, OPENAI_GPT_4O, 2.50, 10.00),
    (Service::Together, TOGETHER_LLAMA_4_MAVERICK, 0.27, 0.85),
    (Service::Together, GROQ_LLAMA_4_SCOUT, 0.18, 0.59),
    (Service::Together, TOGETHER_DEEPSEEK_V3, 1.25, 1.25),
];

/// Perplexity search-context surcharges: `(model, tier, usd_per_1000_requests)`.
const CONTEXT_SURCHARGES: &[(&str, &str, f64)] = &[
    (PERPLEXITY_SONAR, "low", 5.0),
    (PERPLEXITY_SONAR, "medium", 8.0),
    (PERPLEXITY_SONAR, "high", 12.0),
    (PERPLEXITY_SONAR_PRO, "low", 6.0),
    (PERPLEXITY_SONAR_PRO, "medium", 10.0),
    (PERPLEXITY_SONAR_PRO, "high", 14.0),
];

/// Compiled-in price table for the supported models.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingTable;

impl PricingLookup for PricingTable {
    fn pricing(&self, service: Service, model: &str, size_tier: Option<&str>) -> Pricing {
        let Some(&(_, _, input, output)) = TOKEN_PRICES
            .iter()
            .find(|(svc, m, _, _)| *svc == service && *m == model)
        else {
            return Pricing::default();
        };

        let per_request = match (service, size_tier) {
            (Service::Perplexity, Some(tier)) => CONTEXT_SURCHARGES
                .iter()
                .find(|(m, t, _)| *m == model && *t == tier)
                .map_or(0.0, |(_, _, per_thousand)| per_thousand / 1000.0),
            _ => 0.0,
        };

        Pricing {
            input_per_million: input,
            output_per_million: output,
            per_request,
        }
    }
}

/// Running total of spend for one run.
///
/// Cloning shares the total; every clone updates the same counter.
#[derive(Debug, Clone, Default)]
pub struct CostMeter {
    total: Arc<Mutex<f64>>,
}

impl CostMeter {
    /// Creates a meter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prices one completed call, adds it to the total and returns its cost.
    pub fn record(
        &self,
        pricing: &dyn PricingLookup,
        service: Service,
        model: &str,
        size_tier: Option<&str>,
        usage: TokenUsage,
    ) -> f64 {
        let cost = pricing.pricing(service, model, size_tier).cost(usage);
        let total = match self.total.lock() {
            Ok(mut guard) => {
                *guard += cost;
                *guard
            }
            // Advisory counter; a poisoned lock only loses telemetry.
            Err(_) => return cost,
        };
        debug!(
            %service,
            model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cost_usd = cost,
            total_usd = total,
            "call cost"
        );
        cost
    }

    /// Total spend so far, in USD.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.total.lock().map_or(0.0, |guard| *guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(prompt: u32, completion: u32) -> TokenUsage {
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    #[test]
    fn test_known_model_pricing() {
        let p = PricingTable.pricing(Service::OpenAi, OPENAI_GPT_4O, None);
        assert!((p.input_per_million - 2.5).abs() < f64::EPSILON);
        assert!((p.output_per_million - 10.0).abs() < f64::EPSILON);
        assert!(p.per_request.abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_pair_is_free() {
        assert_eq!(
            PricingTable.pricing(Service::Deepseek, "deepseek-reasoner", None),
            Pricing::default()
        );
        assert_eq!(
            PricingTable.pricing(Service::OpenAi, GROQ_QWEN_QWQ, None),
            Pricing::default()
        );
    }

    #[test]
    fn test_perplexity_context_surcharge() {
        let p = PricingTable.pricing(Service::Perplexity, PERPLEXITY_SONAR_PRO, Some("high"));
        assert!((p.per_request - 0.014).abs() < 1e-12);
        let none = PricingTable.pricing(Service::Perplexity, PERPLEXITY_SONAR, Some("huge"));
        assert!(none.per_request.abs() < f64::EPSILON);
    }

    #[test]
    fn test_surcharge_only_for_perplexity() {
        let p = PricingTable.pricing(Service::OpenAi, OPENAI_GPT_4O, Some("high"));
        assert!(p.per_request.abs() < f64::EPSILON);
    }

    #[test]
    fn test_cost_meter_accumulates_across_clones() {
        let meter = CostMeter::new();
        let shared = meter.clone();
        let one = meter.record(&PricingTable, Service::OpenAi, OPENAI_GPT_4O, None, usage(1_000_000, 0));
        shared.record(&PricingTable, Service::OpenAi, OPENAI_GPT_4O, None, usage(0, 1_000_000));
        assert!((one - 2.5).abs() < 1e-9);
        assert!((meter.total() - 12.5).abs() < 1e-9);
    }
}

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Percent};

/// What to do when a new or edited instrument would push the projected real
/// discount above the ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeilingPolicy {
    /// Reject the edit with `DiscountCeilingExceeded`.
    #[default]
    Block,
    /// Apply the edit and report a warning.
    Warn,
}

/// Tunables for a negotiation session. Every field has a default, so a
/// partial YAML/JSON document is enough to override one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Highest acceptable projected real discount (percent) when adding or
    /// editing instruments.
    pub real_discount_ceiling: Percent,
    pub ceiling_policy: CeilingPolicy,
    /// Upper clamp for the real discount while no instrument exists.
    pub real_discount_cap: Percent,
    pub solver_max_iterations: u32,
    /// Solver stopping tolerance, in percentage points.
    pub solver_tolerance: Percent,
    /// Deltas below this are treated as already allocated.
    pub redistribution_tolerance: Money,
    /// Quiet window before a scalar edit is applied by a session.
    pub debounce_ms: u64,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            real_discount_ceiling: dec!(25),
            ceiling_policy: CeilingPolicy::Block,
            real_discount_cap: dec!(50),
            solver_max_iterations: 25,
            solver_tolerance: dec!(0.01),
            redistribution_tolerance: dec!(0.01),
            debounce_ms: 300,
        }
    }
}

impl NegotiationConfig {
    pub fn with_ceiling(mut self, ceiling: Percent) -> Self {
        self.real_discount_ceiling = ceiling.max(Decimal::ZERO);
        self
    }

    pub fn with_ceiling_policy(mut self, policy: CeilingPolicy) -> Self {
        self.ceiling_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = NegotiationConfig::default();
        assert_eq!(cfg.real_discount_ceiling, dec!(25));
        assert_eq!(cfg.real_discount_cap, dec!(50));
        assert_eq!(cfg.solver_max_iterations, 25);
        assert_eq!(cfg.debounce_ms, 300);
        assert_eq!(cfg.ceiling_policy, CeilingPolicy::Block);
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let cfg: NegotiationConfig =
            serde_json::from_str(r#"{"real_discount_ceiling": "30", "ceiling_policy": "warn"}"#)
                .unwrap();
        assert_eq!(cfg.real_discount_ceiling, dec!(30));
        assert_eq!(cfg.ceiling_policy, CeilingPolicy::Warn);
        assert_eq!(cfg.solver_max_iterations, 25);
    }
}

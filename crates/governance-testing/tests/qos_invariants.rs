//! Property-based invariants over `AdaptiveQosController`.

use governance_core::qos::{AdaptiveQosController, LoadLevel};
use governance_testing::generators::system_metrics;
use proptest::prelude::*;

fn controller() -> AdaptiveQosController {
    AdaptiveQosController::new(100, 200.0, 0.85, 0.90, true)
}

proptest! {
    /// No multiplier the controller recommends ever exceeds the 1.0
    /// baseline, whatever the input metrics look like — every multiplier
    /// is only ever capped downward via `.min()`.
    #[test]
    fn multipliers_never_exceed_baseline(metrics in system_metrics()) {
        let mut c = controller();
        let adj = c.evaluate(metrics);
        prop_assert!(adj.speed_multiplier <= 1.0);
        prop_assert!(adj.fuel_multiplier <= 1.0);
        prop_assert!(adj.rate_limit_multiplier <= 1.0);
    }

    /// Multipliers are always finite and non-negative.
    #[test]
    fn multipliers_are_finite_and_nonnegative(metrics in system_metrics()) {
        let mut c = controller();
        let adj = c.evaluate(metrics);
        for m in [adj.speed_multiplier, adj.fuel_multiplier, adj.rate_limit_multiplier] {
            prop_assert!(m.is_finite());
            prop_assert!(m >= 0.0);
        }
    }

    /// Shedding low-priority traffic implies the load level is Overload,
    /// and vice versa — the two are defined in terms of each other.
    #[test]
    fn shedding_and_overload_always_agree(metrics in system_metrics()) {
        let mut c = controller();
        let adj = c.evaluate(metrics);
        prop_assert_eq!(adj.shed_low_priority, adj.load_level == LoadLevel::Overload);
    }

    /// Breaching a threshold always produces at least one human-readable
    /// reason string.
    #[test]
    fn any_breach_is_explained(metrics in system_metrics()) {
        let mut c = controller();
        let adj = c.evaluate(metrics);
        let breached = metrics.cpu_usage > 0.85
            || metrics.memory_usage > 0.90
            || metrics.queue_depth > 100
            || metrics.avg_latency_ms > 200.0
            || metrics.p2p_packet_loss > 0.1;
        if breached {
            prop_assert!(!adj.reasons.is_empty());
        }
    }
}

#[test]
fn trend_requires_a_full_window() {
    let mut c = controller();
    for _ in 0..3 {
        c.evaluate(Default::default());
    }
    assert_eq!(c.trend(10), None);
}

//! Property-based test generators for the runtime governance engine.
//!
//! Mirrors the generator-function idiom used across the kernel test suite:
//! each public function returns a `Strategy` that `proptest` can shrink and
//! replay, rather than a single fixed fixture.

pub mod generators {
    use governance_core::intent::{Intent, Priority};
    use governance_core::qos::SystemMetrics;
    use proptest::prelude::*;

    /// An arbitrary `Priority`.
    pub fn priority() -> impl Strategy<Value = Priority> {
        prop_oneof![Just(Priority::Low), Just(Priority::Normal), Just(Priority::High)]
    }

    /// An arbitrary action string, weighted toward the destructive verbs
    /// the semantic-risk heuristic recognizes, plus arbitrary other verbs.
    pub fn action() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("delete".to_string()),
            Just("drop".to_string()),
            Just("kill".to_string()),
            Just("override".to_string()),
            Just("bypass".to_string()),
            Just("read".to_string()),
            Just("write".to_string()),
            "[a-z]{3,12}",
        ]
    }

    /// An arbitrary `Intent` with plausible field ranges.
    pub fn intent() -> impl Strategy<Value = Intent> {
        (
            "[a-f0-9]{8,16}",
            action(),
            any::<bool>(),
            prop::option::of("[a-z]{1,8}"),
            priority(),
            0u64..1000,
            0u32..50,
            any::<bool>(),
        )
            .prop_map(
                |(id, action, requires_admin, scope, priority, fuel_estimate, burst_count, off_hours)| Intent {
                    id,
                    signature: None,
                    action,
                    requires_admin,
                    scope,
                    priority,
                    fuel_estimate,
                    burst_count,
                    off_hours,
                },
            )
    }

    /// An arbitrary `SystemMetrics` sample with all fields in their
    /// documented ranges.
    pub fn system_metrics() -> impl Strategy<Value = SystemMetrics> {
        (
            0.0f64..1.5,
            0.0f64..1.5,
            0u64..10_000,
            0.0f64..5000.0,
            0.0f64..1.0,
            0.0f64..1.0,
        )
            .prop_map(
                |(cpu_usage, memory_usage, queue_depth, avg_latency_ms, error_rate, p2p_packet_loss)| {
                    SystemMetrics {
                        cpu_usage,
                        memory_usage,
                        queue_depth,
                        avg_latency_ms,
                        error_rate,
                        p2p_packet_loss,
                        timestamp: 0.0,
                    }
                },
            )
    }

    /// A normalized risk-weight triple that always sums to 1.0, generated
    /// by drawing two cut points on the unit interval (the "stick-breaking"
    /// trick), so every draw is a valid simplex point by construction.
    pub fn risk_weight_triple() -> impl Strategy<Value = (f64, f64, f64)> {
        (0.0f64..1.0, 0.0f64..1.0).prop_map(|(a, b)| {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            (lo, hi - lo, 1.0 - hi)
        })
    }

    /// An arbitrary, *not necessarily normalized*, risk-weight triple, used
    /// to check that policy validation rejects triples that don't sum to 1.
    pub fn arbitrary_weight_triple() -> impl Strategy<Value = (f64, f64, f64)> {
        (0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0)
    }
}

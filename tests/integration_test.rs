//! Integration tests across the scoring pipeline.
//!
//! Tests cover:
//! - Score bounds for every algorithm over generated inputs (proptest)
//! - Six-factor new-high/low fallback
//! - Short-history distribution defaults
//! - Sector coverage validation
//! - Custom formula sandbox and evaluation
//! - Momentum availability and hand-computed ratio
//! - Configuration validation, export/import round trip
//! - Idempotence and bulk calculation through the engine

mod common;

use approx::assert_relative_eq;
use breadthscore::domain::algorithm::six_factor::factor_breakdown;
use breadthscore::domain::algorithm::{Algorithm, BreadthAlgorithm};
use breadthscore::domain::breadth_record::RawBreadthRecord;
use breadthscore::domain::configuration::{
    AlgorithmKind, Configuration, Weights, default_configurations, validate_configuration,
};
use breadthscore::domain::error::BreadthError;
use breadthscore::domain::market_condition::Phase;
use breadthscore::domain::formula_eval::{FormulaContext, execute};
use breadthscore::domain::standardize::{standardize, trailing_window};
use breadthscore::domain::statistics::{HistoricalMetrics, historical_metrics, momentum_ratio};
use common::*;
use proptest::prelude::*;

fn default_config(kind: AlgorithmKind) -> Configuration {
    default_configurations()
        .into_iter()
        .find(|c| c.algorithm == kind)
        .unwrap()
}

mod score_bounds {
    use super::*;

    fn arb_record() -> impl Strategy<Value = RawBreadthRecord> {
        (
            (0.0..4000.0f64, 0.0..4000.0f64, 0.0..800.0f64, 0.0..800.0f64),
            (0.0..5.0e9f64, 0.0..5.0e9f64, 0.0..1500.0f64, 0.0..1500.0f64),
            0.0..100.0f64,
            prop::collection::vec(0.0..100.0f64, 11),
        )
            .prop_map(|((adv, dec, hi, lo), (upv, downv, up4, down4), t2108, sectors)| {
                let mut raw = make_record("2024-06-14", adv, dec);
                raw.new_highs = Some(hi);
                raw.new_lows = Some(lo);
                raw.up_volume = Some(upv);
                raw.down_volume = Some(downv);
                raw.stocks_up_4pct = Some(up4);
                raw.stocks_down_4pct = Some(down4);
                raw.t2108 = Some(t2108);
                with_sectors(raw, &sectors)
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn normalized_score_within_configured_range(raw in arb_record(), history_len in 0i64..30) {
            let history = make_history("2024-06-14", history_len);
            for kind in AlgorithmKind::ALL {
                let config = default_config(kind);
                let result = Algorithm::for_kind(kind).calculate(&raw, &config, &history).unwrap();
                prop_assert!(result.normalized_score >= config.scaling.min_score);
                prop_assert!(result.normalized_score <= config.scaling.max_score);
                prop_assert!((0.0..=100.0).contains(&result.score));
                prop_assert!((0.0..=1.0).contains(&result.confidence));
            }
        }
    }

    #[test]
    fn custom_scaling_range_is_respected() {
        let raw = with_sectors(make_record("2024-06-14", 3900.0, 10.0), &[95.0; 11]);
        for kind in AlgorithmKind::ALL {
            let mut config = default_config(kind);
            config.scaling.min_score = 10.0;
            config.scaling.max_score = 20.0;
            let result = Algorithm::for_kind(kind).calculate(&raw, &config, &[]).unwrap();
            assert!(
                (10.0..=20.0).contains(&result.normalized_score),
                "{kind}: {}",
                result.normalized_score
            );
            assert_ne!(result.market_condition.phase, Phase::Bear, "{kind}");
        }
    }
}

mod six_factor_fallback {
    use super::*;

    #[test]
    fn zero_highs_and_lows_use_scaled_advance_decline_points() {
        let mut raw = make_record("2024-06-14", 2200.0, 900.0);
        raw.new_highs = Some(0.0);
        raw.new_lows = Some(0.0);
        let current = standardize(&raw);
        let mut warnings = Vec::new();

        let breakdown = factor_breakdown(&current, &[], 5, &mut warnings);
        assert_eq!(breakdown.hl_points, breakdown.ad_points * (20.0 / 25.0));
        assert!(warnings.iter().any(|w| w.contains("new highs/lows")));
    }

    #[test]
    fn fallback_warning_reaches_result_metadata() {
        let mut raw = make_record("2024-06-14", 2200.0, 900.0);
        raw.new_highs = None;
        raw.new_lows = None;
        let result = Algorithm::for_kind(AlgorithmKind::SixFactor)
            .calculate(&raw, &default_config(AlgorithmKind::SixFactor), &[])
            .unwrap();
        assert!(result.metadata.warnings.iter().any(|w| w.contains("new highs/lows")));
    }
}

mod historical_distribution {
    use super::*;

    #[test]
    fn short_window_returns_neutral_distribution() {
        let history = make_history("2024-06-14", 9);
        let window = trailing_window(Some(date("2024-06-14")), &history);
        assert_eq!(window.len(), 9);

        let metrics = historical_metrics(&window);
        assert_eq!(metrics.mean, 50.0);
        assert_eq!(metrics.std_dev, 20.0);
        assert_eq!(metrics.min, 0.0);
        assert_eq!(metrics.max, 100.0);
        assert_eq!(metrics.p25, 35.0);
        assert_eq!(metrics.p75, 65.0);
        assert!(metrics.is_neutral());
        assert_eq!(HistoricalMetrics::NEUTRAL.mean, 50.0);
    }

    #[test]
    fn ten_records_produce_observed_distribution() {
        let history = make_history("2024-06-14", 10);
        let window = trailing_window(Some(date("2024-06-14")), &history);
        let metrics = historical_metrics(&window);
        assert!(!metrics.is_neutral());
        assert_eq!(metrics.samples, 10);
        assert!(metrics.min <= metrics.p25 && metrics.p25 <= metrics.p75);
        assert!(metrics.p75 <= metrics.max);
    }
}

mod sector_validation {
    use super::*;

    #[test]
    fn five_sectors_fail_six_pass() {
        let algorithm = Algorithm::for_kind(AlgorithmKind::SectorWeighted);

        let five = with_sectors(make_record("2024-06-14", 1800.0, 1200.0), &[60.0; 5]);
        let validation = algorithm.validate(&five);
        assert!(!validation.is_valid);
        assert!(validation.errors.iter().any(|e| e.contains("6 sectors")));

        let six = with_sectors(make_record("2024-06-14", 1800.0, 1200.0), &[60.0; 6]);
        assert!(algorithm.validate(&six).is_valid);
    }

    #[test]
    fn insufficient_sectors_block_calculation() {
        let raw = with_sectors(make_record("2024-06-14", 1800.0, 1200.0), &[60.0; 3]);
        let err = Algorithm::for_kind(AlgorithmKind::SectorWeighted)
            .calculate(&raw, &default_config(AlgorithmKind::SectorWeighted), &[])
            .unwrap_err();
        assert!(matches!(
            err,
            BreadthError::InsufficientSectorData { found: 3, .. }
        ));
    }
}

mod custom_formula {
    use super::*;

    #[test]
    fn process_is_rejected_by_config_validation() {
        let mut config = default_config(AlgorithmKind::Custom);
        config.custom_formula = Some("process + primary".into());
        let validation = Algorithm::for_kind(AlgorithmKind::Custom).validate_config(&config);
        assert!(!validation.valid);
        assert!(!validation.errors.is_empty());
    }

    #[test]
    fn equal_blend_of_equal_inputs() {
        let ctx = FormulaContext::new()
            .with("primary", 80.0)
            .with("secondary", 80.0);
        let score = execute("(primary*0.5)+(secondary*0.5)", &ctx).unwrap();
        assert_relative_eq!(score, 80.0);
    }

    #[test]
    fn failing_formula_falls_back_without_error() {
        let mut config = default_config(AlgorithmKind::Custom);
        config.custom_formula = Some("primary / (reference - reference)".into());
        let raw = make_record("2024-06-14", 1800.0, 1200.0);
        let result = Algorithm::for_kind(AlgorithmKind::Custom)
            .calculate(&raw, &config, &[])
            .unwrap();
        assert!(result.metadata.warnings.iter().any(|w| w.contains("fallback")));
        assert!((0.0..=100.0).contains(&result.normalized_score));
    }
}

mod momentum {
    use super::*;

    fn mover_record(day: &str, up: f64, down: f64) -> RawBreadthRecord {
        let mut raw = make_record(day, 1500.0, 1500.0);
        raw.stocks_up_4pct = Some(up);
        raw.stocks_down_4pct = Some(down);
        raw
    }

    #[test]
    fn unavailable_when_window_too_short() {
        let current = standardize(&mover_record("2024-06-14", 10.0, 5.0));
        let history = vec![
            mover_record("2024-06-12", 10.0, 5.0),
            mover_record("2024-06-13", 10.0, 5.0),
        ];
        let window = trailing_window(Some(date("2024-06-14")), &history);
        assert_eq!(momentum_ratio(&current, &window, 4), None);
    }

    #[test]
    fn four_day_ratio_matches_hand_computation() {
        let current = standardize(&mover_record("2024-06-14", 10.0, 5.0));
        let history = vec![
            mover_record("2024-06-11", 10.0, 5.0),
            mover_record("2024-06-12", 10.0, 5.0),
            mover_record("2024-06-13", 10.0, 5.0),
        ];
        let window = trailing_window(Some(date("2024-06-14")), &history);
        let ratio = momentum_ratio(&current, &window, 4).unwrap();
        assert_relative_eq!(ratio, 40.0 / 20.0);
    }
}

mod configuration_management {
    use super::*;

    #[test]
    fn weight_sum_limits() {
        let mut config = Configuration::new(AlgorithmKind::SixFactor, "weights");
        config.weights = Weights::new(0.9, 0.9, 0.9, 0.0);
        assert!(!validate_configuration(&config).valid);

        config.weights = Weights::new(0.4, 0.35, 0.25, 0.0);
        assert!(validate_configuration(&config).valid);
    }

    #[test]
    fn export_import_round_trip_between_engines() {
        let source = seeded_engine();
        let custom = source
            .configs()
            .clone_configuration(
                &source.configs().get_default(AlgorithmKind::Custom).unwrap().version,
                "tuned custom",
            )
            .unwrap();
        let exported = source.configs().export_json(None).unwrap();

        let target = seeded_engine();
        let imported = target.configs().import_json(&exported).unwrap();
        assert_eq!(imported.len(), 5);

        let copy = imported.iter().find(|c| c.name == "tuned custom").unwrap();
        assert_ne!(copy.version, custom.version);
        assert!(!copy.is_default);
        assert_eq!(copy.weights, custom.weights);
        assert_eq!(copy.scaling, custom.scaling);
        assert_eq!(copy.indicators, custom.indicators);
        assert_eq!(copy.market_conditions, custom.market_conditions);
        assert_eq!(copy.custom_formula, custom.custom_formula);

        for kind in AlgorithmKind::ALL {
            let default = target.configs().get_default(kind).unwrap();
            assert!(imported.iter().all(|c| c.version != default.version));
        }
    }
}

mod engine {
    use super::*;

    #[test]
    fn repeated_calculation_is_identical_apart_from_timing() {
        let engine = seeded_engine();
        let raw = with_sectors(make_record("2024-06-14", 2100.0, 1100.0), &[55.0; 11]);
        let history = make_history("2024-06-14", 20);

        for kind in AlgorithmKind::ALL {
            let first = engine.calculate(&raw, &history, kind, None).unwrap();
            let second = engine.calculate(&raw, &history, kind, None).unwrap();
            assert!(first.same_outcome(&second), "{kind} results differ");
            assert_eq!(
                serde_json::to_value(&first.market_condition).unwrap(),
                serde_json::to_value(&second.market_condition).unwrap()
            );
        }
    }

    #[test]
    fn missing_date_is_rejected() {
        let engine = seeded_engine();
        let mut raw = make_record("2024-06-14", 2100.0, 1100.0);
        raw.date = None;
        let err = engine
            .calculate(&raw, &[], AlgorithmKind::Normalized, None)
            .unwrap_err();
        assert!(matches!(err, BreadthError::MissingDate));
    }

    #[test]
    fn range_calculation_uses_earlier_records_as_history() {
        let engine = seeded_engine();
        let mut records = make_history("2024-06-15", 30);
        records.push(make_record("2024-06-15", 2500.0, 800.0));
        let port = MockDataPort::new().with_records(records.clone());

        let outcome = engine
            .calculate_range(
                &port,
                date("2024-06-10"),
                date("2024-06-15"),
                AlgorithmKind::Normalized,
                None,
                20,
            )
            .unwrap();
        assert_eq!(outcome.results.len(), 6);
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.results[0].date, date("2024-06-10"));

        let last = records.last().unwrap();
        let history: Vec<RawBreadthRecord> = records[records.len() - 21..records.len() - 1].to_vec();
        let single = engine
            .calculate(last, &history, AlgorithmKind::Normalized, None)
            .unwrap();
        assert!(single.same_outcome(outcome.results.last().unwrap()));
    }

    #[test]
    fn data_source_errors_propagate() {
        let engine = seeded_engine();
        let port = MockDataPort::new().with_error("connection refused");
        let err = engine
            .calculate_range(
                &port,
                date("2024-06-10"),
                date("2024-06-15"),
                AlgorithmKind::SixFactor,
                None,
                20,
            )
            .unwrap_err();
        assert!(matches!(err, BreadthError::DataSource { .. }));
    }
}

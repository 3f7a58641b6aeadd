//! Integration tests for the expression engine.
//!
//! Tests cover:
//! - Dimension inference through parsed expressions
//! - Lookback range faults at the start of the calendar
//! - Subtree replacement, equality and XML round-trips
//! - Numeric evaluation of arithmetic, cross-sectional and rolling operators
//! - Sharing one gene across threads

mod common;

use approx::assert_relative_eq;
use common::*;
use alphagene::domain::dimension::Dimension;
use alphagene::domain::environment::Environment;
use alphagene::domain::error::{AlphaError, ValidationError};
use alphagene::domain::gene::Gene;
use alphagene::domain::node::ArgConstraint;

fn parse(env: &Environment, text: &str) -> Gene {
    env.parse_string(text).unwrap()
}

fn day(index: usize) -> chrono::NaiveDate {
    calendar()[index]
}

mod dimensions {
    use super::*;

    #[test]
    fn arithmetic_dimensions() {
        let env = sample_environment();

        assert!(!parse(&env, "add(open1, open2)").validate());

        let same = parse(&env, "add(open1, open1)");
        assert!(same.validate());
        assert_eq!(same.dimension().unwrap().to_string(), "CNY");

        let product = parse(&env, "mul(open1, open2)");
        assert!(product.validate());
        assert_eq!(product.dimension().unwrap().to_string(), "CNY USD");

        let ratio = parse(&env, "div(open1, open1)");
        assert!(ratio.validate());
        assert_eq!(ratio.dimension().unwrap().to_string(), "");
    }

    #[test]
    fn incompatible_add_names_both_sides() {
        let env = sample_environment();
        let gene = parse(&env, "add(open1, open2)");
        assert_eq!(
            gene.validation_error(),
            Some(&ValidationError::Incompatible {
                operator: "add".into(),
                left: "CNY".into(),
                right: "USD".into(),
            })
        );
    }

    #[test]
    fn constants_are_dimensionless() {
        let env = sample_environment();
        assert!(!parse(&env, "add(open1, 1)").validate());
        let scaled = parse(&env, "mul(open1, 2)");
        assert_eq!(scaled.dimension().unwrap(), &Dimension::unit("CNY"));
    }

    #[test]
    fn nested_dimensions() {
        let env = sample_environment();
        let gene = parse(&env, "div(mul(open1, open1), open2)");
        assert_eq!(gene.dimension().unwrap().to_string(), "CNY**2 // USD");

        let root = parse(&env, "pow(open1, 1/2)");
        assert_eq!(root.dimension().unwrap().to_string(), "CNY**1/2");

        let back = parse(&env, "mul(pow(open1, 1/2), pow(open1, 1/2))");
        assert_eq!(back.dimension().unwrap().to_string(), "CNY");
    }

    #[test]
    fn extreme_exponents_validate_without_overflow() {
        let env = sample_environment();
        let doubled = parse(
            &env,
            "mul(pow(open1, 9223372036854775807), pow(open1, 9223372036854775807))",
        );
        assert!(doubled.validate());
        assert_eq!(doubled.dimension().unwrap().to_string(), "CNY**18446744073709551614");

        let nested = parse(
            &env,
            "pow(pow(pow(open1, 1/3037000500), 1/3037000500), 1/3037000500)",
        );
        assert!(nested.validate());
        assert_eq!(
            nested.dimension().unwrap().to_string(),
            "CNY**1/28011385488055777750125000000"
        );
    }

    #[test]
    fn window_operators_keep_or_drop_dimension() {
        let env = sample_environment();
        assert_eq!(parse(&env, "ts_mean(open1, 5)").dimension().unwrap().to_string(), "CNY");
        assert_eq!(parse(&env, "ts_corr(open1, open2, 5)").dimension().unwrap().to_string(), "");
        assert_eq!(
            parse(&env, "ts_cov(open1, open2, 5)").dimension().unwrap().to_string(),
            "CNY USD"
        );
        assert_eq!(parse(&env, "rank(open1)").dimension().unwrap().to_string(), "");
    }

    #[test]
    fn blackhole_never_blocks_validation() {
        let env = sample_environment();
        let oscillator = parse(&env, "rsi(open1, 5)");
        assert!(oscillator.dimension().unwrap().is_blackhole());

        let mixed = parse(&env, "add(rsi(open1, 5), open2)");
        assert!(mixed.validate());
        assert!(mixed.dimension().unwrap().is_blackhole());
    }

    #[test]
    fn catalog_constraints_gate_arguments() {
        let mut env = sample_environment();
        env.constrain("ts_mean", 0, ArgConstraint::dimension("CNY")).unwrap();
        assert!(parse(&env, "ts_mean(open1, 5)").validate());
        assert!(!parse(&env, "ts_mean(open2, 5)").validate());
    }
}

mod lookback {
    use super::*;

    #[test]
    fn rolling_window_needs_history() {
        let env = sample_environment();
        let gene = parse(&env, "ts_mean(open, 5)");
        let n = 5;

        let err = gene.eval(&env, day(n - 2), day(n - 2)).unwrap_err();
        assert!(err.is_range_fault(), "unexpected error {err:?}");

        let frame = gene.eval(&env, day(n - 1), day(n - 1)).unwrap();
        assert_eq!(frame.len(), 1);
        assert!(!frame.rows()[0][0].is_nan());

        assert!(gene.eval(&env, day(n), day(20)).is_ok());
    }

    #[test]
    fn lag_needs_one_more_day() {
        let env = sample_environment();
        let gene = parse(&env, "ts_delay(open1, 5)");
        assert!(gene.eval(&env, day(4), day(4)).unwrap_err().is_range_fault());
        let frame = gene.eval(&env, day(5), day(5)).unwrap();
        assert_relative_eq!(frame.rows()[0][0], 10.0);
    }

    #[test]
    fn nested_windows_accumulate() {
        let env = sample_environment();
        let gene = parse(&env, "ts_mean(ts_mean(open, 5), 5)");
        assert!(gene.eval(&env, day(7), day(7)).unwrap_err().is_range_fault());
        assert!(gene.eval(&env, day(8), day(8)).is_ok());
    }

    #[test]
    fn window_past_the_data_is_a_range_fault() {
        let env = sample_environment();
        let gene = parse(&env, "open");
        let err = gene
            .eval(&env, day(0), date(2024, 6, 3))
            .unwrap_err();
        assert!(err.is_range_fault());
    }
}

mod structure {
    use super::*;

    #[test]
    fn replace_substitutes_subtree() {
        let env = sample_environment();
        let g = parse(&env, "add(open, add(close, open))");
        let replaced = g.replace(1, &g).unwrap();
        assert_eq!(
            replaced.as_str(),
            "add(add(open, add(close, open)), add(close, open))"
        );
        assert!(replaced.validate());
    }

    #[test]
    fn parse_is_reflexive_and_string_canonical() {
        let env = sample_environment();
        let text = "sub(ts_mean(open, 5), mul(close, 1/2))";
        assert_eq!(parse(&env, text), parse(&env, text));
        assert_eq!(parse(&env, text).hashcode(), parse(&env, text).hashcode());
        // semantically equal but rendered differently
        assert_ne!(parse(&env, "add(open, close)"), parse(&env, "add(close, open)"));
    }

    #[test]
    fn xml_round_trips() {
        let env = sample_environment();
        for text in [
            "open",
            "7",
            "-3/4",
            "add(open, add(close, open))",
            "ts_corr(open1, open2, 10)",
            "rank(sub(ema(close, 5), wma(close, 5)))",
        ] {
            let gene = parse(&env, text);
            let back = env.parse_xmlstring(gene.to_xml_string()).unwrap();
            assert_eq!(back.to_xml_string(), gene.to_xml_string(), "{text}");
            assert_eq!(back, gene);
        }
    }

    #[test]
    fn next_sibling_extracts_argument() {
        let env = sample_environment();
        let gene = parse(&env, "add(ts_mean(open, 5), close)");
        let first = gene.next_sibling(1).unwrap();
        assert_eq!(first.as_str(), "ts_mean(open, 5)");
        assert_eq!(gene.subtree_end(1).unwrap(), 4);
        assert_eq!(gene.next_sibling(4).unwrap().as_str(), "close");
    }

    #[test]
    fn malformed_gene_does_not_validate_or_evaluate() {
        let env = sample_environment();
        let truncated = parse(&env, "add(open)");
        assert!(!truncated.validate());
        assert!(matches!(
            truncated.eval(&env, day(5), day(6)),
            Err(AlphaError::Malformed(ValidationError::Truncated { .. }))
        ));

        let trailing = parse(&env, "open close");
        assert!(!trailing.validate());
        assert!(matches!(
            trailing.eval(&env, day(5), day(6)),
            Err(AlphaError::Malformed(ValidationError::Trailing { count: 1 }))
        ));
    }

    #[test]
    fn depth_counts_levels() {
        let env = sample_environment();
        assert_eq!(parse(&env, "open").depth(), 1);
        assert_eq!(parse(&env, "add(open, ts_mean(close, 5))").depth(), 3);
    }
}

mod evaluation {
    use super::*;

    #[test]
    fn arithmetic_values() {
        let env = sample_environment();
        let frame = parse(&env, "add(open1, open1)").eval(&env, day(2), day(4)).unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.columns(), universe().as_slice());
        // open1 AAA on day 3 is 13
        assert_relative_eq!(frame.get(day(3), "AAA").unwrap(), 26.0);

        let scaled = parse(&env, "mul(open1, 2)").eval(&env, day(3), day(3)).unwrap();
        assert_relative_eq!(scaled.get(day(3), "AAA").unwrap(), 26.0);

        let ratio = parse(&env, "div(open1, open1)").eval(&env, day(0), day(9)).unwrap();
        assert!(ratio.rows().iter().flatten().all(|v| (*v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn cross_sectional_rank() {
        let env = sample_environment();
        let frame = parse(&env, "rank(open1)").eval(&env, day(5), day(5)).unwrap();
        assert_relative_eq!(frame.get(day(5), "AAA").unwrap(), 1.0 / 3.0);
        assert_relative_eq!(frame.get(day(5), "BBB").unwrap(), 2.0 / 3.0);
        assert_relative_eq!(frame.get(day(5), "CCC").unwrap(), 1.0);
    }

    #[test]
    fn rolling_values() {
        let env = sample_environment();
        let mean = parse(&env, "ts_mean(open1, 5)").eval(&env, day(10), day(10)).unwrap();
        assert_relative_eq!(mean.get(day(10), "AAA").unwrap(), 18.0);
        assert_relative_eq!(mean.get(day(10), "BBB").unwrap(), 26.0);

        let delta = parse(&env, "ts_delta(open1, 1)").eval(&env, day(5), day(5)).unwrap();
        assert_relative_eq!(delta.get(day(5), "CCC").unwrap(), 3.0);

        let corr = parse(&env, "ts_corr(open1, open2, 5)")
            .eval(&env, day(10), day(12))
            .unwrap();
        assert!(corr.rows().iter().flatten().all(|v| (*v - 1.0).abs() < 1e-9));
    }

    #[test]
    fn ema_seeds_from_lookback() {
        let env = sample_environment();
        let frame = parse(&env, "ema(open1, 3)").eval(&env, day(10), day(12)).unwrap();
        assert_relative_eq!(frame.get(day(10), "AAA").unwrap(), 19.0);
        assert_relative_eq!(frame.get(day(11), "AAA").unwrap(), 20.0);
        assert_relative_eq!(frame.get(day(12), "AAA").unwrap(), 21.0);
    }

    #[test]
    fn result_spans_requested_window() {
        let env = sample_environment();
        let frame = parse(&env, "ts_std(close, 10)").eval(&env, day(12), day(20)).unwrap();
        assert_eq!(frame.first_date(), Some(day(12)));
        assert_eq!(frame.last_date(), Some(day(20)));
        assert_eq!(frame.len(), 9);
    }

    #[test]
    fn fractional_window_fails_at_eval() {
        let mut env = sample_environment();
        env.constrain("ts_mean", 1, ArgConstraint::values(["5/2"])).unwrap();
        let gene = parse(&env, "ts_mean(open, 5/2)");
        assert!(gene.validate());
        assert!(matches!(
            gene.eval(&env, day(10), day(10)),
            Err(AlphaError::Eval { .. })
        ));
    }

    #[test]
    fn shared_gene_across_threads() {
        let env = sample_environment();
        let gene = parse(&env, "ts_mean(add(open, close), 5)");
        let expected = gene.eval(&env, day(10), day(15)).unwrap();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        assert!(gene.validate());
                        gene.eval(&env, day(10), day(15)).unwrap()
                    })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }
}

//! Integration tests for the analysis pipeline.
//!
//! Tests cover:
//! - Full pipeline over mock ports for one and several entities
//! - Cash reconstruction, trading-day axis snapping and benchmark overlay
//! - Failure handling for unreachable providers and unknown entities
//! - Property checks for return chaining, drawdown bounds, downsampling and
//!   cashflow neutrality

mod common;

use approx::assert_relative_eq;
use common::*;
use folioperf::cli::{run_analysis_pipeline, AnalysisRequest};
use folioperf::domain::aggregator::{Aggregator, EntityKey};
use folioperf::domain::analysis::{analyze, AnalysisSettings};
use folioperf::domain::axis::{Axis, AxisMode};
use folioperf::domain::cashflow::{external_cashflows, CashScope, CashflowKind};
use folioperf::domain::downsample::downsample;
use folioperf::domain::error::FolioError;
use folioperf::domain::metrics::max_drawdown;
use folioperf::domain::range::DisplayRange;
use folioperf::domain::twr::{chain, compute_twr, DailyReturn};
use folioperf::domain::valuation::ValuationPoint;
use std::collections::BTreeMap;

fn request() -> AnalysisRequest {
    AnalysisRequest {
        start_date: None,
        end_date: None,
        axis_mode: AxisMode::Calendar,
        cash_scope: CashScope::default(),
        benchmark_ids: Vec::new(),
        entity: None,
        settings: AnalysisSettings::default(),
    }
}

mod pipeline {
    use super::*;

    #[test]
    fn single_entity_with_external_flows() {
        let prices = MockPricePort::new()
            .with_prices("ABC", closes(date(2024, 1, 1), &[100.0, 105.0, 155.0, 138.1]));
        let book = MockBook::new()
            .with_lot("", "ABC", 4.0)
            .with_lot("", "ABC", 6.0)
            .with_flow("", flow(date(2024, 1, 3), 500.0, CashflowKind::Deposit))
            .with_flow("", flow(date(2024, 1, 4), -200.0, CashflowKind::Withdraw));

        let run = run_analysis_pipeline(&prices, &book, &book, &request()).unwrap();

        assert_eq!(run.axis.len(), 4);
        let values: Vec<f64> = run.report.valuations.iter().map(|p| p.value).collect();
        assert_relative_eq!(values[3], 1381.0, epsilon = 1e-9);
        assert_relative_eq!(run.report.stats.period_return, 0.071, epsilon = 1e-9);
        assert_relative_eq!(run.report.daily[1].r, 0.0, epsilon = 1e-12);
        assert_eq!(run.combined.entities, vec![EntityKey::Root]);
    }

    #[test]
    fn entities_are_summed_or_analyzed_alone() {
        let prices = MockPricePort::new()
            .with_prices("X", closes(date(2024, 2, 1), &[100.0, 110.0]))
            .with_prices("Y", closes(date(2024, 2, 1), &[50.0, 50.0]));
        let book = MockBook::new().with_lot("a", "X", 1.0).with_lot("b", "Y", 2.0);

        let run = run_analysis_pipeline(&prices, &book, &book, &request()).unwrap();
        assert_eq!(run.combined.entities.len(), 2);
        assert_eq!(run.combined.version, 2);
        assert_eq!(run.report.valuations[0].value, 200.0);
        assert_relative_eq!(run.report.stats.period_return, 0.05, epsilon = 1e-12);

        let only_b = AnalysisRequest {
            entity: Some(EntityKey::from_id("b")),
            ..request()
        };
        let run = run_analysis_pipeline(&prices, &book, &book, &only_b).unwrap();
        assert_eq!(run.report.valuations[1].value, 100.0);
        assert_eq!(run.report.stats.period_return, 0.0);
    }

    #[test]
    fn dividend_lands_in_cash_not_in_external_flows() {
        let prices =
            MockPricePort::new().with_prices("ABC", closes(date(2024, 3, 1), &[100.0, 100.0, 100.0]));
        let book = MockBook::new()
            .with_lot("", "ABC", 10.0)
            .with_flow("", flow(date(2024, 3, 3), 10.0, CashflowKind::Dividend))
            .with_balance("", 10.0);

        let run = run_analysis_pipeline(&prices, &book, &book, &request()).unwrap();
        let values: Vec<f64> = run.report.valuations.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1000.0, 1000.0, 1010.0]);
        assert_relative_eq!(run.report.stats.period_return, 0.01, epsilon = 1e-12);
    }

    #[test]
    fn weekend_deposit_snaps_to_next_trading_day() {
        let prices = MockPricePort::new().with_prices(
            "ABC",
            vec![
                PricePoint::new(date(2024, 6, 6), Some(100.0)),
                PricePoint::new(date(2024, 6, 7), Some(100.0)),
                PricePoint::new(date(2024, 6, 10), Some(100.0)),
            ],
        );
        let book = MockBook::new()
            .with_lot("", "ABC", 10.0)
            .with_flow("", flow(date(2024, 6, 8), 500.0, CashflowKind::Deposit))
            .with_balance("", 500.0);
        let req = AnalysisRequest {
            axis_mode: AxisMode::Trading,
            ..request()
        };

        let run = run_analysis_pipeline(&prices, &book, &book, &req).unwrap();
        assert_eq!(
            run.axis.days(),
            &[date(2024, 6, 6), date(2024, 6, 7), date(2024, 6, 10)]
        );
        let values: Vec<f64> = run.report.valuations.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1000.0, 1000.0, 1500.0]);
        assert_eq!(run.report.stats.period_return, 0.0);
    }

    #[test]
    fn benchmark_overlay_uses_carried_close() {
        let prices = MockPricePort::new()
            .with_prices("ABC", closes(date(2024, 1, 1), &[10.0, 10.0, 10.0, 10.0]))
            .with_prices(
                "IDX",
                vec![
                    PricePoint::new(date(2023, 12, 29), Some(50.0)),
                    PricePoint::new(date(2024, 1, 2), Some(55.0)),
                ],
            );
        let book = MockBook::new().with_lot("", "ABC", 1.0);
        let req = AnalysisRequest {
            benchmark_ids: vec!["IDX".to_string(), "GONE".to_string()],
            ..request()
        };
        let prices = prices.with_error("GONE", "provider down");

        let run = run_analysis_pipeline(&prices, &book, &book, &req).unwrap();
        assert_eq!(run.report.benchmarks.len(), 2);

        let idx = &run.report.benchmarks[0];
        assert_eq!(idx.series.reference_close, Some(50.0));
        let pct: Vec<Option<f64>> = idx.series.points.iter().map(|p| p.pct).collect();
        assert_eq!(pct[0], Some(0.0));
        assert_relative_eq!(pct[3].unwrap(), 10.0, epsilon = 1e-9);

        let gone = &run.report.benchmarks[1];
        assert!(gone.series.points.iter().all(|p| p.pct.is_none()));
    }

    #[test]
    fn failed_price_fetch_counts_as_empty() {
        let prices = MockPricePort::new()
            .with_prices("OK", closes(date(2024, 1, 1), &[10.0, 11.0]))
            .with_error("BAD", "timeout");
        let book = MockBook::new().with_lot("", "OK", 1.0).with_lot("", "BAD", 100.0);

        let run = run_analysis_pipeline(&prices, &book, &book, &request()).unwrap();
        let values: Vec<f64> = run.report.valuations.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![10.0, 11.0]);
    }

    #[test]
    fn no_prices_and_no_ledger_is_no_data() {
        let prices = MockPricePort::new().with_error("BAD", "timeout");
        let book = MockBook::new().with_lot("", "BAD", 1.0);
        let err = run_analysis_pipeline(&prices, &book, &book, &request()).unwrap_err();
        assert!(matches!(err, FolioError::NoData { .. }));
    }

    #[test]
    fn unknown_entity_is_no_data() {
        let prices = MockPricePort::new().with_prices("X", closes(date(2024, 1, 1), &[1.0, 2.0]));
        let book = MockBook::new().with_lot("a", "X", 1.0);
        let req = AnalysisRequest {
            entity: Some(EntityKey::from_id("zzz")),
            ..request()
        };
        let err = run_analysis_pipeline(&prices, &book, &book, &req).unwrap_err();
        assert!(matches!(err, FolioError::NoData { entity } if entity == "zzz"));
    }

    #[test]
    fn configured_range_limits_the_report() {
        let prices = MockPricePort::new().with_prices(
            "ABC",
            closes(date(2024, 1, 1), &(0..60).map(|i| 100.0 + i as f64).collect::<Vec<_>>()),
        );
        let book = MockBook::new().with_lot("", "ABC", 1.0);
        let req = AnalysisRequest {
            settings: AnalysisSettings {
                range: DisplayRange::OneMonth,
                ..AnalysisSettings::default()
            },
            ..request()
        };

        let run = run_analysis_pipeline(&prices, &book, &book, &req).unwrap();
        assert_eq!(run.axis.len(), 60);
        assert_eq!(run.report.end, Some(date(2024, 2, 29)));
        assert_eq!(run.report.start, Some(date(2024, 1, 29)));
        assert_relative_eq!(run.report.stats.period_return, 159.0 / 128.0 - 1.0, epsilon = 1e-12);
    }
}

mod aggregation {
    use super::*;

    #[test]
    fn republish_replaces_only_that_entity() {
        let axis = Axis::daily(date(2024, 1, 1), date(2024, 1, 2));
        let agg = Aggregator::new();
        agg.publish(EntityKey::from_id("a"), snapshot(&axis, &[100.0, 100.0], vec![]));
        agg.publish(EntityKey::from_id("b"), snapshot(&axis, &[50.0, 60.0], vec![]));
        let combined = agg.publish(EntityKey::from_id("a"), snapshot(&axis, &[10.0, 10.0], vec![]));

        let values: Vec<f64> = combined.valuations.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![60.0, 70.0]);
        assert_eq!(combined.version, 3);
    }

    #[test]
    fn combined_stream_nets_every_entity_deposit() {
        let axis = Axis::daily(date(2024, 1, 1), date(2024, 1, 2));
        let agg = Aggregator::new();
        agg.publish(
            EntityKey::from_id("a"),
            snapshot(
                &axis,
                &[100.0, 200.0],
                vec![flow(date(2024, 1, 2), 100.0, CashflowKind::Deposit)],
            ),
        );
        let combined = agg.publish(EntityKey::from_id("b"), snapshot(&axis, &[100.0, 110.0], vec![]));

        let snap = folioperf::domain::aggregator::EntitySnapshot {
            valuations: combined.valuations.clone(),
            cashflows: combined.cashflows.clone(),
        };
        let report = analyze(&snap, &axis, &AnalysisSettings::default(), &[]);
        assert_relative_eq!(report.stats.period_return, 0.05, epsilon = 1e-12);
    }
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn daily_from(rs: &[f64]) -> Vec<DailyReturn> {
        rs.iter()
            .enumerate()
            .map(|(i, &r)| DailyReturn {
                date: date(2020, 1, 1) + chrono::Days::new(i as u64 + 1),
                r,
            })
            .collect()
    }

    proptest! {
        #[test]
        fn chaining_splits_at_any_point(
            rs in prop::collection::vec(-0.2f64..0.2, 1..60),
            split in 0usize..60,
        ) {
            let daily = daily_from(&rs);
            let k = split.min(daily.len());
            let joined = (1.0 + chain(&daily[..k])) * (1.0 + chain(&daily[k..])) - 1.0;
            prop_assert!((joined - chain(&daily)).abs() < 1e-9);
        }

        #[test]
        fn drawdown_is_bounded(values in prop::collection::vec(0.0f64..1e6, 0..100)) {
            let axis = Axis::daily(date(2020, 1, 1), date(2020, 12, 31));
            let dd = max_drawdown(&valuations(&axis, &values));
            prop_assert!((-1.0..=0.0).contains(&dd));
        }

        #[test]
        fn downsampling_keeps_ends_and_spacing(len in 1usize..800, interval in 2i64..30) {
            let axis = Axis::daily(date(2020, 1, 1), date(2020, 1, 1) + chrono::Days::new(len as u64 - 1));
            let points: Vec<ValuationPoint> = valuations(&axis, &vec![1.0; len]);
            let kept = downsample(&points, interval);

            prop_assert_eq!(kept.first().map(|p| p.date), axis.first());
            prop_assert_eq!(kept.last().map(|p| p.date), axis.last());
            for pair in kept.windows(2).take(kept.len().saturating_sub(2)) {
                prop_assert!((pair[1].date - pair[0].date).num_days() >= interval);
            }
        }

        #[test]
        fn deposits_do_not_change_the_return(
            steps in prop::collection::vec((-0.1f64..0.1, 0.0f64..1000.0), 1..40),
        ) {
            let start = date(2021, 3, 1);
            let axis = Axis::daily(start, start + chrono::Days::new(steps.len() as u64));
            let mut values = vec![1000.0];
            let mut events = Vec::new();
            for (i, &(r, deposit)) in steps.iter().enumerate() {
                let prev = values[i];
                values.push(prev * (1.0 + r) + deposit);
                events.push(flow(axis.days()[i + 1], deposit, CashflowKind::Deposit));
            }

            let external = external_cashflows(&events, &axis);
            let twr = compute_twr(&valuations(&axis, &values), &external);
            let expected = steps.iter().fold(1.0, |acc, &(r, _)| acc * (1.0 + r)) - 1.0;
            prop_assert!((twr.cumulative_return - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn external_map_only_holds_external_kinds() {
        let axis = Axis::daily(date(2024, 1, 1), date(2024, 1, 3));
        let events = vec![
            flow(date(2024, 1, 2), 5.0, CashflowKind::Dividend),
            flow(date(2024, 1, 2), -1.0, CashflowKind::Fee),
            flow(date(2024, 1, 3), 7.0, CashflowKind::Correction),
        ];
        let map = external_cashflows(&events, &axis);
        let expected: BTreeMap<_, _> = [(date(2024, 1, 3), 7.0)].into_iter().collect();
        assert_eq!(map, expected);
    }
}

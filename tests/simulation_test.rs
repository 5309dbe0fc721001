//! End-to-end simulation runs over in-memory series.

mod common;

use common::*;
use tradepilot::adapters::memory_audit_log::MemoryAuditLog;
use tradepilot::domain::audit::{Decision, ReasonCode};
use tradepilot::domain::bar::PriceBar;
use tradepilot::domain::error::TradepilotError;
use tradepilot::domain::indicator::{calculate_rsi, calculate_sma};
use tradepilot::domain::signal::{HoldReason, SignalAction};
use tradepilot::domain::simulation::{
    generate_signals, recommend_latest, run_simulation, run_sweep, SimulationConfig,
};
use tradepilot::domain::strategy::StrategyConfig;
use tradepilot::ports::audit_port::AuditPort;

fn config(run_id: &str) -> SimulationConfig {
    SimulationConfig {
        run_id: run_id.to_string(),
        ..SimulationConfig::default()
    }
}

#[test]
fn identical_inputs_give_identical_reports() {
    let bars = bars_from_closes(&zigzag_closes(120));
    let strategy = rsi_only_strategy(4, 2, true);
    let sim = config("determinism");

    let first = run_simulation(&bars, &strategy, &sim, Some(&MomentumPredictor), None).unwrap();
    let second = run_simulation(&bars, &strategy, &sim, Some(&MomentumPredictor), None).unwrap();

    assert!(first.metrics.trade_count > 0);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn constant_prices_warm_up_then_hold() {
    let bars = constant_bars(20, 100.0);
    let strategy = StrategyConfig::builder()
        .sma_window(5)
        .rsi_window(14)
        .build()
        .unwrap();

    let sma = calculate_sma(&bars, 5);
    assert!((0..4).all(|i| sma.value_at(i).is_none()));
    assert!((4..20).all(|i| sma.value_at(i) == Some(100.0)));

    let rsi = calculate_rsi(&bars, 14);
    assert!((0..14).all(|i| rsi.value_at(i).is_none()));
    assert!((14..20).all(|i| rsi.value_at(i) == Some(100.0)));

    let report = run_simulation(&bars, &strategy, &config("flat"), None, None).unwrap();
    assert_eq!(report.audit.len(), 20);
    assert!(report.signals().all(|s| s.action == SignalAction::Hold));
    assert!(report.signals().take(14).all(|s| s.hold_reason == Some(HoldReason::Warmup)));
    assert_eq!(report.metrics.trade_count, 0);
    assert_eq!(report.cash, 10_000.0);
}

#[test]
fn empty_series_has_no_trades() {
    let strategy = fast_strategy();
    let report = run_simulation(&[], &strategy, &config("empty"), None, None).unwrap();

    assert_eq!(report.bars_processed, 0);
    assert!(report.audit.is_empty());
    assert!(report.closed_trades.is_empty());
    assert_eq!(report.metrics.trade_count, 0);
    assert_eq!(report.metrics.realized_pnl, 0.0);
    assert!(report.position.is_flat());
}

#[test]
fn every_bar_gets_exactly_one_audit_entry() {
    let bars = bars_from_closes(&zigzag_closes(60));
    let sink = MemoryAuditLog::new();
    let report = run_simulation(
        &bars,
        &rsi_only_strategy(3, 1, false),
        &config("complete"),
        None,
        Some(&sink),
    )
    .unwrap();

    let stored = sink.entries_for_run("complete").unwrap();
    assert_eq!(stored.len(), bars.len());
    assert_eq!(stored, report.audit);
    for (i, entry) in stored.iter().enumerate() {
        assert_eq!(entry.sequence, i as u64);
        assert_eq!(entry.timestamp, bars[i].timestamp);
        assert_eq!(entry.decision, Decision::Simulated);
        if entry.reason == ReasonCode::Filled {
            assert!(entry.quantity > 0);
            assert!(entry.price.is_some());
        } else {
            assert_eq!(entry.quantity, 0);
        }
    }
}

#[test]
fn reused_run_id_is_refused_before_any_write() {
    let bars = bars_from_closes(&zigzag_closes(20));
    let sink = MemoryAuditLog::new();
    let strategy = fast_strategy();
    run_simulation(&bars, &strategy, &config("again"), None, Some(&sink)).unwrap();

    let err = run_simulation(&bars, &strategy, &config("again"), None, Some(&sink)).unwrap_err();
    match err {
        TradepilotError::Configuration { field, .. } => assert_eq!(field, "run_id"),
        other => panic!("expected run_id configuration error, got {other:?}"),
    }
    assert_eq!(sink.len(), 20);

    run_simulation(&bars, &strategy, &config("again-2"), None, Some(&sink)).unwrap();
    assert_eq!(sink.len(), 40);
}

#[test]
fn failing_predictor_degrades_to_indicator_only() {
    let bars = bars_from_closes(&zigzag_closes(80));
    let strategy = rsi_only_strategy(3, 1, false);

    let with_failures = run_simulation(&bars, &strategy, &config("p"), Some(&FailingPredictor), None).unwrap();
    let without = run_simulation(&bars, &strategy, &config("p"), None, None).unwrap();

    assert!(with_failures.signals().all(|s| s.prediction.is_none()));
    assert_eq!(with_failures, without);
}

#[test]
fn broken_audit_sink_does_not_stop_simulation() {
    let bars = bars_from_closes(&zigzag_closes(30));
    let report = run_simulation(
        &bars,
        &fast_strategy(),
        &config("broken"),
        None,
        Some(&BrokenAuditLog),
    )
    .unwrap();
    assert_eq!(report.audit.len(), 30);
}

#[test]
fn predictor_only_sees_bars_up_to_the_current_one() {
    let bars = bars_from_closes(&zigzag_closes(25));
    let predictor = RecordingPredictor::default();
    run_simulation(&bars, &fast_strategy(), &config("prefix"), Some(&predictor), None).unwrap();

    let calls = predictor.calls.lock().unwrap();
    assert_eq!(calls.len(), bars.len());
    for (i, (len, last, requested)) in calls.iter().enumerate() {
        assert_eq!(*len, i + 1);
        assert_eq!(*last, bars[i].timestamp);
        assert_eq!(*requested, bars[i].timestamp);
    }
}

#[test]
fn batch_signals_and_recommendation_agree_with_simulation() {
    let bars = bars_from_closes(&zigzag_closes(90));
    let strategy = fast_strategy();

    let report = run_simulation(&bars, &strategy, &config("agree"), Some(&MomentumPredictor), None).unwrap();
    let batch = generate_signals(&bars, &strategy, Some(&MomentumPredictor)).unwrap();
    let streamed: Vec<_> = report.signals().cloned().collect();
    assert_eq!(batch, streamed);

    let latest = recommend_latest(&bars, &strategy, Some(&MomentumPredictor))
        .unwrap()
        .unwrap();
    assert_eq!(Some(&latest), batch.last());
    assert_eq!(recommend_latest(&[], &strategy, None).unwrap(), None);
}

#[test]
fn out_of_order_bars_fail_unless_tolerated() {
    let mut bars = bars_from_closes(&zigzag_closes(10));
    bars.swap(3, 4);
    let strategy = fast_strategy();

    let err = run_simulation(&bars, &strategy, &config("strict"), None, None).unwrap_err();
    assert!(matches!(err, TradepilotError::NonMonotonic { index: 4, .. }));

    let tolerant = SimulationConfig {
        tolerate_bad_bars: true,
        ..config("tolerant")
    };
    let report = run_simulation(&bars, &strategy, &tolerant, None, None).unwrap();
    assert_eq!(report.bars_processed, 9);
}

#[test]
fn malformed_bar_is_rejected() {
    let mut bars: Vec<PriceBar> = bars_from_closes(&[100.0, 101.0, 102.0]);
    bars[1].high = bars[1].low - 5.0;
    let err = run_simulation(&bars, &fast_strategy(), &config("bad"), None, None).unwrap_err();
    assert!(matches!(err, TradepilotError::Data { .. }));
}

#[test]
fn sweep_runs_are_independent_and_ordered() {
    let bars = bars_from_closes(&zigzag_closes(100));
    let strategies: Vec<StrategyConfig> = [2usize, 3, 5]
        .iter()
        .map(|&w| {
            rsi_only_strategy(3, 1, false)
                .to_builder()
                .rsi_window(w)
                .build()
                .unwrap()
        })
        .collect();

    let results = run_sweep(&bars, &strategies, &config("grid"), None);
    assert_eq!(results.len(), 3);
    for (i, (result, strategy)) in results.into_iter().zip(&strategies).enumerate() {
        let report = result.unwrap();
        assert_eq!(report.run_id, format!("grid-{i}"));
        let single = run_simulation(
            &bars,
            strategy,
            &config(&format!("grid-{i}")),
            None,
            None,
        )
        .unwrap();
        assert_eq!(report, single);
    }
}

#[test]
fn equity_curve_tracks_cash_plus_position() {
    let bars = bars_from_closes(&zigzag_closes(70));
    let report = run_simulation(&bars, &rsi_only_strategy(5, 2, true), &config("eq"), None, None).unwrap();

    assert_eq!(report.equity_curve.len(), bars.len());
    let last_close = bars[bars.len() - 1].close;
    let expected = report.cash + report.position.quantity as f64 * last_close;
    let last = report.equity_curve.last().unwrap();
    assert!((last.equity - expected).abs() < 1e-6);
    assert!((report.metrics.final_equity - expected).abs() < 1e-6);
}

//! CLI integration tests with real INI and CSV files on disk.
//!
//! Tests cover:
//! - Config validation, including error cases
//! - Backtest with a JSON report and a JSONL audit log
//! - Recommendation, sweep and audit listing

mod common;

use common::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tradepilot::adapters::file_config_adapter::FileConfigAdapter;
use tradepilot::cli;
use tradepilot::domain::error::TradepilotError;
use tradepilot::domain::simulation::SimulationReport;

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

fn price_csv(count: usize) -> String {
    let mut csv = String::from("timestamp,price\n");
    for (i, close) in zigzag_closes(count).iter().enumerate() {
        csv.push_str(&format!("{},{:.4}\n", ts(i).format("%Y-%m-%d"), close));
    }
    csv
}

fn valid_ini(audit_path: &Path) -> String {
    format!(
        "[strategy]\n\
         name = Choppy RSI\n\
         symbol = BHP\n\
         sma_window = 5\n\
         rsi_window = 3\n\
         rsi_oversold = 40\n\
         rsi_overbought = 60\n\
         enabled_indicators = rsi\n\
         max_position_size = 4\n\
         order_size = 2\n\
         \n\
         [simulation]\n\
         run_id = cli-run\n\
         initial_capital = 5000\n\
         commission_per_trade = 1.0\n\
         \n\
         [audit]\n\
         format = jsonl\n\
         path = {}\n",
        audit_path.display()
    )
}

struct Workspace {
    dir: TempDir,
    config: PathBuf,
    data: PathBuf,
    audit: PathBuf,
}

fn workspace() -> Workspace {
    let dir = TempDir::new().unwrap();
    let audit = dir.path().join("audit.jsonl");
    let config = write_file(dir.path(), "strategy.ini", &valid_ini(&audit));
    let data = write_file(dir.path(), "BHP.csv", &price_csv(80));
    Workspace {
        dir,
        config,
        data,
        audit,
    }
}

#[test]
fn validate_accepts_a_complete_config() {
    let ws = workspace();
    cli::run_validate(&ws.config).unwrap();

    let adapter = FileConfigAdapter::from_file(&ws.config).unwrap();
    let strategy = cli::build_strategy_config(&adapter).unwrap();
    assert_eq!(strategy.name(), "Choppy RSI");
    assert_eq!(strategy.symbol(), "BHP");
    assert_eq!(strategy.rsi_window(), 3);
    let sim = cli::build_simulation_config(&adapter).unwrap();
    assert_eq!(sim.run_id, "cli-run");
    assert_eq!(sim.initial_capital, 5000.0);
}

#[test]
fn validate_rejects_bad_values() {
    let dir = TempDir::new().unwrap();
    for (content, field) in [
        ("[strategy]\nrsi_oversold = 75\nrsi_overbought = 70\n", "rsi_oversold"),
        ("[strategy]\norder_size = 5\nmax_position_size = 2\n", "order_size"),
        ("[strategy]\nsma_window = 0\n", "sma_window"),
        ("[simulation]\ninitial_capital = 0\n", "initial_capital"),
    ] {
        let path = write_file(dir.path(), "bad.ini", content);
        match cli::run_validate(&path) {
            Err(TradepilotError::Configuration { field: f, .. }) => assert_eq!(f, field),
            other => panic!("expected configuration error for {field}, got {other:?}"),
        }
    }
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    assert!(cli::run_validate(&dir.path().join("absent.ini")).is_err());
}

#[test]
fn backtest_writes_report_and_audit_log() {
    let ws = workspace();
    let report_path = ws.dir.path().join("report.json");

    cli::run_backtest(&ws.config, &ws.data, None, Some(&report_path), None).unwrap();

    let report: SimulationReport =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report.run_id, "cli-run");
    assert_eq!(report.symbol, "BHP");
    assert_eq!(report.bars_processed, 80);
    assert_eq!(report.audit.len(), 80);
    assert!(report.metrics.trade_count > 0);
    assert!(report.position.quantity.abs() <= 4);

    let audit_lines = std::fs::read_to_string(&ws.audit).unwrap();
    assert_eq!(audit_lines.lines().count(), 80);
}

#[test]
fn backtest_run_id_override_and_audit_listing() {
    let ws = workspace();
    cli::run_backtest(&ws.config, &ws.data, None, None, Some("first".into())).unwrap();
    cli::run_backtest(&ws.config, &ws.data, None, None, Some("second".into())).unwrap();

    cli::run_audit(&ws.config, Some("second")).unwrap();
    cli::run_audit(&ws.config, None).unwrap();

    let adapter = FileConfigAdapter::from_file(&ws.config).unwrap();
    let sink = cli::open_audit_sink(&adapter).unwrap().unwrap();
    assert_eq!(sink.entries_for_run("first").unwrap().len(), 80);
    assert_eq!(sink.entries_for_run("second").unwrap().len(), 80);
    assert_eq!(sink.entries().unwrap().len(), 160);
}

#[test]
fn repeated_backtest_needs_a_new_run_id() {
    let ws = workspace();
    cli::run_backtest(&ws.config, &ws.data, None, None, None).unwrap();

    match cli::run_backtest(&ws.config, &ws.data, None, None, None) {
        Err(TradepilotError::Configuration { field, .. }) => assert_eq!(field, "run_id"),
        other => panic!("expected run_id configuration error, got {other:?}"),
    }
    let audit_lines = std::fs::read_to_string(&ws.audit).unwrap();
    assert_eq!(audit_lines.lines().count(), 80);

    // without a configured run id each backtest gets its own
    let unnamed = valid_ini(&ws.audit).replace("run_id = cli-run\n", "");
    let config = write_file(ws.dir.path(), "unnamed.ini", &unnamed);
    cli::run_backtest(&config, &ws.data, None, None, None).unwrap();
    cli::run_backtest(&config, &ws.data, None, None, None).unwrap();

    let adapter = FileConfigAdapter::from_file(&config).unwrap();
    let entries = cli::open_audit_sink(&adapter).unwrap().unwrap().entries().unwrap();
    assert_eq!(entries.len(), 240);
    let generated: std::collections::BTreeSet<&str> = entries
        .iter()
        .map(|e| e.run_id.as_str())
        .filter(|id| id.starts_with("backtest-"))
        .collect();
    assert_eq!(generated.len(), 2);
}

#[test]
fn backtest_with_prediction_file() {
    let ws = workspace();
    let mut csv = String::from("timestamp,value,confidence\n");
    for i in 0..80 {
        csv.push_str(&format!("{},{},0.8\n", ts(i).format("%Y-%m-%d"), if i % 2 == 0 { 0.6 } else { -0.6 }));
    }
    let predictions = write_file(ws.dir.path(), "scores.csv", &csv);
    let report_path = ws.dir.path().join("report.json");

    cli::run_backtest(&ws.config, &ws.data, Some(&predictions), Some(&report_path), None).unwrap();

    let report: SimulationReport =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert!(report.signals().all(|s| s.prediction.is_some()));
}

#[test]
fn backtest_rejects_unordered_data() {
    let ws = workspace();
    let data = write_file(
        ws.dir.path(),
        "bad.csv",
        "timestamp,price\n2024-01-02,10\n2024-01-01,11\n",
    );
    let err = cli::run_backtest(&ws.config, &data, None, None, None).unwrap_err();
    assert!(matches!(err, TradepilotError::NonMonotonic { .. }));
}

#[test]
fn recommend_on_latest_bar() {
    let ws = workspace();
    cli::run_recommend(&ws.config, &ws.data, None).unwrap();

    let empty = write_file(ws.dir.path(), "empty.csv", "timestamp,price\n");
    cli::run_recommend(&ws.config, &empty, None).unwrap();
}

#[test]
fn sweep_over_window_grid() {
    let ws = workspace();
    cli::run_sweep_command(&ws.config, &ws.data, "3,5,8", Some("2,3")).unwrap();
    cli::run_sweep_command(&ws.config, &ws.data, "10", None).unwrap();

    assert!(matches!(
        cli::run_sweep_command(&ws.config, &ws.data, "3,x", None),
        Err(TradepilotError::Configuration { .. })
    ));
    assert!(cli::run_sweep_command(&ws.config, &ws.data, "0", None).is_err());
}

#[test]
fn audit_without_sink_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = write_file(dir.path(), "plain.ini", "[strategy]\nname = plain\n");
    assert!(matches!(
        cli::run_audit(&config, None),
        Err(TradepilotError::ConfigMissing { .. })
    ));
}

#[test]
fn data_directory_resolves_symbol_file() {
    let ws = workspace();
    let report_path = ws.dir.path().join("dir-report.json");
    cli::run_backtest(&ws.config, ws.dir.path(), None, Some(&report_path), None).unwrap();

    let report: SimulationReport =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report.bars_processed, 80);
}

//! CLI definition and dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{read_series_file, CsvAdapter};
use crate::adapters::csv_prediction_adapter::CsvPredictionAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::jsonl_audit_log::JsonlAuditLog;
use crate::adapters::memory_audit_log::MemoryAuditLog;
use crate::domain::audit::unique_run_id;
use crate::domain::bar::PriceBar;
use crate::domain::error::TradepilotError;
use crate::domain::prediction::ScoreRange;
use crate::domain::simulation::{
    recommend_latest, run_simulation, run_sweep, SimulationConfig, SimulationReport,
    DEFAULT_INITIAL_CAPITAL,
};
use crate::domain::strategy::{
    parse_enabled_indicators, SmaTrigger, StrategyConfig, DEFAULT_SMA_BUY_BAND, DEFAULT_SMA_SELL_BAND,
};
use crate::ports::audit_port::AuditPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::prediction_port::PredictionPort;

#[derive(Parser, Debug)]
#[command(name = "tradepilot", about = "Indicator-driven trade recommendations and backtests")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a price series through the strategy
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// CSV price series (OHLCV or timestamp,price), or a directory of <SYMBOL>.csv
        #[arg(short, long)]
        data: PathBuf,
        /// CSV of prediction scores keyed by timestamp
        #[arg(short, long)]
        predictions: Option<PathBuf>,
        /// JSON report destination; a summary is printed when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Audit run id; overrides [simulation] run_id, defaults to backtest-<timestamp>-<n>
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Print the recommendation for the latest bar
    Recommend {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        predictions: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Backtest a grid of SMA/RSI windows in parallel
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        /// Comma-separated SMA windows, e.g. 10,20,50
        #[arg(long)]
        sma_windows: String,
        /// Comma-separated RSI windows; defaults to the configured window
        #[arg(long)]
        rsi_windows: Option<String>,
    },
    /// List recorded audit entries as JSON lines
    Audit {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        run_id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuditFormat {
    Jsonl,
    Sqlite,
    Memory,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            data,
            predictions,
            output,
            run_id,
        } => run_backtest(
            &config,
            &data,
            predictions.as_deref(),
            output.as_deref(),
            run_id,
        ),
        Command::Recommend {
            config,
            data,
            predictions,
        } => run_recommend(&config, &data, predictions.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Sweep {
            config,
            data,
            sma_windows,
            rsi_windows,
        } => run_sweep_command(&config, &data, &sma_windows, rsi_windows.as_deref()),
        Command::Audit { config, run_id } => run_audit(&config, run_id.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", error_message(&e));
            (&e).into()
        }
    }
}

/// Error line for stderr; input problems are flagged as fixable before a run.
pub fn error_message(err: &TradepilotError) -> String {
    if err.is_pre_run() {
        format!("error: {err}\nFix the configuration or input data before running.")
    } else {
        format!("error: {err}")
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TradepilotError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

fn int_field(config: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Result<i64, TradepilotError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| TradepilotError::configuration(key, format!("'{}' is not an integer", raw.trim()))),
    }
}

fn float_field(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, TradepilotError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TradepilotError::configuration(key, format!("'{}' is not a number", raw.trim()))),
    }
}

fn window_field(config: &dyn ConfigPort, key: &str, default: usize) -> Result<usize, TradepilotError> {
    let value = int_field(config, "strategy", key, default as i64)?;
    usize::try_from(value).map_err(|_| TradepilotError::configuration(key, format!("{key} must be at least 1")))
}

/// `signed`, `unit`, or an explicit `min,max` pair.
pub fn parse_score_range(value: &str) -> Result<ScoreRange, TradepilotError> {
    match value.trim().to_lowercase().as_str() {
        "signed" => Ok(ScoreRange::SIGNED),
        "unit" => Ok(ScoreRange::UNIT),
        other => {
            let bounds: Vec<&str> = other.split(',').map(str::trim).collect();
            let parse = |s: &str| {
                s.parse::<f64>().map_err(|_| {
                    TradepilotError::configuration(
                        "prediction_range",
                        format!("expected signed, unit, or min,max; got '{other}'"),
                    )
                })
            };
            match bounds.as_slice() {
                [min, max] => Ok(ScoreRange {
                    min: parse(min)?,
                    max: parse(max)?,
                }),
                _ => Err(TradepilotError::configuration(
                    "prediction_range",
                    format!("expected signed, unit, or min,max; got '{other}'"),
                )),
            }
        }
    }
}

/// Build and validate the `[strategy]` section.
pub fn build_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, TradepilotError> {
    let mut builder = StrategyConfig::builder()
        .sma_window(window_field(config, "sma_window", 20)?)
        .rsi_window(window_field(config, "rsi_window", 14)?)
        .rsi_thresholds(
            float_field(config, "strategy", "rsi_oversold")?.unwrap_or(30.0),
            float_field(config, "strategy", "rsi_overbought")?.unwrap_or(70.0),
        )
        .sma_bands(
            float_field(config, "strategy", "sma_buy_band")?.unwrap_or(DEFAULT_SMA_BUY_BAND),
            float_field(config, "strategy", "sma_sell_band")?.unwrap_or(DEFAULT_SMA_SELL_BAND),
        )
        .min_prediction_confidence(float_field(config, "strategy", "min_prediction_confidence")?)
        .max_position_size(int_field(config, "strategy", "max_position_size", 1)?)
        .order_size(int_field(config, "strategy", "order_size", 1)?)
        .allow_shorting(config.get_bool("strategy", "allow_shorting", false));

    if let Some(name) = config.get_string("strategy", "name") {
        builder = builder.name(name);
    }
    if let Some(symbol) = config.get_string("strategy", "symbol") {
        builder = builder.symbol(symbol);
    }
    if let Some(trigger) = config.get_string("strategy", "sma_trigger") {
        builder = builder.sma_trigger(trigger.parse::<SmaTrigger>()?);
    }
    if let Some(range) = config.get_string("strategy", "prediction_range") {
        builder = builder.prediction_range(parse_score_range(&range)?);
    }
    if let Some(enabled) = config.get_string("strategy", "enabled_indicators") {
        builder = builder.enabled_indicators(parse_enabled_indicators(&enabled)?);
    }
    builder.build()
}

/// Build and validate the `[simulation]` section.
///
/// Without a configured `run_id` every call gets a fresh one, so repeated
/// runs against the same audit sink do not collide.
pub fn build_simulation_config(config: &dyn ConfigPort) -> Result<SimulationConfig, TradepilotError> {
    let sim = SimulationConfig {
        run_id: config
            .get_string("simulation", "run_id")
            .unwrap_or_else(|| unique_run_id("backtest")),
        initial_capital: float_field(config, "simulation", "initial_capital")?
            .unwrap_or(DEFAULT_INITIAL_CAPITAL),
        commission_per_trade: float_field(config, "simulation", "commission_per_trade")?.unwrap_or(0.0),
        commission_pct: float_field(config, "simulation", "commission_pct")?.unwrap_or(0.0),
        slippage_pct: float_field(config, "simulation", "slippage_pct")?.unwrap_or(0.0),
        tolerate_bad_bars: config.get_bool("simulation", "tolerate_bad_bars", false),
    };
    sim.validate()?;
    Ok(sim)
}

/// Open the audit sink named by `[audit]`, if any.
pub fn open_audit_sink(config: &dyn ConfigPort) -> Result<Option<Box<dyn AuditPort>>, TradepilotError> {
    let format = match config.get_string("audit", "format") {
        None => None,
        Some(f) => Some(AuditFormat::from_str(f.trim(), true).map_err(|_| {
            TradepilotError::configuration("format", format!("unknown audit format '{}'", f.trim()))
        })?),
    };
    let path = config.get_string("audit", "path");

    match (format, path) {
        (Some(AuditFormat::Memory), _) => Ok(Some(Box::new(MemoryAuditLog::new()))),
        (None, None) => Ok(None),
        (Some(_), None) => Err(TradepilotError::ConfigMissing {
            section: "audit".into(),
            key: "path".into(),
        }),
        (Some(AuditFormat::Jsonl) | None, Some(path)) => Ok(Some(Box::new(JsonlAuditLog::open(path)?))),
        (Some(AuditFormat::Sqlite), Some(_)) => open_sqlite_sink(config),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite_sink(config: &dyn ConfigPort) -> Result<Option<Box<dyn AuditPort>>, TradepilotError> {
    use crate::adapters::sqlite_audit_log::SqliteAuditLog;
    Ok(Some(Box::new(SqliteAuditLog::from_config(config)?)))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite_sink(_config: &dyn ConfigPort) -> Result<Option<Box<dyn AuditPort>>, TradepilotError> {
    Err(TradepilotError::configuration(
        "format",
        "sqlite feature is required for the sqlite audit format",
    ))
}

/// Read a series from a CSV file, or `<SYMBOL>.csv` when `path` is a directory.
fn load_series(path: &Path, symbol: &str) -> Result<Vec<PriceBar>, TradepilotError> {
    eprintln!("Loading price series from {}", path.display());
    let bars = if path.is_dir() {
        CsvAdapter::new(path.to_path_buf()).fetch_series(symbol)?
    } else {
        read_series_file(path)?
    };
    eprintln!("  {} bars", bars.len());
    Ok(bars)
}

fn load_predictor(
    path: Option<&Path>,
    strategy: &StrategyConfig,
) -> Result<Option<CsvPredictionAdapter>, TradepilotError> {
    let Some(path) = path else {
        return Ok(None);
    };
    eprintln!("Loading predictions from {}", path.display());
    let adapter = CsvPredictionAdapter::from_file(path, strategy.prediction_range())?;
    eprintln!("  {} scores", adapter.len());
    Ok(Some(adapter))
}

fn print_summary(report: &SimulationReport) {
    let m = &report.metrics;
    eprintln!("\nRun {} ({} on {})", report.run_id, report.strategy, report.symbol);
    eprintln!("  Bars processed:   {}", report.bars_processed);
    eprintln!("  Fills:            {}", m.trade_count);
    eprintln!("  Closed trades:    {}", m.closed_trades);
    eprintln!("  Win rate:         {:.1}%", m.win_rate * 100.0);
    eprintln!("  Total return:     {:.2}%", m.total_return * 100.0);
    eprintln!("  Max drawdown:     {:.2}%", m.max_drawdown * 100.0);
    eprintln!("  Realized P&L:     {:.2}", m.realized_pnl);
    eprintln!("  Commissions:      {:.2}", m.commissions_paid);
    eprintln!("  Final equity:     {:.2}", m.final_equity);
    eprintln!("  Final position:   {}", report.position.quantity);
    if let Some(last) = report.audit.last() {
        let mark = last.signal.indicators.close;
        eprintln!("  Exposure:         {:.2}", report.position.market_value(mark));
        eprintln!("  Unrealized P&L:   {:.2}", report.position.unrealized_pnl(mark));
    }
}

pub fn run_backtest(
    config_path: &Path,
    data_path: &Path,
    predictions_path: Option<&Path>,
    output_path: Option<&Path>,
    run_id: Option<String>,
) -> Result<(), TradepilotError> {
    let adapter = load_config(config_path)?;
    let strategy = build_strategy_config(&adapter)?;
    let mut sim = build_simulation_config(&adapter)?;
    if let Some(id) = run_id {
        sim.run_id = id;
        sim.validate()?;
    }
    eprintln!("Loading strategy: {}", strategy.name());

    let bars = load_series(data_path, strategy.symbol())?;
    let predictor = load_predictor(predictions_path, &strategy)?;
    let audit = open_audit_sink(&adapter)?;

    let report = run_simulation(
        &bars,
        &strategy,
        &sim,
        predictor.as_ref().map(|p| p as &dyn PredictionPort),
        audit.as_deref(),
    )?;

    print_summary(&report);
    if let Some(output) = output_path {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| TradepilotError::data(format!("cannot serialize report: {e}")))?;
        fs::write(output, json)?;
        eprintln!("\nReport written to: {}", output.display());
    }
    Ok(())
}

pub fn run_recommend(
    config_path: &Path,
    data_path: &Path,
    predictions_path: Option<&Path>,
) -> Result<(), TradepilotError> {
    let adapter = load_config(config_path)?;
    let strategy = build_strategy_config(&adapter)?;
    let bars = load_series(data_path, strategy.symbol())?;
    let predictor = load_predictor(predictions_path, &strategy)?;

    let signal = recommend_latest(
        &bars,
        &strategy,
        predictor.as_ref().map(|p| p as &dyn PredictionPort),
    )?;
    match signal {
        Some(signal) => {
            let json = serde_json::to_string(&signal)
                .map_err(|e| TradepilotError::data(format!("cannot serialize signal: {e}")))?;
            println!("{json}");
            match signal.hold_reason {
                Some(reason) => eprintln!("{} {} ({})", strategy.symbol(), signal.action, reason),
                None => eprintln!("{} {}", strategy.symbol(), signal.action),
            }
        }
        None => eprintln!("No bars; nothing to recommend."),
    }
    Ok(())
}

pub fn run_validate(config_path: &Path) -> Result<(), TradepilotError> {
    let adapter = load_config(config_path)?;
    let strategy = build_strategy_config(&adapter)?;
    let sim = build_simulation_config(&adapter)?;

    eprintln!("\nStrategy: {} ({})", strategy.name(), strategy.symbol());
    eprintln!("  SMA window:        {} ({:?})", strategy.sma_window(), strategy.sma_trigger());
    if strategy.sma_trigger() == SmaTrigger::Band {
        eprintln!(
            "  SMA band:          -{}% / +{}%",
            strategy.sma_buy_band() * 100.0,
            strategy.sma_sell_band() * 100.0
        );
    }
    eprintln!("  RSI window:        {}", strategy.rsi_window());
    eprintln!(
        "  RSI thresholds:    {} / {}",
        strategy.rsi_oversold(),
        strategy.rsi_overbought()
    );
    let enabled: Vec<String> = strategy
        .enabled_indicators()
        .iter()
        .map(|f| f.to_string())
        .collect();
    eprintln!("  Indicators:        {}", enabled.join(", "));
    eprintln!(
        "  Position limits:   order {} / max {}{}",
        strategy.order_size(),
        strategy.max_position_size(),
        if strategy.allow_shorting() { ", shorting allowed" } else { "" }
    );
    if let Some(threshold) = strategy.min_prediction_confidence() {
        eprintln!("  Min confidence:    {threshold}");
    }
    eprintln!("Simulation: run {} with capital {:.2}", sim.run_id, sim.initial_capital);

    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn parse_windows(value: &str, field: &str) -> Result<Vec<usize>, TradepilotError> {
    let windows = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| TradepilotError::configuration(field, format!("'{s}' is not a window length")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if windows.is_empty() {
        return Err(TradepilotError::configuration(field, "at least one window is required"));
    }
    Ok(windows)
}

pub fn run_sweep_command(
    config_path: &Path,
    data_path: &Path,
    sma_windows: &str,
    rsi_windows: Option<&str>,
) -> Result<(), TradepilotError> {
    let adapter = load_config(config_path)?;
    let base = build_strategy_config(&adapter)?;
    let sim = build_simulation_config(&adapter)?;
    let bars = load_series(data_path, base.symbol())?;

    let sma = parse_windows(sma_windows, "sma_window")?;
    let rsi = match rsi_windows {
        Some(v) => parse_windows(v, "rsi_window")?,
        None => vec![base.rsi_window()],
    };

    let mut strategies = Vec::with_capacity(sma.len() * rsi.len());
    for &s in &sma {
        for &r in &rsi {
            strategies.push(
                base.to_builder()
                    .name(format!("{} sma{} rsi{}", base.name(), s, r))
                    .sma_window(s)
                    .rsi_window(r)
                    .build()?,
            );
        }
    }
    eprintln!("Sweeping {} parameter sets...", strategies.len());

    let results = run_sweep(&bars, &strategies, &sim, None);
    eprintln!("\n{:<8} {:<8} {:>8} {:>10} {:>10}", "SMA", "RSI", "Fills", "Return", "MaxDD");
    for (strategy, result) in strategies.iter().zip(results) {
        let report = result?;
        eprintln!(
            "{:<8} {:<8} {:>8} {:>9.2}% {:>9.2}%",
            strategy.sma_window(),
            strategy.rsi_window(),
            report.metrics.trade_count,
            report.metrics.total_return * 100.0,
            report.metrics.max_drawdown * 100.0
        );
    }
    Ok(())
}

pub fn run_audit(config_path: &Path, run_id: Option<&str>) -> Result<(), TradepilotError> {
    let adapter = load_config(config_path)?;
    let Some(sink) = open_audit_sink(&adapter)? else {
        return Err(TradepilotError::ConfigMissing {
            section: "audit".into(),
            key: "path".into(),
        });
    };
    let entries = match run_id {
        Some(id) => sink.entries_for_run(id)?,
        None => sink.entries()?,
    };
    for entry in &entries {
        let line = serde_json::to_string(entry)
            .map_err(|e| TradepilotError::data(format!("cannot serialize entry: {e}")))?;
        println!("{line}");
    }
    eprintln!("{} entries", entries.len());
    Ok(())
}

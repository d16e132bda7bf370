//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_export_adapter::CsvExportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::aggregator::{Aggregator, Combined, EntityKey, EntitySnapshot};
use crate::domain::analysis::{analyze, build_snapshot, AnalysisReport, AnalysisSettings, EntityInputs};
use crate::domain::axis::{Axis, AxisMode};
use crate::domain::cashflow::CashScope;
use crate::domain::config_validation::{parse_optional_date, validate_analysis_config};
use crate::domain::downsample::DownsamplePolicy;
use crate::domain::error::FolioError;
use crate::domain::position::aggregate_lots;
use crate::domain::price::PricePoint;
use crate::domain::range::DisplayRange;
use crate::domain::valuation::InstrumentSeries;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{HoldingsPort, LedgerPort, PricePort, RiskFreeRatePort};
use crate::ports::export_port::ExportPort;

#[derive(Parser, Debug)]
#[command(name = "folioperf", about = "Portfolio performance analytics")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute returns and statistics
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        /// 1m, 3m, 6m, ytd, 1y, 3y, 5y or all
        #[arg(short, long)]
        range: Option<String>,
        /// Analyze one entity instead of the combined portfolio
        #[arg(short, long)]
        entity: Option<String>,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Export the downsampled display series
        #[arg(long)]
        display: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List entities found in holdings and ledger
    Entities {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Analyze {
            config,
            range,
            entity,
            output_dir,
            display,
        } => run_analyze(
            &config,
            range.as_deref(),
            entity.as_deref(),
            output_dir.as_ref(),
            display,
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Entities { config } => run_entities(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = FolioError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Everything the pipeline needs besides the data ports.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub axis_mode: AxisMode,
    pub cash_scope: CashScope,
    pub benchmark_ids: Vec<String>,
    pub entity: Option<EntityKey>,
    pub settings: AnalysisSettings,
}

#[derive(Debug)]
pub struct AnalysisRun {
    pub axis: Axis,
    pub combined: Arc<Combined>,
    pub report: AnalysisReport,
}

fn parse_choice<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<T, FolioError>
where
    T: std::str::FromStr + Default,
    T::Err: std::fmt::Display,
{
    match config.get_string(section, key) {
        None => Ok(T::default()),
        Some(s) => s.parse().map_err(|e: T::Err| FolioError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

pub fn build_settings(
    config: &dyn ConfigPort,
    risk_free: &dyn RiskFreeRatePort,
    range_override: Option<&str>,
) -> Result<AnalysisSettings, FolioError> {
    let range = match range_override {
        Some(r) => r.parse::<DisplayRange>().map_err(|e| FolioError::ConfigInvalid {
            section: "analysis".into(),
            key: "range".into(),
            reason: e.to_string(),
        })?,
        None => parse_choice(config, "analysis", "range")?,
    };
    let defaults = DownsamplePolicy::default();
    Ok(AnalysisSettings {
        range,
        risk_free: risk_free.risk_free_rate()?,
        downsample: DownsamplePolicy {
            threshold_days: config.get_int("display", "downsample_threshold_days", defaults.threshold_days),
            interval_days: config.get_int("display", "downsample_interval_days", defaults.interval_days),
        },
    })
}

pub fn build_request(
    config: &FileConfigAdapter,
    range_override: Option<&str>,
    entity: Option<&str>,
) -> Result<AnalysisRequest, FolioError> {
    Ok(AnalysisRequest {
        start_date: parse_optional_date(config, "start_date")?,
        end_date: parse_optional_date(config, "end_date")?,
        axis_mode: parse_choice(config, "analysis", "axis")?,
        cash_scope: parse_choice(config, "analysis", "cash_scope")?,
        benchmark_ids: config.get_list("benchmark", "ids"),
        entity: entity.map(EntityKey::from_id),
        settings: build_settings(config, config, range_override)?,
    })
}

/// Export target and series choice. Flags win over `[output] dir` and
/// `[output] display`; no directory means nothing is exported.
pub fn export_target(
    config: &dyn ConfigPort,
    output_dir: Option<&PathBuf>,
    display: bool,
) -> Option<(PathBuf, bool)> {
    let dir = output_dir
        .cloned()
        .or_else(|| config.get_string("output", "dir").map(PathBuf::from))?;
    Some((dir, display || config.get_bool("output", "display", false)))
}

fn fetch_or_empty(prices: &dyn PricePort, id: &str, start: NaiveDate, end: NaiveDate) -> Vec<PricePoint> {
    match prices.fetch_history(id, start, end) {
        Ok(history) => history,
        Err(e) => {
            tracing::warn!(instrument = id, error = %e, "price fetch failed, treating as empty");
            eprintln!("warning: no prices for {} ({})", id, e);
            Vec::new()
        }
    }
}

/// Axis bounds: configured dates win, otherwise the span of observed prices
/// and ledger entries.
fn resolve_bounds(
    request: &AnalysisRequest,
    histories: &BTreeMap<String, Vec<PricePoint>>,
    ledger_days: &BTreeSet<NaiveDate>,
) -> Option<(NaiveDate, NaiveDate)> {
    let observed: BTreeSet<NaiveDate> = histories
        .values()
        .flatten()
        .filter(|p| p.observed().is_some())
        .map(|p| p.date)
        .collect();

    let start = request.start_date.or_else(|| {
        let first_price = observed.first().copied();
        let first_flow = ledger_days.first().copied();
        match (first_price, first_flow) {
            (Some(p), Some(f)) => Some(p.min(f)),
            (p, f) => p.or(f),
        }
    })?;
    let end = request.end_date.or_else(|| observed.last().copied())?;
    (start <= end).then_some((start, end))
}

pub fn run_analysis_pipeline(
    prices: &dyn PricePort,
    holdings: &dyn HoldingsPort,
    ledger: &dyn LedgerPort,
    request: &AnalysisRequest,
) -> Result<AnalysisRun, FolioError> {
    let entities = holdings.entities()?;
    if let Some(target) = &request.entity {
        if !entities.contains(target) {
            return Err(FolioError::NoData {
                entity: target.to_string(),
            });
        }
    }
    let no_data = || FolioError::NoData {
        entity: request
            .entity
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "(all)".to_string()),
    };

    // Stage 1: holdings and ledger per entity
    let mut quantities: BTreeMap<EntityKey, BTreeMap<String, f64>> = BTreeMap::new();
    let mut cashflows = BTreeMap::new();
    let mut ledger_days = BTreeSet::new();
    for key in &entities {
        let lots = holdings.positions(key)?;
        quantities.insert(key.clone(), aggregate_lots(&lots));
        let events = ledger.cashflows(key)?;
        ledger_days.extend(events.iter().map(|e| e.date));
        cashflows.insert(key.clone(), events);
    }

    // Stage 2: price histories, fetched once per instrument
    let fetch_start = request.start_date.unwrap_or(NaiveDate::MIN);
    let fetch_end = request.end_date.unwrap_or(NaiveDate::MAX);
    let ids: BTreeSet<&String> = quantities.values().flat_map(|q| q.keys()).collect();
    let histories: BTreeMap<String, Vec<PricePoint>> = ids
        .into_iter()
        .map(|id| (id.clone(), fetch_or_empty(prices, id, fetch_start, fetch_end)))
        .collect();

    // Stage 3: axis
    let (start, end) = resolve_bounds(request, &histories, &ledger_days).ok_or_else(no_data)?;
    let axis = match request.axis_mode {
        AxisMode::Calendar => Axis::daily(start, end),
        AxisMode::Trading => Axis::trading_days(histories.values().map(|h| h.as_slice()), start, end),
    };
    if axis.is_empty() {
        return Err(no_data());
    }
    tracing::info!(start = %start, end = %end, days = axis.len(), mode = ?request.axis_mode, "axis built");

    // Stage 4: per-entity snapshots into the aggregator
    let aggregator = Aggregator::new();
    let mut combined = aggregator.current();
    for key in &entities {
        let instruments = quantities[key]
            .iter()
            .map(|(id, &quantity)| {
                let history = histories.get(id).cloned().unwrap_or_default();
                (id.clone(), InstrumentSeries { history, quantity })
            })
            .collect();
        let inputs = EntityInputs {
            instruments,
            cashflows: cashflows.remove(key).unwrap_or_default(),
            cash_end_balance: holdings.cash_balance(key)?,
        };
        combined = aggregator.publish(key.clone(), build_snapshot(&inputs, &axis, request.cash_scope));
    }

    let snapshot = match &request.entity {
        Some(key) => aggregator.snapshot_of(key).ok_or_else(no_data)?,
        None => EntitySnapshot {
            valuations: combined.valuations.clone(),
            cashflows: combined.cashflows.clone(),
        },
    };

    // Stage 5: benchmarks and analysis
    let benchmarks: Vec<(String, Vec<PricePoint>)> = request
        .benchmark_ids
        .iter()
        .map(|id| (id.clone(), fetch_or_empty(prices, id, NaiveDate::MIN, end)))
        .collect();

    let report = analyze(&snapshot, &axis, &request.settings, &benchmarks);
    Ok(AnalysisRun {
        axis,
        combined,
        report,
    })
}

pub fn print_summary(run: &AnalysisRun) {
    let report = &run.report;
    let stats = &report.stats;
    let span = match (report.start, report.end) {
        (Some(s), Some(e)) => format!("{} to {}", s, e),
        _ => "(empty)".to_string(),
    };

    eprintln!("\n=== Performance ({}) ===", report.range);
    eprintln!("Period:           {}", span);
    eprintln!("Entities:         {}", run.combined.entities.len());
    eprintln!("Period Return:    {:.2}%", stats.period_return * 100.0);
    eprintln!("CAGR:             {:.2}%", stats.cagr * 100.0);
    eprintln!("Volatility:       {:.2}%", stats.volatility_annualized * 100.0);
    match stats.sharpe {
        Some(s) => eprintln!("Sharpe Ratio:     {:.2}", s),
        None => eprintln!("Sharpe Ratio:     n/a"),
    }
    eprintln!("Max Drawdown:     {:.1}%", stats.max_drawdown * 100.0);
    eprintln!("Win Rate:         {:.1}%", stats.win_rate * 100.0);
    eprintln!(
        "Months +/-:       {} / {}",
        stats.months_positive, stats.months_negative
    );

    if !report.benchmarks.is_empty() {
        eprintln!("\n=== Benchmarks ===");
        for b in &report.benchmarks {
            let last = b.series.points.last().and_then(|p| p.pct);
            match last {
                Some(pct) => eprintln!("  {}:  {:+.2}%, CAGR {:.2}%", b.id, pct, b.cagr * 100.0),
                None => eprintln!("  {}:  no data in range", b.id),
            }
        }
    }
}

fn run_analyze(
    config_path: &PathBuf,
    range: Option<&str>,
    entity: Option<&str>,
    output_dir: Option<&PathBuf>,
    display: bool,
) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_analysis_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let request = match build_request(&adapter, range, entity) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let data = match CsvAdapter::from_config(&adapter) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 2: Run the pipeline
    let run = match run_analysis_pipeline(&data, &data, &data, &request) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    print_summary(&run);

    // Stage 3: Export
    if let Some((dir, display)) = export_target(&adapter, output_dir, display) {
        let exporter = CsvExportAdapter::new(dir.clone()).with_display(display);
        if let Err(e) = exporter.write_report(&run.report) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("\nSeries written to: {}", dir.display());
    }

    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_analysis_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    match build_request(&adapter, None, None) {
        Ok(request) => {
            eprintln!("  Range:      {}", request.settings.range);
            eprintln!("  Axis:       {:?}", request.axis_mode);
            eprintln!("  Cash scope: {:?}", request.cash_scope);
            eprintln!("  Benchmarks: {}", request.benchmark_ids.join(", "));
        }
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_entities(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let data = match CsvAdapter::from_config(&adapter) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    match data.entities() {
        Ok(entities) => {
            for entity in entities {
                println!("{}", entity);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

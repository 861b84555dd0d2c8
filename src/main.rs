//! candlebt CLI - hammer backtest and indicator scan commands.
//!
//! Commands:
//! - `backtest` - detect hammers, attribute next-bar P&L, print metrics, write the augmented CSV
//! - `scan` - ATR / SMA / RSI / 52-week snapshot across a basket of symbols

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

use candlebt::config::Config;
use candlebt::engine::EngineBuilder;
use candlebt::indicators::{scan_basket, table_header, write_snapshots_csv};
use candlebt::metrics::TimedReport;
use candlebt::report::{augment, write_csv, CurveSet};
use candlebt::returns::{NonFinitePolicy, ReturnKind};
use candlebt::source::{CsvDirSource, SeriesSource};

#[derive(Parser)]
#[command(
    name = "candlebt",
    about = "Hammer pattern backtest against buy-and-hold, plus indicator snapshots"
)]
struct Cli {
    /// TOML config file. Flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of {SYMBOL}.csv history files.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest the hammer signal on one symbol.
    Backtest {
        #[arg(long)]
        symbol: Option<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Augmented CSV output path.
        #[arg(long)]
        output: Option<PathBuf>,

        /// skip | propagate
        #[arg(long)]
        non_finite: Option<NonFinitePolicy>,

        /// Print metrics as JSON instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Indicator snapshot across a basket.
    Scan {
        /// Symbols to scan. Defaults to the configured basket.
        symbols: Vec<String>,

        /// Optional CSV output path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|err| anyhow!("failed to initialize tracing: {err}"))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    Config::from_file(path)
        .with_context(|| format!("failed to load config {}", path.display()))
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    if let Some(dir) = cli.data_dir {
        config.data.dir = dir;
    }

    match cli.command {
        Commands::Backtest {
            symbol,
            start,
            end,
            output,
            non_finite,
            json,
        } => {
            let bt = &mut config.backtest;
            if let Some(symbol) = symbol {
                bt.symbol = symbol;
            }
            if let Some(start) = start {
                bt.start = parse_date(&start)?;
            }
            if let Some(end) = end {
                bt.end = parse_date(&end)?;
            }
            if let Some(output) = output {
                bt.output = output;
            }
            if let Some(policy) = non_finite {
                bt.non_finite = policy;
            }
            config.validate()?;
            run_backtest(&config, json)
        }
        Commands::Scan { symbols, output } => {
            if !symbols.is_empty() {
                config.scan.symbols = symbols;
            }
            if output.is_some() {
                config.scan.output = output;
            }
            config.validate()?;
            run_scan(&config)
        }
    }
}

fn run_backtest(config: &Config, json: bool) -> Result<()> {
    let started = Instant::now();
    let bt = &config.backtest;
    let source = CsvDirSource::new(&config.data.dir);

    info!(
        symbol = %bt.symbol,
        start = %bt.start,
        end = %bt.end,
        source = source.name(),
        "fetching series"
    );
    let series = source
        .fetch(&bt.symbol, bt.start, bt.end)
        .with_context(|| format!("failed to load {}", bt.symbol))?;
    info!(
        bars = series.len(),
        first = ?series.first_date(),
        last = ?series.last_date(),
        "series loaded"
    );

    let engine = EngineBuilder::new()
        .non_finite(bt.non_finite)
        .validate_data(bt.validate_data)
        .build()?;
    let run = engine.run(series.bars())?;
    let rows = augment(&series, &run)?;
    let report = TimedReport::new(run.metrics, started.elapsed());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    let curves = CurveSet::from_rows(series.symbol(), &rows);
    info!(
        title = %curves.title(),
        bars = rows.len(),
        signals = run.signal.fired_count(),
        overnight = run.curves.last(ReturnKind::Overnight),
        passive = run.curves.last(ReturnKind::Passive),
        "curves ready"
    );

    write_csv(&bt.output, &rows)
        .with_context(|| format!("failed to write {}", bt.output.display()))?;
    Ok(())
}

fn run_scan(config: &Config) -> Result<()> {
    let source = CsvDirSource::new(&config.data.dir);
    let end = Local::now().date_naive();
    let days = config.scan.window_days;
    let Some(start) = end.checked_sub_days(Days::new(u64::from(days))) else {
        bail!("scan window of {days} days is out of range");
    };

    let (snapshots, errors) = scan_basket(&source, config.scan.symbols.clone(), start, end);

    println!("{}", table_header());
    for snapshot in &snapshots {
        println!("{snapshot}");
    }
    for e in &errors {
        eprintln!("{}: {}", e.symbol, e.error);
    }

    if let Some(path) = &config.scan.output {
        write_snapshots_csv(path, &snapshots)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote snapshots");
    }

    if snapshots.is_empty() && !errors.is_empty() {
        bail!("every symbol failed to scan");
    }
    Ok(())
}

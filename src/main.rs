use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use evtop::event::{Event, ThreadRegistry};
use evtop::fields::registry::{ExprFilterCompiler, FieldRegistry};
use evtop::{Providers, Table, ViewConfig};

/// Streaming aggregation tables over a JSON-lines event stream.
#[derive(Parser)]
#[command(name = "evtop", about)]
struct Cli {
    /// Path to the YAML view description.
    #[arg(short, long)]
    view: Option<PathBuf>,

    /// JSON-lines event input; "-" or absent reads stdin.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = &cli.command {
        println!("evtop {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;
    fmt().with_env_filter(filter).with_target(true).init();

    let view_path = cli.view.context("--view is required (use --help for usage)")?;
    let cfg = ViewConfig::load(&view_path)
        .with_context(|| format!("loading view from {}", view_path.display()))?;

    let reader: Box<dyn BufRead> = match cli.input {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(&path)
                .with_context(|| format!("opening event input {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        _ => Box::new(BufReader::new(std::io::stdin())),
    };

    run(cfg, reader)
}

fn run(cfg: ViewConfig, reader: Box<dyn BufRead>) -> Result<()> {
    let threads = Arc::new(ThreadRegistry::new());

    let providers = Providers {
        fields: Arc::new(FieldRegistry::new()),
        filters: Arc::new(ExprFilterCompiler::new()),
        threads: Arc::clone(&threads) as Arc<dyn evtop::event::ThreadProvider>,
    };

    let mut table = Table::new(providers, cfg.mode, cfg.refresh_interval_ns(), cfg.output);
    table
        .configure(&cfg.columns, &cfg.filter, cfg.use_defaults, cfg.view_depth)
        .context("configuring table")?;
    table.set_json_rows(cfg.json_first_row, cfg.json_last_row);

    tracing::info!(
        view = %cfg.name,
        mode = ?cfg.mode,
        output = ?cfg.output,
        "starting evtop",
    );

    let mut last_ts = 0u64;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.context("reading event input")?;
        if line.trim().is_empty() {
            continue;
        }

        let evt: Event = match serde_json::from_str(&line) {
            Ok(evt) => evt,
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "skipping malformed event");
                continue;
            }
        };

        // The source owns the thread table; keep it current as events
        // carry fresh thread info.
        if let Some(tinfo) = &evt.thread {
            threads.upsert(tinfo.clone());
        }

        if evt.ts >= table.next_flush_time_ns() {
            table.flush(&evt);
            if table.prev_flush_time_ns() != 0 {
                table
                    .get_sample(table.refresh_interval_ns())
                    .context("emitting sample")?;
            }
        }

        table.process_event(&evt);
        last_ts = evt.ts;
    }

    // Emit whatever accumulated after the last boundary.
    if last_ts != 0 {
        let closing = Event {
            ts: table.next_flush_time_ns().max(last_ts),
            ..Default::default()
        };
        table.flush(&closing);
        if table.prev_flush_time_ns() != 0 {
            table
                .get_sample(table.refresh_interval_ns())
                .context("emitting final sample")?;
        }
    }

    Ok(())
}

//! MCP Status CLI
//!
//! Feeds proxy progress events into a file-backed metrics store and prints
//! the history, summary and dashboard views.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info, warn};

use mcp_metrics::config::{load_environment, MetricsConfig};
use mcp_metrics::views::{ChangeFlag, DashboardView, HistoryView, MetricsSummaryView};
use mcp_metrics::{EventLog, ExportOutcome, JsonFileStore, MetricsStore, ProgressEvent, ProgressIngestor};

#[derive(Parser, Debug)]
#[command(name = "mcp-status")]
#[command(about = "Tool execution metrics for MCP servers")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the persisted history
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Completed executions kept in history
    #[arg(long, global = true)]
    history_limit: Option<usize>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest JSON-lines progress events from a file or stdin
    Ingest {
        /// Events file; reads stdin when omitted
        file: Option<PathBuf>,

        /// Export the session event log into this workspace directory
        #[arg(long)]
        export: Option<PathBuf>,

        /// Print prometheus counters for the session afterwards
        #[arg(long)]
        prometheus: bool,
    },

    /// List recent executions
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show aggregate counters
    Summary,

    /// Show the dashboard
    Dashboard {
        /// Print the webview JSON payload instead of text
        #[arg(long)]
        json: bool,
    },

    /// Drop all recorded executions
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_environment();

    let args = Args::parse();
    init_tracing(args.verbose)?;

    let mut config = MetricsConfig::from_env();
    if let Some(dir) = &args.state_dir {
        config = config.with_state_dir(dir);
    }
    if let Some(limit) = args.history_limit {
        config = config.with_history_limit(limit)?;
    }

    let backend = JsonFileStore::open(&config.state_dir)
        .with_context(|| format!("Failed to open state directory {}", config.state_dir.display()))?;
    let mut store = MetricsStore::with_config(Arc::new(backend), &config)?;
    debug!(state_dir = %config.state_dir.display(), "Opened metrics store");

    match args.command {
        Commands::Ingest {
            file,
            export,
            prometheus,
        } => {
            let log = match file {
                Some(path) => {
                    let file = tokio::fs::File::open(&path)
                        .await
                        .with_context(|| format!("Failed to open {}", path.display()))?;
                    ingest(&mut store, file).await?
                }
                None => ingest(&mut store, tokio::io::stdin()).await?,
            };

            if let Some(workspace) = export {
                match log.export(Some(workspace.as_path())) {
                    Ok(outcome @ ExportOutcome::Written(_)) => println!("{}", outcome.message()),
                    Ok(outcome) => eprintln!("{}", outcome.message()),
                    Err(e) => eprintln!("Failed to export execution log: {}", e),
                }
            }
            if prometheus {
                print!("{}", store.render_prometheus()?);
            }
        }
        Commands::History { limit } => {
            for item in HistoryView::new(limit).render(&store) {
                println!("{:<10} {:<28} {}", item.icon, item.label, item.description);
            }
        }
        Commands::Summary => {
            for line in MetricsSummaryView::new().render(&store) {
                println!("{:<18} {}", line.label, line.value);
            }
        }
        Commands::Dashboard { json } => {
            let view = DashboardView::new();
            if json {
                println!("{}", serde_json::to_string_pretty(&view.payload(&store))?);
            } else {
                print!("{}", view.render_text(&store));
            }
        }
        Commands::Clear => {
            store.clear();
            println!("Cleared execution history");
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("mcp_status={}", level).parse()?)
                .add_directive(format!("mcp_metrics={}", level).parse()?),
        )
        .init();
    Ok(())
}

/// Apply every event line to the store, echoing output-panel lines
async fn ingest<R>(store: &mut MetricsStore, reader: R) -> Result<EventLog>
where
    R: AsyncRead + Unpin,
{
    let ingestor = ProgressIngestor::new();
    let mut log = EventLog::new();
    let dashboard_dirty = ChangeFlag::new();
    dashboard_dirty.attach(store);
    dashboard_dirty.take();

    let mut lines = BufReader::new(reader).lines();
    let mut line_no = 0usize;
    let mut skipped = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: ProgressEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed progress event");
                skipped += 1;
                continue;
            }
        };

        let applied = ingestor.apply(store, &event);
        println!("{}", log.record(applied));
    }

    let running = store.get_running_executions();
    info!(
        events = log.len(),
        skipped,
        still_running = running.len(),
        "Ingest finished"
    );
    for exec in running {
        println!("still running: {}/{} ({:.0}%)", exec.server, exec.tool, exec.percentage * 100.0);
    }
    if dashboard_dirty.take() {
        print!("{}", DashboardView::new().render_text(store));
    }

    Ok(log)
}

//! metricboard CLI: offline engine runs and a live dashboard watcher.
//!
//! Commands:
//! - `materialize`: bucket documents (JSON file) to a dense series
//! - `align`: tabular points (JSON file) to a dense live-window series
//! - `slice`: bucket documents to a fixed-length historical window
//! - `catalog`: print the granularity table
//! - `watch`: refresh a dashboard against its backend and print frames
//! - `metadata`: list the values of a rule's value field
//!
//! Data goes to stdout; logs go to stderr (`RUST_LOG`, default `info`).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use metricboard_core::data::{parse_documents_str, parse_points_str, parse_timestamp};
use metricboard_core::granularity::format_label;
use metricboard_core::{
    align_live_window, Granularity, MaterializedSeries, Materializer, OverlapPolicy,
    WindowSlicer,
};
use metricboard_runner::{
    export_frame_csv, export_json, export_series_csv, write_export, ChartPanel, DashboardConfig,
    DataProvider, HttpProvider, PanelRefresh, RefreshTask,
};

#[derive(Parser)]
#[command(
    name = "metricboard",
    about = "metricboard CLI: time-series materialization for metrics dashboards"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Materialize bucket documents into a dense series.
    Materialize {
        /// JSON file holding a `/data` response (array of bucket documents).
        #[arg(long)]
        input: PathBuf,

        /// Granularity code: M, D, h, m or s.
        #[arg(long, value_parser = parse_granularity)]
        granularity: Granularity,

        /// First tick of the window (RFC 3339 or `YYYY-MM-DD HH:MM:SS`).
        #[arg(long, value_parser = parse_time)]
        start: DateTime<Utc>,

        /// Number of ticks.
        #[arg(long)]
        range: usize,

        /// How slots covered by more than one document are resolved.
        #[arg(long, value_enum, default_value_t = Overlap::Replace)]
        overlap: Overlap,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Align a tabular point stream onto a live window.
    Align {
        /// JSON file holding a `/tabular` response.
        #[arg(long)]
        input: PathBuf,

        /// Granularity code: M, D, h, m or s.
        #[arg(long, value_parser = parse_granularity)]
        granularity: Granularity,

        /// Window start; floored to the granularity.
        #[arg(long, value_parser = parse_time)]
        start: DateTime<Utc>,

        /// Window end (inclusive).
        #[arg(long, value_parser = parse_time)]
        end: DateTime<Utc>,

        /// Number of ticks.
        #[arg(long)]
        range: usize,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Cut a fixed-length window out of bucket documents.
    Slice {
        /// JSON file holding a `/data` response.
        #[arg(long)]
        input: PathBuf,

        /// Desired first tick of the window.
        #[arg(long, value_parser = parse_time)]
        start: DateTime<Utc>,

        /// Number of values.
        #[arg(long)]
        length: usize,

        /// Granularity code. Defaults to minutes.
        #[arg(long, value_parser = parse_granularity, default_value = "m")]
        granularity: Granularity,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the granularity catalog.
    Catalog {
        /// Reference time for tick counts (defaults to now).
        #[arg(long, value_parser = parse_time)]
        at: Option<DateTime<Utc>>,
    },
    /// Refresh a dashboard against its backend and print each frame.
    Watch {
        /// Dashboard TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Stop after this many frames.
        #[arg(long, default_value_t = 1)]
        frames: usize,

        /// Override the dashboard's granularity.
        #[arg(long, value_parser = parse_granularity)]
        granularity: Option<Granularity>,

        /// Add one series per value of each rule's value field.
        #[arg(long, default_value_t = false)]
        expand_values: bool,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// List the values of a rule's value field.
    Metadata {
        /// Dashboard TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Rule index (position in the dashboard file).
        #[arg(long)]
        rule: usize,

        /// Granularity to query at. Defaults to the rule's coarsest.
        #[arg(long, value_parser = parse_granularity)]
        granularity: Option<Granularity>,
    },
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Write to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
}

#[derive(Clone, Copy, ValueEnum)]
enum Overlap {
    Replace,
    Sum,
}

impl From<Overlap> for OverlapPolicy {
    fn from(overlap: Overlap) -> Self {
        match overlap {
            Overlap::Replace => OverlapPolicy::Replace,
            Overlap::Sum => OverlapPolicy::Sum,
        }
    }
}

fn parse_granularity(code: &str) -> Result<Granularity, String> {
    Granularity::from_code(code).map_err(|e| e.to_string())
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(raw).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Materialize {
            input,
            granularity,
            start,
            range,
            overlap,
            output,
        } => run_materialize(&input, granularity, start, range, overlap, &output),
        Commands::Align {
            input,
            granularity,
            start,
            end,
            range,
            output,
        } => run_align(&input, granularity, start, end, range, &output),
        Commands::Slice {
            input,
            start,
            length,
            granularity,
            output,
        } => run_slice(&input, granularity, start, length, &output),
        Commands::Catalog { at } => {
            print_catalog(at.unwrap_or_else(Utc::now));
            Ok(())
        }
        Commands::Watch {
            config,
            frames,
            granularity,
            expand_values,
            output,
        } => run_watch(&config, frames, granularity, expand_values, &output),
        Commands::Metadata {
            config,
            rule,
            granularity,
        } => run_metadata(&config, rule, granularity),
    }
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn run_materialize(
    input: &Path,
    granularity: Granularity,
    start: DateTime<Utc>,
    range: usize,
    overlap: Overlap,
    output: &OutputArgs,
) -> Result<()> {
    let batch = parse_documents_str(&read_input(input)?, granularity)
        .with_context(|| format!("failed to parse {}", input.display()))?;
    if batch.skipped > 0 {
        warn!(skipped = batch.skipped, "skipped malformed bucket documents");
    }
    let series = Materializer::new(granularity)
        .with_overlap(overlap.into())
        .materialize(&batch.documents, start, range)?;
    emit_series(&series, output)
}

fn run_align(
    input: &Path,
    granularity: Granularity,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    range: usize,
    output: &OutputArgs,
) -> Result<()> {
    let mut points = parse_points_str(&read_input(input)?)
        .with_context(|| format!("failed to parse {}", input.display()))?;
    points.sort_by_key(|p| p.time);
    let series = align_live_window(&points, granularity, start, end, range)?;
    emit_series(&series, output)
}

fn run_slice(
    input: &Path,
    granularity: Granularity,
    start: DateTime<Utc>,
    length: usize,
    output: &OutputArgs,
) -> Result<()> {
    let batch = parse_documents_str(&read_input(input)?, granularity)
        .with_context(|| format!("failed to parse {}", input.display()))?;
    let values = WindowSlicer::new(granularity).slice(&batch.documents, start, length)?;

    let rendered = match output.format {
        Format::Json => export_json(&values)?,
        Format::Csv => values
            .iter()
            .map(|v| format!("{v}\n"))
            .collect::<String>(),
    };
    emit(&rendered, output)
}

fn print_catalog(at: DateTime<Utc>) {
    println!("Reference: {}", format_label(at));
    println!();
    println!(
        "{:<5} {:<8} {:<8} {:<6} {:>10}  {}",
        "Code", "Unit", "Parent", "Field", "Per parent", "Rounds up at"
    );
    println!("{}", "-".repeat(64));
    for g in Granularity::ALL {
        let threshold = g.rounding_threshold();
        println!(
            "{:<5} {:<8} {:<8} {:<6} {:>10}  {} >= {}",
            g.code(),
            g.unit().name(),
            g.parent_unit().name(),
            g.field_name(),
            g.ticks_per_parent(at),
            threshold.unit.name(),
            threshold.at,
        );
    }
}

fn load_dashboard(path: &Path) -> Result<DashboardConfig> {
    DashboardConfig::from_file(path)
        .with_context(|| format!("failed to load dashboard {}", path.display()))
}

fn connect(config: &DashboardConfig) -> Result<Arc<HttpProvider>> {
    let provider = HttpProvider::new(&config.base_url, config.request_timeout())
        .context("failed to create HTTP provider")?;
    Ok(Arc::new(provider))
}

fn run_watch(
    config_path: &Path,
    frames: usize,
    granularity: Option<Granularity>,
    expand_values: bool,
    output: &OutputArgs,
) -> Result<()> {
    if frames == 0 {
        bail!("--frames must be at least 1");
    }
    let config = load_dashboard(config_path)?;
    let provider = connect(&config)?;

    let mut panel = ChartPanel::from_config(&config, provider)?;
    if let Some(g) = granularity {
        panel.set_granularity(g);
    }
    if expand_values {
        for failure in panel.expand_rule_values() {
            warn!(rule = %failure.label, error = %failure.error, "could not expand rule values");
        }
    }
    if panel.rules().iter().all(|r| !r.supports(panel.granularity())) {
        bail!(
            "no rule in {} supports granularity '{}'",
            config_path.display(),
            panel.granularity()
        );
    }

    info!(
        base_url = %config.base_url,
        granularity = %panel.granularity(),
        rules = panel.rules().len(),
        frames,
        "watching dashboard"
    );

    let interval = config.refresh_interval();
    let task = RefreshTask::spawn(panel, interval).context("failed to start refresh task")?;
    // A frame can take up to one request timeout beyond the interval.
    let wait = interval + config.request_timeout() + Duration::from_secs(1);

    for n in 0..frames {
        let Some(refresh) = task.next_frame(wait) else {
            bail!("no frame received within {}s", wait.as_secs());
        };
        report_failures(&refresh);
        let rendered = match output.format {
            Format::Json => export_json(&refresh.frame)?,
            Format::Csv => export_frame_csv(&refresh.frame)?,
        };
        if let Some(path) = &output.output {
            // One file per frame: frame.json, frame.1.json, ...
            let path = if n == 0 { path.clone() } else { numbered(path, n) };
            write_export(&path, &rendered)?;
            info!(path = %path.display(), "frame written");
        } else {
            println!("{rendered}");
        }
    }

    task.cancel();
    Ok(())
}

fn report_failures(refresh: &PanelRefresh) {
    for failure in &refresh.failures {
        warn!(rule = %failure.label, error = %failure.error, "showing last good series");
    }
}

fn numbered(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{n}"),
    };
    path.with_file_name(name)
}

fn run_metadata(config_path: &Path, rule_index: usize, granularity: Option<Granularity>) -> Result<()> {
    let config = load_dashboard(config_path)?;
    let Some(rule) = config.rules.get(rule_index) else {
        bail!(
            "rule {rule_index} not found ({} has {} rules)",
            config_path.display(),
            config.rules.len()
        );
    };
    let granularity = granularity
        .or_else(|| rule.supported_granularities.first())
        .unwrap_or(config.granularity);

    let provider = connect(&config)?;
    let values = provider
        .fetch_metadata(rule.index, granularity)
        .with_context(|| format!("metadata request for rule '{}' failed", rule.label()))?;

    if values.is_empty() {
        println!("No values for {}.", rule.label());
    }
    for value in values {
        println!("{}", value);
    }
    Ok(())
}

fn emit_series(series: &MaterializedSeries, output: &OutputArgs) -> Result<()> {
    let rendered = match output.format {
        Format::Json => export_json(series)?,
        Format::Csv => export_series_csv(series)?,
    };
    emit(&rendered, output)
}

fn emit(rendered: &str, output: &OutputArgs) -> Result<()> {
    match &output.output {
        Some(path) => write_export(path, rendered),
        None => {
            print!("{rendered}");
            if !rendered.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_output_paths() {
        assert_eq!(
            numbered(Path::new("out/frame.json"), 2),
            PathBuf::from("out/frame.2.json")
        );
        assert_eq!(numbered(Path::new("frame"), 1), PathBuf::from("frame.1"));
    }

    #[test]
    fn cli_parses_materialize() {
        let cli = Cli::try_parse_from([
            "metricboard",
            "materialize",
            "--input",
            "docs.json",
            "--granularity",
            "h",
            "--start",
            "2024-01-01T00:00:00Z",
            "--range",
            "24",
            "--format",
            "csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Materialize {
                granularity, range, ..
            } => {
                assert_eq!(granularity, Granularity::Hour);
                assert_eq!(range, 24);
            }
            _ => panic!("expected materialize"),
        }
    }

    #[test]
    fn cli_rejects_unknown_granularity() {
        assert!(Cli::try_parse_from(["metricboard", "catalog"]).is_ok());
        assert!(Cli::try_parse_from([
            "metricboard",
            "slice",
            "--input",
            "docs.json",
            "--start",
            "2024-01-01 00:00:00",
            "--length",
            "10",
            "--granularity",
            "w",
        ])
        .is_err());
    }
}

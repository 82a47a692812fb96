//! Funnel Insight: click-stream funnel analysis from CSV and Excel exports.
//!
//! Loads a table, cleans it, computes funnel metrics, ranks modules by CTR
//! and writes a Markdown, JSON or CSV report.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use funnel_core::{AnalysisConfig, ColumnRole};
use funnel_ingest::TableLoader;
use funnel_reporting::{analyze, AnalysisResult, ExportFormat};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "funnel-insight")]
#[command(about = "Click-stream funnel analysis and module ranking")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "FUNNEL_INSIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Human-readable logs instead of JSON
    #[arg(long, global = true, default_value_t = false)]
    plain_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a CSV or Excel export and write a report
    Analyze {
        /// Input file (.csv, .xlsx, .xlsm, .xls)
        file: PathBuf,

        /// Output path (default: funnel_analysis_report_<timestamp>.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format: markdown, json, csv
        #[arg(long, default_value = "markdown")]
        format: ExportFormat,

        /// Minimum clicks for a row to be kept (overrides config)
        #[arg(long, env = "FUNNEL_INSIGHT__MIN_CLICK_THRESHOLD")]
        min_click: Option<u64>,

        /// Length of the module ranking (overrides config)
        #[arg(long, env = "FUNNEL_INSIGHT__TOP_N")]
        top_n: Option<usize>,
    },

    /// Print the effective column mapping
    Columns,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.plain_logs);

    // An explicitly named config file must load; environment-only failures fall back.
    let mut config = match (AnalysisConfig::load(cli.config.as_deref()), &cli.config) {
        (Ok(config), _) => config,
        (Err(e), Some(path)) => {
            return Err(e).with_context(|| format!("failed to load config {}", path.display()));
        }
        (Err(e), None) => {
            warn!(error = %e, "Failed to load config, using defaults");
            AnalysisConfig::default()
        }
    };

    match cli.command {
        Commands::Analyze {
            file,
            output,
            format,
            min_click,
            top_n,
        } => {
            if let Some(min_click) = min_click {
                config.min_click_threshold = min_click;
            }
            if let Some(top_n) = top_n {
                config.top_n = top_n;
            }
            run_analyze(&file, output, format, &config)
        }
        Commands::Columns => {
            print_columns(&config);
            Ok(())
        }
    }
}

fn init_tracing(plain: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "funnel_insight=info,funnel_reporting=info,funnel_ingest=info".into()
    });
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if plain {
        builder.init();
    } else {
        builder.json().init();
    }
}

fn run_analyze(
    file: &Path,
    output: Option<PathBuf>,
    format: ExportFormat,
    config: &AnalysisConfig,
) -> anyhow::Result<()> {
    info!(
        file = %file.display(),
        min_click_threshold = config.min_click_threshold,
        top_n = config.top_n,
        "Configuration loaded"
    );

    let dataset = TableLoader::new(config.columns.clone())
        .load_path(file)
        .with_context(|| format!("failed to load {}", file.display()))?;
    let result = analyze(&dataset, config).context("analysis failed")?;

    print_summary(&result);

    let output = output.unwrap_or_else(|| default_output_path(format));
    let rendered = format
        .render(&result)
        .context("failed to render report")?;
    std::fs::write(&output, rendered)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(output = %output.display(), ?format, "Report written");
    println!();
    println!("Report written to: {}", output.display());
    Ok(())
}

fn default_output_path(format: ExportFormat) -> PathBuf {
    PathBuf::from(format!(
        "funnel_analysis_report_{}.{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    ))
}

fn print_summary(result: &AnalysisResult) {
    let stats = &result.cleaning_stats;
    let overall = &result.overall;

    println!("Funnel analysis: {}", result.source);
    println!();
    println!(
        "  Rows:             {} -> {} (long-tail {}, anomalies {})",
        stats.original_count,
        stats.after_anomaly_filter,
        stats.removed_by_threshold(),
        stats.removed_as_anomalies()
    );
    if stats.total_nulls() > 0 {
        println!("  Missing values:   {}", stats.total_nulls());
    }
    println!("  Exposure:         {}", overall.exposure);
    println!("  Clicks:           {}", overall.click);
    println!("  Submissions:      {}", overall.submit);
    println!("  Orders:           {}", overall.order);
    println!("  CTR:              {:.2}%", overall.ctr);
    println!("  Click CVR:        {:.2}%", overall.click_cvr);
    println!("  Order CVR:        {:.2}%", overall.order_cvr);
    println!(
        "  Largest loss:     {} ({:.2}%)",
        result.loss.dominant,
        result.loss.dominant_loss()
    );

    if !result.ranking.is_empty() {
        println!();
        println!("  Top modules by CTR:");
        for module in result.ranking.top(result.config.insights.highlight_count) {
            println!(
                "    {:>3}. {}  CTR {:.2}%  order CVR {:.2}%",
                module.rank, module.event_name, module.metrics.ctr, module.metrics.order_cvr
            );
        }
    }
}

fn print_columns(config: &AnalysisConfig) {
    println!("Column mapping:");
    for role in ColumnRole::ALL {
        let column = config.columns.column_for(role).unwrap_or("(not mapped)");
        let required = if role.is_required() { "required" } else { "optional" };
        println!("  {:<12} {:<10} {}", role.as_str(), required, column);
    }
}

//! Chronet simulator CLI
//!
//! Spawns a population of counting entities and runs them through the
//! global entry points.

use chronet_sim::demo::{self, DEMO_DTS_MS};
use chronet_sim::{run, Registry, Report, ReportTarget, RunConfig, RunExport, RunSummary};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Chronet auto-tracking simulator
#[derive(Parser, Debug)]
#[command(name = "chronet-sim")]
#[command(about = "Run every live entity through the magic network", long_about = None)]
struct Args {
    /// Simulated duration of each run in seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Progress report target (none, stdout, stderr, graphical)
    #[arg(short, long)]
    report: Option<ReportTarget>,

    /// Wall-clock seconds between progress reports
    #[arg(long)]
    report_period: Option<f64>,

    /// Number of demo entities
    #[arg(short, long)]
    entities: Option<usize>,

    /// Number of consecutive runs
    #[arg(long)]
    runs: Option<u32>,

    /// Load a JSON run configuration; flags override its values
    #[arg(short, long)]
    config: Option<String>,

    /// Export run summaries to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn run_config(&self) -> Result<RunConfig, chronet_sim::ConfigError> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::default(),
        };

        if let Some(duration) = self.duration {
            config.duration_secs = duration;
        }
        if let Some(report) = self.report {
            config.report = report;
        }
        if let Some(period) = self.report_period {
            config.report_period_secs = period;
        }
        if let Some(entities) = self.entities {
            config.entities = entities;
        }
        if let Some(runs) = self.runs {
            config.runs = runs;
        }
        if self.export.is_some() {
            config.export_path = self.export.clone();
        }
        Ok(config)
    }
}

/// `RUST_LOG` directives win over `--verbose` when they parse.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        match EnvFilter::try_new(directives) {
            Ok(filter) => return filter,
            Err(e) => eprintln!("Ignoring invalid RUST_LOG: {}", e),
        }
    }
    EnvFilter::new(if verbose { "debug" } else { "info" })
}

fn run_batch(config: &RunConfig) -> Result<Vec<RunSummary>, Box<dyn std::error::Error>> {
    let registry = Registry::global();
    let population = demo::spawn_population(&registry, config.entities)?;
    debug!(
        "Spawned {} entities on {:?} ms clocks",
        population.len(),
        DEMO_DTS_MS
    );

    let mut summaries = Vec::with_capacity(config.runs as usize);
    for index in 0..config.runs {
        let report: Report = config.report.into();
        let summary = run(config.duration(), report, config.report_period())?;
        debug!(
            "  run {} | t={} -> {} | steps={} | updates={}",
            index, summary.start, summary.end, summary.steps, summary.entity_updates
        );
        let stopped = summary.stopped;
        summaries.push(summary);
        if stopped {
            break;
        }
    }

    let updates: u64 = population.iter().map(|c| c.borrow().updates()).sum();
    debug!("Population performed {} updates in total", updates);
    Ok(summaries)
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let rust_log = std::env::var("RUST_LOG").ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(args.verbose, rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error: failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    let config = match args.run_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if !args.json {
        info!("Chronet simulator v{}", env!("CARGO_PKG_VERSION"));
        info!(
            "{} entities | {} run(s) of {} s | report: {}",
            config.entities, config.runs, config.duration_secs, config.report
        );
    }

    let summaries = match run_batch(&config) {
        Ok(summaries) => summaries,
        Err(e) => {
            error!("Run failed: {}", e);
            std::process::exit(1);
        }
    };

    let mut export = RunExport::new("demo", config.entities);
    for summary in &summaries {
        export.add_run(summary);
    }

    if let Some(path) = &config.export_path {
        if let Err(e) = export.write_to_file(path) {
            error!("Failed to write export: {}", e);
            std::process::exit(1);
        }
        info!("Exported {} runs to {}", export.runs.len(), path);
    }

    if args.json {
        match serde_json::to_string_pretty(&export) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize runs: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        for record in &export.runs {
            info!(
                "run {}: {:.3} s -> {:.3} s, {} steps{}",
                record.index,
                record.start_secs,
                record.end_secs,
                record.steps,
                if record.stopped { " (stopped)" } else { "" }
            );
        }
        info!("Done: {} steps in total", export.total_steps());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directives(filter: EnvFilter) -> String {
        filter.to_string().to_lowercase()
    }

    #[test]
    fn test_log_filter_defaults_follow_verbose() {
        assert_eq!(directives(log_filter(false, None)), "info");
        assert_eq!(directives(log_filter(true, None)), "debug");
        assert_eq!(directives(log_filter(true, Some("  "))), "debug");
    }

    #[test]
    fn test_log_filter_prefers_rust_log() {
        let filter = log_filter(false, Some("chronet_sim=trace"));
        assert_eq!(directives(filter), "chronet_sim=trace");
    }
}

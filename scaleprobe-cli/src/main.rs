use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use scaleprobe_config::{ConfigLoader, LogLevel, ScaleProbeConfig};
use scaleprobe_execution::{
    InputGenerator, LoadDriver, Orchestrator, Resolver, RunReport, StopReason,
};
use scaleprobe_http::{HttpClientConfig, HttpTarget, TargetClient};
use scaleprobe_logging::init_logging_from_config;
use scaleprobe_metrics::{MetricSampler, PrometheusBackend, QueryContext};
use scaleprobe_output::{read_dataset, DatasetRow, DatasetWriter};
use scaleprobe_platform::{platform_from_config, KubectlPlatform, PortForwardLauncher};
use scaleprobe_resilience::StopSignal;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

mod cli;
mod summary;

use cli::{Cli, Commands, ConfigCommands, RunArgs};
use summary::ScalingSummary;

/// Load configuration from file or environment
fn load_config(config_path: Option<&Path>) -> Result<ScaleProbeConfig> {
    let loader = ConfigLoader::new();
    match config_path {
        Some(path) => loader
            .from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => {
            debug!("No configuration file specified. Loading from environment and defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

fn target_client(config: &ScaleProbeConfig) -> Result<Arc<dyn TargetClient>> {
    let client = HttpTarget::new(&HttpClientConfig::from(&config.target))
        .context("Failed to build the target HTTP client")?;
    Ok(Arc::new(client))
}

fn port_forward_launcher(config: &ScaleProbeConfig) -> Arc<dyn PortForwardLauncher> {
    Arc::new(KubectlPlatform::from_config(&config.deployment))
}

/// Run the whole test matrix
async fn run_command(mut config: ScaleProbeConfig, args: &RunArgs) -> Result<()> {
    args.apply(&mut config);
    config
        .validate_all()
        .context("Configuration is invalid after applying command line overrides")?;

    let client = target_client(&config)?;
    let resolver = Resolver::from_config(
        &config.target,
        Arc::clone(&client),
        Some(port_forward_launcher(&config)),
    );
    let input = InputGenerator::from_config(&config.load.input)?;
    let driver = LoadDriver::new(client, &config.target, input);

    let backend = PrometheusBackend::from_config(&config.metrics)
        .context("Failed to build the metrics client")?;
    let sampler = MetricSampler::new(
        backend,
        config.metrics.clone(),
        QueryContext::from_deployment(&config.deployment),
    );

    let platform = platform_from_config(&config.deployment);
    info!("Deployment platform: {}", platform.describe());

    let writer = DatasetWriter::open(&config.output.dataset_path)
        .with_context(|| format!("Failed to open dataset {:?}", config.output.dataset_path))?;

    let stop = StopSignal::new();
    let listener = stop.listen_for_ctrl_c();

    let mut orchestrator =
        Orchestrator::new(&config, resolver, driver, sampler, platform, writer)?
            .with_stop_signal(stop);
    println!(
        "{} Running {} tests, appending to {:?}",
        "▶".bright_cyan().bold(),
        orchestrator.planned_tests().len(),
        config.output.dataset_path
    );

    let outcome = orchestrator.run().await;
    listener.abort();

    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            println!("{} Run aborted: {}", "❌".bright_red(), e);
            error!("Run aborted: {}", e);
            return Err(e.into());
        }
    };

    print_run_report(&report);
    if config.output.print_summary {
        let rows: Vec<DatasetRow> = report.results.iter().map(DatasetRow::from).collect();
        ScalingSummary::from_rows(&rows).print();
    }
    Ok(())
}

fn print_run_report(report: &RunReport) {
    let completed = report.results.iter().filter(|r| r.is_completed()).count();
    println!(
        "{} {}/{} tests recorded ({} completed) via {} {}",
        "✓".bright_green().bold(),
        report.results.len(),
        report.planned,
        completed,
        report.endpoint.strategy,
        report.endpoint.base_url
    );
    match report.stopped {
        Some(StopReason::Interrupted) => println!(
            "{} Run interrupted; the remaining tests were not started",
            "⚠".bright_yellow().bold()
        ),
        Some(StopReason::DeadlineExceeded) => println!(
            "{} Run deadline reached; the remaining tests were not started",
            "⚠".bright_yellow().bold()
        ),
        None => {}
    }
}

/// Resolve an endpoint and report which strategy worked
async fn probe_command(config: &ScaleProbeConfig) -> Result<()> {
    let client = target_client(config)?;
    let mut resolver =
        Resolver::from_config(&config.target, client, Some(port_forward_launcher(config)));

    match resolver.resolve().await {
        Ok(endpoint) => {
            println!(
                "✅ Target reachable via {} at {}",
                endpoint.strategy, endpoint.base_url
            );
            Ok(())
        }
        Err(failure) => {
            println!("❌ No connectivity strategy reached the target");
            for strategy in &failure.failures {
                println!(
                    "   {} ({} attempts): {}",
                    strategy.strategy, strategy.attempts, strategy.error
                );
            }
            Err(failure.into())
        }
    }
}

fn summarize_command(config: &ScaleProbeConfig, dataset: Option<&PathBuf>) -> Result<()> {
    let path = dataset.unwrap_or(&config.output.dataset_path);
    info!("Summarizing dataset {:?}", path);

    let rows = read_dataset(path).with_context(|| format!("Failed to read dataset {:?}", path))?;
    if rows.is_empty() {
        warn!("Dataset {:?} has no rows", path);
    }
    ScalingSummary::from_rows(&rows).print();
    Ok(())
}

/// Handle configuration validation
fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    match load_config(Some(config_file)) {
        Ok(_config) => {
            println!("✅ Configuration file is valid");
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {:#}", e);
            error!("Configuration validation failed: {:#}", e);
            Err(e)
        }
    }
}

/// Handle configuration generation
fn handle_config_generate(output: &Path, force: bool) -> Result<()> {
    info!("Generating sample configuration at: {:?}", output);

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }

    fs::write(output, ScaleProbeConfig::generate_sample())
        .context("Failed to write configuration file")?;

    println!("✅ Sample configuration generated at: {:?}", output);
    println!(
        "🔧 Validate with: scaleprobe config validate --config-file {:?}",
        output
    );
    Ok(())
}

/// Handle configuration display
fn handle_config_show(config: &ScaleProbeConfig, format: &str) -> Result<()> {
    let value = serde_json::to_value(config).context("Failed to serialize config")?;

    match format.to_lowercase().as_str() {
        "yaml" | "yml" => {
            let yaml = serde_yaml::to_string(&value).context("Failed to serialize to YAML")?;
            println!("{}", yaml);
        }
        "json" => {
            let json =
                serde_json::to_string_pretty(&value).context("Failed to serialize to JSON")?;
            println!("{}", json);
        }
        _ => {
            return Err(anyhow::anyhow!(
                "Unknown output format: {}. Valid formats: yaml, json",
                format
            ));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // These read or write their own file and must not fail on the global config
    match &cli.command {
        Commands::Config {
            config_cmd: ConfigCommands::Validate { config_file },
        } => return handle_config_validate(config_file),
        Commands::Config {
            config_cmd: ConfigCommands::Generate { output, force },
        } => return handle_config_generate(output, *force),
        _ => {}
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.parse::<LogLevel>().map_err(|e| anyhow::anyhow!(e))?;
    }
    let _guard = init_logging_from_config(&config.logging)?;

    info!("scaleprobe {} starting", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Run(args) => run_command(config, args).await,
        Commands::Probe => probe_command(&config).await,
        Commands::Summarize { dataset } => summarize_command(&config, dataset.as_ref()),
        Commands::Config { config_cmd } => match config_cmd {
            ConfigCommands::Show { format } => handle_config_show(&config, format),
            ConfigCommands::Validate { .. } | ConfigCommands::Generate { .. } => Ok(()),
        },
    }
}

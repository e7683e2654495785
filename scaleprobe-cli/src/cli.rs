//! CLI argument parsing definitions

use clap::{Args, Parser, Subcommand};
use scaleprobe_config::{
    PlatformKind, ScaleProbeConfig, StopConditionConfig, StrategyConfig,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the test matrix and append the results to the dataset
    Run(RunArgs),

    /// Resolve a reachable endpoint for the target service and exit
    Probe,

    /// Print the scaling summary of an existing dataset
    Summarize {
        /// Dataset to read (defaults to the configured dataset path)
        #[arg(long, value_name = "PATH")]
        dataset: Option<PathBuf>,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

/// Overrides applied on top of the loaded configuration
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Replica counts to test (example: --replicas 1,2,4)
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub replicas: Option<Vec<u32>>,

    /// Repetitions per replica count
    #[arg(long, value_name = "N")]
    pub repetitions: Option<u32>,

    /// Concurrent load workers
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Load window length in seconds
    #[arg(long, value_name = "SECONDS", conflicts_with = "requests")]
    pub duration: Option<u64>,

    /// Load window size in requests
    #[arg(long, value_name = "COUNT")]
    pub requests: Option<u64>,

    /// Dataset file to append to
    #[arg(long, value_name = "PATH")]
    pub dataset: Option<PathBuf>,

    /// Use this URL as the only connectivity strategy
    #[arg(long, value_name = "URL")]
    pub target_url: Option<String>,

    /// Prometheus base URL
    #[arg(long, value_name = "URL")]
    pub metrics_url: Option<String>,

    /// Skip metric sampling; resource fields are left empty
    #[arg(long)]
    pub no_metrics: bool,

    /// Deployment platform: kubectl, manual
    #[arg(long, value_name = "PLATFORM")]
    pub platform: Option<PlatformKind>,

    /// Do not print the end-of-run summary
    #[arg(long)]
    pub no_summary: bool,
}

impl RunArgs {
    pub fn apply(&self, config: &mut ScaleProbeConfig) {
        if let Some(replicas) = &self.replicas {
            config.matrix.replica_counts = replicas.clone();
        }
        if let Some(repetitions) = self.repetitions {
            config.matrix.repetitions = repetitions;
        }
        if let Some(concurrency) = self.concurrency {
            config.load.concurrency = concurrency;
        }
        if let Some(seconds) = self.duration {
            config.load.stop = StopConditionConfig::Duration { seconds };
        }
        if let Some(count) = self.requests {
            config.load.stop = StopConditionConfig::Requests { count };
        }
        if let Some(dataset) = &self.dataset {
            config.output.dataset_path = dataset.clone();
        }
        if let Some(url) = &self.target_url {
            config.target.strategies = vec![StrategyConfig::Direct { url: url.clone() }];
        }
        if let Some(url) = &self.metrics_url {
            config.metrics.url = url.clone();
        }
        if self.no_metrics {
            config.metrics.enabled = false;
        }
        if let Some(platform) = self.platform {
            config.deployment.platform = platform;
        }
        if self.no_summary {
            config.output.print_summary = false;
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Write a sample configuration file with every default spelled out
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Output format: yaml, json
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: String,
    },
}

use anyhow::{Context, Result};
use scaleprobe_config::{LogFormat, LogLevel, LogTarget, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Keeps non-blocking file writers flushing until dropped
#[must_use = "dropping the guard stops file logging"]
#[derive(Default)]
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

/// Filter from `RUST_LOG`, falling back to the configured level.
///
/// HTTP client internals are capped at `warn` so request-level chatter
/// does not drown the run log.
pub fn build_env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},hyper=warn,hyper_util=warn,reqwest=warn,h2=warn,rustls=warn",
            level.as_str()
        ))
    })
}

/// Initialize logging from configuration
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<LoggingGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(config.targets.len());
    let mut guards = Vec::new();

    for target in &config.targets {
        match target {
            LogTarget::Console => {
                layers.push(fmt_layer(
                    config.format,
                    config.include_location,
                    std::io::stderr,
                    true,
                ));
            }
            LogTarget::File { directory, prefix } => {
                std::fs::create_dir_all(directory)
                    .with_context(|| format!("Failed to create log directory {}", directory))?;
                let appender = tracing_appender::rolling::daily(directory, prefix);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                guards.push(guard);
                layers.push(fmt_layer(config.format, config.include_location, writer, false));
            }
        }
    }

    if layers.is_empty() {
        init_simple_tracing(config.level)?;
        return Ok(LoggingGuard::default());
    }

    // try_init so a second initialisation (tests, embedding) is not fatal
    if tracing_subscriber::registry()
        .with(layers)
        .with(build_env_filter(config.level))
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(LoggingGuard { _guards: guards })
}

/// Initialize plain console tracing at the given level
pub fn init_simple_tracing(level: LogLevel) -> Result<()> {
    if tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(level))
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }
    Ok(())
}

fn fmt_layer<W>(format: LogFormat, include_location: bool, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_file(include_location)
        .with_line_number(include_location);

    match format {
        LogFormat::Json => layer.json().with_ansi(false).boxed(),
        LogFormat::Compact => layer.compact().with_ansi(ansi).boxed(),
        LogFormat::Pretty => layer.pretty().with_ansi(ansi).boxed(),
        LogFormat::Text => layer.with_target(false).with_ansi(ansi).boxed(),
    }
}

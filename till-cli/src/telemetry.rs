use anyhow::{anyhow, Context, Result};
use till_config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber. Logs go to stderr so stdout stays machine readable.
///
/// `RUST_LOG` wins over the configured level; each `-v` raises the default by one step.
/// The returned guard flushes the file writer and must outlive the command.
pub fn init_tracing(config: &LoggingConfig, verbosity: u8) -> Result<Option<WorkerGuard>> {
    let level = match verbosity {
        0 => config.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .with_context(|| format!("invalid log filter '{level}'"))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);
    layers.push(if config.json {
        stderr.json().boxed()
    } else {
        stderr.boxed()
    });

    let guard = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "till.log"));
            layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;
    Ok(guard)
}

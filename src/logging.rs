//! Subscriber setup from [`LogConfig`].

use magpie_config::{LogConfig, LogFormat};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps the file writer's worker alive; hold it until exit.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber. `RUST_LOG` overrides `config.level`.
///
/// Logs go to stderr so that command output on stdout stays machine-readable.
pub fn init(config: &LogConfig) -> LogGuard {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let json = config.format == LogFormat::Json;

    let mut layers = Vec::new();
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    layers.push(if json {
        stderr.json().flatten_event(true).boxed()
    } else {
        stderr.boxed()
    });

    let mut file_guard = None;
    if let Some(path) = &config.file {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let name = path.file_name().map_or_else(
            || std::ffi::OsString::from("magpie.log"),
            std::ffi::OsStr::to_os_string,
        );
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("failed to create log directory {}: {e}", dir.display());
        } else {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            file_guard = Some(guard);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            layers.push(if json {
                file.json().flatten_event(true).boxed()
            } else {
                file.boxed()
            });
        }
    }

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init();

    LogGuard {
        _file_guard: file_guard,
    }
}

use slog::{o, Drain, Logger};
use slog_async::Async;
use slog_term::{FullFormat, PlainDecorator, TermDecorator};

/// Configuration for setting up the logger
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub async_buffer_size: usize,
    pub use_color: bool,
    pub environment: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            async_buffer_size: 1024,
            use_color: true,
            environment: "development".to_string(),
        }
    }
}

/// Sets up the root slog logger used by background components.
pub fn setup_logger(config: LoggerConfig) -> Logger {
    let decorator = {
        let builder = TermDecorator::new();
        let builder = if config.use_color {
            builder.force_color()
        } else {
            builder
        };
        builder.build()
    };

    let drain = FullFormat::new(decorator).build().fuse();

    let drain = Async::new(drain)
        .chan_size(config.async_buffer_size)
        .build()
        .fuse();

    Logger::root(
        drain,
        o!("version" => env!("CARGO_PKG_VERSION"), "env" => config.environment),
    )
}

/// Child logger tagged with the component name.
pub fn component_logger(root: &Logger, component: &'static str) -> Logger {
    root.new(o!("component" => component))
}

/// Logger that writes to stderr synchronously; suitable for tests.
pub fn plain_logger() -> Logger {
    let decorator = PlainDecorator::new(std::io::stderr());
    let drain = FullFormat::new(decorator).build();
    let drain = std::sync::Mutex::new(drain).fuse();
    Logger::root(drain, o!())
}

/// Logger that drops every record.
pub fn discard_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_logger_accepts_records() {
        let root = setup_logger(LoggerConfig {
            async_buffer_size: 128,
            use_color: false,
            environment: "test".to_string(),
        });
        let logger = component_logger(&root, "notifications");
        slog::info!(logger, "dispatcher ready"; "attempts" => 2);
        slog::debug!(plain_logger(), "plain logger works");
        slog::warn!(discard_logger(), "dropped");
    }
}

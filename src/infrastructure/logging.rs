use crate::domain::settings::LogSettings;
use anyhow::Context;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub struct LoggingGuard {
    // We need to keep this guard alive for logs to be flushed
    _guards: Vec<WorkerGuard>,
    console_enabled: bool,
}

impl LoggingGuard {
    /// Whether records reach the terminal at all
    pub fn console_enabled(&self) -> bool {
        self.console_enabled
    }
}

pub fn init_logger(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let mut guards = Vec::new();

    // RUST_LOG wins over the configured level
    let level_filter = if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        EnvFilter::try_from_default_env()
            .with_context(|| format!("invalid {} directives", EnvFilter::DEFAULT_ENV))?
    } else {
        EnvFilter::default().add_directive(parse_level(&settings.level)?.into())
    };

    // Console layer on stderr; stdout is reserved for command output
    let console_layer = if settings.console_logging_enabled {
        Some(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_file(settings.show_file_line)
                .with_line_number(settings.show_file_line)
                .with_thread_ids(settings.show_thread_ids)
                .with_target(settings.show_target)
                .with_ansi(settings.ansi_colors),
        )
    } else {
        None
    };

    // File layer
    let file_layer = if settings.file_logging_enabled {
        std::fs::create_dir_all(&settings.log_dir)?;
        let file_appender = tracing_appender::rolling::RollingFileAppender::new(
            rotation(&settings.rotation),
            &settings.log_dir,
            &settings.file_name_prefix,
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        guards.push(guard);
        Some(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false) // File logs shouldn't have ANSI colors
                .with_file(settings.show_file_line)
                .with_line_number(settings.show_file_line)
                .with_thread_ids(settings.show_thread_ids)
                .with_target(settings.show_target),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(level_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!("Logging initialized");

    Ok(LoggingGuard {
        _guards: guards,
        console_enabled: settings.console_logging_enabled,
    })
}

/// A bare level name; anything else would silently filter out every record
fn parse_level(level: &str) -> anyhow::Result<LevelFilter> {
    LevelFilter::from_str(level.trim()).map_err(|_| {
        anyhow::anyhow!(
            "invalid log level '{}' (expected trace, debug, info, warn, error or off)",
            level
        )
    })
}

fn rotation(name: &str) -> tracing_appender::rolling::Rotation {
    match name.to_lowercase().as_str() {
        "hourly" => tracing_appender::rolling::Rotation::HOURLY,
        "minutely" => tracing_appender::rolling::Rotation::MINUTELY,
        "never" => tracing_appender::rolling::Rotation::NEVER,
        _ => tracing_appender::rolling::Rotation::DAILY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_appender::rolling::Rotation;

    #[test]
    fn test_rotation_names() {
        assert_eq!(rotation("Hourly"), Rotation::HOURLY);
        assert_eq!(rotation("never"), Rotation::NEVER);
        assert_eq!(rotation("weekly"), Rotation::DAILY);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::DEBUG);
        assert_eq!(parse_level("WARN").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_level("off").unwrap(), LevelFilter::OFF);
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        for level in ["warning", "verbose"] {
            let err = parse_level(level).unwrap_err();
            assert!(err.to_string().contains("invalid log level"), "{}", level);
        }
    }

    #[test]
    fn test_init_fails_on_unknown_level() {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        let settings = LogSettings {
            level: "warning".to_string(),
            ..LogSettings::default()
        };
        assert!(init_logger(&settings).is_err());
    }
}

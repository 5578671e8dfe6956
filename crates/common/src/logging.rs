//! Logging and tracing initialization.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Targets raised to `debug` by verbose mode.
const ENGINE_TARGETS: [&str; 6] = [
    "livemix",
    "livemix_common",
    "livemix_scene_model",
    "livemix_animator",
    "livemix_mixer",
    "livemix_composer",
];

/// Filter directive for `config`.
///
/// Verbose mode raises the engine crates to `debug` and leaves every other
/// target at the configured level. Engine targets the configuration already
/// names keep their configured level.
pub fn filter_directive(config: &LoggingConfig, verbose: bool) -> String {
    let base = config.level.trim();
    let base = if base.is_empty() { "info" } else { base };
    if !verbose {
        return base.to_string();
    }
    let named: Vec<&str> = base
        .split(',')
        .filter_map(|d| d.split_once('=').map(|(target, _)| target.trim()))
        .collect();
    ENGINE_TARGETS
        .iter()
        .filter(|target| !named.contains(*target))
        .fold(base.to_string(), |acc, target| format!("{acc},{target}=debug"))
}

/// `RUST_LOG` wins over the configured directive when set and valid.
fn env_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = filter_directive(config, verbose);
        EnvFilter::try_new(&directive).unwrap_or_else(|e| {
            eprintln!("Invalid log filter '{directive}' ({e}), using 'info'");
            EnvFilter::new("info")
        })
    })
}

/// Initialize the tracing subscriber with the given configuration.
///
/// Calling this more than once is harmless; later calls leave the first
/// subscriber in place.
pub fn init_logging(config: &LoggingConfig) {
    init_logging_verbose(config, false);
}

/// Initialize logging, raising the engine crates to `debug` when `verbose`.
pub fn init_logging_verbose(config: &LoggingConfig, verbose: bool) {
    let builder = fmt::Subscriber::builder().with_env_filter(env_filter(config, verbose));
    if config.json {
        let subscriber = builder.json().with_current_span(false).finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = builder.with_target(verbose).finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            json: false,
        }
    }

    #[test]
    fn test_quiet_directive_is_configured_level() {
        assert_eq!(filter_directive(&config("warn"), false), "warn");
        assert_eq!(filter_directive(&config("  "), false), "info");
    }

    #[test]
    fn test_verbose_raises_only_engine_targets() {
        let directive = filter_directive(&config("warn"), true);
        assert!(directive.starts_with("warn,"));
        assert!(directive.contains("livemix_mixer=debug"));
        assert!(directive.contains("livemix_composer=debug"));
        assert!(!directive.contains("tokio"));
        assert!(EnvFilter::try_new(&directive).is_ok());
    }

    #[test]
    fn test_verbose_keeps_per_target_levels() {
        let directive = filter_directive(&config("livemix_mixer=trace,warn"), true);
        assert!(directive.starts_with("livemix_mixer=trace,warn,"));
        assert!(!directive.contains("livemix_mixer=debug"));
        assert!(directive.contains("livemix_composer=debug"));
        assert!(EnvFilter::try_new(&directive).is_ok());
    }
}

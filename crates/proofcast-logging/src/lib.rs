//! # proofcast-logging
//!
//! Installs the global `tracing` subscriber.
//!
//! `RUST_LOG` wins when set; otherwise the filter is built from the default
//! level plus per-module overrides taken from settings.

#![deny(unsafe_code)]

use std::str::FromStr;

use proofcast_settings::LoggingSettings;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Errors from logging setup.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// A configured level name is not a tracing level.
    #[error("invalid log level {level:?} for {target}")]
    InvalidLevel {
        /// `default` or the module path the level was given for.
        target: String,
        /// The rejected value.
        level: String,
    },
    /// A global subscriber is already installed.
    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Resolved logging configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default log level.
    pub level: Level,
    /// Per-module level overrides (e.g. `proofcast_server::websocket` => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Resolve level names from settings.
    pub fn from_settings(settings: &LoggingSettings) -> Result<Self, LoggingError> {
        let level = parse_level("default", &settings.level)?;
        let module_levels = settings
            .modules
            .iter()
            .map(|(module, raw)| Ok((module.clone(), parse_level(module, raw)?)))
            .collect::<Result<Vec<_>, LoggingError>>()?;
        Ok(Self {
            level,
            module_levels,
            json: settings.json,
        })
    }

    /// `EnvFilter` directive string, e.g. `info,proofcast_server=debug`.
    pub fn filter_directives(&self) -> String {
        let mut directives = self.level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            directives.push(',');
            directives.push_str(module);
            directives.push('=');
            directives.push_str(&level.to_string().to_lowercase());
        }
        directives
    }
}

fn parse_level(target: &str, raw: &str) -> Result<Level, LoggingError> {
    Level::from_str(raw).map_err(|_| LoggingError::InvalidLevel {
        target: target.to_string(),
        level: raw.to_string(),
    })
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let json_layer = config.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
    });
    let text_layer = (!config.json).then(|| tracing_subscriber::fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.json);
        assert_eq!(config.filter_directives(), "info");
    }

    #[test]
    fn from_settings_with_modules() {
        let mut settings = LoggingSettings {
            level: "warn".into(),
            json: true,
            ..LoggingSettings::default()
        };
        let _ = settings
            .modules
            .insert("proofcast_server::websocket".into(), "DEBUG".into());
        let config = LoggingConfig::from_settings(&settings).unwrap();
        assert_eq!(config.level, Level::WARN);
        assert!(config.json);
        assert_eq!(
            config.filter_directives(),
            "warn,proofcast_server::websocket=debug"
        );
    }

    #[test]
    fn invalid_default_level() {
        let settings = LoggingSettings {
            level: "loud".into(),
            ..LoggingSettings::default()
        };
        let err = LoggingConfig::from_settings(&settings).unwrap_err();
        assert_eq!(err.to_string(), "invalid log level \"loud\" for default");
    }

    #[test]
    fn invalid_module_level() {
        let mut settings = LoggingSettings::default();
        let _ = settings.modules.insert("hyper".into(), "chatty".into());
        let err = LoggingConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(err, LoggingError::InvalidLevel { ref target, .. } if target == "hyper"));
    }

    #[test]
    fn second_init_fails() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);
        let second = init_logging(&config);
        assert!(matches!(second, Err(LoggingError::Init(_))));
    }
}

//! Environment-backed configuration for `reconnect-smoke`.

use std::env;

use reconnect_core::MonitorConfig;
use thiserror::Error;

const DEFAULT_SIGNED_IN_USER: &str = "rider@nexar.example";

/// Runtime configuration used by the smoke run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeConfig {
    /// Monitor timing knobs.
    pub monitor: MonitorConfig,
    /// Account the in-memory service pretends is signed in. `None` runs anonymous.
    pub signed_in_user: Option<String>,
    /// Emit one JSON line per broadcast event on stdout.
    pub print_events: bool,
}

impl SmokeConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = MonitorConfig::default();
        let monitor = MonitorConfig {
            inactivity_threshold_ms: parse_u64_with_default(
                "NEXAR_MONITOR_INACTIVITY_THRESHOLD_MS",
                defaults.inactivity_threshold_ms,
                &mut lookup,
            )?,
            debounce_ms: parse_u64_with_default(
                "NEXAR_MONITOR_DEBOUNCE_MS",
                defaults.debounce_ms,
                &mut lookup,
            )?,
            max_loading_ms: parse_u64_with_default(
                "NEXAR_MONITOR_MAX_LOADING_MS",
                defaults.max_loading_ms,
                &mut lookup,
            )?,
            loading_scan_interval_ms: parse_u64_with_default(
                "NEXAR_MONITOR_LOADING_SCAN_INTERVAL_MS",
                defaults.loading_scan_interval_ms,
                &mut lookup,
            )?,
            online_reconnect_delay_ms: parse_u64_with_default(
                "NEXAR_MONITOR_ONLINE_RECONNECT_DELAY_MS",
                defaults.online_reconnect_delay_ms,
                &mut lookup,
            )?,
        };

        if let Err(err) = monitor.validate() {
            return Err(ConfigError::InvalidValue {
                key: "NEXAR_MONITOR_*",
                value: format!("{monitor:?}"),
                reason: err.message,
            });
        }

        let signed_in_user = match optional_trimmed_env("NEXAR_MONITOR_USER", &mut lookup) {
            Some(user) if user == "-" => None,
            Some(user) => Some(user),
            None => Some(DEFAULT_SIGNED_IN_USER.to_owned()),
        };

        let print_events =
            parse_bool_with_default("NEXAR_MONITOR_PRINT_EVENTS", true, &mut lookup)?;

        Ok(Self {
            monitor,
            signed_in_user,
            print_events,
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("invalid {key}='{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_u64_with_default<F>(
    key: &'static str,
    default: u64,
    lookup: &mut F,
) -> Result<u64, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    value
        .parse::<u64>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_bool_with_default<F>(
    key: &'static str,
    default: bool,
    lookup: &mut F,
) -> Result<bool, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected a boolean".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<SmokeConfig, ConfigError> {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        SmokeConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_monitor_defaults() {
        let cfg = config_from_pairs(&[]).expect("config should parse");
        assert_eq!(cfg.monitor, MonitorConfig::default());
        assert_eq!(cfg.signed_in_user.as_deref(), Some(DEFAULT_SIGNED_IN_USER));
        assert!(cfg.print_events);
    }

    #[test]
    fn parses_timing_overrides() {
        let cfg = config_from_pairs(&[
            ("NEXAR_MONITOR_INACTIVITY_THRESHOLD_MS", "5000"),
            ("NEXAR_MONITOR_DEBOUNCE_MS", " 250 "),
            ("NEXAR_MONITOR_MAX_LOADING_MS", "10000"),
        ])
        .expect("config should parse");

        assert_eq!(cfg.monitor.inactivity_threshold_ms, 5_000);
        assert_eq!(cfg.monitor.debounce_ms, 250);
        assert_eq!(cfg.monitor.max_loading_ms, 10_000);
        assert_eq!(cfg.monitor.loading_scan_interval_ms, 2_000);
    }

    #[test]
    fn dash_user_runs_anonymous() {
        let cfg = config_from_pairs(&[("NEXAR_MONITOR_USER", "-")]).expect("config should parse");
        assert_eq!(cfg.signed_in_user, None);
    }

    #[test]
    fn rejects_invalid_numeric_values() {
        let err = config_from_pairs(&[("NEXAR_MONITOR_DEBOUNCE_MS", "soon")])
            .expect_err("invalid debounce should fail");

        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "NEXAR_MONITOR_DEBOUNCE_MS",
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_timers() {
        let err = config_from_pairs(&[("NEXAR_MONITOR_MAX_LOADING_MS", "0")])
            .expect_err("zero max loading should fail");
        assert!(err.to_string().contains("max_loading_ms must be greater than 0"));
    }

    #[test]
    fn rejects_invalid_booleans() {
        let err = config_from_pairs(&[("NEXAR_MONITOR_PRINT_EVENTS", "maybe")])
            .expect_err("invalid bool should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "NEXAR_MONITOR_PRINT_EVENTS",
                ..
            }
        ));
    }
}

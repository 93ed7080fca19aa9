//! Log subscriber setup.
//!
//! Module thresholds from [`LogConfig`] become `EnvFilter` directives. The
//! filter picks the most specific directive for an event's module path, so a
//! setting for `syspal::collector` covers `syspal::collector::disk` unless
//! that module has its own entry.

use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, Severity};
use crate::error::ConfigError;

/// Global threshold after command-line overrides: `-q` wins, then `-v`/`-vv`.
pub fn effective_level(config: &LogConfig, verbosity: u8, quiet: bool) -> Severity {
    if quiet {
        return Severity::Error;
    }
    match verbosity {
        0 => config.level,
        1 => config.level.min(Severity::Debug),
        _ => Severity::Trace,
    }
}

/// Directive list for the filter, global level first.
pub fn directives(
    config: &LogConfig,
    verbosity: u8,
    quiet: bool,
) -> Result<Vec<String>, ConfigError> {
    let mut out = vec![effective_level(config, verbosity, quiet).as_str().to_string()];
    for (module, severity) in &config.modules {
        if !is_module_path(module) {
            return Err(ConfigError::Directive {
                directive: module.clone(),
                reason: "expected a module path such as syspal::collector".to_string(),
            });
        }
        // Quiet caps module entries too; `off` stays off.
        let severity = if quiet {
            (*severity).max(Severity::Error)
        } else {
            *severity
        };
        out.push(format!("{}={}", module, severity.as_str()));
    }
    Ok(out)
}

fn is_module_path(s: &str) -> bool {
    !s.is_empty()
        && s.split("::")
            .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
}

/// Builds the filter from configuration; `RUST_LOG` directives are appended
/// and take effect on top.
pub fn build_filter(config: &LogConfig, verbosity: u8, quiet: bool) -> Result<EnvFilter, ConfigError> {
    let mut list = directives(config, verbosity, quiet)?;
    if let Ok(env) = std::env::var(EnvFilter::DEFAULT_ENV) {
        list.extend(env.split(',').filter(|d| !d.trim().is_empty()).map(String::from));
    }
    let joined = list.join(",");
    EnvFilter::builder()
        .parse(&joined)
        .map_err(|e| ConfigError::Directive {
            directive: joined.clone(),
            reason: e.to_string(),
        })
}

/// Installs the global `tracing` subscriber. Call once, from the binary.
pub fn init_logging(config: &LogConfig, verbosity: u8, quiet: bool) -> Result<(), ConfigError> {
    let filter = build_filter(config, verbosity, quiet)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn config(level: Severity, modules: &[(&str, Severity)]) -> LogConfig {
        LogConfig {
            level,
            modules: modules
                .iter()
                .map(|(m, s)| (m.to_string(), *s))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_effective_level() {
        let cfg = config(Severity::Info, &[]);
        assert_eq!(effective_level(&cfg, 0, false), Severity::Info);
        assert_eq!(effective_level(&cfg, 1, false), Severity::Debug);
        assert_eq!(effective_level(&cfg, 2, false), Severity::Trace);
        assert_eq!(effective_level(&cfg, 2, true), Severity::Error);

        // -v never raises an already verbose threshold
        let verbose = config(Severity::Trace, &[]);
        assert_eq!(effective_level(&verbose, 1, false), Severity::Trace);
    }

    #[test]
    fn test_directives_from_modules() {
        let cfg = config(
            Severity::Warn,
            &[
                ("syspal::entity", Severity::Debug),
                ("syspal::collector::disk", Severity::Off),
            ],
        );
        let list = directives(&cfg, 0, false).unwrap();
        assert_eq!(
            list,
            vec![
                "warn".to_string(),
                "syspal::collector::disk=off".to_string(),
                "syspal::entity=debug".to_string(),
            ]
        );
    }

    #[test]
    fn test_quiet_caps_module_directives() {
        let cfg = config(
            Severity::Info,
            &[
                ("syspal::entity", Severity::Debug),
                ("syspal::collector::disk", Severity::Off),
            ],
        );
        let list = directives(&cfg, 2, true).unwrap();
        assert_eq!(
            list,
            vec![
                "error".to_string(),
                "syspal::collector::disk=off".to_string(),
                "syspal::entity=error".to_string(),
            ]
        );
    }

    #[test]
    fn test_invalid_module_path_rejected() {
        for bad in ["", "syspal::", "a=b", "two words"] {
            let cfg = config(Severity::Info, &[(bad, Severity::Debug)]);
            let err = directives(&cfg, 0, false).unwrap_err();
            assert!(matches!(err, ConfigError::Directive { .. }), "{:?}", bad);
        }
    }

    #[test]
    fn test_build_filter_rejects_before_parsing() {
        let cfg = config(Severity::Info, &[("bad path", Severity::Debug)]);
        assert!(build_filter(&cfg, 0, false).is_err());
    }
}

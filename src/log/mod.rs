//! The `log` module configures the crate's logging facilities. Log messages describe what the
//! forecast and demographic engines are doing (ensemble sizes, degenerate quantile cells, regions
//! that failed in a batch). This is not to be confused with the forecast _output_, which is
//! written by [`crate::forecast::output`].
//!
//! This module (re)exports the five logging macros: `error!`, `warn!`, `info!`, `debug!` and
//! `trace!` where `error!` represents the highest-priority log messages and `trace!` the lowest.
//!
//! Logging is _disabled_ by default. The command line tool enables it with
//! `--log-level <spec>`, where the spec is parsed by [`parse_log_levels`]. Logging can also be
//! controlled programmatically:
//!
//!  - `enable_logging()`: turns on all log messages
//!  - `disable_logging()`: turns off all log messages
//!  - `set_log_level(level: LevelFilter)`: enables only log messages with priority at least `level`
//!
//! In addition, per-module filtering of messages can be configured using `set_module_filter()` /
//! `set_module_filters()` and `remove_module_filter()`:
//!
//! ```rust
//! use seir_forecast::log::{set_module_filter, set_log_level, LevelFilter};
//!
//! pub fn setup_logging() {
//!     // Enable `info` log messages globally.
//!     set_log_level(LevelFilter::Info);
//!     // Show the per-cell quantile diagnostics.
//!     set_module_filter("seir_forecast::forecast::quantile", LevelFilter::Debug);
//! }
//! ```
#[cfg(feature = "logging")]
mod standard_logger;

#[cfg(not(feature = "logging"))]
mod null_logger;

#[cfg(all(feature = "logging", feature = "progress_bar"))]
mod progress_bar_encoder;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::str::FromStr;

pub use log::{debug, error, info, trace, warn, LevelFilter};
#[cfg(feature = "logging")]
use log4rs::Handle;
use std::sync::LazyLock;
use std::sync::{Mutex, MutexGuard};

use crate::error::ForecastError;

// Logging disabled
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;

/// A global instance of the logging configuration.
static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// Different log level filters can be applied to the log messages emitted from different modules
/// according to the module path (e.g. `"seir_forecast::demographics"`). These are stored in the
/// global `LogConfiguration`.
#[derive(Debug, PartialEq)]
struct ModuleLogConfiguration {
    /// The module path this configuration applies to
    module: String,
    /// The maximum log level for this module path
    level: LevelFilter,
}

impl From<(&str, LevelFilter)> for ModuleLogConfiguration {
    fn from((module, level): (&str, LevelFilter)) -> Self {
        Self {
            module: module.to_string(),
            level,
        }
    }
}

/// Holds logging configuration. Its primary responsibility is to keep track of the filter levels
/// of modules and hold a handle to the global logger.
///
/// Because loggers are globally installed, only one instance of this struct should exist. The
/// public API are free functions which fetch the singleton and call the appropriate member
/// function.
#[derive(Debug)]
pub(in crate::log) struct LogConfiguration {
    /// The "default" level filter for modules ("targets") without an explicitly set filter. A
    /// global filter level of `LevelFilter::Off` disables logging.
    pub(in crate::log) global_log_level: LevelFilter,
    pub(in crate::log) module_configurations: HashMap<String, ModuleLogConfiguration>,

    #[cfg(feature = "logging")]
    /// Handle to the `log4rs` logger.
    root_handle: Option<Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        Self {
            global_log_level: DEFAULT_LOG_LEVEL,
            module_configurations: HashMap::new(),

            #[cfg(feature = "logging")]
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    pub(in crate::log) fn set_log_level(&mut self, level: LevelFilter) {
        self.global_log_level = level;
        self.set_config();
    }

    /// Returns true if the configuration was mutated, false otherwise.
    fn insert_module_filter(&mut self, module: &str, level: LevelFilter) -> bool {
        match self.module_configurations.entry(module.to_string()) {
            Entry::Occupied(mut entry) => {
                let module_config = entry.get_mut();
                if module_config.level == level {
                    return false;
                }
                module_config.level = level;
            }

            Entry::Vacant(entry) => {
                entry.insert((module, level).into());
            }
        }
        true
    }

    pub(in crate::log) fn set_module_filter(&mut self, module: &str, level: LevelFilter) {
        if self.insert_module_filter(module, level) {
            self.set_config();
        }
    }

    pub(in crate::log) fn set_module_filters(&mut self, module_filters: &[(&str, LevelFilter)]) {
        let mut mutated: bool = false;
        for (module, level) in module_filters {
            mutated |= self.insert_module_filter(module, *level);
        }
        if mutated {
            self.set_config();
        }
    }

    pub(in crate::log) fn remove_module_filter(&mut self, module: &str) {
        if self.module_configurations.remove(module).is_some() {
            self.set_config();
        }
    }
}

/// A parsed `--log-level` specification: an optional global level followed by
/// `module=level` pairs, comma separated, e.g. `"info,seir_forecast::forecast=debug"`.
#[derive(Debug, Default, PartialEq)]
pub struct LogLevels {
    pub global: Option<LevelFilter>,
    pub modules: Vec<(String, LevelFilter)>,
}

/// Parses a log level specification. Level names are case-insensitive.
///
/// # Errors
///
/// Returns a configuration error naming the first unrecognized level.
pub fn parse_log_levels(spec: &str) -> Result<LogLevels, ForecastError> {
    let mut levels = LogLevels::default();
    for part in spec.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let parse_level = |level: &str| {
            LevelFilter::from_str(level.trim()).map_err(|_| {
                ForecastError::configuration(format!("unrecognized log level `{level}`"))
            })
        };
        match part.split_once('=') {
            Some((module, level)) => levels
                .modules
                .push((module.trim().to_string(), parse_level(level)?)),
            None => levels.global = Some(parse_level(part)?),
        }
    }
    Ok(levels)
}

/// Installs a parsed specification. Modules named without a global level imply a global level
/// of `Error` so that failures are still reported.
pub fn apply_log_levels(levels: &LogLevels) {
    let mut log_configuration = get_log_configuration();
    let filters: Vec<(&str, LevelFilter)> = levels
        .modules
        .iter()
        .map(|(module, level)| (module.as_str(), *level))
        .collect();
    for (module, level) in &filters {
        log_configuration.insert_module_filter(module, *level);
    }
    let global = match (levels.global, filters.is_empty()) {
        (Some(level), _) => level,
        (None, false) => LevelFilter::Error,
        (None, true) => DEFAULT_LOG_LEVEL,
    };
    log_configuration.set_log_level(global);
    for (module, level) in &filters {
        info!("Logging enabled for {} at level {}", module, level);
    }
}

// The public API

/// Enables the logger with no global level filter / full logging. Equivalent to
/// `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Disables logging completely. Equivalent to `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the global log level. A global filter level of `LevelFilter::Off` disables logging.
pub fn set_log_level(level: LevelFilter) {
    let mut log_configuration = get_log_configuration();
    log_configuration.set_log_level(level);
}

/// Sets a level filter for the given module path.
pub fn set_module_filter(module_path: &str, level_filter: LevelFilter) {
    let mut log_configuration = get_log_configuration();
    log_configuration.set_module_filter(module_path, level_filter);
}

/// Removes a module-specific level filter for the given module path. The global level filter will
/// apply to the module.
pub fn remove_module_filter(module_path: &str) {
    let mut log_configuration = get_log_configuration();
    log_configuration.remove_module_filter(module_path);
}

/// Sets the level filters for a set of modules. Use this instead of `set_module_filter()` to set
/// filters in bulk.
pub fn set_module_filters(module_filters: &[(&str, LevelFilter)]) {
    let mut log_configuration = get_log_configuration();
    log_configuration.set_module_filters(module_filters);
}

/// Fetches a mutable reference to the global `LogConfiguration`.
fn get_log_configuration() -> MutexGuard<'static, LogConfiguration> {
    LOG_CONFIGURATION.lock().expect("Mutex poisoned")
}

#[cfg(test)]
mod tests {
    use super::{
        get_log_configuration, parse_log_levels, remove_module_filter, set_log_level,
        set_module_filters, LogLevels,
    };
    use log::{error, trace, LevelFilter};
    use std::sync::{LazyLock, Mutex};

    // Force logging tests to run serially for consistent behavior.
    static TEST_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(Mutex::default);

    #[test]
    fn test_set_log_level() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        set_log_level(LevelFilter::Error);
        {
            let config = get_log_configuration();
            assert_eq!(config.global_log_level, LevelFilter::Error);
            error!("test_set_log_level: global set to error");
            trace!("test_set_log_level: NOT EMITTED");
        }
        set_log_level(LevelFilter::Trace);
        {
            let config = get_log_configuration();
            assert_eq!(config.global_log_level, LevelFilter::Trace);
        }
        set_log_level(LevelFilter::Off);
    }

    #[test]
    fn test_set_remove_module_filters() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        let filters = [
            ("seir_forecast::forecast", LevelFilter::Debug),
            ("seir_forecast::demographics", LevelFilter::Warn),
        ];
        set_module_filters(&filters);
        {
            let config = get_log_configuration();
            for (module_path, level) in &filters {
                assert_eq!(
                    config.module_configurations.get(*module_path),
                    Some(&((*module_path, *level).into()))
                );
            }
        }

        remove_module_filter("seir_forecast::forecast");
        remove_module_filter("seir_forecast::demographics");
        {
            let config = get_log_configuration();
            assert!(config
                .module_configurations
                .get("seir_forecast::forecast")
                .is_none());
        }
        set_log_level(LevelFilter::Off);
    }

    #[test]
    fn test_parse_log_levels() {
        assert_eq!(parse_log_levels("").unwrap(), LogLevels::default());
        assert_eq!(
            parse_log_levels("info, seir_forecast::forecast=Debug").unwrap(),
            LogLevels {
                global: Some(LevelFilter::Info),
                modules: vec![("seir_forecast::forecast".to_string(), LevelFilter::Debug)],
            }
        );
        assert_eq!(
            parse_log_levels("TRACE").unwrap().global,
            Some(LevelFilter::Trace)
        );
        assert!(parse_log_levels("seir_forecast=loud").is_err());
        assert!(parse_log_levels("verbose").is_err());
    }
}

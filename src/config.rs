//! Runtime configuration.
//!
//! Values come from the process environment, after loading a `.env` file
//! from the working directory when one exists.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache;
use crate::loader;

/// Settings shared by the CLI and embedding applications.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Profile database file. `None` when no data directory could be found.
    pub db_path: Option<PathBuf>,
    /// Capacity of the viewport note cache.
    pub cache_capacity: usize,
    /// Quiet period before a scheduled viewport hydration runs.
    pub hydration_debounce: Duration,
    /// `tracing_subscriber` filter directive.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache_capacity: cache::DEFAULT_CAPACITY,
            hydration_debounce: loader::DEFAULT_DEBOUNCE,
            log_filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads the environment.
    pub fn load() -> Self {
        // A missing .env file is the common case.
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    /// Parses configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is unset or invalid.
    ///
    /// # Environment Variables
    ///
    /// - `INKVAULT_DB_PATH`: profile database file
    ///   (default `{data_dir}/inkvault/profile.db`)
    /// - `INKVAULT_CACHE_CAPACITY` (usize, default 100)
    /// - `INKVAULT_HYDRATION_DEBOUNCE_MS` (u64, default 120)
    /// - `INKVAULT_LOG` (filter directive, default `warn`)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let db_path = std::env::var_os("INKVAULT_DB_PATH")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .or(defaults.db_path);

        let cache_capacity = std::env::var("INKVAULT_CACHE_CAPACITY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|capacity| *capacity > 0)
            .unwrap_or(defaults.cache_capacity);

        let hydration_debounce = std::env::var("INKVAULT_HYDRATION_DEBOUNCE_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.hydration_debounce);

        let log_filter = std::env::var("INKVAULT_LOG")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.log_filter);

        Self {
            db_path,
            cache_capacity,
            hydration_debounce,
            log_filter,
        }
    }
}

/// Returns `{data_dir}/inkvault/profile.db` where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("inkvault").join("profile.db"))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const VARS: [&str; 4] = [
        "INKVAULT_DB_PATH",
        "INKVAULT_CACHE_CAPACITY",
        "INKVAULT_HYDRATION_DEBOUNCE_MS",
        "INKVAULT_LOG",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: serialized with every other env-mutating test.
            unsafe { std::env::remove_var(var) };
        }
    }

    fn set_env(var: &str, value: &str) {
        // SAFETY: serialized with every other env-mutating test.
        unsafe { std::env::set_var(var, value) };
    }

    #[test]
    #[serial]
    fn defaults_when_environment_is_empty() {
        clear_env();

        let config = Config::from_env();

        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.hydration_debounce, Duration::from_millis(120));
        assert_eq!(config.log_filter, "warn");
        assert_eq!(config.db_path, default_db_path());
    }

    #[test]
    #[serial]
    fn reads_overrides_from_environment() {
        clear_env();
        set_env("INKVAULT_DB_PATH", "/tmp/inkvault-test/profile.db");
        set_env("INKVAULT_CACHE_CAPACITY", "250");
        set_env("INKVAULT_HYDRATION_DEBOUNCE_MS", "30");
        set_env("INKVAULT_LOG", "inkvault=debug");

        let config = Config::from_env();
        clear_env();

        assert_eq!(
            config.db_path,
            Some(PathBuf::from("/tmp/inkvault-test/profile.db"))
        );
        assert_eq!(config.cache_capacity, 250);
        assert_eq!(config.hydration_debounce, Duration::from_millis(30));
        assert_eq!(config.log_filter, "inkvault=debug");
    }

    #[test]
    #[serial]
    fn invalid_values_fall_back_to_defaults() {
        clear_env();
        set_env("INKVAULT_CACHE_CAPACITY", "0");
        set_env("INKVAULT_HYDRATION_DEBOUNCE_MS", "soon");
        set_env("INKVAULT_LOG", "  ");

        let config = Config::from_env();
        clear_env();

        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.hydration_debounce, Duration::from_millis(120));
        assert_eq!(config.log_filter, "warn");
    }
}

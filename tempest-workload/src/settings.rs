//! Run settings.
//!
//! Settings adjust how a workload is run without touching the workload
//! itself: the seed, thread and iteration overrides, the transition walk
//! order and whether full visit traces are kept.
//!
//! # Example
//!
//! ```ignore
//! use tempest_workload::settings::{load_profile, RunSettings};
//!
//! // A builtin profile
//! let settings = load_profile("smoke").unwrap();
//!
//! // or a settings file
//! let settings = RunSettings::from_file("run.toml").unwrap();
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::transition::TransitionOrder;

/// How to run a workload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Run seed. A random seed is chosen and logged when unset.
    pub seed: Option<u64>,
    /// Replaces the workload's thread count.
    pub thread_count: Option<u32>,
    /// Replaces the workload's iteration count.
    pub iterations: Option<u64>,
    /// Upper bound on the number of workers.
    pub max_threads: Option<u32>,
    /// Walk order for outgoing transitions.
    pub transition_order: TransitionOrder,
    /// Keep every visited state in worker traces.
    pub record_trace: bool,
}

impl RunSettings {
    /// Sets the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enables visit traces.
    #[must_use]
    pub const fn with_trace(mut self) -> Self {
        self.record_trace = true;
        self
    }

    /// Thread count after overrides and the cap are applied.
    #[must_use]
    pub fn effective_threads(&self, configured: u32) -> u32 {
        let threads = self.thread_count.unwrap_or(configured);
        self.max_threads.map_or(threads, |max| threads.min(max))
    }

    /// Iteration count after overrides are applied.
    #[must_use]
    pub fn effective_iterations(&self, configured: u64) -> u64 {
        self.iterations.unwrap_or(configured)
    }

    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be read or does not parse.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| SettingsError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse settings from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed TOML or unknown field values.
    pub fn from_toml(toml: &str) -> Result<Self, SettingsError> {
        toml::from_str(toml).map_err(|e| SettingsError::Parse {
            message: e.to_string(),
        })
    }

    /// Serialize the settings to a TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

/// Failure to obtain [`RunSettings`].
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings from {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// I/O failure.
        source: std::io::Error,
    },
    /// The settings are not valid TOML for [`RunSettings`].
    #[error("failed to parse settings: {message}")]
    Parse {
        /// Parser message.
        message: String,
    },
    /// No builtin profile has this name.
    #[error("unknown run profile `{name}`")]
    NotFound {
        /// Requested name.
        name: String,
    },
}

/// Built-in profiles for common runs.
#[must_use]
pub fn builtin_profiles() -> HashMap<&'static str, RunSettings> {
    HashMap::from([
        ("default", RunSettings::default()),
        (
            "smoke",
            RunSettings {
                thread_count: Some(2),
                iterations: Some(5),
                ..RunSettings::default()
            },
        ),
        (
            "stress",
            RunSettings {
                max_threads: Some(64),
                ..RunSettings::default()
            },
        ),
        (
            "reproduce",
            RunSettings {
                thread_count: Some(1),
                record_trace: true,
                ..RunSettings::default()
            },
        ),
    ])
}

/// Returns the builtin profile called `name`.
///
/// # Errors
///
/// Returns [`SettingsError::NotFound`] for an unknown name.
pub fn load_profile(name: &str) -> Result<RunSettings, SettingsError> {
    builtin_profiles()
        .remove(name)
        .ok_or_else(|| SettingsError::NotFound {
            name: name.to_string(),
        })
}

/// Builtin profile names, sorted.
#[must_use]
pub fn list_profiles() -> Vec<&'static str> {
    let mut names: Vec<_> = builtin_profiles().keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = RunSettings::default();
        assert_eq!(settings.seed, None);
        assert_eq!(settings.transition_order, TransitionOrder::Declared);
        assert_eq!(settings.effective_threads(8), 8);
        assert_eq!(settings.effective_iterations(20), 20);
    }

    #[test]
    fn test_overrides_and_cap() {
        let settings = RunSettings {
            thread_count: Some(100),
            max_threads: Some(16),
            iterations: Some(3),
            ..RunSettings::default()
        };
        assert_eq!(settings.effective_threads(4), 16);
        assert_eq!(settings.effective_iterations(20), 3);

        let capped = RunSettings {
            max_threads: Some(2),
            ..RunSettings::default()
        };
        assert_eq!(capped.effective_threads(4), 2);
        assert_eq!(capped.effective_threads(1), 1);
    }

    #[test]
    fn test_profiles_listed_sorted() {
        assert_eq!(list_profiles(), vec!["default", "reproduce", "smoke", "stress"]);
        let smoke = load_profile("smoke").unwrap();
        assert_eq!(smoke.thread_count, Some(2));
        assert!(load_profile("reproduce").unwrap().record_trace);
    }

    #[test]
    fn test_unknown_profile_rejected() {
        let result = load_profile("soak");
        assert!(matches!(result, Err(SettingsError::NotFound { .. })));
    }

    #[test]
    fn test_from_toml() {
        let settings = RunSettings::from_toml(
            r#"
            seed = 42
            iterations = 7
            transition_order = "lexicographic"
            "#,
        )
        .unwrap();
        assert_eq!(settings.seed, Some(42));
        assert_eq!(settings.iterations, Some(7));
        assert_eq!(settings.transition_order, TransitionOrder::Lexicographic);
        assert!(!settings.record_trace);
    }

    #[test]
    fn test_settings_survive_toml() {
        let settings = load_profile("reproduce").unwrap().with_seed(9);
        let parsed = RunSettings::from_toml(&settings.to_toml()).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_bad_toml_rejected() {
        let result = RunSettings::from_toml("seed = \"not a number\"");
        assert!(matches!(result, Err(SettingsError::Parse { .. })));
    }
}

//! Configuration Management
//!
//! Holds `SET variable = value` style settings and derives the typed
//! configuration consumed by the binder.

use crate::common::constants::{DEFAULT_PIVOT_LIMIT, PIVOT_LIMIT_SETTING, THREADS_SETTING};
use crate::common::error::{PrismError, PrismResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Configuration manager for database settings
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    settings: Arc<RwLock<HashMap<String, String>>>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a configuration variable. Known settings are validated eagerly.
    pub fn set(&self, key: &str, value: impl Into<String>) -> PrismResult<()> {
        let key = key.to_lowercase();
        let value = value.into();
        if key == PIVOT_LIMIT_SETTING || key == THREADS_SETTING {
            parse_positive(&key, &value)?;
        }
        tracing::debug!(setting = %key, value = %value, "SET");
        self.settings.write().insert(key, value);
        Ok(())
    }

    /// Get a configuration variable
    pub fn get(&self, key: &str) -> Option<String> {
        self.settings.read().get(&key.to_lowercase()).cloned()
    }

    /// Reset a variable to its default
    pub fn reset(&self, key: &str) {
        self.settings.write().remove(&key.to_lowercase());
    }

    /// List all configuration variables
    pub fn list_all(&self) -> Vec<(String, String)> {
        let mut all: Vec<_> = self
            .settings
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort();
        all
    }

    /// Snapshot of the settings the binder cares about
    pub fn binder_config(&self) -> PrismResult<BinderConfig> {
        let pivot_limit = match self.get(PIVOT_LIMIT_SETTING) {
            Some(value) => parse_positive(PIVOT_LIMIT_SETTING, &value)?,
            None => DEFAULT_PIVOT_LIMIT,
        };
        Ok(BinderConfig { pivot_limit })
    }

    /// Number of scan workers, if set
    pub fn threads(&self) -> PrismResult<Option<usize>> {
        self.get(THREADS_SETTING)
            .map(|value| parse_positive(THREADS_SETTING, &value))
            .transpose()
    }
}

fn parse_positive(key: &str, value: &str) -> PrismResult<usize> {
    let parsed: usize = value.trim().parse().map_err(|_| {
        PrismError::InvalidArgument(format!(
            "{} must be a positive integer, got '{}'",
            key, value
        ))
    })?;
    if parsed == 0 {
        return Err(PrismError::InvalidArgument(format!(
            "{} must be greater than zero",
            key
        )));
    }
    Ok(parsed)
}

/// Typed settings read by the binder for one statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinderConfig {
    /// Upper bound (exclusive) on the number of pivot value combinations
    pub pivot_limit: usize,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            pivot_limit: DEFAULT_PIVOT_LIMIT,
        }
    }
}

//! Manager and per-filter configuration.
//!
//! The manager is constructed with a [`ManagerConfig`] and never mutates
//! it; `create` may carry a per-filter [`FilterParams`] override.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::FilterError;

/// Sizing parameters for a single filter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Number of keys the filter is sized for.
    pub capacity: usize,
    /// Target false positive rate.
    pub target_fpr: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            target_fpr: 1.0 / 10_000.0,
        }
    }
}

impl FilterParams {
    /// Create validated parameters.
    pub fn new(capacity: usize, target_fpr: f64) -> Result<Self, FilterError> {
        let params = Self {
            capacity,
            target_fpr,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check that the parameters describe a constructible filter.
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.capacity == 0 {
            return Err(FilterError::InvalidParams(
                "capacity cannot be 0".to_string(),
            ));
        }

        if !(self.target_fpr > 0.0 && self.target_fpr < 1.0) {
            return Err(FilterError::InvalidParams(format!(
                "target_fpr {} must be in (0, 1)",
                self.target_fpr
            )));
        }

        Ok(())
    }
}

/// Configuration the manager is constructed with.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Directory holding one `bloomd.<name>` folder per filter.
    pub data_dir: PathBuf,
    /// Parameters used when a create carries no override.
    pub default_params: FilterParams,
}

impl ManagerConfig {
    /// Configuration with the stock filter parameters.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            default_params: FilterParams::default(),
        }
    }

    /// Override the default filter parameters.
    pub fn with_default_params(mut self, params: FilterParams) -> Self {
        self.default_params = params;
        self
    }
}

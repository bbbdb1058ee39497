use std::path::Path;

use serde::Deserialize;

use crate::error::GammaError;
use crate::types::{PivotType, SamplerKind};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GammaConfig {
    /// Chance continua drawn before the precision pass.
    pub n_samples: usize,
    /// Target relative error of the expected-disorder estimate, in `(0, 1)`.
    pub precision_level: Option<f64>,
    /// Restricts the pivot sampler to these annotators' tracks.
    pub ground_truth_annotators: Option<Vec<String>>,
    pub pivot_type: PivotType,
    pub sampler: SamplerKind,
    pub seed: u64,
    /// Candidate tuples scored per provider call.
    pub batch_size: usize,
    pub alpha: f64,
    pub beta: f64,
    pub delta_empty: f64,
}

impl GammaConfig {
    pub const DEFAULT_N_SAMPLES: usize = 30;
    pub const DEFAULT_BATCH_SIZE: usize = 1 << 20;
    pub const DEFAULT_SEED: u64 = 4577;

    pub fn load(path: &Path) -> Result<Self, GammaError> {
        let data =
            std::fs::read_to_string(path).map_err(|e| GammaError::io("read gamma config", e))?;
        let config: Self =
            serde_json::from_str(&data).map_err(|e| GammaError::json("parse gamma config", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GammaError> {
        if self.n_samples == 0 {
            return Err(GammaError::invalid_input("n_samples must be >= 1"));
        }
        if let Some(level) = self.precision_level {
            if !(level > 0.0 && level < 1.0) {
                return Err(GammaError::invalid_input(format!(
                    "precision_level must lie in (0, 1), got {level}"
                )));
            }
        }
        if let Some(annotators) = &self.ground_truth_annotators {
            if annotators.is_empty() {
                return Err(GammaError::invalid_input(
                    "ground_truth_annotators must name at least one annotator",
                ));
            }
            if self.sampler == SamplerKind::Statistical {
                return Err(GammaError::invalid_input(
                    "ground_truth_annotators only applies to the pivot sampler",
                ));
            }
        }
        if self.batch_size == 0 {
            return Err(GammaError::invalid_input("batch_size must be >= 1"));
        }
        if !(self.delta_empty > 0.0 && self.delta_empty.is_finite()) {
            return Err(GammaError::invalid_input(format!(
                "delta_empty must be positive, got {}",
                self.delta_empty
            )));
        }
        if self.alpha < 0.0 || self.beta < 0.0 {
            return Err(GammaError::invalid_input(
                "alpha and beta must be non-negative",
            ));
        }
        Ok(())
    }
}

impl Default for GammaConfig {
    fn default() -> Self {
        Self {
            n_samples: Self::DEFAULT_N_SAMPLES,
            precision_level: None,
            ground_truth_annotators: None,
            pivot_type: PivotType::Float,
            sampler: SamplerKind::Pivot,
            seed: Self::DEFAULT_SEED,
            batch_size: Self::DEFAULT_BATCH_SIZE,
            alpha: 1.0,
            beta: 1.0,
            delta_empty: 1.0,
        }
    }
}

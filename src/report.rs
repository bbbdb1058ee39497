use serde::Serialize;
use statrs::statistics::Statistics;

use crate::alignment::Alignment;
use crate::types::PivotType;

/// Two-sided 95% normal quantile.
pub const Z_95: f64 = 1.96;

#[derive(Debug, Clone, PartialEq)]
pub struct GammaResult {
    pub best_alignment: Alignment,
    pub chance_samples: Vec<f64>,
    pub pivot_type: PivotType,
    pub n_samples: usize,
    pub precision_level: Option<f64>,
}

impl GammaResult {
    pub fn observed_agreement(&self) -> f64 {
        self.best_alignment.observed_agreement()
    }

    /// Mean chance disorder.
    pub fn expected_disagreement(&self) -> f64 {
        self.chance_samples.iter().mean()
    }

    pub fn chance_std_dev(&self) -> f64 {
        self.chance_samples.iter().population_std_dev()
    }

    pub fn gamma(&self) -> f64 {
        1.0 - self.observed_agreement() / self.expected_disagreement()
    }

    /// Gamma bounds implied by the requested precision level, if any.
    pub fn approx_gamma_range(&self) -> Option<(f64, f64)> {
        let level = self.precision_level?;
        let observed = self.observed_agreement();
        let expected = self.expected_disagreement();
        Some((
            1.0 - observed / (expected * (1.0 - level)),
            1.0 - observed / (expected * (1.0 + level)),
        ))
    }

    /// Gamma bounds from the standard error of the chance samples.
    pub fn estimated_gamma_range(&self) -> (f64, f64) {
        let observed = self.observed_agreement();
        let expected = self.expected_disagreement();
        let n = self.chance_samples.len().max(1) as f64;
        let margin = Z_95 * self.chance_std_dev() / n.sqrt();
        let low = (expected - margin).max(f64::MIN_POSITIVE);
        (1.0 - observed / low, 1.0 - observed / (expected + margin))
    }

    pub fn summary(&self, id: &str) -> GammaReport {
        GammaReport {
            id: id.to_string(),
            gamma: self.gamma(),
            observed_agreement: self.observed_agreement(),
            expected_disagreement: self.expected_disagreement(),
            chance_std_dev: self.chance_std_dev(),
            n_samples: self.n_samples,
            chance_sample_count: self.chance_samples.len(),
            pivot_type: self.pivot_type,
            precision_level: self.precision_level,
            approx_gamma_range: self.approx_gamma_range(),
            estimated_gamma_range: self.estimated_gamma_range(),
            unitary_alignment_count: self.best_alignment.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GammaReport {
    pub id: String,
    pub gamma: f64,
    pub observed_agreement: f64,
    pub expected_disagreement: f64,
    pub chance_std_dev: f64,
    pub n_samples: usize,
    pub chance_sample_count: usize,
    pub pivot_type: PivotType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approx_gamma_range: Option<(f64, f64)>,
    pub estimated_gamma_range: (f64, f64),
    pub unitary_alignment_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub generated_at: String,
    pub seed: u64,
    pub input_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub schema_version: u32,
    pub meta: Meta,
    pub results: Vec<GammaReport>,
}

use rand::RngCore;

use crate::alignment::solver::{solve_exact_cover, PartitionProblem};
use crate::continuum::Continuum;
use crate::error::GammaError;
use crate::pipeline::traits::{BinarySolver, ContinuumSampler};
use crate::sampling::{sample_pivoted, sample_statistical, ContinuumStatistics};
use crate::types::PivotType;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExactCoverSolver;

impl BinarySolver for ExactCoverSolver {
    fn solve(&self, problem: &PartitionProblem) -> Result<Vec<f64>, GammaError> {
        solve_exact_cover(problem)
    }
}

/// Pivots whole annotator tracks; see [`sample_pivoted`].
#[derive(Debug, Clone, Default)]
pub struct PivotSampler {
    pivot_type: PivotType,
    restrict_to: Option<Vec<String>>,
}

impl PivotSampler {
    pub fn new(pivot_type: PivotType) -> Self {
        Self {
            pivot_type,
            restrict_to: None,
        }
    }

    /// Only these annotators' tracks are used as sources.
    pub fn with_restriction(mut self, annotators: Option<Vec<String>>) -> Self {
        self.restrict_to = annotators;
        self
    }

    pub fn pivot_type(&self) -> PivotType {
        self.pivot_type
    }
}

impl ContinuumSampler for PivotSampler {
    fn sample(
        &self,
        continuum: &Continuum,
        rng: &mut dyn RngCore,
    ) -> Result<Continuum, GammaError> {
        match &self.restrict_to {
            Some(annotators) => sample_pivoted(continuum, self.pivot_type, annotators, rng),
            None => {
                let all: Vec<String> = continuum.annotators().map(str::to_string).collect();
                sample_pivoted(continuum, self.pivot_type, &all, rng)
            }
        }
    }
}

/// Draws tracks from the continuum's pooled unit statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticalSampler;

impl ContinuumSampler for StatisticalSampler {
    fn sample(
        &self,
        continuum: &Continuum,
        rng: &mut dyn RngCore,
    ) -> Result<Continuum, GammaError> {
        let stats = ContinuumStatistics::from_continuum(continuum)?;
        sample_statistical(&stats, continuum.num_annotators(), rng)
    }
}

use std::ops::Range;

use rayon::prelude::*;
use statrs::statistics::Statistics;

use crate::alignment::candidates::CandidateEnumerator;
use crate::alignment::{best_alignment, Alignment};
use crate::config::GammaConfig;
use crate::continuum::Continuum;
use crate::error::GammaError;
use crate::pipeline::traits::{BinarySolver, ContinuumSampler, DissimilarityProvider};
use crate::report::{GammaResult, Z_95};
use crate::sampling::sample_rng;

pub struct GammaEstimator {
    config: GammaConfig,
    enumerator: CandidateEnumerator,
    provider: Box<dyn DissimilarityProvider>,
    solver: Box<dyn BinarySolver>,
    sampler: Box<dyn ContinuumSampler>,
}

pub(crate) struct GammaEstimatorParts {
    pub config: GammaConfig,
    pub provider: Box<dyn DissimilarityProvider>,
    pub solver: Box<dyn BinarySolver>,
    pub sampler: Box<dyn ContinuumSampler>,
}

impl GammaEstimator {
    pub(crate) fn from_parts(parts: GammaEstimatorParts) -> Self {
        Self {
            enumerator: CandidateEnumerator::new(parts.config.batch_size),
            config: parts.config,
            provider: parts.provider,
            solver: parts.solver,
            sampler: parts.sampler,
        }
    }

    pub fn config(&self) -> &GammaConfig {
        &self.config
    }

    pub fn best_alignment(&self, continuum: &Continuum) -> Result<Alignment, GammaError> {
        best_alignment(
            continuum,
            self.provider.as_ref(),
            self.solver.as_ref(),
            &self.enumerator,
        )
    }

    /// Disorder of the best alignment of chance continuum `index`.
    pub fn chance_sample(&self, continuum: &Continuum, index: usize) -> Result<f64, GammaError> {
        let mut rng = sample_rng(self.config.seed, index);
        let sampled = self.sampler.sample(continuum, &mut rng)?;
        Ok(self.best_alignment(&sampled)?.observed_agreement())
    }

    fn chance_samples(
        &self,
        continuum: &Continuum,
        indices: Range<usize>,
    ) -> Result<Vec<f64>, GammaError> {
        indices
            .into_par_iter()
            .map(|index| self.chance_sample(continuum, index))
            .collect()
    }

    pub fn compute_gamma(&self, continuum: &Continuum) -> Result<GammaResult, GammaError> {
        self.config.validate()?;
        if continuum.num_annotators() < 2 {
            return Err(GammaError::degenerate(format!(
                "gamma needs at least two annotators, got {}",
                continuum.num_annotators()
            )));
        }
        if let Some(annotators) = &self.config.ground_truth_annotators {
            if let Some(missing) = annotators
                .iter()
                .find(|name| !continuum.contains_annotator(name))
            {
                return Err(GammaError::invalid_input(format!(
                    "ground truth annotator '{missing}' is not part of the continuum"
                )));
            }
        }

        let n_samples = self.config.n_samples;
        let mut samples = self.chance_samples(continuum, 0..n_samples)?;
        tracing::info!(
            n_samples,
            annotators = continuum.num_annotators(),
            units = continuum.num_units(),
            "gamma: initial chance samples drawn"
        );

        if let Some(level) = self.config.precision_level {
            let required = required_samples(&samples, level)?;
            if required > samples.len() {
                tracing::info!(
                    required,
                    drawn = samples.len(),
                    precision_level = level,
                    "gamma: drawing additional chance samples"
                );
                let extra = self.chance_samples(continuum, samples.len()..required)?;
                samples.extend(extra);
            }
        }

        let mean = samples.iter().mean();
        if !(mean > 0.0) {
            return Err(GammaError::degenerate(
                "chance disorder samples have zero mean",
            ));
        }

        let best = self.best_alignment(continuum)?;
        let result = GammaResult {
            best_alignment: best,
            chance_samples: samples,
            pivot_type: self.config.pivot_type,
            n_samples,
            precision_level: self.config.precision_level,
        };
        tracing::info!(
            gamma = result.gamma(),
            observed = result.observed_agreement(),
            expected = result.expected_disagreement(),
            "gamma: computed"
        );
        Ok(result)
    }
}

/// Chance samples needed to estimate the mean chance disorder within a
/// relative error of `precision_level` at 95% confidence.
pub fn required_samples(samples: &[f64], precision_level: f64) -> Result<usize, GammaError> {
    if samples.is_empty() {
        return Err(GammaError::degenerate("no chance samples drawn"));
    }
    let mean = samples.iter().mean();
    if !(mean > 0.0) {
        return Err(GammaError::degenerate(
            "chance disorder samples have zero mean",
        ));
    }
    let variation = samples.iter().population_std_dev() / mean;
    let required = (variation * Z_95 / precision_level).powi(2).ceil();
    Ok(required as usize)
}

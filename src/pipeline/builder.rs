use crate::config::GammaConfig;
use crate::dissimilarity::CombinedDissimilarity;
use crate::error::GammaError;
use crate::pipeline::defaults::{ExactCoverSolver, PivotSampler, StatisticalSampler};
use crate::pipeline::runtime::{GammaEstimator, GammaEstimatorParts};
use crate::pipeline::traits::{BinarySolver, ContinuumSampler, DissimilarityProvider};
use crate::types::SamplerKind;

pub struct GammaEstimatorBuilder {
    config: GammaConfig,
    provider: Option<Box<dyn DissimilarityProvider>>,
    solver: Option<Box<dyn BinarySolver>>,
    sampler: Option<Box<dyn ContinuumSampler>>,
}

impl GammaEstimatorBuilder {
    pub fn new(config: GammaConfig) -> Self {
        Self {
            config,
            provider: None,
            solver: None,
            sampler: None,
        }
    }

    pub fn with_provider(mut self, provider: Box<dyn DissimilarityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_solver(mut self, solver: Box<dyn BinarySolver>) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn with_sampler(mut self, sampler: Box<dyn ContinuumSampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn build(self) -> Result<GammaEstimator, GammaError> {
        self.config.validate()?;

        let provider = self.provider.unwrap_or_else(|| {
            Box::new(CombinedDissimilarity::new(
                self.config.alpha,
                self.config.beta,
                self.config.delta_empty,
            ))
        });
        let sampler: Box<dyn ContinuumSampler> = match self.sampler {
            Some(sampler) => sampler,
            None => match self.config.sampler {
                SamplerKind::Pivot => Box::new(
                    PivotSampler::new(self.config.pivot_type)
                        .with_restriction(self.config.ground_truth_annotators.clone()),
                ),
                SamplerKind::Statistical => Box::new(StatisticalSampler),
            },
        };

        tracing::debug!(
            n_samples = self.config.n_samples,
            batch_size = self.config.batch_size,
            delta_empty = provider.delta_empty(),
            sampler = ?self.config.sampler,
            "builder: gamma estimator assembled"
        );

        Ok(GammaEstimator::from_parts(GammaEstimatorParts {
            provider,
            solver: self
                .solver
                .unwrap_or_else(|| Box::new(ExactCoverSolver)),
            sampler,
            config: self.config,
        }))
    }
}

#[cfg(test)]
mod tests {
    use rand::RngCore;

    use super::*;
    use crate::continuum::Continuum;

    struct ShiftSampler;

    impl ContinuumSampler for ShiftSampler {
        fn sample(
            &self,
            continuum: &Continuum,
            _rng: &mut dyn RngCore,
        ) -> Result<Continuum, GammaError> {
            let mut sampled = Continuum::new();
            for (index, (annotator, unit)) in continuum.iter_units().enumerate() {
                let offset = if index % 2 == 0 { 0.0 } else { 40.0 };
                sampled.add(
                    annotator,
                    unit.segment.start() + offset,
                    unit.segment.end() + offset,
                    unit.label.clone(),
                )?;
            }
            Ok(sampled)
        }
    }

    fn continuum() -> Continuum {
        let mut continuum = Continuum::new();
        continuum.add("a", 0.0, 2.0, Some("x".into())).unwrap();
        continuum.add("b", 0.0, 2.0, Some("x".into())).unwrap();
        continuum
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let config = GammaConfig {
            n_samples: 0,
            ..GammaConfig::default()
        };
        assert!(matches!(
            GammaEstimatorBuilder::new(config).build(),
            Err(GammaError::InvalidInput { .. })
        ));
    }

    #[test]
    fn builder_defaults_follow_config() {
        let estimator = GammaEstimatorBuilder::new(GammaConfig::default())
            .build()
            .unwrap();
        assert_eq!(estimator.config(), &GammaConfig::default());
    }

    #[test]
    fn builder_uses_custom_sampler() {
        let config = GammaConfig {
            n_samples: 3,
            ..GammaConfig::default()
        };
        let estimator = GammaEstimatorBuilder::new(config)
            .with_sampler(Box::new(ShiftSampler))
            .build()
            .unwrap();
        let result = estimator.compute_gamma(&continuum()).unwrap();
        // The shifted pair is pruned, leaving two singletons at delta_empty each.
        assert!(result.chance_samples.iter().all(|&s| (s - 1.0).abs() < 1e-12));
        assert_eq!(result.gamma(), 1.0);
    }
}

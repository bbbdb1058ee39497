use std::collections::BTreeMap;

use rand::distributions::WeightedIndex;
use rand::RngCore;
use rand_distr::{Distribution, Normal};
use statrs::statistics::Statistics;

use crate::continuum::Continuum;
use crate::error::GammaError;
use crate::sampling::pivot::sampled_annotator_name;

const MIN_UNIT_LENGTH: f64 = 1e-6;

/// Mean and standard deviation of one observed quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub mean: f64,
    pub std_dev: f64,
}

impl Moments {
    fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
            };
        }
        let std_dev = values.iter().population_std_dev();
        Self {
            mean: values.iter().mean(),
            std_dev: if std_dev.is_finite() { std_dev } else { 0.0 },
        }
    }

    fn normal(&self) -> Result<Normal<f64>, GammaError> {
        Normal::new(self.mean, self.std_dev)
            .map_err(|e| GammaError::invalid_input(format!("invalid normal distribution: {e}")))
    }
}

/// Pooled unit statistics of a continuum, used to draw unrelated annotations
/// with the same density, duration and label profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuumStatistics {
    pub units_per_annotator: Moments,
    pub gaps: Moments,
    pub lengths: Moments,
    pub labels: Vec<Option<String>>,
    pub label_weights: Vec<f64>,
}

impl ContinuumStatistics {
    pub fn from_continuum(continuum: &Continuum) -> Result<Self, GammaError> {
        if continuum.is_empty() {
            return Err(GammaError::degenerate(
                "cannot learn unit statistics from an empty continuum",
            ));
        }
        let mut counts = Vec::new();
        let mut gaps = Vec::new();
        let mut lengths = Vec::new();
        let mut label_counts: BTreeMap<Option<String>, f64> = BTreeMap::new();

        for (_, track) in continuum.tracks() {
            counts.push(track.len() as f64);
            let mut previous_end = 0.0;
            for unit in track.values() {
                gaps.push(unit.segment.start() - previous_end);
                lengths.push(unit.segment.duration());
                previous_end = unit.segment.end();
                *label_counts.entry(unit.label.clone()).or_default() += 1.0;
            }
        }

        let (labels, label_weights) = label_counts.into_iter().unzip();
        Ok(Self {
            units_per_annotator: Moments::of(&counts),
            gaps: Moments::of(&gaps),
            lengths: Moments::of(&lengths),
            labels,
            label_weights,
        })
    }
}

/// Draws `num_annotators` tracks from the pooled statistics.
pub fn sample_statistical(
    stats: &ContinuumStatistics,
    num_annotators: usize,
    rng: &mut dyn RngCore,
) -> Result<Continuum, GammaError> {
    let count_dist = stats.units_per_annotator.normal()?;
    let gap_dist = stats.gaps.normal()?;
    let length_dist = stats.lengths.normal()?;
    let label_dist = WeightedIndex::new(&stats.label_weights)
        .map_err(|e| GammaError::invalid_input(format!("invalid label weights: {e}")))?;

    let mut sampled = Continuum::new();
    for index in 0..num_annotators {
        let name = sampled_annotator_name(index);
        sampled.add_annotator(&name);
        let num_units = count_dist.sample(rng).round().max(1.0) as usize;
        let mut cursor = 0.0_f64;
        for _ in 0..num_units {
            let start = (cursor + gap_dist.sample(rng)).max(0.0);
            let length = length_dist.sample(rng).abs().max(MIN_UNIT_LENGTH);
            let label = stats.labels[label_dist.sample(rng)].clone();
            sampled.add(&name, start, start + length, label)?;
            cursor = start + length;
        }
    }
    Ok(sampled)
}

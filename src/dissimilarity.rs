//! Default dissimilarity providers.
//!
//! Each provider defines a cost between two (possibly absent) units; the
//! disorder of a candidate tuple is the mean of that cost over every pair of
//! annotator slots. Pairing a unit with nothing costs `delta_empty`, pairing
//! nothing with nothing costs 0.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::alignment::candidates::CandidateBatch;
use crate::pipeline::traits::{DissimilarityProvider, ProviderState};
use crate::types::Unit;

/// Tuples per rayon task when scoring a batch.
const SCORING_CHUNK: usize = 4096;

/// Cost between two units, both present.
pub trait PairDissimilarity: Send + Sync {
    fn delta_empty(&self) -> f64;

    fn between(&self, a: &Unit, b: &Unit) -> f64;

    fn pair(&self, a: Option<&Unit>, b: Option<&Unit>) -> f64 {
        match (a, b) {
            (Some(a), Some(b)) => self.between(a, b),
            (None, None) => 0.0,
            _ => self.delta_empty(),
        }
    }
}

/// Mean pairwise cost of one tuple.
pub fn tuple_disorder<P: PairDissimilarity + ?Sized>(
    pair: &P,
    state: &ProviderState,
    tuple: &[usize],
) -> f64 {
    let width = tuple.len();
    if width < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 0..width {
        let a = state.unit(i, tuple[i]);
        for j in (i + 1)..width {
            total += pair.pair(a, state.unit(j, tuple[j]));
        }
    }
    total / (width * (width - 1) / 2) as f64
}

/// Scores every tuple of `batch` in parallel, preserving order.
pub fn evaluate_pairwise<P: PairDissimilarity + ?Sized>(
    pair: &P,
    state: &ProviderState,
    batch: &CandidateBatch,
) -> Vec<f64> {
    let width = batch.width();
    if width == 0 {
        return Vec::new();
    }
    batch
        .as_flat()
        .par_chunks(width * SCORING_CHUNK)
        .flat_map_iter(|chunk| {
            chunk
                .chunks_exact(width)
                .map(|tuple| tuple_disorder(pair, state, tuple))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// `((|s1 - s2| + |e1 - e2|) / (d1 + d2))^2 * delta_empty`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionalDissimilarity {
    pub delta_empty: f64,
}

impl PositionalDissimilarity {
    pub fn new(delta_empty: f64) -> Self {
        Self { delta_empty }
    }

    fn distance(a: &Unit, b: &Unit) -> f64 {
        let (sa, sb) = (&a.segment, &b.segment);
        let shift = (sa.start() - sb.start()).abs() + (sa.end() - sb.end()).abs();
        let ratio = shift / (sa.duration() + sb.duration());
        ratio * ratio
    }
}

impl Default for PositionalDissimilarity {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PairDissimilarity for PositionalDissimilarity {
    fn delta_empty(&self) -> f64 {
        self.delta_empty
    }

    fn between(&self, a: &Unit, b: &Unit) -> f64 {
        Self::distance(a, b) * self.delta_empty
    }
}

impl DissimilarityProvider for PositionalDissimilarity {
    fn delta_empty(&self) -> f64 {
        self.delta_empty
    }

    fn evaluate(&self, state: &ProviderState, batch: &CandidateBatch) -> Vec<f64> {
        evaluate_pairwise(self, state, batch)
    }
}

/// `delta_empty * distance(label_a, label_b)`; 0 for equal labels and 1
/// otherwise unless overridden.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalDissimilarity {
    pub delta_empty: f64,
    overrides: HashMap<(Option<String>, Option<String>), f64>,
}

impl CategoricalDissimilarity {
    pub fn new(delta_empty: f64) -> Self {
        Self {
            delta_empty,
            overrides: HashMap::new(),
        }
    }

    /// Sets the symmetric label distance, clamped to `[0, 1]`.
    pub fn with_distance(mut self, a: Option<&str>, b: Option<&str>, distance: f64) -> Self {
        let distance = distance.clamp(0.0, 1.0);
        let a = a.map(str::to_string);
        let b = b.map(str::to_string);
        self.overrides.insert((a.clone(), b.clone()), distance);
        self.overrides.insert((b, a), distance);
        self
    }

    fn distance(&self, a: &Unit, b: &Unit) -> f64 {
        if self.overrides.is_empty() {
            return if a.label == b.label { 0.0 } else { 1.0 };
        }
        let key = (a.label.clone(), b.label.clone());
        match self.overrides.get(&key) {
            Some(&distance) => distance,
            None if a.label == b.label => 0.0,
            None => 1.0,
        }
    }
}

impl Default for CategoricalDissimilarity {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PairDissimilarity for CategoricalDissimilarity {
    fn delta_empty(&self) -> f64 {
        self.delta_empty
    }

    fn between(&self, a: &Unit, b: &Unit) -> f64 {
        self.distance(a, b) * self.delta_empty
    }
}

impl DissimilarityProvider for CategoricalDissimilarity {
    fn delta_empty(&self) -> f64 {
        self.delta_empty
    }

    fn evaluate(&self, state: &ProviderState, batch: &CandidateBatch) -> Vec<f64> {
        evaluate_pairwise(self, state, batch)
    }
}

/// `alpha * positional + beta * categorical`, both sharing `delta_empty`.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedDissimilarity {
    pub alpha: f64,
    pub beta: f64,
    positional: PositionalDissimilarity,
    categorical: CategoricalDissimilarity,
}

impl CombinedDissimilarity {
    pub fn new(alpha: f64, beta: f64, delta_empty: f64) -> Self {
        Self {
            alpha,
            beta,
            positional: PositionalDissimilarity::new(delta_empty),
            categorical: CategoricalDissimilarity::new(delta_empty),
        }
    }

    pub fn with_categorical(mut self, categorical: CategoricalDissimilarity) -> Self {
        self.categorical = CategoricalDissimilarity {
            delta_empty: self.positional.delta_empty,
            ..categorical
        };
        self
    }
}

impl Default for CombinedDissimilarity {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

impl PairDissimilarity for CombinedDissimilarity {
    fn delta_empty(&self) -> f64 {
        self.positional.delta_empty
    }

    fn between(&self, a: &Unit, b: &Unit) -> f64 {
        self.alpha * self.positional.between(a, b) + self.beta * self.categorical.between(a, b)
    }
}

impl DissimilarityProvider for CombinedDissimilarity {
    fn delta_empty(&self) -> f64 {
        self.positional.delta_empty
    }

    fn evaluate(&self, state: &ProviderState, batch: &CandidateBatch) -> Vec<f64> {
        evaluate_pairwise(self, state, batch)
    }
}

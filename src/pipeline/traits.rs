use rand::RngCore;

use crate::alignment::candidates::CandidateBatch;
use crate::alignment::solver::PartitionProblem;
use crate::continuum::Continuum;
use crate::error::GammaError;
use crate::types::Unit;

/// Per-continuum data handed to [`DissimilarityProvider::evaluate`].
///
/// `tracks[i]` holds annotator `i`'s units in chronological order, so slot
/// value `j < tracks[i].len()` of a candidate tuple names `tracks[i][j]` and
/// `j == tracks[i].len()` is the null slot.
#[derive(Debug, Clone, Default)]
pub struct ProviderState {
    pub annotators: Vec<String>,
    pub tracks: Vec<Vec<Unit>>,
}

impl ProviderState {
    pub fn from_continuum(continuum: &Continuum) -> Self {
        let mut annotators = Vec::with_capacity(continuum.num_annotators());
        let mut tracks = Vec::with_capacity(continuum.num_annotators());
        for (name, track) in continuum.tracks() {
            annotators.push(name.to_string());
            tracks.push(track.values().cloned().collect());
        }
        Self { annotators, tracks }
    }

    pub fn num_annotators(&self) -> usize {
        self.tracks.len()
    }

    /// Resolves slot `slot` of annotator `annotator`, `None` for the null slot.
    pub fn unit(&self, annotator: usize, slot: usize) -> Option<&Unit> {
        self.tracks.get(annotator).and_then(|track| track.get(slot))
    }
}

/// Scores tuples of (possibly absent) units, one slot per annotator.
pub trait DissimilarityProvider: Send + Sync {
    /// Cost of pairing a unit with nothing. Candidates scoring at least
    /// `num_annotators * delta_empty()` are never part of an optimal alignment.
    fn delta_empty(&self) -> f64;

    fn build_args(&self, continuum: &Continuum) -> ProviderState {
        ProviderState::from_continuum(continuum)
    }

    /// Returns exactly one non-negative disorder per tuple of `batch`.
    fn evaluate(&self, state: &ProviderState, batch: &CandidateBatch) -> Vec<f64>;
}

/// Minimizes `objective · x` over `x ∈ {0,1}^n` subject to `A·x = 1`.
pub trait BinarySolver: Send + Sync {
    /// Returns one (near-)binary value per column, or
    /// [`GammaError::Infeasible`] when no exact partition exists.
    fn solve(&self, problem: &PartitionProblem) -> Result<Vec<f64>, GammaError>;
}

/// Builds a synthetic continuum from the chance null model.
pub trait ContinuumSampler: Send + Sync {
    fn sample(&self, continuum: &Continuum, rng: &mut dyn RngCore)
        -> Result<Continuum, GammaError>;
}

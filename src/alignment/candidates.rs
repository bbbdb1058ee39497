use crate::error::GammaError;
use crate::pipeline::traits::{DissimilarityProvider, ProviderState};

/// A flat run of fixed-width index tuples, one slot per annotator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateBatch {
    width: usize,
    indices: Vec<usize>,
}

impl CandidateBatch {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            indices: Vec::new(),
        }
    }

    pub fn with_capacity(width: usize, tuples: usize) -> Self {
        Self {
            width,
            indices: Vec::with_capacity(width * tuples),
        }
    }

    pub fn push(&mut self, tuple: &[usize]) {
        debug_assert_eq!(tuple.len(), self.width);
        self.indices.extend_from_slice(tuple);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.indices.len() / self.width
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tuple(&self, index: usize) -> &[usize] {
        &self.indices[index * self.width..(index + 1) * self.width]
    }

    pub fn tuples(&self) -> std::slice::ChunksExact<'_, usize> {
        self.indices.chunks_exact(self.width.max(1))
    }

    pub fn as_flat(&self) -> &[usize] {
        &self.indices
    }
}

/// Streams the cartesian product `Π radices[i]` as batches of at most
/// `batch_size` tuples, last annotator varying fastest.
///
/// Slot `radices[i] - 1` is annotator `i`'s null slot. The all-null tuple
/// covers no unit and is never emitted.
#[derive(Debug)]
pub struct ProductBatches {
    radices: Vec<usize>,
    digits: Vec<usize>,
    batch_size: usize,
    exhausted: bool,
}

impl ProductBatches {
    pub fn new(radices: Vec<usize>, batch_size: usize) -> Self {
        let exhausted = radices.is_empty() || radices.contains(&0);
        Self {
            digits: vec![0; radices.len()],
            radices,
            batch_size: batch_size.max(1),
            exhausted,
        }
    }

    /// Number of tuples the stream yields in total, if it fits in a `u128`.
    pub fn total(&self) -> Option<u128> {
        if self.radices.is_empty() {
            return Some(0);
        }
        self.radices
            .iter()
            .try_fold(1u128, |acc, &radix| acc.checked_mul(radix as u128))
            .map(|product| product.saturating_sub(1))
    }

    fn is_all_null(&self) -> bool {
        self.digits
            .iter()
            .zip(&self.radices)
            .all(|(&digit, &radix)| digit + 1 == radix)
    }

    fn advance(&mut self) {
        for pos in (0..self.digits.len()).rev() {
            self.digits[pos] += 1;
            if self.digits[pos] < self.radices[pos] {
                return;
            }
            self.digits[pos] = 0;
        }
        self.exhausted = true;
    }
}

impl Iterator for ProductBatches {
    type Item = CandidateBatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let mut batch = CandidateBatch::with_capacity(self.radices.len(), self.batch_size);
        while !self.exhausted && batch.len() < self.batch_size {
            if self.is_all_null() {
                // Last tuple in odometer order.
                self.exhausted = true;
                break;
            }
            batch.push(&self.digits);
            self.advance();
        }
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

/// Candidates that survived pruning, with their disorders.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    width: usize,
    tuples: Vec<usize>,
    disorders: Vec<f64>,
    track_lengths: Vec<usize>,
    enumerated: u64,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.disorders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disorders.is_empty()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn tuple(&self, index: usize) -> &[usize] {
        &self.tuples[index * self.width..(index + 1) * self.width]
    }

    pub fn disorder(&self, index: usize) -> f64 {
        self.disorders[index]
    }

    pub fn disorders(&self) -> &[f64] {
        &self.disorders
    }

    /// Units per annotator; slot value equal to this length is the null slot.
    pub fn track_lengths(&self) -> &[usize] {
        &self.track_lengths
    }

    /// Tuples scored before pruning.
    pub fn enumerated(&self) -> u64 {
        self.enumerated
    }

    pub fn is_null(&self, annotator: usize, slot: usize) -> bool {
        slot >= self.track_lengths[annotator]
    }
}

/// Scores the full candidate product batch by batch and keeps the tuples that
/// can still belong to an optimal alignment.
#[derive(Debug, Clone)]
pub struct CandidateEnumerator {
    batch_size: usize,
    prune: bool,
}

impl CandidateEnumerator {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            prune: true,
        }
    }

    /// Keeps every scored tuple. Only useful to cross-check the pruning bound.
    pub fn without_pruning(mut self) -> Self {
        self.prune = false;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn enumerate(
        &self,
        state: &ProviderState,
        provider: &dyn DissimilarityProvider,
    ) -> Result<CandidateSet, GammaError> {
        let width = state.num_annotators();
        let track_lengths: Vec<usize> = state.tracks.iter().map(Vec::len).collect();
        let radices: Vec<usize> = track_lengths.iter().map(|len| len + 1).collect();
        let bound = width as f64 * provider.delta_empty();

        let mut set = CandidateSet {
            width,
            track_lengths,
            ..CandidateSet::default()
        };
        for (batch_index, batch) in ProductBatches::new(radices, self.batch_size).enumerate() {
            let disorders = provider.evaluate(state, &batch);
            if disorders.len() != batch.len() {
                return Err(GammaError::invalid_input(format!(
                    "dissimilarity provider returned {} disorders for {} candidates",
                    disorders.len(),
                    batch.len()
                )));
            }

            let before = set.len();
            for (tuple, disorder) in batch.tuples().zip(disorders) {
                if !disorder.is_finite() || disorder < 0.0 {
                    return Err(GammaError::invalid_input(format!(
                        "dissimilarity provider returned invalid disorder {disorder} for {tuple:?}"
                    )));
                }
                if self.prune && disorder >= bound {
                    continue;
                }
                set.tuples.extend_from_slice(tuple);
                set.disorders.push(disorder);
            }
            set.enumerated += batch.len() as u64;

            tracing::debug!(
                batch = batch_index,
                tuples = batch.len(),
                survivors = set.len() - before,
                "candidates: scored batch"
            );
        }

        tracing::debug!(
            enumerated = set.enumerated,
            kept = set.len(),
            prune_bound = bound,
            "candidates: enumeration complete"
        );
        Ok(set)
    }
}

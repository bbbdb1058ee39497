pub mod candidates;
pub mod solver;

use serde::Serialize;

use crate::continuum::Continuum;
use crate::error::GammaError;
use crate::pipeline::traits::{BinarySolver, DissimilarityProvider};
use crate::types::Unit;

use candidates::CandidateEnumerator;
use solver::{check_partition, select_columns, PartitionProblem};

/// One chosen candidate: at most one unit per annotator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitaryAlignment {
    pub members: Vec<(String, Option<Unit>)>,
    pub disorder: f64,
}

impl UnitaryAlignment {
    pub fn num_units(&self) -> usize {
        self.members.iter().filter(|(_, unit)| unit.is_some()).count()
    }
}

/// Minimum-disorder partition of a continuum's units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alignment {
    unitary_alignments: Vec<UnitaryAlignment>,
    total_disorder: f64,
    generation: u64,
}

impl Alignment {
    pub fn unitary_alignments(&self) -> &[UnitaryAlignment] {
        &self.unitary_alignments
    }

    pub fn len(&self) -> usize {
        self.unitary_alignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unitary_alignments.is_empty()
    }

    pub fn total_disorder(&self) -> f64 {
        self.total_disorder
    }

    /// Mean disorder per unitary alignment; 0 when nothing was aligned.
    pub fn observed_agreement(&self) -> f64 {
        if self.unitary_alignments.is_empty() {
            0.0
        } else {
            self.total_disorder / self.unitary_alignments.len() as f64
        }
    }

    /// Continuum generation this alignment was computed against.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ensure_current(&self, continuum: &Continuum) -> Result<(), GammaError> {
        if continuum.generation() != self.generation {
            return Err(GammaError::StaleAlignment {
                expected: self.generation,
                actual: continuum.generation(),
            });
        }
        Ok(())
    }
}

/// Enumerates, prunes and exactly solves for the best alignment of `continuum`.
pub fn best_alignment(
    continuum: &Continuum,
    provider: &dyn DissimilarityProvider,
    solver: &dyn BinarySolver,
    enumerator: &CandidateEnumerator,
) -> Result<Alignment, GammaError> {
    let state = provider.build_args(continuum);
    let candidates = enumerator.enumerate(&state, provider)?;
    let problem = PartitionProblem::from_candidates(&candidates);

    let values = solver.solve(&problem)?;
    if values.len() != problem.num_variables() {
        return Err(GammaError::invalid_input(format!(
            "solver returned {} values for {} candidates",
            values.len(),
            problem.num_variables()
        )));
    }
    let selected = select_columns(&values);
    check_partition(&problem.constraints, &selected)?;

    let unitary_alignments: Vec<UnitaryAlignment> = selected
        .iter()
        .map(|&col| UnitaryAlignment {
            members: candidates
                .tuple(col)
                .iter()
                .enumerate()
                .map(|(annotator, &slot)| {
                    (
                        state.annotators[annotator].clone(),
                        state.unit(annotator, slot).cloned(),
                    )
                })
                .collect(),
            disorder: candidates.disorder(col),
        })
        .collect();
    let total_disorder = unitary_alignments.iter().map(|u| u.disorder).sum();

    tracing::debug!(
        units = continuum.num_units(),
        candidates = candidates.len(),
        chosen = unitary_alignments.len(),
        total_disorder,
        "alignment: best alignment found"
    );

    Ok(Alignment {
        unitary_alignments,
        total_disorder,
        generation: continuum.generation(),
    })
}

use gamma_agreement::alignment::candidates::{CandidateBatch, CandidateEnumerator};
use gamma_agreement::pipeline::defaults::ExactCoverSolver;
use gamma_agreement::sampling::{sample_pivoted, sample_rng};
use gamma_agreement::{
    best_alignment, read_delimited, write_delimited, CombinedDissimilarity, Continuum,
    DissimilarityProvider, GammaConfig, GammaEstimatorBuilder, PivotType, ProviderState,
};
use proptest::prelude::*;
use rand::Rng;
use statrs::statistics::Statistics;
use std::time::{Duration, Instant};

fn build_continuum(tracks: &[Vec<(u8, u8, bool)>]) -> Continuum {
    let mut continuum = Continuum::new();
    for (index, units) in tracks.iter().enumerate() {
        let annotator = format!("annotator_{index}");
        continuum.add_annotator(&annotator);
        for &(start, len, alt) in units {
            let label = if alt { "y" } else { "x" };
            continuum
                .add(
                    &annotator,
                    f64::from(start),
                    f64::from(start) + f64::from(len),
                    Some(label.to_string()),
                )
                .unwrap();
        }
    }
    continuum
}

fn tracks_strategy() -> impl Strategy<Value = Vec<Vec<(u8, u8, bool)>>> {
    prop::collection::vec(
        prop::collection::vec((0u8..30, 1u8..6, any::<bool>()), 0..=3),
        2..=3,
    )
}

fn reference_continuum() -> Continuum {
    let mut continuum = Continuum::new();
    for (annotator, offset) in [("a", 0.0), ("b", 0.5), ("c", -0.25)] {
        for (start, end, label) in [
            (2.0, 5.0, "x"),
            (7.0, 9.0, "y"),
            (12.0, 16.0, "x"),
            (20.0, 21.0, "z"),
            (25.0, 30.0, "y"),
        ] {
            continuum
                .add(annotator, start + offset, end + offset, Some(label.to_string()))
                .unwrap();
        }
    }
    continuum
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn best_alignment_partitions_every_unit(tracks in tracks_strategy()) {
        let continuum = build_continuum(&tracks);
        let alignment = best_alignment(
            &continuum,
            &CombinedDissimilarity::default(),
            &ExactCoverSolver,
            &CandidateEnumerator::new(16),
        )
        .unwrap();

        let mut aligned: Vec<(String, f64, f64)> = alignment
            .unitary_alignments()
            .iter()
            .flat_map(|unitary| unitary.members.iter())
            .filter_map(|(annotator, unit)| {
                unit.as_ref()
                    .map(|u| (annotator.clone(), u.segment.start(), u.segment.end()))
            })
            .collect();
        aligned.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mut expected: Vec<(String, f64, f64)> = continuum
            .iter_units()
            .map(|(annotator, u)| (annotator.to_string(), u.segment.start(), u.segment.end()))
            .collect();
        expected.sort_by(|a, b| a.partial_cmp(b).unwrap());
        prop_assert_eq!(aligned, expected);
    }

    #[test]
    fn pruning_keeps_the_optimum(tracks in tracks_strategy()) {
        let continuum = build_continuum(&tracks);
        let provider = CombinedDissimilarity::default();
        let pruned = best_alignment(
            &continuum,
            &provider,
            &ExactCoverSolver,
            &CandidateEnumerator::new(8),
        )
        .unwrap();
        let full = best_alignment(
            &continuum,
            &provider,
            &ExactCoverSolver,
            &CandidateEnumerator::new(8).without_pruning(),
        )
        .unwrap();
        prop_assert!((pruned.total_disorder() - full.total_disorder()).abs() < 1e-9);
    }

    #[test]
    fn int_pivot_keeps_integer_bounds(tracks in tracks_strategy(), seed in any::<u64>()) {
        let continuum = build_continuum(&tracks);
        prop_assume!(!continuum.is_empty());
        let eligible: Vec<String> = continuum.annotators().map(str::to_string).collect();
        let sampled =
            sample_pivoted(&continuum, PivotType::Int, &eligible, &mut sample_rng(seed, 0))
                .unwrap();
        prop_assert_eq!(sampled.num_annotators(), continuum.num_annotators());
        for (_, unit) in sampled.iter_units() {
            prop_assert_eq!(unit.segment.start().fract(), 0.0);
            prop_assert_eq!(unit.segment.end().fract(), 0.0);
        }
    }

    #[test]
    fn float_pivot_moves_every_unit_by_one_offset(
        source in prop::collection::btree_map(1u8..12, 0u8..30, 1..=5),
        others in 1usize..=3,
        seed in any::<u64>(),
    ) {
        // Distinct lengths keep shifted units from landing on one segment.
        let mut continuum = Continuum::new();
        for (&len, &start) in &source {
            let start = f64::from(start);
            continuum
                .add("source", start, start + f64::from(len), Some(format!("unit_{len}")))
                .unwrap();
        }
        for index in 0..others {
            continuum
                .add(&format!("other_{index}"), 0.0, 1.0, Some("filler".to_string()))
                .unwrap();
        }
        let originals = continuum.track("source").unwrap();
        let eligible = vec!["source".to_string()];
        let sampled =
            sample_pivoted(&continuum, PivotType::Float, &eligible, &mut sample_rng(seed, 1))
                .unwrap();
        prop_assert_eq!(sampled.num_annotators(), continuum.num_annotators());

        let mut magnitude: Option<f64> = None;
        for (_, track) in sampled.tracks() {
            prop_assert_eq!(track.len(), originals.len());
            for unit in track.values() {
                let original = originals
                    .values()
                    .find(|candidate| candidate.label == unit.label)
                    .unwrap();
                prop_assert!(
                    (unit.segment.duration() - original.segment.duration()).abs() < 1e-9
                );
                let shift = unit.segment.start() - original.segment.start();
                let expected = *magnitude.get_or_insert(shift.abs());
                prop_assert!((shift.abs() - expected).abs() < 1e-9);
                if shift < 0.0 {
                    prop_assert!(original.segment.start() > expected - 1e-9);
                }
            }
        }
    }
}

#[test]
fn identical_annotators_reach_full_agreement() {
    let mut continuum = Continuum::new();
    for annotator in ["a", "b", "c"] {
        for (start, end, label) in [(0.0, 3.0, "x"), (5.0, 6.0, "y"), (9.0, 14.0, "x")] {
            continuum
                .add(annotator, start, end, Some(label.to_string()))
                .unwrap();
        }
    }
    let config = GammaConfig {
        n_samples: 10,
        ..GammaConfig::default()
    };
    let result = GammaEstimatorBuilder::new(config)
        .build()
        .unwrap()
        .compute_gamma(&continuum)
        .unwrap();
    assert_eq!(result.observed_agreement(), 0.0);
    assert!(result.expected_disagreement() > 0.0);
    assert_eq!(result.gamma(), 1.0);
}

/// Units never pair: any tuple holding two units costs far more than leaving
/// both alone, and a lone unit costs nothing.
struct NeverPair;

impl DissimilarityProvider for NeverPair {
    fn delta_empty(&self) -> f64 {
        1.0
    }

    fn evaluate(&self, state: &ProviderState, batch: &CandidateBatch) -> Vec<f64> {
        batch
            .tuples()
            .map(|tuple| {
                let present = tuple
                    .iter()
                    .enumerate()
                    .filter(|&(annotator, &slot)| state.unit(annotator, slot).is_some())
                    .count();
                if present >= 2 {
                    100.0
                } else {
                    0.0
                }
            })
            .collect()
    }
}

#[test]
fn disjoint_units_stay_singletons() {
    let mut continuum = Continuum::new();
    continuum.add("a", 0.0, 1.0, Some("x".to_string())).unwrap();
    continuum.add("b", 10.0, 11.0, Some("x".to_string())).unwrap();
    let alignment = best_alignment(
        &continuum,
        &NeverPair,
        &ExactCoverSolver,
        &CandidateEnumerator::new(4),
    )
    .unwrap();
    assert_eq!(alignment.len(), 2);
    assert!(alignment
        .unitary_alignments()
        .iter()
        .all(|unitary| unitary.num_units() == 1));
    assert_eq!(alignment.total_disorder(), 0.0);
    assert_eq!(alignment.observed_agreement(), 0.0);
}

#[test]
fn precision_level_draws_required_samples() {
    let continuum = reference_continuum();
    let base = GammaConfig {
        n_samples: 10,
        seed: 2024,
        ..GammaConfig::default()
    };
    let first = GammaEstimatorBuilder::new(base.clone())
        .build()
        .unwrap()
        .compute_gamma(&continuum)
        .unwrap();
    let samples = &first.chance_samples;
    assert_eq!(samples.len(), 10);
    let cv = samples.iter().population_std_dev() / samples.iter().mean();
    assert!(cv > 0.0, "chance samples should vary");

    // (cv * 1.96 / p)^2 = 39.5 rounds up to 40 samples.
    let precision = cv * 1.96 / 39.5f64.sqrt();
    let config = GammaConfig {
        precision_level: Some(precision),
        ..base
    };
    let second = GammaEstimatorBuilder::new(config)
        .build()
        .unwrap()
        .compute_gamma(&continuum)
        .unwrap();
    assert_eq!(second.chance_samples.len(), 40);
    assert_eq!(&second.chance_samples[..10], &samples[..]);
    assert_eq!(second.n_samples, 10);
}

#[test]
fn delimited_file_round_trip() {
    let continuum = reference_continuum();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write_delimited(&continuum, file.as_file_mut()).unwrap();
    let reader = std::io::BufReader::new(file.reopen().unwrap());
    let back = read_delimited(reader).unwrap();
    assert_eq!(back.num_annotators(), continuum.num_annotators());
    assert_eq!(back.num_units(), continuum.num_units());
    assert_eq!(back.categories(), continuum.categories());
}

/// Three annotators with forty jittered units each, close to the size of a
/// short annotated recording.
fn jittered_continuum(units_per_annotator: usize) -> Continuum {
    let mut rng = sample_rng(99, 0);
    let mut continuum = Continuum::new();
    for annotator in ["a", "b", "c"] {
        for index in 0..units_per_annotator {
            let anchor = index as f64 * 10.0;
            let start = anchor + rng.gen_range(-1.0..1.0);
            let end = start + rng.gen_range(3.0..7.0);
            let label = ["x", "y", "z"][index % 3];
            continuum
                .add(annotator, start, end, Some(label.to_string()))
                .unwrap();
        }
    }
    continuum
}

#[test]
fn forty_units_per_annotator_finish_promptly() {
    let continuum = jittered_continuum(40);
    let config = GammaConfig {
        n_samples: 8,
        seed: 5,
        ..GammaConfig::default()
    };
    let estimator = GammaEstimatorBuilder::new(config).build().unwrap();

    let started = Instant::now();
    let alignment = estimator.best_alignment(&continuum).unwrap();
    let result = estimator.compute_gamma(&continuum).unwrap();
    let elapsed = started.elapsed();

    let aligned: usize = alignment
        .unitary_alignments()
        .iter()
        .map(|unitary| unitary.num_units())
        .sum();
    assert_eq!(aligned, continuum.num_units());
    assert_eq!(result.chance_samples.len(), 8);
    assert!(result.gamma() > 0.0);
    assert!(
        elapsed < Duration::from_secs(60),
        "gamma over 3x40 units took {elapsed:?}"
    );
}

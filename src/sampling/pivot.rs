use rand::{Rng, RngCore};

use crate::continuum::Continuum;
use crate::error::GammaError;
use crate::types::PivotType;

pub(crate) fn sampled_annotator_name(index: usize) -> String {
    format!("sampled_{index}")
}

/// Draws the pivot between the mean unit length and the latest unit start.
pub fn draw_pivot(
    continuum: &Continuum,
    pivot_type: PivotType,
    rng: &mut dyn RngCore,
) -> Result<f64, GammaError> {
    let last_start = continuum
        .last_start()
        .ok_or_else(|| GammaError::degenerate("cannot pivot an empty continuum"))?;
    let avg_len = continuum.avg_unit_length();
    let (low, high) = if avg_len <= last_start {
        (avg_len, last_start)
    } else {
        (last_start, avg_len)
    };

    let pivot = match pivot_type {
        PivotType::Float => {
            if high > low {
                rng.gen_range(low..=high)
            } else {
                low
            }
        }
        PivotType::Int => {
            let floor = low.floor() as i64;
            let ceil = high.ceil() as i64;
            if ceil > floor {
                rng.gen_range(floor..ceil) as f64
            } else {
                floor as f64
            }
        }
    };
    Ok(pivot)
}

/// Builds `num_annotators` synthetic tracks, each a pivoted copy of a real
/// track drawn uniformly from `eligible`.
///
/// Units starting after the pivot move left by `pivot`, the others move right
/// by `pivot`. Labels and durations are kept.
pub fn sample_pivoted(
    continuum: &Continuum,
    pivot_type: PivotType,
    eligible: &[String],
    rng: &mut dyn RngCore,
) -> Result<Continuum, GammaError> {
    if eligible.is_empty() {
        return Err(GammaError::invalid_input(
            "pivot sampling needs at least one eligible annotator",
        ));
    }
    if let Some(missing) = eligible.iter().find(|name| !continuum.contains_annotator(name)) {
        return Err(GammaError::invalid_input(format!(
            "annotator '{missing}' is not part of the continuum"
        )));
    }

    let pivot = draw_pivot(continuum, pivot_type, rng)?;
    let mut sampled = Continuum::new();
    for index in 0..continuum.num_annotators() {
        let source = &eligible[rng.gen_range(0..eligible.len())];
        let name = sampled_annotator_name(index);
        sampled.add_annotator(&name);
        let Some(track) = continuum.track(source) else {
            continue;
        };
        for unit in track.values() {
            let offset = if pivot < unit.segment.start() {
                -pivot
            } else {
                pivot
            };
            sampled.add_segment(&name, unit.segment.shifted(offset)?, unit.label.clone());
        }
    }

    tracing::trace!(pivot, tracks = sampled.num_annotators(), "sampling: pivoted continuum");
    Ok(sampled)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn integer_continuum() -> Continuum {
        let mut continuum = Continuum::new();
        for (annotator, bounds) in [
            ("a", [(0.0, 4.0), (10.0, 13.0), (25.0, 31.0)]),
            ("b", [(1.0, 5.0), (12.0, 14.0), (40.0, 47.0)]),
            ("c", [(2.0, 3.0), (20.0, 22.0), (33.0, 35.0)]),
        ] {
            for (start, end) in bounds {
                continuum
                    .add(annotator, start, end, Some(annotator.to_uppercase()))
                    .unwrap();
            }
        }
        continuum
    }

    #[test]
    fn float_pivot_lies_in_range() {
        let continuum = integer_continuum();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            let pivot = draw_pivot(&continuum, PivotType::Float, &mut rng).unwrap();
            assert!(pivot >= continuum.avg_unit_length());
            assert!(pivot <= 40.0);
        }
    }

    #[test]
    fn int_pivot_is_integral() {
        let continuum = integer_continuum();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for _ in 0..100 {
            let pivot = draw_pivot(&continuum, PivotType::Int, &mut rng).unwrap();
            assert_eq!(pivot.fract(), 0.0);
        }
    }

    #[test]
    fn sampled_continuum_has_one_track_per_annotator() {
        let continuum = integer_continuum();
        let eligible: Vec<String> = continuum.annotators().map(str::to_string).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let sampled = sample_pivoted(&continuum, PivotType::Float, &eligible, &mut rng).unwrap();
        assert_eq!(sampled.num_annotators(), 3);
        let names: Vec<&str> = sampled.annotators().collect();
        assert_eq!(names, vec!["sampled_0", "sampled_1", "sampled_2"]);
        for (_, track) in sampled.tracks() {
            assert_eq!(track.len(), 3);
        }
    }

    #[test]
    fn restriction_limits_source_tracks() {
        let continuum = integer_continuum();
        let eligible = vec!["b".to_string()];
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let sampled = sample_pivoted(&continuum, PivotType::Float, &eligible, &mut rng).unwrap();
        assert_eq!(sampled.num_annotators(), 3);
        for (_, unit) in sampled.iter_units() {
            assert_eq!(unit.label.as_deref(), Some("B"));
        }
    }

    #[test]
    fn unknown_annotator_is_rejected() {
        let continuum = integer_continuum();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let result = sample_pivoted(
            &continuum,
            PivotType::Float,
            &["zed".to_string()],
            &mut rng,
        );
        assert!(matches!(result, Err(GammaError::InvalidInput { .. })));
    }

    #[test]
    fn empty_continuum_cannot_be_pivoted() {
        let mut continuum = Continuum::new();
        continuum.add_annotator("a");
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        assert!(matches!(
            draw_pivot(&continuum, PivotType::Float, &mut rng),
            Err(GammaError::Degenerate { .. })
        ));
    }
}

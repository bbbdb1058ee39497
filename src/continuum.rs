use std::collections::{BTreeMap, BTreeSet};

use crate::error::GammaError;
use crate::types::{Segment, Unit};

/// One annotator's units, ordered by `(start, end)`.
pub type Track = BTreeMap<Segment, Unit>;

/// All annotators' units for one annotated resource.
///
/// Every mutation bumps [`Continuum::generation`], which alignments record so a
/// result computed before a later `add` can be detected as stale.
#[derive(Debug, Clone, Default)]
pub struct Continuum {
    tracks: BTreeMap<String, Track>,
    generation: u64,
}

impl Continuum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an annotator with no units. No-op if it already exists.
    pub fn add_annotator(&mut self, annotator: &str) {
        if !self.tracks.contains_key(annotator) {
            self.tracks.insert(annotator.to_string(), Track::new());
            self.generation += 1;
        }
    }

    /// Adds a unit, failing with [`GammaError::InvalidSegment`] unless `end > start`.
    pub fn add(
        &mut self,
        annotator: &str,
        start: f64,
        end: f64,
        label: Option<String>,
    ) -> Result<(), GammaError> {
        let segment = Segment::new(start, end)?;
        self.add_segment(annotator, segment, label);
        Ok(())
    }

    /// Adds a unit for an already validated segment. Returns `false` when the
    /// annotator already has a unit on exactly this segment.
    pub fn add_segment(&mut self, annotator: &str, segment: Segment, label: Option<String>) -> bool {
        let track = self.tracks.entry(annotator.to_string()).or_default();
        if track.contains_key(&segment) {
            tracing::debug!(
                annotator,
                start = segment.start(),
                end = segment.end(),
                "continuum: duplicate segment ignored"
            );
            return false;
        }
        track.insert(segment, Unit::new(segment, label));
        self.generation += 1;
        true
    }

    /// Adds every `(start, end, label)` record to `annotator`'s track.
    pub fn import_annotator<I>(&mut self, annotator: &str, records: I) -> Result<(), GammaError>
    where
        I: IntoIterator<Item = (f64, f64, Option<String>)>,
    {
        self.add_annotator(annotator);
        for (start, end, label) in records {
            self.add(annotator, start, end, label)?;
        }
        Ok(())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn num_annotators(&self) -> usize {
        self.tracks.len()
    }

    pub fn num_units(&self) -> usize {
        self.tracks.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_units() == 0
    }

    pub fn annotators(&self) -> impl Iterator<Item = &str> + '_ {
        self.tracks.keys().map(String::as_str)
    }

    pub fn tracks(&self) -> impl Iterator<Item = (&str, &Track)> + '_ {
        self.tracks.iter().map(|(name, track)| (name.as_str(), track))
    }

    pub fn track(&self, annotator: &str) -> Option<&Track> {
        self.tracks.get(annotator)
    }

    pub fn contains_annotator(&self, annotator: &str) -> bool {
        self.tracks.contains_key(annotator)
    }

    /// Annotator-major, then chronological.
    pub fn iter_units(&self) -> impl Iterator<Item = (&str, &Unit)> + '_ {
        self.tracks
            .iter()
            .flat_map(|(name, track)| track.values().map(move |unit| (name.as_str(), unit)))
    }

    pub fn categories(&self) -> BTreeSet<String> {
        self.iter_units()
            .filter_map(|(_, unit)| unit.label.clone())
            .collect()
    }

    /// Mean unit duration, 0 for an empty continuum.
    pub fn avg_unit_length(&self) -> f64 {
        let num_units = self.num_units();
        if num_units == 0 {
            return 0.0;
        }
        let total: f64 = self
            .iter_units()
            .map(|(_, unit)| unit.segment.duration())
            .sum();
        total / num_units as f64
    }

    pub fn last_start(&self) -> Option<f64> {
        self.iter_units()
            .map(|(_, unit)| unit.segment.start())
            .reduce(f64::max)
    }

    /// Earliest start and latest end over all units.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let first = self
            .iter_units()
            .map(|(_, unit)| unit.segment.start())
            .reduce(f64::min)?;
        let last = self
            .iter_units()
            .map(|(_, unit)| unit.segment.end())
            .reduce(f64::max)?;
        Some((first, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_continuum() -> Continuum {
        let mut continuum = Continuum::new();
        continuum.add("bob", 5.0, 7.0, Some("b".into())).unwrap();
        continuum.add("alice", 3.0, 4.0, Some("a".into())).unwrap();
        continuum.add("alice", 1.0, 2.0, Some("b".into())).unwrap();
        continuum.add("bob", 0.0, 1.0, None).unwrap();
        continuum
    }

    #[test]
    fn counts_and_categories() {
        let continuum = sample_continuum();
        assert_eq!(continuum.num_annotators(), 2);
        assert_eq!(continuum.num_units(), 4);
        let categories: Vec<_> = continuum.categories().into_iter().collect();
        assert_eq!(categories, vec!["a".to_string(), "b".to_string()]);
        assert!((continuum.avg_unit_length() - 1.25).abs() < 1e-12);
    }

    #[test]
    fn iteration_is_annotator_major_then_chronological() {
        let continuum = sample_continuum();
        let order: Vec<(&str, f64)> = continuum
            .iter_units()
            .map(|(name, unit)| (name, unit.segment.start()))
            .collect();
        assert_eq!(
            order,
            vec![("alice", 1.0), ("alice", 3.0), ("bob", 0.0), ("bob", 5.0)]
        );
        // Restartable: a second pass yields the same sequence.
        assert_eq!(continuum.iter_units().count(), 4);
    }

    #[test]
    fn duplicate_segment_keeps_first_label() {
        let mut continuum = Continuum::new();
        continuum.add("a", 0.0, 1.0, Some("x".into())).unwrap();
        let generation = continuum.generation();
        continuum.add("a", 0.0, 1.0, Some("y".into())).unwrap();
        assert_eq!(continuum.num_units(), 1);
        assert_eq!(continuum.generation(), generation);
        let unit = continuum.iter_units().next().unwrap().1;
        assert_eq!(unit.label.as_deref(), Some("x"));
    }

    #[test]
    fn signed_zero_bounds_are_one_segment() {
        let mut continuum = Continuum::new();
        continuum.add("a", -0.0, 1.0, None).unwrap();
        continuum.add("a", 0.0, 1.0, None).unwrap();
        assert_eq!(continuum.num_units(), 1);
    }

    #[test]
    fn mutation_bumps_generation() {
        let mut continuum = Continuum::new();
        assert_eq!(continuum.generation(), 0);
        continuum.add_annotator("a");
        continuum.add_annotator("a");
        assert_eq!(continuum.generation(), 1);
        continuum.add("a", 0.0, 1.0, None).unwrap();
        assert_eq!(continuum.generation(), 2);
    }

    #[test]
    fn import_annotator_registers_empty_track() {
        let mut continuum = Continuum::new();
        continuum.import_annotator("empty", Vec::new()).unwrap();
        continuum
            .import_annotator(
                "full",
                vec![(0.0, 1.0, None), (2.0, 3.0, Some("z".into()))],
            )
            .unwrap();
        assert_eq!(continuum.num_annotators(), 2);
        assert_eq!(continuum.track("empty").map(BTreeMap::len), Some(0));
        assert_eq!(continuum.num_units(), 2);
    }

    #[test]
    fn add_rejects_empty_segment() {
        let mut continuum = Continuum::new();
        let result = continuum.add("a", 4.0, 4.0, None);
        assert!(matches!(result, Err(GammaError::InvalidSegment { .. })));
        assert_eq!(continuum.num_units(), 0);
        assert_eq!(continuum.num_annotators(), 0);
    }

    #[test]
    fn bounds_and_last_start() {
        let continuum = sample_continuum();
        assert_eq!(continuum.bounds(), Some((0.0, 7.0)));
        assert_eq!(continuum.last_start(), Some(5.0));
        assert_eq!(Continuum::new().bounds(), None);
        assert_eq!(Continuum::new().avg_unit_length(), 0.0);
    }
}

use std::path::Path;

use gamma_agreement::Continuum;
use textgrid::{TextGrid, TierType};

/// Each interval tier becomes one annotator; empty intervals are gaps.
pub fn load_continuum(path: &Path) -> Result<Continuum, String> {
    let textgrid = TextGrid::from_file(path).map_err(|err| {
        format!(
            "textgrid crate parse failed for '{}': {err}",
            path.display()
        )
    })?;

    let mut continuum = Continuum::new();
    for tier in textgrid
        .tiers
        .iter()
        .filter(|tier| tier.tier_type == TierType::IntervalTier)
    {
        let records = tier.intervals.iter().filter_map(|interval| {
            let text = interval.text.trim();
            (!text.is_empty()).then(|| (interval.xmin, interval.xmax, Some(text.to_string())))
        });
        continuum.import_annotator(&tier.name, records).map_err(|err| {
            format!(
                "invalid interval in tier '{}' of '{}': {err}",
                tier.name,
                path.display()
            )
        })?;
    }
    if continuum.num_annotators() == 0 {
        return Err(format!(
            "'{}' has no interval tiers to use as annotators",
            path.display()
        ));
    }
    Ok(continuum)
}

//! Latest-value resolution for long-form indicator observations.
//!
//! One resolver, parameterized by indicator code. For every entity that has at
//! least one observation of that indicator it keeps the row with the highest
//! year among rows with a value. Entities whose observations are all null
//! still get an entry, with value and year both absent.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::debug;

use crate::domain::{IndicatorCodes, IndicatorKind, IndicatorObservation, ResolvedIndicator, ResolvedSet, ResolvedTable};

/// Resolve the latest non-null value per entity for `indicator_code`.
///
/// Observations of other indicators are ignored. Ties on year keep the first
/// row seen.
pub fn resolve(observations: &[IndicatorObservation], indicator_code: &str) -> ResolvedTable {
    let mut out: ResolvedTable = HashMap::new();

    for obs in observations.iter().filter(|o| o.indicator == indicator_code) {
        let entry = out.entry(obs.entity.clone()).or_insert_with(|| ResolvedIndicator {
            entity: obs.entity.clone(),
            indicator: indicator_code.to_string(),
            value: None,
            year: None,
        });

        let Some(value) = obs.value.filter(|v| v.is_finite()) else {
            continue;
        };

        let newer = match entry.year {
            None => true,
            Some(year) => obs.year > year,
        };
        if newer {
            entry.value = Some(value);
            entry.year = Some(obs.year);
        }
    }

    debug!(
        indicator = indicator_code,
        entities = out.len(),
        resolved = out.values().filter(|r| r.value.is_some()).count(),
        "resolved indicator"
    );

    out
}

/// Run [`resolve`] once per configured indicator code.
///
/// Each call is a pure function over the same input slice, so the four
/// resolutions run in parallel.
pub fn resolve_all(observations: &[IndicatorObservation], codes: &IndicatorCodes) -> ResolvedSet {
    IndicatorKind::ALL
        .par_iter()
        .map(|&kind| {
            let code = codes.code(kind);
            (code.to_string(), resolve(observations, code))
        })
        .collect()
}

//! Left join of the country reference table with resolved indicators and the
//! optional capital table.
//!
//! Every reference row yields exactly one merged row, in input order. Missing
//! indicators stay absent; they are never defaulted to zero.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::domain::{CapitalRecord, CountryRecord, IndicatorCodes, IndicatorKind, IndicatorValue, MergedRecord, ResolvedSet};

/// Merge reference countries with resolved indicators and capital overrides.
///
/// Capital rows override the reference `capital`/`lat`/`lon` field by field,
/// only where the capital row carries a value. An empty or absent capital
/// table leaves the reference values untouched.
pub fn merge(
    countries: &[CountryRecord],
    resolved: &ResolvedSet,
    capitals: Option<&[CapitalRecord]>,
    codes: &IndicatorCodes,
) -> Vec<MergedRecord> {
    let capital_index: HashMap<&str, &CapitalRecord> = capitals
        .unwrap_or_default()
        .iter()
        .fold(HashMap::new(), |mut index, row| {
            // First row per key wins, matching the reference-table authority rule.
            index.entry(row.iso3.as_str()).or_insert(row);
            index
        });

    if capitals.is_none_or(|rows| rows.is_empty()) {
        debug!("no capital enrichment; keeping reference capitals and coordinates");
    }

    let mut overridden = 0usize;
    let out: Vec<MergedRecord> = countries
        .iter()
        .map(|country| {
            let mut record = MergedRecord {
                iso3: country.iso3.clone(),
                country: country.country.clone(),
                region: country.region.clone(),
                subregion: country.subregion.clone(),
                capital: country.capital.clone(),
                lat: country.lat,
                lon: country.lon,
                population_x: country.population_x,
                ..MergedRecord::default()
            };

            for (kind, code) in codes.iter() {
                *record.indicator_mut(kind) = resolved
                    .get(code)
                    .and_then(|table| table.get(&country.iso3))
                    .map(IndicatorValue::from)
                    .unwrap_or_default();
            }

            if let Some(cap) = capital_index.get(country.iso3.as_str()) {
                overridden += 1;
                if let Some(name) = cap.capital.as_deref().filter(|s| !s.trim().is_empty()) {
                    record.capital = Some(name.to_string());
                }
                if cap.lat.is_some() {
                    record.lat = cap.lat;
                }
                if cap.lon.is_some() {
                    record.lon = cap.lon;
                }
            }

            record
        })
        .collect();

    debug!(rows = out.len(), capital_overrides = overridden, "merged reference table");
    out
}

/// Reference iso3 codes that matched no observation for the given indicator,
/// grouped by indicator, in reference order.
pub fn unmatched_entities(
    countries: &[CountryRecord],
    resolved: &ResolvedSet,
    codes: &IndicatorCodes,
) -> Vec<(IndicatorKind, Vec<String>)> {
    codes
        .iter()
        .map(|(kind, code)| {
            let table = resolved.get(code);
            let missing: Vec<String> = countries
                .iter()
                .filter(|c| {
                    table
                        .and_then(|t| t.get(&c.iso3))
                        .is_none_or(|r| r.value.is_none())
                })
                .map(|c| c.iso3.clone())
                .collect();
            (kind, missing)
        })
        .collect()
}

/// Log unmatched keys per indicator. Unmatched keys are data, not errors.
pub fn log_unmatched(unmatched: &[(IndicatorKind, Vec<String>)]) {
    for (kind, keys) in unmatched {
        if keys.is_empty() {
            continue;
        }
        let preview: Vec<&str> = keys.iter().take(10).map(String::as_str).collect();
        warn!(
            indicator = kind.name(),
            count = keys.len(),
            sample = %preview.join(","),
            "reference countries without a resolved value"
        );
    }
}

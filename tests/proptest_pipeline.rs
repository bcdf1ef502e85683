//! Property-based tests for the resolve / merge / QA stages using proptest.

use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use country_insights::domain::{Column, CountryRecord, IndicatorCodes, IndicatorObservation};
use country_insights::merge::merge;
use country_insights::qa::assess;
use country_insights::resolve::{resolve, resolve_all};

const ENTITIES: [&str; 5] = ["GBR", "FRA", "DEU", "ATA", "JPN"];
const CODE: &str = "SP.POP.TOTL";

fn arb_observation() -> impl Strategy<Value = IndicatorObservation> {
    (
        0usize..ENTITIES.len(),
        1990i32..2026,
        prop::option::of(-1.0e6f64..1.0e9),
    )
        .prop_map(|(e, year, value)| IndicatorObservation {
            entity: ENTITIES[e].to_string(),
            indicator: CODE.to_string(),
            year,
            value,
        })
}

fn arb_countries() -> impl Strategy<Value = Vec<CountryRecord>> {
    prop::collection::vec(0usize..ENTITIES.len(), 0..12).prop_map(|idx| {
        idx.into_iter()
            .map(|e| CountryRecord {
                iso3: ENTITIES[e].to_string(),
                ..CountryRecord::default()
            })
            .collect()
    })
}

// --- Resolver properties ---

proptest! {
    #[test]
    fn resolved_year_is_max_non_null_year(obs in prop::collection::vec(arb_observation(), 0..60)) {
        let resolved = resolve(&obs, CODE);

        let mut expected: HashMap<&str, Option<i32>> = HashMap::new();
        for o in &obs {
            let slot = expected.entry(o.entity.as_str()).or_insert(None);
            if o.value.is_some() {
                *slot = Some(slot.map_or(o.year, |y| y.max(o.year)));
            }
        }

        prop_assert_eq!(resolved.len(), expected.len());
        for (entity, year) in expected {
            let r = &resolved[entity];
            prop_assert_eq!(r.year, year);
            prop_assert_eq!(r.value.is_some(), r.year.is_some());
        }
    }

    #[test]
    fn resolution_is_independent_of_other_indicators(obs in prop::collection::vec(arb_observation(), 0..40)) {
        let codes = IndicatorCodes::default();
        let all = resolve_all(&obs, &codes);
        prop_assert_eq!(&all[CODE], &resolve(&obs, CODE));
        prop_assert!(all[&codes.gdp_usd].is_empty());
    }
}

// --- Merge / QA properties ---

proptest! {
    #[test]
    fn merge_yields_one_row_per_reference_row(
        countries in arb_countries(),
        obs in prop::collection::vec(arb_observation(), 0..40),
    ) {
        let codes = IndicatorCodes::default();
        let resolved = resolve_all(&obs, &codes);
        let merged = merge(&countries, &resolved, None, &codes);

        prop_assert_eq!(merged.len(), countries.len());
        for (m, c) in merged.iter().zip(&countries) {
            prop_assert_eq!(&m.iso3, &c.iso3);
        }
    }

    #[test]
    fn missing_counts_add_up_and_assessment_repeats(
        countries in arb_countries(),
        obs in prop::collection::vec(arb_observation(), 0..40),
    ) {
        let codes = IndicatorCodes::default();
        let resolved = resolve_all(&obs, &codes);
        let merged = merge(&countries, &resolved, None, &codes);

        let at = Utc.with_ymd_and_hms(2025, 12, 15, 18, 33, 17).unwrap();
        let (report, status) = assess(&merged, at);

        for m in &report.missingness {
            let present = merged.iter().filter(|r| !r.cell(m.column).is_missing()).count();
            prop_assert_eq!(m.missing_count + present, status.row_count);
        }
        prop_assert!(report.missingness.windows(2).all(|w| w[0].missing_rate >= w[1].missing_rate));
        prop_assert!(report.missingness.iter().all(|m| m.column != Column::AsOfUtc));

        let later = Utc.with_ymd_and_hms(2025, 12, 16, 9, 0, 0).unwrap();
        let (report2, mut status2) = assess(&merged, later);
        prop_assert_eq!(&report, &report2);
        status2.generated_at = status.generated_at;
        prop_assert_eq!(&status, &status2);
    }
}

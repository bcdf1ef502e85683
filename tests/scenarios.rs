// tests/scenarios.rs
use chrono::{DateTime, TimeZone, Utc};

use country_insights::app::pipeline::{PipelineInputs, run_with_inputs};
use country_insights::domain::{
    CapitalRecord, Column, CountryRecord, IndicatorCodes, IndicatorObservation, ViolationReason,
};
use country_insights::qa::{CHECK_UNIQUE_ISO3, CHECK_VALIDITY};
use country_insights::resolve::resolve;

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 15, 18, 33, 17).unwrap()
}

fn country(iso3: &str, name: &str, capital: Option<&str>, lat: f64, lon: f64, pop: Option<f64>) -> CountryRecord {
    CountryRecord {
        iso3: iso3.to_string(),
        country: Some(name.to_string()),
        region: Some("Region".to_string()),
        subregion: Some("Subregion".to_string()),
        capital: capital.map(str::to_string),
        lat: Some(lat),
        lon: Some(lon),
        population_x: pop,
    }
}

fn obs(entity: &str, indicator: &str, year: i32, value: Option<f64>) -> IndicatorObservation {
    IndicatorObservation {
        entity: entity.to_string(),
        indicator: indicator.to_string(),
        year,
        value,
    }
}

#[test]
fn scenario_a_latest_year_wins() {
    let codes = IndicatorCodes::default();
    let inputs = PipelineInputs {
        countries: vec![
            country("GBR", "United Kingdom", Some("London"), 51.5, -0.12, Some(67e6)),
            country("FRA", "France", Some("Paris"), 48.86, 2.35, Some(68e6)),
        ],
        observations: vec![
            obs("GBR", &codes.population, 2020, Some(100.0)),
            obs("GBR", &codes.population, 2022, Some(110.0)),
        ],
        ..PipelineInputs::default()
    };

    let resolved = resolve(&inputs.observations, &codes.population);
    assert_eq!(resolved["GBR"].value, Some(110.0));
    assert_eq!(resolved["GBR"].year, Some(2022));

    let output = run_with_inputs(&inputs, &codes, ts()).unwrap();
    let gbr = &output.records[0];
    assert_eq!(gbr.population.value, Some(110.0));
    assert_eq!(gbr.population.year, Some(2022));
    assert_eq!(output.records[1].population.value, None);
    assert!(output.status.pass);
}

#[test]
fn scenario_b_unmatched_country_keeps_reference_fields() {
    let codes = IndicatorCodes::default();
    let inputs = PipelineInputs {
        countries: vec![
            country("GBR", "United Kingdom", Some("London"), 51.5, -0.12, Some(67e6)),
            country("ATA", "Antarctica", None, -75.0, 0.0, Some(1_000.0)),
        ],
        observations: vec![
            obs("GBR", &codes.population, 2023, Some(68.3e6)),
            obs("GBR", &codes.gdp_usd, 2023, Some(3.3e12)),
            obs("GBR", &codes.life_expectancy, 2022, Some(80.7)),
        ],
        ..PipelineInputs::default()
    };

    let output = run_with_inputs(&inputs, &codes, ts()).unwrap();
    assert_eq!(output.records.len(), 2);

    let ata = &output.records[1];
    assert_eq!(ata.iso3, "ATA");
    assert_eq!(ata.population.value, None);
    assert_eq!(ata.gdp_usd.value, None);
    assert_eq!(ata.life_expectancy.value, None);
    assert_eq!(ata.population_x, Some(1_000.0));

    // Absent is not zero: the row renders empty cells, not "0".
    let rows = output.rows();
    let pop_y = output.columns.iter().position(|c| *c == Column::PopulationY).unwrap();
    assert_eq!(rows[1][pop_y], "");
}

#[test]
fn scenario_c_duplicate_reference_key_fails_qa() {
    let codes = IndicatorCodes::default();
    let inputs = PipelineInputs {
        countries: vec![
            country("GBR", "United Kingdom", Some("London"), 51.5, -0.12, None),
            country("GBR", "Britain", Some("London"), 51.5, -0.12, None),
        ],
        ..PipelineInputs::default()
    };

    let output = run_with_inputs(&inputs, &codes, ts()).unwrap();
    assert_eq!(output.records.len(), 2);
    assert_eq!(output.report.duplicate_keys.len(), 1);
    assert_eq!(output.report.duplicate_keys[0].iso3, "GBR");
    assert_eq!(output.report.duplicate_keys[0].count, 2);
    assert!(!output.status.pass);
    assert!(output.status.failed_checks.iter().any(|c| c == CHECK_UNIQUE_ISO3));
}

#[test]
fn scenario_d_negative_life_expectancy_fails_qa() {
    let codes = IndicatorCodes::default();
    let inputs = PipelineInputs {
        countries: vec![country("NZL", "New Zealand", Some("Wellington"), -41.3, 174.8, None)],
        observations: vec![obs("NZL", &codes.life_expectancy, 2022, Some(-5.0))],
        ..PipelineInputs::default()
    };

    let output = run_with_inputs(&inputs, &codes, ts()).unwrap();
    assert!(!output.status.pass);
    assert!(output.status.failed_checks.iter().any(|c| c == CHECK_VALIDITY));

    let v = &output.report.validity_violations[0];
    assert_eq!(v.iso3, "NZL");
    assert_eq!(v.column, Column::LifeExpectancy);
    assert_eq!(v.reason, ViolationReason::Negative);
}

#[test]
fn scenario_e_missing_capital_table_keeps_reference_values() {
    let codes = IndicatorCodes::default();
    let countries = vec![
        country("GBR", "United Kingdom", Some("London"), 51.5, -0.12, None),
        country("JPN", "Japan", Some("Tokyo"), 35.68, 139.69, None),
    ];

    for capitals in [None, Some(Vec::<CapitalRecord>::new())] {
        let inputs = PipelineInputs {
            countries: countries.clone(),
            capitals,
            ..PipelineInputs::default()
        };
        let output = run_with_inputs(&inputs, &codes, ts()).unwrap();

        for (record, reference) in output.records.iter().zip(&countries) {
            assert_eq!(record.capital, reference.capital);
            assert_eq!(record.lat, reference.lat);
            assert_eq!(record.lon, reference.lon);
        }
        assert!(output.status.pass);
        assert!(output.status.failed_checks.is_empty());
    }
}

#[test]
fn population_sources_are_never_reconciled() {
    let codes = IndicatorCodes::default();
    let inputs = PipelineInputs {
        countries: vec![country("IND", "India", Some("New Delhi"), 28.6, 77.2, Some(1.38e9))],
        observations: vec![obs("IND", &codes.population, 2023, Some(1.43e9))],
        ..PipelineInputs::default()
    };
    let output = run_with_inputs(&inputs, &codes, ts()).unwrap();
    assert_eq!(output.records[0].population_x, Some(1.38e9));
    assert_eq!(output.records[0].population.value, Some(1.43e9));
}

#[test]
fn custom_indicator_codes_flow_through_resolve_and_merge() {
    let codes = IndicatorCodes {
        gdp_usd: "NY.GDP.MKTP.KD".to_string(),
        ..IndicatorCodes::default()
    };
    let inputs = PipelineInputs {
        countries: vec![country("GBR", "United Kingdom", Some("London"), 51.5, -0.12, None)],
        observations: vec![
            obs("GBR", "NY.GDP.MKTP.CD", 2023, Some(3.3e12)),
            obs("GBR", "NY.GDP.MKTP.KD", 2022, Some(3.1e12)),
        ],
        ..PipelineInputs::default()
    };
    let output = run_with_inputs(&inputs, &codes, ts()).unwrap();
    assert_eq!(output.records[0].gdp_usd.value, Some(3.1e12));
    assert_eq!(output.records[0].gdp_usd.year, Some(2022));
}

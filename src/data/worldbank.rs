//! World Bank API integration.
//!
//! Two endpoints are used:
//! - `/country/all/indicator/{code}`: one indicator for all countries over a
//!   year window, flattened into long-form `IndicatorObservation`s
//! - `/country`: the country list, used as the reference table when no local
//!   one is supplied
//!
//! Both answer with a `[meta, rows]` envelope and are paged.

use std::collections::HashSet;
use std::thread::sleep;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::domain::{IndicatorObservation, WorldBankCountry};
use crate::error::AppError;
use crate::io::ingest::parse_iso3;

const DEFAULT_BASE_URL: &str = "https://api.worldbank.org/v2";
const INDICATOR_PER_PAGE: &str = "20000";
const COUNTRY_PER_PAGE: &str = "400";
const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("country-insights/", env!("CARGO_PKG_VERSION"));
const AGGREGATES_REGION: &str = "Aggregates";

pub struct WorldBankClient {
    client: Client,
    base_url: String,
    retry_delay: Duration,
}

impl WorldBankClient {
    /// Build a client; `WORLD_BANK_API_BASE` (from the environment or `.env`)
    /// overrides the API base URL.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let base_url = std::env::var("WORLD_BANK_API_BASE").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::fetch(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_delay: Duration::from_millis(1500),
        })
    }

    /// Fetch every observation of `indicator_code` in `[start_year, end_year]`.
    pub fn fetch_indicator(
        &self,
        indicator_code: &str,
        start_year: i32,
        end_year: i32,
    ) -> Result<Vec<IndicatorObservation>, AppError> {
        let url = format!("{}/country/all/indicator/{indicator_code}", self.base_url);
        let date = format!("{start_year}:{end_year}");
        let query = [("per_page", INDICATOR_PER_PAGE), ("date", date.as_str())];

        let out = self.fetch_pages(&url, &query, |body| {
            let page = parse_indicator_page(body, indicator_code)?;
            Ok((page.meta, page.observations))
        })?;

        if out.is_empty() {
            warn!(indicator = indicator_code, "no observations returned");
        }
        Ok(out)
    }

    /// Fetch the country list, aggregates removed, first row per iso3 kept.
    pub fn fetch_countries(&self) -> Result<Vec<WorldBankCountry>, AppError> {
        let url = format!("{}/country", self.base_url);
        let query = [("per_page", COUNTRY_PER_PAGE)];

        let mut countries = self.fetch_pages(&url, &query, |body| {
            let page = parse_country_page(body)?;
            Ok((page.meta, page.countries))
        })?;

        let mut seen = HashSet::new();
        countries.retain(|c| seen.insert(c.iso3.clone()));

        if countries.is_empty() {
            return Err(AppError::fetch("World Bank country list returned no countries"));
        }
        debug!(countries = countries.len(), "fetched country list");
        Ok(countries)
    }

    /// Follow pages from 1 until the echoed page reaches `pages`.
    fn fetch_pages<T, F>(&self, url: &str, query: &[(&str, &str)], mut decode: F) -> Result<Vec<T>, AppError>
    where
        F: FnMut(&str) -> Result<(PageMeta, Vec<T>), AppError>,
    {
        let mut out = Vec::new();
        let mut page = 1u32;
        loop {
            let body = self.get_with_retry(url, query, page)?;
            let (meta, rows) = decode(&body)?;
            out.extend(rows);

            debug!(url, page, pages = meta.pages, "fetched page");
            match meta.next_page(page) {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(out)
    }

    fn get_with_retry(&self, url: &str, query: &[(&str, &str)], page: u32) -> Result<String, AppError> {
        let mut last_err = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self.get_once(url, query, page) {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!(url, page, attempt, error = %e, "World Bank request failed");
                    last_err = e;
                    if attempt < MAX_ATTEMPTS {
                        sleep(self.retry_delay * attempt);
                    }
                }
            }
        }
        Err(AppError::fetch(format!(
            "World Bank request failed after {MAX_ATTEMPTS} attempts: {url}: {last_err}"
        )))
    }

    fn get_once(&self, url: &str, query: &[(&str, &str)], page: u32) -> Result<String, String> {
        let page = page.to_string();
        let resp = self
            .client
            .get(url)
            .query(&[("format", "json"), ("page", page.as_str())])
            .query(query)
            .send()
            .map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            return Err(format!("status {}", resp.status()));
        }
        resp.text().map_err(|e| e.to_string())
    }
}

/// Paging metadata of a `[meta, rows]` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageMeta {
    #[serde(deserialize_with = "number_or_string")]
    pub page: u32,
    #[serde(deserialize_with = "number_or_string")]
    pub pages: u32,
}

impl PageMeta {
    /// Page to request after `requested`, or `None` when done.
    ///
    /// A response that echoes a different page than was asked for ends the
    /// walk instead of looping.
    pub fn next_page(&self, requested: u32) -> Option<u32> {
        if self.page != requested {
            warn!(requested, echoed = self.page, "unexpected page in response; stopping");
            return None;
        }
        (self.page < self.pages).then(|| self.page + 1)
    }
}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// One decoded page of an indicator response.
#[derive(Debug, Clone)]
pub struct IndicatorPage {
    pub meta: PageMeta,
    pub observations: Vec<IndicatorObservation>,
}

/// One decoded page of the country list.
#[derive(Debug, Clone)]
pub struct CountryPage {
    pub meta: PageMeta,
    pub countries: Vec<WorldBankCountry>,
}

#[derive(Debug, Deserialize)]
struct IndicatorRow {
    #[serde(rename = "countryiso3code", default)]
    iso3: String,
    date: String,
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CountryRow {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    region: Labelled,
    #[serde(rename = "incomeLevel", default)]
    income_level: Labelled,
    #[serde(rename = "capitalCity", default)]
    capital_city: String,
    #[serde(default)]
    latitude: String,
    #[serde(default)]
    longitude: String,
}

#[derive(Debug, Default, Deserialize)]
struct Labelled {
    #[serde(default)]
    value: String,
}

fn decode_envelope<T: DeserializeOwned>(body: &str, what: &str) -> Result<(PageMeta, Vec<T>), AppError> {
    let (meta, rows): (PageMeta, Option<Vec<T>>) =
        serde_json::from_str(body).map_err(|e| AppError::fetch(format!("Unexpected payload for {what}: {e}")))?;
    Ok((meta, rows.unwrap_or_default()))
}

/// Decode a World Bank indicator page.
///
/// Rows without a three-letter iso3 (regional aggregates) or with a
/// non-numeric date are dropped. `rows` may be `null` past the last page.
pub fn parse_indicator_page(body: &str, indicator_code: &str) -> Result<IndicatorPage, AppError> {
    let (meta, rows) = decode_envelope::<IndicatorRow>(body, &format!("indicator {indicator_code}"))?;

    let observations = rows
        .into_iter()
        .filter_map(|row| {
            let entity = parse_iso3(&row.iso3).ok()?;
            let year = row.date.trim().parse::<i32>().ok()?;
            Some(IndicatorObservation {
                entity,
                indicator: indicator_code.to_string(),
                year,
                value: row.value.filter(|v| v.is_finite()),
            })
        })
        .collect();

    Ok(IndicatorPage { meta, observations })
}

/// Decode a page of the country list, dropping aggregates.
pub fn parse_country_page(body: &str) -> Result<CountryPage, AppError> {
    let (meta, rows) = decode_envelope::<CountryRow>(body, "country list")?;

    let countries = rows
        .into_iter()
        .filter(|row| row.region.value.trim() != AGGREGATES_REGION)
        .filter_map(|row| {
            let iso3 = parse_iso3(&row.id).ok()?;
            Some(WorldBankCountry {
                iso3,
                country: non_blank(row.name),
                region: non_blank(row.region.value),
                income_level: non_blank(row.income_level.value),
                capital: non_blank(row.capital_city),
                lat: parse_coordinate(&row.latitude),
                lon: parse_coordinate(&row.longitude),
            })
        })
        .collect();

    Ok(CountryPage { meta, countries })
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

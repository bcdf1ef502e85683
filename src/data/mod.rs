//! Fetch layer: statistical API clients.

pub mod worldbank;

pub use worldbank::{WorldBankClient, parse_country_page, parse_indicator_page};

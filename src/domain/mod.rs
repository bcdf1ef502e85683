//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw inputs (`CountryRecord`, `IndicatorObservation`, `CapitalRecord`)
//! - indicator configuration (`IndicatorKind`, `IndicatorCodes`)
//! - merged rows and the published column schema (`MergedRecord`, `Column`)
//! - QA outputs (`QaReport`, `QaStatus`) and the assembled `PipelineOutput`

pub mod types;

pub use types::*;

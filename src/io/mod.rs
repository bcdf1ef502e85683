//! Input/output helpers.
//!
//! - CSV ingest of reference, observation, and capital extracts (`ingest`)
//! - dataset, QA, and raw extract exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;

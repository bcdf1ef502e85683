//! `country-insights` library crate.
//!
//! The binary (`ci`) is a thin wrapper around this library so that:
//!
//! - the resolve / merge / QA stages are testable without spawning processes
//! - the fetch and file layers stay swappable around a pure in-memory core

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod merge;
pub mod qa;
pub mod report;
pub mod resolve;

#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for import-census
//!
//! This library consolidates all functionality for the import-census tool, which samples
//! public repositories, extracts the libraries their source files import, and aggregates
//! the results into frequency statistics.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`crawl`]: The incremental discover-and-analyze pipeline
//! - [`reports`]: Aggregation of the import stream into counts and README tables

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

pub mod crawl;

#[cfg(any(debug_assertions, test))]
pub mod reports;
#[cfg(not(any(debug_assertions, test)))]
mod reports;

pub use crate::commands::{Host, run};

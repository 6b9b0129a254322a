//! Output module for reporting harvest results
//!
//! This module handles:
//! - Loading job, URL and entity statistics from storage
//! - Printing them for the `stats` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};

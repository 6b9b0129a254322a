//! State module for jobs, tracked URLs and entities
//!
//! # Components
//!
//! - `JobType` / `JobStatus`: which sub-pipelines a job runs and where it is in its lifecycle
//! - `UrlType`: categorizer output bucket
//! - `ScrapeStatus`: per-URL scrape outcome
//! - `EntityStatus`: whether an entity is still listed on the site

mod job_state;
mod url_state;

// Re-export main types
pub use job_state::{JobStatus, JobType};
pub use url_state::{EntityStatus, ScrapeStatus, UrlType};

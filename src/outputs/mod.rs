//! Output generation for finished batches.
//!
//! # Submodules
//!
//! - [`json`]: Persists a `BatchReport` as one JSON document per batch
//! - [`report`]: Renders a `BatchReport` as readable text for the terminal

pub mod json;
pub mod report;

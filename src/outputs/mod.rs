//! Output generation.
//!
//! - [`json`]: writes analysis reports and predictions to dated JSON files

pub mod json;

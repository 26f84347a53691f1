//! dvfix - Dolby Vision RPU repair
//!
//! This library crate exposes the pipeline and configuration for the `dvfix`
//! binary and for integration testing.

pub mod config;
pub mod pipeline;

//! Cross-module tests of the resolution pipeline.
//!
//! # Test Structure
//!
//! - `determinism.rs`: identical inputs give identical resolutions and state
//! - `scenarios.rs`: end-to-end placement and event scenarios through the
//!   scheduler and engine
//! - `helpers.rs`: action, session and engine builders

pub(crate) mod helpers;
mod scenarios;

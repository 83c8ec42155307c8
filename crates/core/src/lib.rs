//! lobsize-core
//!
//! Per-team (line of business) size attribution for Android APKs and app bundles.
//!
//! Mapping generation scans a build's modules (library archives, local and
//! feature modules) and persists three tables: module metadata, resource paths,
//! and code packages, each pointing at module indices grouped into functional
//! units. Attribution reads those tables and a decoded artifact and reports how
//! many bytes each functional unit ships, split by category.
//!
//! All logic lives here so it is testable and reusable from any frontend.

pub mod model;
pub mod glob;
pub mod config;
pub mod scanner;
pub mod mapping;
pub mod store;
pub mod attribution;
pub mod services;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

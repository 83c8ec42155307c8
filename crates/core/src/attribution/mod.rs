//! Size attribution: turns a decoded artifact into a per-FU size breakdown.
//!
//! The flow is strictly two-phase:
//! - collection, where concurrent producers append decoder output;
//! - compute, a single deterministic pass (files, packages, dex
//!   normalization, aggregation) over the collected snapshot.

pub mod collector;
pub mod engine;
pub mod fallback;
pub mod report;
pub mod resolve;

pub use collector::{CollectedEntries, Collector};
pub use engine::{largest_remainder, AttributionEngine, Calculator, FilePass, PackagePass};
pub use fallback::NamespaceClassifier;
pub use report::{
    write_report, FileDetail, FileResolution, FuShare, PackageDetail, PackageResolution, SizeReport,
};

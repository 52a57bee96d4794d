//! Core pipeline orchestration for favs.
//!
//! This crate ties together the adapter registry, the filter engine and the
//! read → filter → transform → render pipeline shared by the CLI and the
//! protocol server.

pub mod filter;
pub mod pipeline;
pub mod registry;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use filter::FilterOutcome;
pub use pipeline::{
    PipelineReport, PipelineRequest, ProgressReporter, ReadMode, SilentProgress, SourceProfiles,
    list_profiles, read_all, read_single, run, source_preference,
};
pub use registry::AdapterRegistry;

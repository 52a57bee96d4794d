//! Shared record model, error model, configuration and adapter traits for favs.
//!
//! This crate is the foundation depended on by all other favs crates.
//! It provides:
//! - [`FavsError`], the unified error type
//! - The record model ([`BookmarkRecord`], [`SourceDescriptor`], [`Collection`])
//! - Capability traits ([`SourceReader`], [`Renderer`]) and their options
//! - Configuration ([`AppConfig`], [`FilterRules`], config loading)

pub mod adapter;
pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use adapter::{
    ProfileInfo, RenderOptions, Renderer, RendererOptions, SourceOptions, SourceReader,
};
pub use config::{
    AppConfig, FilterRules, PipelineConfig, RenderConfig, RendererConfig, SourceConfig,
    TransformConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    local_config_path,
};
pub use error::{FavsError, Result};
pub use types::{BookmarkRecord, Collection, FilteredCollection, SourceDescriptor};

/// Re-exported so adapter crates share one cancellation type.
pub use tokio_util::sync::CancellationToken;

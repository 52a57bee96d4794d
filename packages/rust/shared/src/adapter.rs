//! Capability traits for bookmark sources and renderers.
//!
//! Sources read bookmarks from an external store (browser profile, export
//! file) and convert them into [`BookmarkRecord`]s. Renderers turn a
//! [`FilteredCollection`] into bytes. Both are registered by name and shared
//! as trait objects, so configuration is applied through `&self` and kept
//! behind interior mutability by each implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::{BookmarkRecord, FilteredCollection};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Runtime options handed to [`SourceReader::configure`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOptions {
    /// Profile to read. Empty means every profile the source knows about.
    pub profile: String,
    /// Overrides the default location of the source data.
    pub custom_path: Option<String>,
    /// Reader-specific key/value options.
    pub options: BTreeMap<String, String>,
}

impl SourceOptions {
    /// Options selecting a single profile.
    pub fn for_profile(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            ..Default::default()
        }
    }
}

/// A profile or account available within a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileInfo {
    pub name: String,
    pub path: String,
    pub is_default: bool,
}

/// Trait for bookmark sources.
///
/// Readers must populate [`BookmarkRecord::source_name`] with [`name`](Self::name)
/// and drop records without a URL.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Unique lowercase identifier (e.g. `chrome`, `firefox`).
    fn name(&self) -> &str;

    /// Human-friendly name (e.g. `Google Chrome`).
    fn display_name(&self) -> &str;

    /// Whether the source can currently be read. Must be cheap: no network
    /// or blocking I/O beyond a metadata check.
    fn available(&self) -> bool;

    /// Path or description of what will be read, for diagnostics.
    fn path(&self) -> String;

    /// Apply runtime options. Called before [`read`](Self::read).
    fn configure(&self, options: SourceOptions) -> Result<()>;

    /// Profiles this source can read.
    fn list_profiles(&self) -> Result<Vec<ProfileInfo>>;

    /// Read all records for the configured profile selection.
    ///
    /// Implementations should check `cancel` between discrete units of work
    /// (e.g. between profiles) and return what they have when cancelled.
    async fn read(&self, cancel: &CancellationToken) -> Result<Vec<BookmarkRecord>>;
}

// ---------------------------------------------------------------------------
// Renderers
// ---------------------------------------------------------------------------

/// Runtime options handed to [`Renderer::configure`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RendererOptions {
    /// Default style when [`RenderOptions::style`] is empty.
    pub style: String,
    /// Renderer-specific key/value options.
    pub options: BTreeMap<String, String>,
}

/// What a renderer should include in its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Header with generation time, platform, sources and totals.
    pub include_metadata: bool,
    /// Date each bookmark was added.
    pub include_dates: bool,
    /// Bookmark tags.
    pub include_tags: bool,
    /// Source and profile attribution per bookmark.
    pub include_profile: bool,
    /// One section per source/profile.
    pub group_by_source: bool,
    /// Sort alphabetically by title (case-insensitive).
    pub sort_alphabetically: bool,
    /// Renderer-specific variant; forwarded untouched by the pipeline.
    pub style: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
            include_dates: true,
            include_tags: true,
            include_profile: true,
            group_by_source: true,
            sort_alphabetically: false,
            style: String::new(),
        }
    }
}

/// Trait for output renderers.
pub trait Renderer: Send + Sync {
    /// Unique lowercase identifier used with `--format` (e.g. `markdown`).
    fn name(&self) -> &str;

    /// Human-friendly name (e.g. `Markdown`).
    fn display_name(&self) -> &str;

    /// Supported file extensions; the first is the default.
    fn file_extensions(&self) -> &[&str];

    /// Apply runtime options. Called before [`render`](Self::render).
    fn configure(&self, options: RendererOptions) -> Result<()>;

    /// Render the collection.
    fn render(&self, collection: &FilteredCollection, options: &RenderOptions) -> Result<Vec<u8>>;
}

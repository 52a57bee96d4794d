//! Core record model shared by sources, renderers, the pipeline and the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BookmarkRecord
// ---------------------------------------------------------------------------

/// A single bookmark from any source.
///
/// Every field except `url` may be empty. Readers that cannot determine a URL
/// drop the record instead of emitting one with an empty `url`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookmarkRecord {
    /// Display name; renderers fall back to the URL when empty.
    #[serde(default)]
    pub title: String,
    /// Target address, treated as opaque.
    pub url: String,
    /// Folder hierarchy from the source root. Empty means root level.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub folder_path: Vec<String>,
    /// When the bookmark was created. `None` means the source did not say.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<DateTime<Utc>>,
    /// Name of the reader that produced this record (e.g. `chrome`).
    #[serde(default)]
    pub source_name: String,
    /// Profile or account within the source.
    #[serde(default)]
    pub profile: String,
    /// Labels; order is not significant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl BookmarkRecord {
    /// Create a record with just a title and URL.
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    /// The folder path joined with `/`, as matched by folder filter rules.
    pub fn folder_string(&self) -> String {
        self.folder_path.join("/")
    }

    /// Title for display, falling back to the URL when the title is empty.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }
}

// ---------------------------------------------------------------------------
// SourceDescriptor
// ---------------------------------------------------------------------------

/// One contribution to a [`Collection`], created once per successful read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Reader name (e.g. `firefox`).
    pub name: String,
    /// Profile label for the contribution.
    pub profile: String,
    /// Human-readable origin (file path or description).
    pub path: String,
    /// Number of records contributed.
    pub count: usize,
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Records aggregated from one or more sources, with attribution.
///
/// The sum of descriptor counts always equals the number of records: records
/// and descriptors are only ever appended together through [`Collection::add`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Collection {
    bookmarks: Vec<BookmarkRecord>,
    sources: Vec<SourceDescriptor>,
}

impl Collection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one source's records together with its descriptor.
    /// The descriptor count is derived from `records`.
    pub fn add(
        &mut self,
        records: Vec<BookmarkRecord>,
        name: impl Into<String>,
        profile: impl Into<String>,
        path: impl Into<String>,
    ) {
        let descriptor = SourceDescriptor {
            name: name.into(),
            profile: profile.into(),
            path: path.into(),
            count: records.len(),
        };
        self.bookmarks.extend(records);
        self.sources.push(descriptor);
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    pub fn bookmarks(&self) -> &[BookmarkRecord] {
        &self.bookmarks
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    /// Build a view of this collection with a transformed record list, keeping
    /// the original source attribution.
    ///
    /// Filtering and deduplication produce such views for rendering; the count
    /// invariant describes what each source contributed, not what survived.
    pub fn with_bookmarks(&self, bookmarks: Vec<BookmarkRecord>) -> FilteredCollection {
        FilteredCollection {
            bookmarks,
            sources: self.sources.clone(),
        }
    }

    /// Narrow to records and descriptors from a single source.
    pub fn only_source(&self, name: &str) -> Collection {
        Collection {
            bookmarks: self
                .bookmarks
                .iter()
                .filter(|b| b.source_name == name)
                .cloned()
                .collect(),
            sources: self
                .sources
                .iter()
                .filter(|s| s.name == name)
                .cloned()
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// FilteredCollection
// ---------------------------------------------------------------------------

/// A render-ready view: post-filter records plus the contributing sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredCollection {
    pub bookmarks: Vec<BookmarkRecord>,
    pub sources: Vec<SourceDescriptor>,
}

impl From<Collection> for FilteredCollection {
    fn from(collection: Collection) -> Self {
        Self {
            bookmarks: collection.bookmarks,
            sources: collection.sources,
        }
    }
}

impl From<&Collection> for FilteredCollection {
    fn from(collection: &Collection) -> Self {
        Self {
            bookmarks: collection.bookmarks.clone(),
            sources: collection.sources.clone(),
        }
    }
}

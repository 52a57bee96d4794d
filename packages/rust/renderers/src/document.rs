//! Serializable document shared by the structured renderers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use favs_shared::{BookmarkRecord, FilteredCollection, RenderOptions, SourceDescriptor};

use crate::{date_string, platform};

/// How folder paths are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FolderStyle {
    /// A list of folder names.
    List,
    /// Folder names joined with `/`.
    Joined,
}

#[derive(Debug, Serialize)]
pub(crate) struct Document<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata<'a>>,
    pub bookmarks: Vec<Entry<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Metadata<'a> {
    pub generated: String,
    pub platform: String,
    pub total: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceEntry<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SourceEntry<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub profile: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub path: &'a str,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum Folder<'a> {
    List(&'a [String]),
    Joined(String),
}

impl Folder<'_> {
    fn is_empty(&self) -> bool {
        match self {
            Folder::List(path) => path.is_empty(),
            Folder::Joined(path) => path.is_empty(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Entry<'a> {
    pub title: &'a str,
    pub url: &'a str,
    #[serde(skip_serializing_if = "Folder::is_empty")]
    pub folder: Folder<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_added: Option<String>,
    #[serde(skip_serializing_if = "no_tags")]
    pub tags: &'a [String],
    #[serde(skip_serializing_if = "str::is_empty")]
    pub source: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub profile: &'a str,
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

impl<'a> Entry<'a> {
    pub fn new(record: &'a BookmarkRecord, options: &RenderOptions, folders: FolderStyle) -> Self {
        let folder = match folders {
            FolderStyle::List => Folder::List(&record.folder_path),
            FolderStyle::Joined => Folder::Joined(record.folder_string()),
        };
        let (source, profile) = if options.include_profile {
            (record.source_name.as_str(), record.profile.as_str())
        } else {
            ("", "")
        };

        Self {
            title: &record.title,
            url: &record.url,
            folder,
            date_added: record
                .date_added
                .filter(|_| options.include_dates)
                .map(|d| date_string(&d)),
            tags: if options.include_tags {
                record.tags.as_slice()
            } else {
                &[]
            },
            source,
            profile,
        }
    }
}

impl<'a> Document<'a> {
    pub fn build(
        collection: &'a FilteredCollection,
        options: &RenderOptions,
        folders: FolderStyle,
        generated: DateTime<Utc>,
    ) -> Self {
        let metadata = options.include_metadata.then(|| Metadata {
            generated: generated.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            platform: platform("/"),
            total: collection.bookmarks.len(),
            sources: collection.sources.iter().map(SourceEntry::from).collect(),
        });

        Self {
            metadata,
            bookmarks: collection
                .bookmarks
                .iter()
                .map(|record| Entry::new(record, options, folders))
                .collect(),
        }
    }
}

impl<'a> From<&'a SourceDescriptor> for SourceEntry<'a> {
    fn from(source: &'a SourceDescriptor) -> Self {
        Self {
            name: &source.name,
            profile: &source.profile,
            path: &source.path,
            count: source.count,
        }
    }
}

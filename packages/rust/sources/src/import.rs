//! File import: Netscape bookmark HTML or OPML outlines.
//!
//! The format is sniffed from the content. Netscape exports (what every
//! browser's "Export bookmarks" produces) are parsed as HTML; anything else is
//! treated as OPML.

use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html};
use tracing::{debug, instrument};
use xml::reader::{EventReader, XmlEvent};

use favs_shared::{
    BookmarkRecord, CancellationToken, FavsError, ProfileInfo, Result, SourceOptions, SourceReader,
};

use crate::{read_lock, write_lock};

const SOURCE_NAME: &str = "import";
const PROFILE: &str = "import";

/// Reads bookmarks from an exported file given as the custom path.
pub struct ImportSource {
    path: RwLock<Option<PathBuf>>,
}

impl ImportSource {
    pub fn new() -> Self {
        Self {
            path: RwLock::new(None),
        }
    }
}

impl Default for ImportSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceReader for ImportSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn display_name(&self) -> &str {
        "OPML/HTML Import"
    }

    fn available(&self) -> bool {
        read_lock(&self.path).is_some()
    }

    fn path(&self) -> String {
        read_lock(&self.path)
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    fn configure(&self, options: SourceOptions) -> Result<()> {
        *write_lock(&self.path) = options
            .custom_path
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        Ok(())
    }

    fn list_profiles(&self) -> Result<Vec<ProfileInfo>> {
        Ok(Vec::new())
    }

    #[instrument(skip_all, fields(source = SOURCE_NAME))]
    async fn read(&self, cancel: &CancellationToken) -> Result<Vec<BookmarkRecord>> {
        let Some(path) = read_lock(&self.path).clone() else {
            return Err(FavsError::config_invalid(SOURCE_NAME, "no file path configured"));
        };
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| FavsError::read_failure(SOURCE_NAME, format!("{}: {e}", path.display())))?;

        let records = if is_netscape(&content) {
            parse_netscape(&content)
        } else {
            parse_opml(&content)?
        };
        debug!(path = %path.display(), count = records.len(), "imported bookmarks");
        Ok(records)
    }
}

fn is_netscape(content: &str) -> bool {
    let lower = content.to_ascii_lowercase();
    lower.contains("<!doctype netscape-bookmark-file") || lower.contains("<dl>")
}

fn record(title: String, url: String, path: &[String]) -> BookmarkRecord {
    BookmarkRecord {
        title,
        url,
        folder_path: path.to_vec(),
        source_name: SOURCE_NAME.to_string(),
        profile: PROFILE.to_string(),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Netscape HTML
// ---------------------------------------------------------------------------

fn parse_netscape(content: &str) -> Vec<BookmarkRecord> {
    let document = Html::parse_document(content);
    let mut records = Vec::new();

    let root = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "dl");
    if let Some(root) = root {
        walk_list(root, &[], &mut records);
    }
    records
}

/// Walk a `<DL>`. A folder's list is normally nested in its `<DT>`, but a list
/// following the `<DT>` as a sibling is accepted too.
fn walk_list(list: ElementRef<'_>, path: &[String], out: &mut Vec<BookmarkRecord>) {
    let mut pending: Option<String> = None;

    for child in list.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "dt" => pending = walk_item(child, path, out),
            "dl" => {
                let mut nested = path.to_vec();
                nested.extend(pending.take());
                walk_list(child, &nested, out);
            }
            "dd" => {}
            // <p> wrappers left over from the export format.
            _ => walk_list(child, path, out),
        }
    }
}

/// Returns the folder name when the item is a folder header without a nested list.
fn walk_item(item: ElementRef<'_>, path: &[String], out: &mut Vec<BookmarkRecord>) -> Option<String> {
    let mut folder: Option<String> = None;
    let mut consumed = false;

    for child in item.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "h3" => folder = Some(element_text(child)),
            "a" => {
                if let Some(bookmark) = link(child, path) {
                    out.push(bookmark);
                }
            }
            "dl" => {
                let mut nested = path.to_vec();
                nested.extend(folder.clone());
                walk_list(child, &nested, out);
                consumed = true;
            }
            _ => {}
        }
    }

    if consumed { None } else { folder }
}

fn link(anchor: ElementRef<'_>, path: &[String]) -> Option<BookmarkRecord> {
    let el = anchor.value();
    let url = el.attr("href").map(str::trim).filter(|u| !u.is_empty())?;

    let mut bookmark = record(element_text(anchor), url.to_string(), path);
    bookmark.date_added = el
        .attr("add_date")
        .and_then(|d| d.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
    bookmark.tags = el
        .attr("tags")
        .map(|tags| {
            tags.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    Some(bookmark)
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

// ---------------------------------------------------------------------------
// OPML
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Outline {
    title: String,
    url: String,
    created: String,
    has_children: bool,
}

fn parse_opml(content: &str) -> Result<Vec<BookmarkRecord>> {
    let mut stack: Vec<Outline> = Vec::new();
    let mut records = Vec::new();

    for event in EventReader::new(content.as_bytes()) {
        let event = event
            .map_err(|e| FavsError::read_failure(SOURCE_NAME, format!("invalid OPML: {e}")))?;
        match event {
            XmlEvent::StartElement {
                name, attributes, ..
            } if name.local_name == "outline" => {
                if let Some(parent) = stack.last_mut() {
                    parent.has_children = true;
                }
                let attr = |key: &str| {
                    attributes
                        .iter()
                        .find(|a| a.name.local_name == key)
                        .map(|a| a.value.clone())
                        .unwrap_or_default()
                };
                let text = attr("text");
                let html_url = attr("htmlUrl");
                stack.push(Outline {
                    title: if text.is_empty() { attr("title") } else { text },
                    url: if html_url.is_empty() { attr("xmlUrl") } else { html_url },
                    created: attr("created"),
                    has_children: false,
                });
            }
            XmlEvent::EndElement { name } if name.local_name == "outline" => {
                let Some(outline) = stack.pop() else {
                    continue;
                };
                // Outlines with children are folders; leaves need a URL.
                if outline.has_children || outline.url.is_empty() {
                    continue;
                }
                let path: Vec<String> = stack.iter().map(|o| o.title.clone()).collect();
                let mut bookmark = record(outline.title, outline.url, &path);
                bookmark.date_added = DateTime::parse_from_rfc2822(&outline.created)
                    .ok()
                    .map(|d| d.with_timezone(&Utc));
                records.push(bookmark);
            }
            _ => {}
        }
    }

    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

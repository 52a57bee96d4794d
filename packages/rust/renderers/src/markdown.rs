//! Markdown in three styles: nested lists, tables, or a fenced YAML block.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{Local, Utc};
use tracing::debug;

use favs_shared::{
    BookmarkRecord, FavsError, FilteredCollection, RenderOptions, Renderer, RendererOptions, Result,
    SourceDescriptor,
};

use crate::document::{Document, FolderStyle};
use crate::tree::FolderNode;
use crate::{date_string, platform};

/// Markdown sub-format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MarkdownStyle {
    /// Nested lists following the folder tree.
    #[default]
    Textual,
    /// One table row per bookmark.
    Table,
    /// A fenced YAML block.
    Yaml,
}

impl MarkdownStyle {
    /// Parse a style name. Unknown names fall back to [`MarkdownStyle::Textual`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "table" => Self::Table,
            "yaml" => Self::Yaml,
            _ => Self::Textual,
        }
    }
}

pub struct MarkdownRenderer {
    style: RwLock<MarkdownStyle>,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            style: RwLock::new(MarkdownStyle::default()),
        }
    }

    /// Per-call style wins over the configured one.
    fn resolve_style(&self, requested: &str) -> MarkdownStyle {
        if !requested.is_empty() {
            return MarkdownStyle::parse(requested);
        }
        self.style
            .read()
            .map(|style| *style)
            .unwrap_or_default()
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for MarkdownRenderer {
    fn name(&self) -> &str {
        "markdown"
    }

    fn display_name(&self) -> &str {
        "Markdown"
    }

    fn file_extensions(&self) -> &[&str] {
        &[".md", ".markdown"]
    }

    fn configure(&self, options: RendererOptions) -> Result<()> {
        let style = options
            .options
            .get("style")
            .filter(|s| !s.is_empty())
            .unwrap_or(&options.style);
        if let Ok(mut current) = self.style.write() {
            *current = MarkdownStyle::parse(style);
        }
        Ok(())
    }

    fn render(&self, collection: &FilteredCollection, options: &RenderOptions) -> Result<Vec<u8>> {
        let mut out = String::from("# Browser Bookmarks\n\n");
        if options.include_metadata {
            out.push_str(&header(collection));
        }

        let style = self.resolve_style(&options.style);
        debug!(?style, records = collection.bookmarks.len(), "rendering markdown");
        match style {
            MarkdownStyle::Textual => render_textual(collection, options, &mut out),
            MarkdownStyle::Table => render_table(collection, options, &mut out),
            MarkdownStyle::Yaml => render_yaml(collection, options, &mut out)?,
        }

        Ok(out.into_bytes())
    }
}

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

fn header(collection: &FilteredCollection) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "*Generated: {}*\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("*Platform: {}*\n", platform_label()));
    out.push_str(&format!("*Source: {}*\n", source_summary(&collection.sources)));
    out.push_str(&format!(
        "*Total bookmarks: {}*\n\n",
        collection.bookmarks.len()
    ));
    out
}

fn platform_label() -> String {
    let joined = platform(" (");
    format!("{joined})")
}

fn source_summary(sources: &[SourceDescriptor]) -> String {
    sources
        .iter()
        .map(|s| {
            if s.profile.is_empty() {
                s.name.clone()
            } else {
                format!("{}/{}", s.name, s.profile)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Records grouped by `(source, profile)`, in key order.
fn group_by_source(records: &[BookmarkRecord]) -> BTreeMap<(&str, &str), Vec<&BookmarkRecord>> {
    let mut groups: BTreeMap<(&str, &str), Vec<&BookmarkRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.source_name.as_str(), record.profile.as_str()))
            .or_default()
            .push(record);
    }
    groups
}

fn section_heading(source: &str, profile: &str, options: &RenderOptions) -> String {
    let mut heading = title_case(source);
    if options.include_profile && !profile.is_empty() {
        heading.push_str(" / ");
        heading.push_str(profile);
    }
    format!("## {heading}\n\n")
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn escape_link_text(s: &str) -> String {
    s.replace('[', "\\[").replace(']', "\\]")
}

fn sorted<'a>(records: Vec<&'a BookmarkRecord>, options: &RenderOptions) -> Vec<&'a BookmarkRecord> {
    let mut records = records;
    if options.sort_alphabetically {
        records.sort_by_cached_key(|r| r.display_title().to_lowercase());
    }
    records
}

/// Render `body` once, or once per source section when grouping.
fn sections<F>(collection: &FilteredCollection, options: &RenderOptions, out: &mut String, mut body: F)
where
    F: FnMut(Vec<&BookmarkRecord>, &mut String),
{
    if options.group_by_source {
        for ((source, profile), records) in group_by_source(&collection.bookmarks) {
            out.push_str(&section_heading(source, profile, options));
            body(records, out);
            out.push('\n');
        }
    } else {
        body(collection.bookmarks.iter().collect(), out);
    }
}

// ---------------------------------------------------------------------------
// Textual
// ---------------------------------------------------------------------------

fn render_textual(collection: &FilteredCollection, options: &RenderOptions, out: &mut String) {
    sections(collection, options, out, |records, out| {
        let mut tree = FolderNode::build(records);
        if options.sort_alphabetically {
            tree.sort_alphabetically();
        }
        render_folder(&tree, 0, options, out);
    });
}

fn render_folder(node: &FolderNode<'_>, depth: usize, options: &RenderOptions, out: &mut String) {
    let mut depth = depth;
    if !node.name.is_empty() {
        out.push_str(&format!("{}- **{}**\n", "  ".repeat(depth), node.name));
        depth += 1;
    }

    for record in &node.bookmarks {
        out.push_str(&bookmark_line(record, depth, options));
    }
    for child in &node.children {
        render_folder(child, depth, options, out);
    }
}

fn bookmark_line(record: &BookmarkRecord, depth: usize, options: &RenderOptions) -> String {
    let mut line = format!(
        "{}- [{}]({})",
        "  ".repeat(depth),
        escape_link_text(record.display_title()),
        record.url
    );

    let mut meta: Vec<String> = Vec::new();
    if options.include_dates {
        meta.extend(record.date_added.as_ref().map(date_string));
    }
    if options.include_tags {
        meta.extend(record.tags.iter().map(|t| format!("#{t}")));
    }
    if !meta.is_empty() {
        line.push_str(&format!(" *({})*", meta.join(", ")));
    }
    line.push('\n');
    line
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn render_table(collection: &FilteredCollection, options: &RenderOptions, out: &mut String) {
    sections(collection, options, out, |records, out| {
        let mut headers = vec!["Title", "Folder"];
        if options.include_dates {
            headers.push("Date");
        }
        if options.include_tags {
            headers.push("Tags");
        }
        out.push_str(&format!("| {} |\n", headers.join(" | ")));
        out.push_str(&format!("|{}\n", "---|".repeat(headers.len())));

        for record in sorted(records, options) {
            let mut row = vec![
                format!(
                    "[{}]({})",
                    escape_cell(&escape_link_text(record.display_title())),
                    record.url
                ),
                escape_cell(&record.folder_string()),
            ];
            if options.include_dates {
                row.push(record.date_added.as_ref().map(date_string).unwrap_or_default());
            }
            if options.include_tags {
                row.push(
                    record
                        .tags
                        .iter()
                        .map(|t| format!("#{}", escape_cell(t)))
                        .collect::<Vec<_>>()
                        .join(" "),
                );
            }
            out.push_str(&format!("| {} |\n", row.join(" | ")));
        }
    });
}

// ---------------------------------------------------------------------------
// YAML
// ---------------------------------------------------------------------------

fn render_yaml(
    collection: &FilteredCollection,
    options: &RenderOptions,
    out: &mut String,
) -> Result<()> {
    let view = FilteredCollection {
        bookmarks: sorted(collection.bookmarks.iter().collect(), options)
            .into_iter()
            .cloned()
            .collect(),
        sources: Vec::new(),
    };

    let body_options = RenderOptions {
        include_metadata: false,
        ..options.clone()
    };
    let document = Document::build(&view, &body_options, FolderStyle::Joined, Utc::now());
    let yaml = serde_yaml::to_string(&document).map_err(|e| FavsError::render("markdown", e))?;

    out.push_str("```yaml\n");
    out.push_str(&yaml);
    out.push_str("```\n");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn render(style: &str, options: RenderOptions) -> String {
        let bytes = MarkdownRenderer::new()
            .render(
                &fixtures::collection(),
                &RenderOptions {
                    style: style.into(),
                    ..options
                },
            )
            .expect("render");
        String::from_utf8(bytes).expect("utf8")
    }

    fn bare() -> RenderOptions {
        RenderOptions {
            include_metadata: false,
            group_by_source: false,
            ..RenderOptions::default()
        }
    }

    #[test]
    fn textual_nests_folders() {
        let out = render("", bare());
        // Root-level records come before any folder.
        let expected = "# Browser Bookmarks\n\n\
            - [https://mozilla.org/](https://mozilla.org/)\n\
            - **Bookmarks bar**\n  \
            - [Tom & Jerry <3](https://example.com/?a=1&b=2)\n  \
            - **Dev**\n    \
            - [Rust \\[lang\\]](https://www.rust-lang.org/) *(2023-11-14, #lang)*\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn textual_groups_by_source_in_key_order() {
        let out = render("textual", RenderOptions {
            include_metadata: false,
            ..RenderOptions::default()
        });
        let chrome = out.find("## Chrome / Default").expect("chrome section");
        let firefox = out.find("## Firefox / abc.default").expect("firefox section");
        assert!(chrome < firefox);
    }

    #[test]
    fn metadata_header() {
        let out = render("", RenderOptions::default());
        assert!(out.contains("*Source: chrome/Default, firefox/abc.default*"));
        assert!(out.contains("*Total bookmarks: 3*"));
    }

    #[test]
    fn table_columns_follow_options() {
        let out = render("table", bare());
        assert!(out.contains("| Title | Folder | Date | Tags |\n|---|---|---|---|\n"));
        assert!(out.contains(
            "| [Rust \\[lang\\]](https://www.rust-lang.org/) | Bookmarks bar/Dev | 2023-11-14 | #lang |"
        ));

        let out = render("table", RenderOptions {
            include_dates: false,
            include_tags: false,
            ..bare()
        });
        assert!(out.contains("| Title | Folder |\n|---|---|\n"));
    }

    #[test]
    fn yaml_block_is_fenced() {
        let out = render("yaml", bare());
        let body = out
            .split("```yaml\n")
            .nth(1)
            .and_then(|rest| rest.split("```").next())
            .expect("fenced block");
        let doc: serde_yaml::Value = serde_yaml::from_str(body).expect("valid yaml");
        assert_eq!(doc["bookmarks"][0]["folder"].as_str(), Some("Bookmarks bar/Dev"));
    }

    #[test]
    fn style_resolution() {
        let renderer = MarkdownRenderer::new();
        assert_eq!(renderer.resolve_style(""), MarkdownStyle::Textual);

        renderer
            .configure(RendererOptions {
                style: "table".into(),
                ..Default::default()
            })
            .expect("configure");
        assert_eq!(renderer.resolve_style(""), MarkdownStyle::Table);
        assert_eq!(renderer.resolve_style("yaml"), MarkdownStyle::Yaml);
        assert_eq!(renderer.resolve_style("fancy"), MarkdownStyle::Textual);
    }
}

//! Outline exports that browsers and feed readers can import: OPML 2.0 and the
//! Netscape bookmark HTML format.
//!
//! Both walk the [`FolderNode`] tree and write folders before the bookmarks
//! filed directly at the same level.

use chrono::{DateTime, Utc};
use tracing::debug;
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

use favs_shared::{
    BookmarkRecord, FavsError, FilteredCollection, RenderOptions, Renderer, RendererOptions, Result,
};

use crate::tree::FolderNode;

/// `Tue, 14 Nov 2023 22:13:20 GMT`
fn http_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn folder_tree<'a>(collection: &'a FilteredCollection, options: &RenderOptions) -> FolderNode<'a> {
    let mut tree = FolderNode::build(&collection.bookmarks);
    if options.sort_alphabetically {
        tree.sort_alphabetically();
    }
    tree
}

// ---------------------------------------------------------------------------
// OPML
// ---------------------------------------------------------------------------

pub struct OpmlRenderer;

impl Renderer for OpmlRenderer {
    fn name(&self) -> &str {
        "opml"
    }

    fn display_name(&self) -> &str {
        "OPML"
    }

    fn file_extensions(&self) -> &[&str] {
        &[".opml", ".xml"]
    }

    fn configure(&self, _options: RendererOptions) -> Result<()> {
        Ok(())
    }

    fn render(&self, collection: &FilteredCollection, options: &RenderOptions) -> Result<Vec<u8>> {
        let tree = folder_tree(collection, options);
        debug!(records = tree.total(), "rendering opml");

        let mut writer = EmitterConfig::new()
            .perform_indent(true)
            .indent_string("  ")
            .create_writer(Vec::new());
        write_opml(&mut writer, &tree, options).map_err(|e| FavsError::render("opml", e))?;

        let mut out = writer.into_inner();
        out.push(b'\n');
        Ok(out)
    }
}

fn write_opml(
    writer: &mut EventWriter<Vec<u8>>,
    tree: &FolderNode<'_>,
    options: &RenderOptions,
) -> xml::writer::Result<()> {
    let created = http_date(&Utc::now());

    writer.write(XmlEvent::StartDocument {
        version: xml::common::XmlVersion::Version10,
        encoding: Some("UTF-8"),
        standalone: None,
    })?;
    writer.write(XmlEvent::start_element("opml").attr("version", "2.0"))?;

    writer.write(XmlEvent::start_element("head"))?;
    writer.write(XmlEvent::start_element("title"))?;
    writer.write(XmlEvent::characters("Bookmarks Export"))?;
    writer.write(XmlEvent::end_element())?;
    writer.write(XmlEvent::start_element("dateCreated"))?;
    writer.write(XmlEvent::characters(&created))?;
    writer.write(XmlEvent::end_element())?;
    writer.write(XmlEvent::end_element())?;

    writer.write(XmlEvent::start_element("body"))?;
    write_outlines(writer, tree, options)?;
    writer.write(XmlEvent::end_element())?;

    writer.write(XmlEvent::end_element())
}

fn write_outlines(
    writer: &mut EventWriter<Vec<u8>>,
    node: &FolderNode<'_>,
    options: &RenderOptions,
) -> xml::writer::Result<()> {
    for child in &node.children {
        writer.write(
            XmlEvent::start_element("outline")
                .attr("text", child.name)
                .attr("title", child.name),
        )?;
        write_outlines(writer, child, options)?;
        writer.write(XmlEvent::end_element())?;
    }

    for record in &node.bookmarks {
        write_link(writer, record, options)?;
    }
    Ok(())
}

fn write_link(
    writer: &mut EventWriter<Vec<u8>>,
    record: &BookmarkRecord,
    options: &RenderOptions,
) -> xml::writer::Result<()> {
    let title = record.display_title();
    let created = record
        .date_added
        .as_ref()
        .filter(|_| options.include_dates)
        .map(http_date);
    let category = (options.include_tags && !record.tags.is_empty()).then(|| record.tags.join(","));

    let mut element = XmlEvent::start_element("outline")
        .attr("text", title)
        .attr("title", title)
        .attr("type", "link")
        .attr("htmlUrl", &record.url);
    if let Some(created) = &created {
        element = element.attr("created", created);
    }
    if let Some(category) = &category {
        element = element.attr("category", category);
    }

    writer.write(element)?;
    writer.write(XmlEvent::end_element())
}

// ---------------------------------------------------------------------------
// Netscape HTML
// ---------------------------------------------------------------------------

const NETSCAPE_HEADER: &str = "<!DOCTYPE NETSCAPE-Bookmark-file-1>
<!-- This is an automatically generated file.
     It will be read and overwritten.
     DO NOT EDIT! -->
<META HTTP-EQUIV=\"Content-Type\" CONTENT=\"text/html; charset=UTF-8\">
<TITLE>Bookmarks</TITLE>
<H1>Bookmarks</H1>
<DL><p>
";

pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn name(&self) -> &str {
        "html"
    }

    fn display_name(&self) -> &str {
        "Netscape HTML"
    }

    fn file_extensions(&self) -> &[&str] {
        &[".html", ".htm"]
    }

    fn configure(&self, _options: RendererOptions) -> Result<()> {
        Ok(())
    }

    fn render(&self, collection: &FilteredCollection, options: &RenderOptions) -> Result<Vec<u8>> {
        let tree = folder_tree(collection, options);
        debug!(records = tree.total(), "rendering netscape html");

        let mut out = String::from(NETSCAPE_HEADER);
        render_html_folder(&tree, 1, options, &mut out);
        out.push_str("</DL><p>\n");
        Ok(out.into_bytes())
    }
}

fn render_html_folder(node: &FolderNode<'_>, depth: usize, options: &RenderOptions, out: &mut String) {
    let indent = "    ".repeat(depth);

    for child in &node.children {
        out.push_str(&format!("{indent}<DT><H3>{}</H3>\n", escape_html(child.name)));
        out.push_str(&format!("{indent}<DL><p>\n"));
        render_html_folder(child, depth + 1, options, out);
        out.push_str(&format!("{indent}</DL><p>\n"));
    }

    for record in &node.bookmarks {
        let mut attrs = format!("HREF=\"{}\"", escape_html(&record.url));
        if options.include_dates {
            if let Some(date) = &record.date_added {
                attrs.push_str(&format!(" ADD_DATE=\"{}\"", date.timestamp()));
            }
        }
        if options.include_tags && !record.tags.is_empty() {
            attrs.push_str(&format!(" TAGS=\"{}\"", escape_html(&record.tags.join(","))));
        }
        out.push_str(&format!(
            "{indent}<DT><A {attrs}>{}</A>\n",
            escape_html(record.display_title())
        ));
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

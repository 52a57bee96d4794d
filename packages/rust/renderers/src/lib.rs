//! Built-in output renderers.
//!
//! Every renderer turns a [`favs_shared::FilteredCollection`] into bytes.
//! Structured formats (JSON, YAML) share one serializable document; the
//! outline formats (Markdown lists, OPML, Netscape HTML) share the
//! [`tree::FolderNode`] hierarchy.

mod document;
mod json;
mod markdown;
mod outline;
pub mod tree;
mod yaml;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use favs_shared::Renderer;

pub use json::JsonRenderer;
pub use markdown::{MarkdownRenderer, MarkdownStyle};
pub use outline::{HtmlRenderer, OpmlRenderer};
pub use yaml::YamlRenderer;

/// Every built-in renderer, ready to register.
pub fn builtin_renderers() -> Vec<Arc<dyn Renderer>> {
    vec![
        Arc::new(JsonRenderer),
        Arc::new(YamlRenderer),
        Arc::new(MarkdownRenderer::new()),
        Arc::new(OpmlRenderer),
        Arc::new(HtmlRenderer),
    ]
}

/// `os<sep>arch`, e.g. `linux/x86_64`.
pub(crate) fn platform(separator: &str) -> String {
    format!(
        "{}{separator}{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Calendar date as `YYYY-MM-DD`.
pub(crate) fn date_string(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::DateTime;
    use favs_shared::{BookmarkRecord, Collection, FilteredCollection};

    /// Two sources, nested folders, one record with tags and a date.
    pub fn collection() -> FilteredCollection {
        let mut collection = Collection::new();
        collection.add(
            vec![
                BookmarkRecord {
                    folder_path: vec!["Bookmarks bar".into(), "Dev".into()],
                    date_added: DateTime::from_timestamp(1_700_000_000, 0),
                    tags: vec!["lang".into()],
                    source_name: "chrome".into(),
                    profile: "Default".into(),
                    ..BookmarkRecord::new("Rust [lang]", "https://www.rust-lang.org/")
                },
                BookmarkRecord {
                    folder_path: vec!["Bookmarks bar".into()],
                    source_name: "chrome".into(),
                    profile: "Default".into(),
                    ..BookmarkRecord::new("Tom & Jerry <3", "https://example.com/?a=1&b=2")
                },
            ],
            "chrome",
            "Default",
            "/home/me/.config/google-chrome/Default/Bookmarks",
        );
        collection.add(
            vec![BookmarkRecord {
                source_name: "firefox".into(),
                profile: "abc.default".into(),
                ..BookmarkRecord::new("", "https://mozilla.org/")
            }],
            "firefox",
            "abc.default",
            "/home/me/.mozilla/firefox/abc.default/places.sqlite",
        );
        collection.into()
    }
}

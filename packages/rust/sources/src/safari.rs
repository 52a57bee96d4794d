//! Apple Safari, via `~/Library/Safari/Bookmarks.plist`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use favs_shared::{
    BookmarkRecord, CancellationToken, FavsError, ProfileInfo, Result, SourceOptions, SourceReader,
};

use crate::{read_lock, write_lock};

const SOURCE_NAME: &str = "safari";

/// Safari has a single bookmark store.
const PROFILE: &str = "default";

const LEAF: &str = "WebBookmarkTypeLeaf";
const LIST: &str = "WebBookmarkTypeList";

/// Reads bookmarks from Safari.
///
/// The default location only exists on macOS; a custom path to an exported
/// `Bookmarks.plist` works anywhere.
pub struct SafariSource {
    path: RwLock<Option<PathBuf>>,
}

impl SafariSource {
    pub fn new() -> Self {
        Self {
            path: RwLock::new(default_path()),
        }
    }
}

impl Default for SafariSource {
    fn default() -> Self {
        Self::new()
    }
}

fn default_path() -> Option<PathBuf> {
    if !cfg!(target_os = "macos") {
        return None;
    }
    dirs::home_dir().map(|home| home.join("Library").join("Safari").join("Bookmarks.plist"))
}

#[async_trait]
impl SourceReader for SafariSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn display_name(&self) -> &str {
        "Apple Safari"
    }

    fn available(&self) -> bool {
        read_lock(&self.path).as_deref().is_some_and(Path::is_file)
    }

    fn path(&self) -> String {
        read_lock(&self.path)
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    fn configure(&self, options: SourceOptions) -> Result<()> {
        *write_lock(&self.path) = options.custom_path.map(PathBuf::from).or_else(default_path);
        Ok(())
    }

    fn list_profiles(&self) -> Result<Vec<ProfileInfo>> {
        if !self.available() {
            return Ok(Vec::new());
        }
        Ok(vec![ProfileInfo {
            name: PROFILE.into(),
            path: self.path(),
            is_default: true,
        }])
    }

    #[instrument(skip_all, fields(source = SOURCE_NAME))]
    async fn read(&self, cancel: &CancellationToken) -> Result<Vec<BookmarkRecord>> {
        let Some(path) = read_lock(&self.path).clone() else {
            return Ok(Vec::new());
        };
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| FavsError::read_failure(SOURCE_NAME, format!("{}: {e}", path.display())))?;
        let records = parse_plist(&data)?;
        debug!(count = records.len(), "read Safari bookmarks");
        Ok(records)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Node {
    #[serde(rename = "WebBookmarkType")]
    kind: String,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "URLString")]
    url: String,
    #[serde(rename = "URIDictionary")]
    uri: BTreeMap<String, String>,
    #[serde(rename = "Children")]
    children: Vec<Node>,
}

fn parse_plist(data: &[u8]) -> Result<Vec<BookmarkRecord>> {
    let root: Node = plist::from_bytes(data)
        .map_err(|e| FavsError::read_failure(SOURCE_NAME, format!("invalid plist: {e}")))?;
    let mut records = Vec::new();
    walk(&root, &[], &mut records);
    Ok(records)
}

fn walk(node: &Node, path: &[String], out: &mut Vec<BookmarkRecord>) {
    match node.kind.as_str() {
        LEAF => {
            let url = non_empty(&node.url)
                .or_else(|| node.uri.get("").map(String::as_str))
                .unwrap_or_default();
            if url.is_empty() {
                return;
            }
            let title = non_empty(&node.title)
                .or_else(|| node.uri.get("title").map(String::as_str))
                .filter(|t| !t.is_empty())
                .unwrap_or(url);
            out.push(BookmarkRecord {
                title: title.to_string(),
                url: url.to_string(),
                folder_path: path.to_vec(),
                source_name: SOURCE_NAME.to_string(),
                profile: PROFILE.to_string(),
                ..Default::default()
            });
        }
        LIST => {
            let mut current = path.to_vec();
            if !node.title.is_empty() {
                current.push(node.title.clone());
            }
            for child in &node.children {
                walk(child, &current, out);
            }
        }
        _ => {
            for child in &node.children {
                walk(child, path, out);
            }
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>WebBookmarkType</key><string>WebBookmarkTypeList</string>
  <key>Title</key><string></string>
  <key>Children</key>
  <array>
    <dict>
      <key>WebBookmarkType</key><string>WebBookmarkTypeList</string>
      <key>Title</key><string>BookmarksBar</string>
      <key>Children</key>
      <array>
        <dict>
          <key>WebBookmarkType</key><string>WebBookmarkTypeLeaf</string>
          <key>URLString</key><string>https://www.apple.com/</string>
          <key>URIDictionary</key>
          <dict><key>title</key><string>Apple</string></dict>
        </dict>
        <dict>
          <key>WebBookmarkType</key><string>WebBookmarkTypeLeaf</string>
          <key>URIDictionary</key>
          <dict><key></key><string>https://webkit.org/</string></dict>
        </dict>
        <dict>
          <key>WebBookmarkType</key><string>WebBookmarkTypeLeaf</string>
          <key>Title</key><string>No URL</string>
        </dict>
      </array>
    </dict>
    <dict>
      <key>WebBookmarkType</key><string>WebBookmarkTypeProxy</string>
      <key>Title</key><string>History</string>
    </dict>
  </array>
</dict>
</plist>
"#;

    #[test]
    fn parses_leaves_with_fallbacks() {
        let records = parse_plist(PLIST.as_bytes()).expect("parse");
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].title, "Apple");
        assert_eq!(records[0].url, "https://www.apple.com/");
        assert_eq!(records[0].folder_path, vec!["BookmarksBar"]);
        assert_eq!(records[0].profile, "default");

        // No title anywhere: the URL stands in.
        assert_eq!(records[1].url, "https://webkit.org/");
        assert_eq!(records[1].title, "https://webkit.org/");
    }

    #[tokio::test]
    async fn custom_path_is_readable_on_any_platform() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Bookmarks.plist");
        std::fs::write(&path, PLIST).expect("write");

        let source = SafariSource::new();
        source
            .configure(SourceOptions {
                custom_path: Some(path.display().to_string()),
                ..Default::default()
            })
            .expect("configure");

        assert!(source.available());
        assert_eq!(source.list_profiles().expect("profiles").len(), 1);
        let records = source.read(&CancellationToken::new()).await.expect("read");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.source_name == "safari"));
    }

    #[test]
    fn garbage_is_read_failure() {
        let err = parse_plist(b"definitely not a plist").expect_err("invalid");
        assert!(matches!(err, FavsError::ReadFailure { .. }));
    }
}

//! Chromium-family browsers (Chrome, Edge, Chromium, Brave).
//!
//! Each profile directory (`Default`, `Profile N`) under the browser's user
//! data directory holds a `Bookmarks` JSON file with a `roots` object of
//! folder trees.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use favs_shared::{
    BookmarkRecord, CancellationToken, FavsError, ProfileInfo, Result, SourceOptions, SourceReader,
};

use crate::{app_data_base, read_lock, write_lock};

/// Seconds between 1601-01-01 (Chromium epoch) and 1970-01-01.
const EPOCH_DELTA_SECS: i64 = 11_644_473_600;

const BOOKMARKS_FILE: &str = "Bookmarks";
const DEFAULT_PROFILE: &str = "Default";

/// Profile label used when reading a custom path.
const CUSTOM_PROFILE: &str = "custom";

/// A Chromium-based browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Chrome,
    Edge,
    Chromium,
    Brave,
}

impl Browser {
    pub fn name(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Edge => "edge",
            Self::Chromium => "chromium",
            Self::Brave => "brave",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Chrome => "Google Chrome",
            Self::Edge => "Microsoft Edge",
            Self::Chromium => "Chromium",
            Self::Brave => "Brave",
        }
    }

    /// User data directory relative to the platform base.
    fn relative_dir(self) -> &'static str {
        if cfg!(target_os = "macos") {
            match self {
                Self::Chrome => "Library/Application Support/Google/Chrome",
                Self::Edge => "Library/Application Support/Microsoft Edge",
                Self::Chromium => "Library/Application Support/Chromium",
                Self::Brave => "Library/Application Support/BraveSoftware/Brave-Browser",
            }
        } else if cfg!(windows) {
            match self {
                Self::Chrome => "Google/Chrome/User Data",
                Self::Edge => "Microsoft/Edge/User Data",
                Self::Chromium => "Chromium/User Data",
                Self::Brave => "BraveSoftware/Brave-Browser/User Data",
            }
        } else {
            match self {
                Self::Chrome => ".config/google-chrome",
                Self::Edge => ".config/microsoft-edge",
                Self::Chromium => ".config/chromium",
                Self::Brave => ".config/BraveSoftware/Brave-Browser",
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Profile {
    name: String,
    path: PathBuf,
}

#[derive(Debug, Default)]
struct State {
    options: SourceOptions,
    profiles: Vec<Profile>,
}

/// Reads bookmarks from a Chromium-family browser.
pub struct ChromiumSource {
    browser: Browser,
    base_dir: Option<PathBuf>,
    state: RwLock<State>,
}

impl ChromiumSource {
    /// Reader for `browser` at its platform default location.
    pub fn new(browser: Browser) -> Self {
        let base_dir = app_data_base(false).map(|base| base.join(browser.relative_dir()));
        Self::with_base_dir(browser, base_dir)
    }

    /// Reader for `browser` with an explicit user data directory.
    pub fn with_base_dir(browser: Browser, base_dir: Option<PathBuf>) -> Self {
        let profiles = base_dir.as_deref().map(discover_profiles).unwrap_or_default();
        Self {
            browser,
            base_dir,
            state: RwLock::new(State {
                options: SourceOptions::default(),
                profiles,
            }),
        }
    }

    fn base_display(&self) -> String {
        self.base_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    /// Files to read for the current profile selection.
    fn targets(&self) -> Vec<Profile> {
        let state = read_lock(&self.state);
        if let Some(custom) = &state.options.custom_path {
            return vec![Profile {
                name: CUSTOM_PROFILE.into(),
                path: PathBuf::from(custom),
            }];
        }

        let wanted = state.options.profile.as_str();
        if wanted.is_empty() {
            return state.profiles.clone();
        }
        if let Some(p) = state.profiles.iter().find(|p| p.name == wanted) {
            return vec![p.clone()];
        }
        // A missing "Default" falls back to the first profile found.
        if wanted == DEFAULT_PROFILE {
            return state.profiles.first().cloned().into_iter().collect();
        }
        Vec::new()
    }
}

#[async_trait]
impl SourceReader for ChromiumSource {
    fn name(&self) -> &str {
        self.browser.name()
    }

    fn display_name(&self) -> &str {
        self.browser.display_name()
    }

    fn available(&self) -> bool {
        let state = read_lock(&self.state);
        match &state.options.custom_path {
            Some(custom) => Path::new(custom).exists(),
            None => !state.profiles.is_empty(),
        }
    }

    fn path(&self) -> String {
        let state = read_lock(&self.state);
        if let Some(custom) = &state.options.custom_path {
            return custom.clone();
        }
        match state.profiles.as_slice() {
            [] => format!("{} (no profiles found)", self.base_display()),
            [only] => only.path.display().to_string(),
            many => {
                let names: Vec<&str> = many.iter().map(|p| p.name.as_str()).collect();
                format!("{} [{}]", self.base_display(), names.join(", "))
            }
        }
    }

    fn configure(&self, options: SourceOptions) -> Result<()> {
        let mut state = write_lock(&self.state);
        if options.custom_path.is_none() {
            state.profiles = self
                .base_dir
                .as_deref()
                .map(discover_profiles)
                .unwrap_or_default();
        }
        state.options = options;
        Ok(())
    }

    fn list_profiles(&self) -> Result<Vec<ProfileInfo>> {
        let state = read_lock(&self.state);
        Ok(state
            .profiles
            .iter()
            .enumerate()
            .map(|(i, p)| ProfileInfo {
                name: p.name.clone(),
                path: p.path.display().to_string(),
                is_default: i == 0 || p.name == DEFAULT_PROFILE,
            })
            .collect())
    }

    #[instrument(skip_all, fields(source = self.browser.name()))]
    async fn read(&self, cancel: &CancellationToken) -> Result<Vec<BookmarkRecord>> {
        let targets = self.targets();
        let read_all = targets.len() > 1 || read_lock(&self.state).options.profile.is_empty();
        let mut records = Vec::new();

        for target in targets {
            if cancel.is_cancelled() {
                break;
            }
            match read_bookmarks_file(&target.path, self.browser.name(), &target.name).await {
                Ok(mut found) => {
                    debug!(profile = %target.name, count = found.len(), "read profile");
                    records.append(&mut found);
                }
                // Reading every profile tolerates a broken one.
                Err(e) if read_all => {
                    warn!(profile = %target.name, error = %e, "skipping unreadable profile");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Discovery and parsing
// ---------------------------------------------------------------------------

fn discover_profiles(base: &Path) -> Vec<Profile> {
    let Ok(entries) = std::fs::read_dir(base) else {
        return Vec::new();
    };

    let mut profiles: Vec<Profile> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name != DEFAULT_PROFILE && !name.starts_with("Profile ") {
                return None;
            }
            let path = entry.path().join(BOOKMARKS_FILE);
            path.is_file().then_some(Profile { name, path })
        })
        .collect();
    profiles.sort_by(|a, b| a.name.cmp(&b.name));
    profiles
}

#[derive(Debug, Deserialize)]
struct BookmarksFile {
    #[serde(default)]
    roots: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Node {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    url: String,
    date_added: String,
    children: Vec<Node>,
}

async fn read_bookmarks_file(
    path: &Path,
    source: &str,
    profile: &str,
) -> Result<Vec<BookmarkRecord>> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| FavsError::read_failure(source, format!("{}: {e}", path.display())))?;
    parse_bookmarks(&data, source, profile)
}

/// Parse a `Bookmarks` file into records.
fn parse_bookmarks(data: &[u8], source: &str, profile: &str) -> Result<Vec<BookmarkRecord>> {
    let file: BookmarksFile = serde_json::from_slice(data)
        .map_err(|e| FavsError::read_failure(source, format!("invalid Bookmarks JSON: {e}")))?;

    let mut records = Vec::new();
    for root in file.roots.into_values() {
        // `roots` also carries non-folder entries such as `sync_transaction_version`.
        let Ok(node) = serde_json::from_value::<Node>(root) else {
            continue;
        };
        if node.kind == "folder" {
            walk(&node, &[], source, profile, &mut records);
        }
    }
    Ok(records)
}

fn walk(
    folder: &Node,
    parent: &[String],
    source: &str,
    profile: &str,
    out: &mut Vec<BookmarkRecord>,
) {
    let mut path = parent.to_vec();
    if !folder.name.is_empty() {
        path.push(folder.name.clone());
    }

    for child in &folder.children {
        match child.kind.as_str() {
            "url" if !child.url.is_empty() => out.push(BookmarkRecord {
                title: child.name.clone(),
                url: child.url.clone(),
                folder_path: path.clone(),
                date_added: chromium_date(&child.date_added),
                source_name: source.to_string(),
                profile: profile.to_string(),
                tags: Vec::new(),
            }),
            "folder" => walk(child, &path, source, profile, out),
            _ => {}
        }
    }
}

/// Microseconds since 1601-01-01 as a string. Zero or garbage means unknown.
fn chromium_date(raw: &str) -> Option<DateTime<Utc>> {
    let micros: i64 = raw.parse().ok().filter(|v| *v != 0)?;
    DateTime::from_timestamp_micros(micros - EPOCH_DELTA_SECS * 1_000_000)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "../../../fixtures/bookmarks/chrome-Bookmarks.json";

    fn fixture() -> Vec<u8> {
        std::fs::read(FIXTURE).expect("fixture exists")
    }

    fn user_data_dir(profiles: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in profiles {
            let profile_dir = dir.path().join(name);
            std::fs::create_dir_all(&profile_dir).expect("mkdir");
            std::fs::write(profile_dir.join(BOOKMARKS_FILE), fixture()).expect("write");
        }
        // Not a profile directory; must be ignored.
        std::fs::create_dir_all(dir.path().join("System Profile")).expect("mkdir");
        dir
    }

    #[test]
    fn parses_fixture_folders_and_dates() {
        let records = parse_bookmarks(&fixture(), "chrome", "Default").expect("parse");

        let rust = records
            .iter()
            .find(|r| r.url == "https://www.rust-lang.org/")
            .expect("rust bookmark");
        assert_eq!(rust.title, "Rust Programming Language");
        assert_eq!(rust.folder_path, vec!["Bookmarks bar", "Dev"]);
        assert_eq!(rust.source_name, "chrome");
        assert_eq!(rust.profile, "Default");
        assert_eq!(
            rust.date_added.expect("dated").timestamp(),
            13_350_000_000 - EPOCH_DELTA_SECS
        );

        // Entries without a URL are dropped.
        assert!(records.iter().all(|r| !r.url.is_empty()));
    }

    #[test]
    fn zero_date_is_unknown() {
        assert!(chromium_date("0").is_none());
        assert!(chromium_date("").is_none());
        assert!(chromium_date("not a number").is_none());
    }

    #[test]
    fn invalid_json_is_read_failure() {
        let err = parse_bookmarks(b"{not json", "chrome", "Default").expect_err("invalid");
        assert!(matches!(err, FavsError::ReadFailure { .. }));
    }

    #[test]
    fn discovers_only_profile_directories() {
        let dir = user_data_dir(&["Profile 2", "Default"]);
        let source = ChromiumSource::with_base_dir(Browser::Chrome, Some(dir.path().to_path_buf()));

        assert!(source.available());
        let profiles = source.list_profiles().expect("profiles");
        let names: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Default", "Profile 2"]);
        assert!(profiles[0].is_default);
        assert!(!profiles[1].is_default);
    }

    #[tokio::test]
    async fn profile_selection() {
        let dir = user_data_dir(&["Profile 1", "Profile 2"]);
        let source = ChromiumSource::with_base_dir(Browser::Brave, Some(dir.path().to_path_buf()));
        let cancel = CancellationToken::new();
        let single = parse_bookmarks(&fixture(), "brave", "x").expect("parse").len();

        source.configure(SourceOptions::for_profile("")).expect("configure");
        let all = source.read(&cancel).await.expect("read all");
        assert_eq!(all.len(), single * 2);

        source
            .configure(SourceOptions::for_profile("Profile 2"))
            .expect("configure");
        let records = source.read(&cancel).await.expect("read one");
        assert_eq!(records.len(), single);
        assert!(records.iter().all(|r| r.profile == "Profile 2"));

        // "Default" is missing here, so the first profile is used.
        source
            .configure(SourceOptions::for_profile("Default"))
            .expect("configure");
        let records = source.read(&cancel).await.expect("read default");
        assert!(records.iter().all(|r| r.profile == "Profile 1"));

        source
            .configure(SourceOptions::for_profile("Nope"))
            .expect("configure");
        assert!(source.read(&cancel).await.expect("read missing").is_empty());
    }

    #[tokio::test]
    async fn custom_path_reads_one_file() {
        let source = ChromiumSource::with_base_dir(Browser::Edge, None);
        assert!(!source.available());

        source
            .configure(SourceOptions {
                custom_path: Some(FIXTURE.into()),
                ..Default::default()
            })
            .expect("configure");
        assert!(source.available());
        assert_eq!(source.path(), FIXTURE);

        let records = source.read(&CancellationToken::new()).await.expect("read");
        assert!(!records.is_empty());
        assert!(records.iter().all(|r| r.profile == "custom" && r.source_name == "edge"));
    }

    #[tokio::test]
    async fn cancelled_read_returns_nothing() {
        let dir = user_data_dir(&["Default"]);
        let source = ChromiumSource::with_base_dir(Browser::Chrome, Some(dir.path().to_path_buf()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(source.read(&cancel).await.expect("read").is_empty());
    }
}

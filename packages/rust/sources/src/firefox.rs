//! Mozilla Firefox, via the `places.sqlite` database of a profile.
//!
//! Firefox keeps the database locked while running, so it is copied (with its
//! write-ahead log, if any) into a temporary directory and read from there.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use libsql::{Connection, params};
use tracing::{debug, instrument};

use favs_shared::{
    BookmarkRecord, CancellationToken, FavsError, ProfileInfo, Result, SourceOptions, SourceReader,
};

use crate::{app_data_base, from_unix_micros, read_lock, write_lock};

const SOURCE_NAME: &str = "firefox";
const PLACES_FILE: &str = "places.sqlite";

/// `moz_bookmarks.id` of the built-in tags folder.
const TAGS_ROOT_ID: i64 = 4;

/// Guard against cycles when walking the parent chain.
const MAX_FOLDER_DEPTH: usize = 64;

#[derive(Debug, Default)]
struct State {
    options: SourceOptions,
    db_path: Option<PathBuf>,
    profile: String,
}

/// Reads bookmarks from Firefox.
pub struct FirefoxSource {
    profiles_dir: Option<PathBuf>,
    state: RwLock<State>,
}

impl FirefoxSource {
    pub fn new() -> Self {
        let rel = if cfg!(target_os = "macos") {
            "Library/Application Support/Firefox/Profiles"
        } else if cfg!(windows) {
            "Mozilla/Firefox/Profiles"
        } else {
            ".mozilla/firefox"
        };
        Self::with_profiles_dir(app_data_base(true).map(|base| base.join(rel)))
    }

    /// Reader with an explicit profiles directory.
    pub fn with_profiles_dir(profiles_dir: Option<PathBuf>) -> Self {
        let source = Self {
            profiles_dir,
            state: RwLock::new(State::default()),
        };
        let (db_path, profile) = source.locate(&SourceOptions::default());
        {
            let mut state = write_lock(&source.state);
            state.db_path = db_path;
            state.profile = profile;
        }
        source
    }

    /// Profile directories that contain a places database, sorted by name.
    fn profile_dirs(&self) -> Vec<(String, PathBuf)> {
        let Some(dir) = &self.profiles_dir else {
            return Vec::new();
        };
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut found: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| {
                let places = entry.path().join(PLACES_FILE);
                places
                    .is_file()
                    .then(|| (entry.file_name().to_string_lossy().into_owned(), places))
            })
            .collect();
        found.sort();
        found
    }

    /// Database path and profile label for `options`.
    fn locate(&self, options: &SourceOptions) -> (Option<PathBuf>, String) {
        if let Some(custom) = &options.custom_path {
            let path = PathBuf::from(custom);
            let profile = path
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return (Some(path), profile);
        }

        let profiles = self.profile_dirs();
        let wanted = options.profile.as_str();
        let chosen = if wanted.is_empty() || wanted == "Default" {
            // Profile directories have random prefixes, so "Default" means the
            // first one found.
            profiles
                .iter()
                .find(|(name, _)| name == wanted)
                .or_else(|| profiles.first())
        } else {
            profiles.iter().find(|(name, _)| name == wanted)
        };

        match chosen {
            Some((name, path)) => (Some(path.clone()), name.clone()),
            None => (None, wanted.to_string()),
        }
    }
}

impl Default for FirefoxSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceReader for FirefoxSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn display_name(&self) -> &str {
        "Mozilla Firefox"
    }

    fn available(&self) -> bool {
        read_lock(&self.state)
            .db_path
            .as_deref()
            .is_some_and(Path::is_file)
    }

    fn path(&self) -> String {
        read_lock(&self.state)
            .db_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    fn configure(&self, options: SourceOptions) -> Result<()> {
        let (db_path, profile) = self.locate(&options);
        let mut state = write_lock(&self.state);
        state.options = options;
        state.db_path = db_path;
        state.profile = profile;
        Ok(())
    }

    fn list_profiles(&self) -> Result<Vec<ProfileInfo>> {
        let current = read_lock(&self.state).profile.clone();
        Ok(self
            .profile_dirs()
            .into_iter()
            .map(|(name, path)| ProfileInfo {
                is_default: name == current,
                name,
                path: path.display().to_string(),
            })
            .collect())
    }

    #[instrument(skip_all, fields(source = SOURCE_NAME))]
    async fn read(&self, cancel: &CancellationToken) -> Result<Vec<BookmarkRecord>> {
        let (db_path, profile) = {
            let state = read_lock(&self.state);
            (state.db_path.clone(), state.profile.clone())
        };
        let Some(db_path) = db_path else {
            return Ok(Vec::new());
        };
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        let copy = copy_database(&db_path).await?;
        let db = libsql::Builder::new_local(copy.path().join(PLACES_FILE))
            .build()
            .await
            .map_err(db_error)?;
        let conn = db.connect().map_err(db_error)?;

        let records = read_places(&conn, &profile).await?;
        debug!(count = records.len(), %profile, "read places database");
        Ok(records)
    }
}

fn db_error(e: libsql::Error) -> FavsError {
    FavsError::read_failure(SOURCE_NAME, e)
}

/// Copy the database and its WAL into a fresh temporary directory.
async fn copy_database(path: &Path) -> Result<tempfile::TempDir> {
    let dir = tempfile::Builder::new()
        .prefix("favs-firefox-")
        .tempdir()
        .map_err(|e| FavsError::io(std::env::temp_dir(), e))?;

    tokio::fs::copy(path, dir.path().join(PLACES_FILE))
        .await
        .map_err(|e| FavsError::read_failure(SOURCE_NAME, format!("{}: {e}", path.display())))?;

    let wal = path.with_extension("sqlite-wal");
    if wal.is_file() {
        let target = dir.path().join(format!("{PLACES_FILE}-wal"));
        if let Err(e) = tokio::fs::copy(&wal, &target).await {
            debug!(error = %e, "could not copy write-ahead log");
        }
    }
    Ok(dir)
}

#[derive(Debug)]
struct Folder {
    parent: i64,
    title: String,
}

async fn read_places(conn: &Connection, profile: &str) -> Result<Vec<BookmarkRecord>> {
    // --- Folders ---
    let mut folders: HashMap<i64, Folder> = HashMap::new();
    let mut rows = conn
        .query("SELECT id, parent, title FROM moz_bookmarks WHERE type = 2", params![])
        .await
        .map_err(db_error)?;
    while let Some(row) = rows.next().await.map_err(db_error)? {
        let (Ok(id), Ok(parent)) = (row.get::<i64>(0), row.get::<i64>(1)) else {
            continue;
        };
        let title: Option<String> = row.get(2).ok();
        folders.insert(
            id,
            Folder {
                parent,
                title: title.unwrap_or_default(),
            },
        );
    }

    // --- Tags ---
    let mut tags: HashMap<String, Vec<String>> = HashMap::new();
    let mut rows = conn
        .query(
            "SELECT p.url, tag_folder.title
             FROM moz_bookmarks b
             JOIN moz_places p ON b.fk = p.id
             JOIN moz_bookmarks tag_folder ON b.parent = tag_folder.id
             WHERE tag_folder.parent = ?1
               AND p.url IS NOT NULL
               AND tag_folder.title IS NOT NULL",
            params![TAGS_ROOT_ID],
        )
        .await
        .map_err(db_error)?;
    while let Some(row) = rows.next().await.map_err(db_error)? {
        if let (Ok(url), Ok(tag)) = (row.get::<String>(0), row.get::<String>(1)) {
            tags.entry(url).or_default().push(tag);
        }
    }

    // --- Bookmarks ---
    let mut rows = conn
        .query(
            "SELECT b.title, p.url, b.parent, b.dateAdded
             FROM moz_bookmarks b
             JOIN moz_places p ON b.fk = p.id
             WHERE b.type = 1
               AND p.url IS NOT NULL
               AND p.url NOT LIKE 'place:%'
             ORDER BY b.id",
            params![],
        )
        .await
        .map_err(db_error)?;

    let mut seen = std::collections::HashSet::new();
    let mut records = Vec::new();
    while let Some(row) = rows.next().await.map_err(db_error)? {
        let (Ok(url), Ok(parent)) = (row.get::<String>(1), row.get::<i64>(2)) else {
            continue;
        };
        if url.is_empty() || is_under_tags_root(parent, &folders) || !seen.insert(url.clone()) {
            continue;
        }

        let title: Option<String> = row.get(0).ok();
        let title = title.filter(|t| !t.is_empty()).unwrap_or_else(|| url.clone());
        let date_added: Option<i64> = row.get(3).ok();

        records.push(BookmarkRecord {
            title,
            folder_path: folder_path(parent, &folders),
            date_added: date_added.and_then(from_unix_micros),
            source_name: SOURCE_NAME.to_string(),
            profile: profile.to_string(),
            tags: tags.get(&url).cloned().unwrap_or_default(),
            url,
        });
    }

    Ok(records)
}

fn is_under_tags_root(mut id: i64, folders: &HashMap<i64, Folder>) -> bool {
    for _ in 0..MAX_FOLDER_DEPTH {
        if id == TAGS_ROOT_ID {
            return true;
        }
        match folders.get(&id) {
            Some(folder) => id = folder.parent,
            None => return false,
        }
    }
    false
}

fn folder_path(mut id: i64, folders: &HashMap<i64, Folder>) -> Vec<String> {
    let mut path = Vec::new();
    for _ in 0..MAX_FOLDER_DEPTH {
        let Some(folder) = folders.get(&id) else {
            break;
        };
        if !folder.title.is_empty() {
            path.push(folder.title.clone());
        }
        id = folder.parent;
    }
    path.reverse();
    path
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

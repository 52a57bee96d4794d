//! Built-in bookmark sources.
//!
//! Each reader converts one external bookmark store into
//! [`favs_shared::BookmarkRecord`]s. Readers are shared through the registry as
//! trait objects, so their configured state lives behind a lock.

mod chromium;
mod firefox;
mod import;
mod safari;

use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use favs_shared::SourceReader;

pub use chromium::{Browser, ChromiumSource};
pub use firefox::FirefoxSource;
pub use import::ImportSource;
pub use safari::SafariSource;

/// Every built-in source, ready to register.
pub fn builtin_sources() -> Vec<Arc<dyn SourceReader>> {
    vec![
        Arc::new(ChromiumSource::new(Browser::Chrome)),
        Arc::new(ChromiumSource::new(Browser::Edge)),
        Arc::new(ChromiumSource::new(Browser::Chromium)),
        Arc::new(ChromiumSource::new(Browser::Brave)),
        Arc::new(FirefoxSource::new()),
        Arc::new(SafariSource::new()),
        Arc::new(ImportSource::new()),
    ]
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Base directory for per-user application data.
///
/// Browsers keep their data under `%LOCALAPPDATA%` (Chromium family) or
/// `%APPDATA%` (Firefox) on Windows and under the home directory elsewhere.
pub(crate) fn app_data_base(roaming: bool) -> Option<PathBuf> {
    if cfg!(windows) {
        if roaming {
            dirs::config_dir()
        } else {
            dirs::data_local_dir()
        }
    } else {
        dirs::home_dir()
    }
}

/// Microseconds since the Unix epoch; zero and out-of-range values mean "unknown".
pub(crate) fn from_unix_micros(micros: i64) -> Option<DateTime<Utc>> {
    if micros <= 0 {
        return None;
    }
    DateTime::from_timestamp_micros(micros)
}

// Configured state is replaced wholesale by `configure`, so a poisoned lock
// still holds a consistent value.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_are_unique() {
        let sources = builtin_sources();
        let mut names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), sources.len());
        assert_eq!(
            names,
            vec!["brave", "chrome", "chromium", "edge", "firefox", "import", "safari"]
        );
    }

    #[test]
    fn unix_micros_zero_is_unknown() {
        assert!(from_unix_micros(0).is_none());
        let date = from_unix_micros(1_700_000_000_000_000).expect("in range");
        assert_eq!(date.timestamp(), 1_700_000_000);
    }
}

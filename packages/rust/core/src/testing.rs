//! In-memory sources and renderers for exercising the pipeline and server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use favs_shared::{
    BookmarkRecord, CancellationToken, FavsError, FilteredCollection, ProfileInfo, RenderOptions,
    Renderer, RendererOptions, Result, SourceOptions, SourceReader,
};

/// A source returning a fixed list of records.
pub struct StaticSource {
    name: String,
    display_name: String,
    records: Vec<BookmarkRecord>,
    available: bool,
    fail: bool,
    cancel_on_read: bool,
    reads: Arc<AtomicUsize>,
    last_options: Mutex<Option<SourceOptions>>,
}

impl StaticSource {
    /// Records are stamped with `name` as their source.
    pub fn new(name: &str, display_name: &str, records: Vec<BookmarkRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|mut r| {
                r.source_name = name.to_string();
                r
            })
            .collect();
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            records,
            available: true,
            fail: false,
            cancel_on_read: false,
            reads: Arc::new(AtomicUsize::new(0)),
            last_options: Mutex::new(None),
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Make every read fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Cancel the run's token from inside `read`, after returning records.
    pub fn cancelling(mut self) -> Self {
        self.cancel_on_read = true;
        self
    }

    /// Shared read counter, usable after the source moves into a registry.
    pub fn read_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }

    /// Options passed to the most recent `configure` call.
    pub fn last_options(&self) -> Option<SourceOptions> {
        self.last_options
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SourceReader for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn available(&self) -> bool {
        self.available
    }

    fn path(&self) -> String {
        format!("memory://{}", self.name)
    }

    fn configure(&self, options: SourceOptions) -> Result<()> {
        if let Ok(mut guard) = self.last_options.lock() {
            *guard = Some(options);
        }
        Ok(())
    }

    fn list_profiles(&self) -> Result<Vec<ProfileInfo>> {
        Ok(vec![ProfileInfo {
            name: "Default".into(),
            path: self.path(),
            is_default: true,
        }])
    }

    async fn read(&self, cancel: &CancellationToken) -> Result<Vec<BookmarkRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.cancel_on_read {
            cancel.cancel();
        }
        if self.fail {
            return Err(FavsError::read_failure(&self.name, "simulated failure"));
        }
        Ok(self.records.clone())
    }
}

/// A renderer emitting one `title<TAB>url` line per record.
pub struct StaticRenderer {
    name: String,
}

impl StaticRenderer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Renderer for StaticRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn file_extensions(&self) -> &[&str] {
        &[".txt"]
    }

    fn configure(&self, _options: RendererOptions) -> Result<()> {
        Ok(())
    }

    fn render(&self, collection: &FilteredCollection, _options: &RenderOptions) -> Result<Vec<u8>> {
        let mut out = String::new();
        for record in &collection.bookmarks {
            out.push_str(&record.title);
            out.push('\t');
            out.push_str(&record.url);
            out.push('\n');
        }
        Ok(out.into_bytes())
    }
}

/// Shorthand for a record with a title and URL.
pub fn record(title: &str, url: &str) -> BookmarkRecord {
    BookmarkRecord::new(title, url)
}

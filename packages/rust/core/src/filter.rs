//! Rule-based filter engine and URL deduplication.
//!
//! [`apply`] is a pure function: it never reorders, never errors, and reports
//! both the surviving records and a diagnostic trail. Exclusion rules run in a
//! fixed precedence and the first match drops the record:
//!
//! 1. excluded scheme
//! 2. URL longer than `max_url_length`
//! 3. folder path not matching any include folder (when the list is non-empty)
//! 4. folder path matching an exclude folder
//! 5. URL matching an exclude pattern
//!
//! Kept records may additionally produce warnings for a warn-listed scheme and
//! for a URL longer than `warn_url_length`.

use std::collections::HashSet;

use regex::Regex;
use tracing::debug;

use favs_shared::{BookmarkRecord, FilterRules};

/// Result of running the filter engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Records that survived, in input order.
    pub kept: Vec<BookmarkRecord>,
    /// Number of records dropped by any exclusion rule.
    pub excluded: usize,
    /// Advisory messages about kept records.
    pub warnings: Vec<String>,
}

/// Why a record was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Exclusion {
    Scheme(String),
    TooLong(usize),
    NotIncluded,
    Folder(String),
    Pattern,
}

/// Rules compiled once per run.
struct CompiledRules<'a> {
    rules: &'a FilterRules,
    patterns: Vec<Regex>,
    exclude_schemes: HashSet<String>,
    warn_schemes: HashSet<String>,
}

impl<'a> CompiledRules<'a> {
    fn new(rules: &'a FilterRules) -> Self {
        // Invalid patterns are dropped, not fatal.
        let patterns = rules
            .exclude_url_patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    debug!(pattern = %p, error = %e, "skipping invalid exclude pattern");
                    None
                }
            })
            .collect();

        Self {
            rules,
            patterns,
            exclude_schemes: lowercase_set(&rules.exclude_schemes),
            warn_schemes: lowercase_set(&rules.warn_schemes),
        }
    }

    fn exclusion(&self, record: &BookmarkRecord, scheme: &str) -> Option<Exclusion> {
        if self.exclude_schemes.contains(scheme) {
            return Some(Exclusion::Scheme(scheme.to_string()));
        }

        let max = self.rules.max_url_length;
        if max > 0 && record.url.len() > max {
            return Some(Exclusion::TooLong(record.url.len()));
        }

        let folders = record.folder_string();
        if !self.rules.include_folders.is_empty()
            && !self
                .rules
                .include_folders
                .iter()
                .any(|inc| folders.contains(inc.as_str()))
        {
            return Some(Exclusion::NotIncluded);
        }

        if let Some(exc) = self
            .rules
            .exclude_folders
            .iter()
            .find(|exc| folders.contains(exc.as_str()))
        {
            return Some(Exclusion::Folder(exc.clone()));
        }

        if self.patterns.iter().any(|re| re.is_match(&record.url)) {
            return Some(Exclusion::Pattern);
        }

        None
    }

    fn warnings(&self, record: &BookmarkRecord, scheme: &str, out: &mut Vec<String>) {
        if self.warn_schemes.contains(scheme) {
            out.push(format!(
                "bookmark '{}' uses scheme '{scheme}': {}",
                truncate(&record.title, 40),
                truncate(&record.url, 60)
            ));
        }

        let warn = self.rules.warn_url_length;
        if warn > 0 && record.url.len() > warn {
            out.push(format!(
                "bookmark '{}' has long URL ({} chars): {}",
                truncate(&record.title, 40),
                record.url.len(),
                truncate(&record.url, 60)
            ));
        }
    }
}

/// Apply `rules` to `records`.
pub fn apply(records: &[BookmarkRecord], rules: &FilterRules) -> FilterOutcome {
    let compiled = CompiledRules::new(rules);
    let mut outcome = FilterOutcome::default();

    for record in records {
        let scheme = url_scheme(&record.url);

        if let Some(reason) = compiled.exclusion(record, &scheme) {
            debug!(url = %truncate(&record.url, 60), ?reason, "excluded");
            outcome.excluded += 1;
            continue;
        }

        compiled.warnings(record, &scheme, &mut outcome.warnings);
        outcome.kept.push(record.clone());
    }

    outcome
}

/// Drop records whose URL was already seen, keeping the first occurrence.
pub fn deduplicate(records: Vec<BookmarkRecord>) -> Vec<BookmarkRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.url.clone()))
        .collect()
}

/// Sort records by title, case-insensitively. The sort is stable.
pub fn sort_by_title(records: &mut [BookmarkRecord]) {
    records.sort_by_cached_key(|record| record.title.to_lowercase());
}

/// Lowercased scheme: everything before the first `:`. Empty when there is
/// no `:` or when the URL starts with one.
pub fn url_scheme(url: &str) -> String {
    match url.find(':') {
        Some(idx) if idx > 0 => url[..idx].to_lowercase(),
        _ => String::new(),
    }
}

fn lowercase_set(values: &[String]) -> HashSet<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

/// Shorten to at most `max` characters, ending with `...` when cut.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max <= 3 {
        return s.chars().take(max).collect();
    }
    let head: String = s.chars().take(max - 3).collect();
    format!("{head}...")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! End-to-end pipeline: sources → filter → transform → render.

use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use favs_shared::{
    AppConfig, CancellationToken, Collection, FavsError, FilterRules, ProfileInfo, RenderOptions,
    RendererOptions, Result, SourceDescriptor, SourceReader, TransformConfig,
};

use crate::filter;
use crate::registry::AdapterRegistry;

/// Source names tried first, in order, when picking or scanning sources.
pub const SOURCE_PREFERENCE: &[&str] = &["chrome", "firefox", "edge", "safari", "chromium", "brave"];

/// Profile requested in single-source mode when nothing else is configured.
pub const DEFAULT_PROFILE: &str = "Default";

// ---------------------------------------------------------------------------
// Request / report
// ---------------------------------------------------------------------------

/// Which sources a run reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadMode {
    /// One source: the named one, or the first enabled and available one in
    /// preference order.
    Single {
        source: Option<String>,
        profile: Option<String>,
    },
    /// Every enabled and available source, every profile.
    All,
}

/// Everything a pipeline run needs besides the registry.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub mode: ReadMode,
    pub filter: FilterRules,
    pub transform: TransformConfig,
    /// Name of the renderer to invoke.
    pub renderer: String,
    /// Passed to [`favs_shared::Renderer::configure`] before rendering.
    pub renderer_options: RendererOptions,
    pub render: RenderOptions,
}

impl PipelineRequest {
    /// Build a request from the loaded config. Grouping by source only
    /// applies when reading every source.
    pub fn from_config(config: &AppConfig, mode: ReadMode, renderer: &str, style: &str) -> Self {
        let pipeline = &config.pipeline;
        let mut render = pipeline.render.to_options(pipeline.transform.sort, style);
        render.group_by_source = render.group_by_source && mode == ReadMode::All;

        Self {
            mode,
            filter: pipeline.filter.clone(),
            transform: pipeline.transform,
            renderer: renderer.to_string(),
            renderer_options: (&config.renderer(renderer)).into(),
            render,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// One entry per contributing source.
    pub sources: Vec<SourceDescriptor>,
    /// Records read before filtering.
    pub collected: usize,
    /// Records handed to the renderer.
    pub rendered: usize,
    /// Records dropped by filter rules.
    pub excluded: usize,
    /// Filter warnings about kept records.
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a source has been read.
    fn source_read(&self, name: &str, count: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &PipelineReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_read(&self, _name: &str, _count: usize) {}
    fn done(&self, _report: &PipelineReport) {}
}

// ---------------------------------------------------------------------------
// Source selection
// ---------------------------------------------------------------------------

/// Registered source names in preference order: the preferred names that are
/// registered, then every other registered name, sorted.
pub fn source_preference(registry: &AdapterRegistry) -> Vec<String> {
    let registered = registry.source_names();
    let mut ordered: Vec<String> = SOURCE_PREFERENCE
        .iter()
        .filter(|name| registered.iter().any(|r| r.as_str() == **name))
        .map(|name| name.to_string())
        .collect();
    ordered.extend(
        registered
            .into_iter()
            .filter(|name| !SOURCE_PREFERENCE.contains(&name.as_str())),
    );
    ordered
}

fn as_read_failure(name: &str, err: FavsError) -> FavsError {
    match err {
        err @ FavsError::ReadFailure { .. } => err,
        other => FavsError::read_failure(name, other),
    }
}

/// Read one source into a collection.
///
/// An explicit `source` is used as-is; otherwise the first enabled and
/// available source in preference order is picked.
#[instrument(skip_all, fields(source = source.unwrap_or("auto")))]
pub async fn read_single(
    registry: &AdapterRegistry,
    config: &AppConfig,
    source: Option<&str>,
    profile: Option<&str>,
    cancel: &CancellationToken,
) -> Result<Collection> {
    let reader = match source {
        Some(name) => registry
            .source(name)
            .ok_or_else(|| FavsError::source_not_found(name))?,
        None => source_preference(registry)
            .iter()
            .filter(|name| config.source(name).enabled)
            .filter_map(|name| registry.source(name))
            .find(|reader| reader.available())
            .ok_or_else(|| FavsError::source_not_found("no enabled source is available"))?,
    };

    let settings = config.source(reader.name());
    let profile = match profile {
        Some(p) if !p.is_empty() => p.to_string(),
        _ if !settings.profile.is_empty() => settings.profile.clone(),
        _ => DEFAULT_PROFILE.to_string(),
    };

    reader.configure(settings.to_options(profile.clone()))?;
    debug!(source = reader.name(), path = %reader.path(), %profile, "reading source");

    let records = reader
        .read(cancel)
        .await
        .map_err(|e| as_read_failure(reader.name(), e))?;

    let mut collection = Collection::new();
    collection.add(records, reader.name(), profile, reader.path());
    Ok(collection)
}

/// Read every enabled, available source, skipping the ones that fail.
///
/// Stops early when `cancel` fires and returns what was collected so far.
#[instrument(skip_all)]
pub async fn read_all(
    registry: &AdapterRegistry,
    config: &AppConfig,
    cancel: &CancellationToken,
    progress: &dyn ProgressReporter,
) -> Collection {
    let mut collection = Collection::new();

    for name in source_preference(registry) {
        if cancel.is_cancelled() {
            warn!(collected = collection.len(), "cancelled, stopping source scan");
            break;
        }

        let Some(reader) = registry.source(&name) else {
            continue;
        };
        let settings = config.source(&name);
        if !settings.enabled {
            debug!(source = %name, "disabled, skipping");
            continue;
        }
        // Configure first: a custom path can make a source available.
        if let Err(e) = reader.configure(settings.to_options("")) {
            warn!(source = %name, error = %e, "configuration rejected, skipping");
            continue;
        }
        if !reader.available() {
            debug!(source = %name, "unavailable, skipping");
            continue;
        }

        debug!(source = %name, path = %reader.path(), "reading source");
        let records = match reader.read(cancel).await {
            Ok(records) => records,
            Err(e) => {
                warn!(source = %name, error = %e, "read failed, skipping");
                continue;
            }
        };

        progress.source_read(&name, records.len());
        if records.is_empty() {
            continue;
        }

        // The descriptor is labelled with the first record's profile.
        let profile = records[0].profile.clone();
        info!(source = %name, count = records.len(), "read bookmarks");
        collection.add(records, name, profile, reader.path());
    }

    collection
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Run the full pipeline and return the rendered bytes.
///
/// 1. Resolve the renderer
/// 2. Read sources (single or all)
/// 3. Filter, then optionally deduplicate and sort
/// 4. Render
#[instrument(skip_all, fields(renderer = %request.renderer))]
pub async fn run(
    registry: &AdapterRegistry,
    config: &AppConfig,
    request: &PipelineRequest,
    cancel: &CancellationToken,
    progress: &dyn ProgressReporter,
) -> Result<(Vec<u8>, PipelineReport)> {
    let start = Instant::now();

    let renderer = registry
        .renderer(&request.renderer)
        .ok_or_else(|| FavsError::InvalidFormat {
            name: request.renderer.clone(),
            available: registry.renderer_names().join(", "),
        })?;
    if !config.renderer(&request.renderer).enabled {
        return Err(FavsError::config_invalid(
            &request.renderer,
            "renderer is disabled in the config",
        ));
    }

    // --- Phase 1: Read ---
    progress.phase("Reading bookmarks");
    let collection = match &request.mode {
        ReadMode::Single { source, profile } => {
            let collection =
                read_single(registry, config, source.as_deref(), profile.as_deref(), cancel)
                    .await?;
            for descriptor in collection.sources() {
                progress.source_read(&descriptor.name, descriptor.count);
            }
            collection
        }
        ReadMode::All => read_all(registry, config, cancel, progress).await,
    };

    if collection.is_empty() {
        return Err(FavsError::EmptyResult);
    }

    // --- Phase 2: Filter / transform ---
    progress.phase("Filtering");
    let outcome = filter::apply(collection.bookmarks(), &request.filter);
    for warning in &outcome.warnings {
        warn!("{warning}");
    }
    if outcome.excluded > 0 {
        debug!(excluded = outcome.excluded, "excluded by filter rules");
    }

    let mut records = outcome.kept;
    if request.transform.deduplicate {
        records = filter::deduplicate(records);
    }
    if request.transform.sort {
        filter::sort_by_title(&mut records);
    }

    // --- Phase 3: Render ---
    progress.phase("Rendering");
    let view = collection.with_bookmarks(records);
    renderer.configure(request.renderer_options.clone())?;
    let bytes = renderer.render(&view, &request.render)?;

    let report = PipelineReport {
        sources: view.sources.clone(),
        collected: collection.len(),
        rendered: view.bookmarks.len(),
        excluded: outcome.excluded,
        warnings: outcome.warnings,
        elapsed: start.elapsed(),
    };

    info!(
        collected = report.collected,
        rendered = report.rendered,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "pipeline complete"
    );
    progress.done(&report);

    Ok((bytes, report))
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// A source and the profiles it can read, for `--list`.
#[derive(Debug, Clone)]
pub struct SourceProfiles {
    pub name: String,
    pub display_name: String,
    pub available: bool,
    pub path: String,
    pub profiles: Vec<ProfileInfo>,
}

/// Every registered source in preference order with its profiles.
/// Profiles are only listed for available sources.
pub fn list_profiles(registry: &AdapterRegistry, config: &AppConfig) -> Vec<SourceProfiles> {
    source_preference(registry)
        .into_iter()
        .filter_map(|name| registry.source(&name))
        .map(|reader| {
            if let Err(e) = reader.configure(config.source(reader.name()).to_options("")) {
                debug!(source = reader.name(), error = %e, "configure failed");
            }
            let available = reader.available();
            let profiles = if available {
                reader.list_profiles().unwrap_or_else(|e| {
                    warn!(source = reader.name(), error = %e, "could not list profiles");
                    Vec::new()
                })
            } else {
                Vec::new()
            };
            describe(reader.as_ref(), available, profiles)
        })
        .collect()
}

fn describe(reader: &dyn SourceReader, available: bool, profiles: Vec<ProfileInfo>) -> SourceProfiles {
    SourceProfiles {
        name: reader.name().to_string(),
        display_name: reader.display_name().to_string(),
        available,
        path: reader.path(),
        profiles,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use favs_shared::{BookmarkRecord, RendererConfig, SourceConfig};

    use super::*;
    use crate::testing::{StaticRenderer, StaticSource, record};

    const NETSCAPE_FIXTURE: &str =
        concat!(env!("CARGO_MANIFEST_DIR"), "/../../../fixtures/bookmarks/netscape.html");

    fn enabled(names: &[&str]) -> AppConfig {
        let sources: BTreeMap<String, SourceConfig> = names
            .iter()
            .map(|n| {
                (
                    n.to_string(),
                    SourceConfig {
                        enabled: true,
                        ..Default::default()
                    },
                )
            })
            .collect();
        AppConfig {
            sources,
            ..AppConfig::default()
        }
    }

    fn with_profile(mut r: BookmarkRecord, profile: &str) -> BookmarkRecord {
        r.profile = profile.into();
        r
    }

    fn request(mode: ReadMode) -> PipelineRequest {
        PipelineRequest {
            mode,
            filter: FilterRules::permissive(),
            transform: TransformConfig::default(),
            renderer: "plain".into(),
            renderer_options: RendererOptions::default(),
            render: RenderOptions::default(),
        }
    }

    fn registry() -> AdapterRegistry {
        let registry = AdapterRegistry::new();
        registry.register_renderer(Arc::new(StaticRenderer::new("plain")));
        registry
    }

    #[test]
    fn preference_puts_known_names_first() {
        let registry = AdapterRegistry::new();
        for name in ["zeta", "brave", "alpha", "firefox", "chrome"] {
            registry.register_source(Arc::new(StaticSource::new(name, name, vec![])));
        }
        assert_eq!(
            source_preference(&registry),
            vec!["chrome", "firefox", "brave", "alpha", "zeta"]
        );
    }

    #[tokio::test]
    async fn all_mode_skips_failing_source() {
        let registry = registry();
        registry.register_source(Arc::new(StaticSource::new(
            "s1",
            "One",
            vec![
                with_profile(record("A", "https://a"), "p1"),
                with_profile(record("B", "https://b"), "p1"),
                with_profile(record("C", "https://c"), "p1"),
            ],
        )));
        registry.register_source(Arc::new(
            StaticSource::new("s2", "Two", vec![record("X", "https://x")]).failing(),
        ));

        let config = enabled(&["s1", "s2"]);
        let collection =
            read_all(&registry, &config, &CancellationToken::new(), &SilentProgress).await;

        assert_eq!(collection.len(), 3);
        assert_eq!(collection.sources().len(), 1);
        assert_eq!(collection.sources()[0].name, "s1");
        assert_eq!(collection.sources()[0].profile, "p1");
        assert_eq!(collection.sources()[0].count, 3);
    }

    #[tokio::test]
    async fn all_mode_skips_disabled_unavailable_and_empty() {
        let registry = registry();
        registry.register_source(Arc::new(StaticSource::new(
            "on",
            "On",
            vec![record("A", "https://a")],
        )));
        registry.register_source(Arc::new(StaticSource::new(
            "off",
            "Off",
            vec![record("B", "https://b")],
        )));
        registry.register_source(Arc::new(
            StaticSource::new("gone", "Gone", vec![record("C", "https://c")]).unavailable(),
        ));
        registry.register_source(Arc::new(StaticSource::new("empty", "Empty", vec![])));

        let config = enabled(&["on", "gone", "empty"]);
        let collection =
            read_all(&registry, &config, &CancellationToken::new(), &SilentProgress).await;

        let names: Vec<&str> = collection.sources().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["on"]);
    }

    #[tokio::test]
    async fn all_mode_reads_every_profile() {
        let registry = registry();
        let source = StaticSource::new("s", "S", vec![record("A", "https://a")]);
        let source = Arc::new(source);
        registry.register_source(source.clone());

        let config = enabled(&["s"]);
        read_all(&registry, &config, &CancellationToken::new(), &SilentProgress).await;

        let options = source.last_options().expect("configured");
        assert_eq!(options.profile, "");
    }

    #[tokio::test]
    async fn cancelled_scan_collects_nothing() {
        let registry = registry();
        let source = StaticSource::new("s", "S", vec![record("A", "https://a")]);
        let reads = source.read_counter();
        registry.register_source(Arc::new(source));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let config = enabled(&["s"]);

        let err = run(&registry, &config, &request(ReadMode::All), &cancel, &SilentProgress)
            .await
            .expect_err("nothing collected");
        assert!(matches!(err, FavsError::EmptyResult));
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_during_scan_keeps_earlier_sources() {
        let registry = registry();
        registry.register_source(Arc::new(
            StaticSource::new("chrome", "Chrome", vec![record("A", "https://a"), record("B", "https://b")])
                .cancelling(),
        ));
        let later = StaticSource::new("firefox", "Firefox", vec![record("F", "https://f")]);
        let later_reads = later.read_counter();
        registry.register_source(Arc::new(later));

        let cancel = CancellationToken::new();
        let collection =
            read_all(&registry, &enabled(&["chrome", "firefox"]), &cancel, &SilentProgress).await;

        assert!(cancel.is_cancelled());
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.sources().len(), 1);
        assert_eq!(collection.sources()[0].name, "chrome");
        assert_eq!(later_reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_mode_reads_import_file_from_config() {
        let registry = registry();
        registry.register_source(Arc::new(favs_sources::ImportSource::new()));

        let mut config = enabled(&[]);
        config.sources.insert(
            "import".into(),
            SourceConfig {
                enabled: true,
                custom_path: Some(NETSCAPE_FIXTURE.into()),
                ..Default::default()
            },
        );

        let collection =
            read_all(&registry, &config, &CancellationToken::new(), &SilentProgress).await;
        assert_eq!(collection.len(), 4);
        assert_eq!(collection.sources()[0].name, "import");
    }

    #[tokio::test]
    async fn disabled_renderer_is_rejected() {
        let registry = registry();
        registry.register_source(Arc::new(StaticSource::new("s", "S", vec![record("A", "https://a")])));
        let mut config = enabled(&["s"]);
        config.renderers.insert(
            "plain".into(),
            RendererConfig {
                enabled: false,
                ..Default::default()
            },
        );

        let err = run(&registry, &config, &request(ReadMode::All), &CancellationToken::new(), &SilentProgress)
            .await
            .expect_err("disabled renderer");
        assert!(matches!(err, FavsError::ConfigInvalid { .. }));
    }

    #[tokio::test]
    async fn single_mode_defaults_profile_and_picks_preferred() {
        let registry = registry();
        let firefox = Arc::new(StaticSource::new("firefox", "Firefox", vec![record("F", "https://f")]));
        registry.register_source(firefox.clone());
        registry.register_source(Arc::new(
            StaticSource::new("chrome", "Chrome", vec![record("C", "https://c")]).unavailable(),
        ));

        let config = enabled(&["chrome", "firefox"]);
        let collection = read_single(&registry, &config, None, None, &CancellationToken::new())
            .await
            .expect("read");

        assert_eq!(collection.sources()[0].name, "firefox");
        assert_eq!(collection.sources()[0].profile, DEFAULT_PROFILE);
        assert_eq!(firefox.last_options().expect("configured").profile, "Default");
    }

    #[tokio::test]
    async fn single_mode_errors() {
        let registry = registry();
        registry.register_source(Arc::new(
            StaticSource::new("bad", "Bad", vec![]).failing(),
        ));
        let config = enabled(&[]);
        let cancel = CancellationToken::new();

        let err = read_single(&registry, &config, Some("missing"), None, &cancel)
            .await
            .expect_err("unknown source");
        assert!(matches!(err, FavsError::NotFound { .. }));

        let err = read_single(&registry, &config, None, None, &cancel)
            .await
            .expect_err("nothing enabled");
        assert!(matches!(err, FavsError::NotFound { .. }));

        let err = read_single(&registry, &config, Some("bad"), Some("p"), &cancel)
            .await
            .expect_err("read fails");
        assert!(matches!(err, FavsError::ReadFailure { .. }));
    }

    #[tokio::test]
    async fn run_filters_dedups_and_renders() {
        let registry = registry();
        registry.register_source(Arc::new(StaticSource::new(
            "s",
            "S",
            vec![
                record("A", "http://a"),
                record("B", "javascript:alert(1)"),
                record("A2", "http://a"),
            ],
        )));
        let config = enabled(&["s"]);

        let mut req = request(ReadMode::Single {
            source: Some("s".into()),
            profile: None,
        });
        req.filter.exclude_schemes = vec!["javascript".into()];
        req.transform.deduplicate = true;

        let (bytes, report) = run(&registry, &config, &req, &CancellationToken::new(), &SilentProgress)
            .await
            .expect("run");

        assert_eq!(String::from_utf8(bytes).expect("utf8"), "A\thttp://a\n");
        assert_eq!(report.collected, 3);
        assert_eq!(report.excluded, 1);
        assert_eq!(report.rendered, 1);
        assert_eq!(report.sources.len(), 1);
    }

    #[tokio::test]
    async fn run_sorts_case_insensitively() {
        let registry = registry();
        registry.register_source(Arc::new(StaticSource::new(
            "s",
            "S",
            vec![record("beta", "https://b"), record("Alpha", "https://a")],
        )));
        let config = enabled(&["s"]);
        let mut req = request(ReadMode::All);
        req.transform.sort = true;

        let (bytes, _) = run(&registry, &config, &req, &CancellationToken::new(), &SilentProgress)
            .await
            .expect("run");
        assert_eq!(
            String::from_utf8(bytes).expect("utf8"),
            "Alpha\thttps://a\nbeta\thttps://b\n"
        );
    }

    #[tokio::test]
    async fn unknown_renderer_is_invalid_format() {
        let registry = registry();
        let mut req = request(ReadMode::All);
        req.renderer = "pdf".into();

        let err = run(&registry, &enabled(&[]), &req, &CancellationToken::new(), &SilentProgress)
            .await
            .expect_err("unknown renderer");
        match err {
            FavsError::InvalidFormat { name, available } => {
                assert_eq!(name, "pdf");
                assert_eq!(available, "plain");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn all_sources_empty_is_empty_result() {
        let registry = registry();
        registry.register_source(Arc::new(StaticSource::new("s", "S", vec![]).failing()));
        let err = run(
            &registry,
            &enabled(&["s"]),
            &request(ReadMode::All),
            &CancellationToken::new(),
            &SilentProgress,
        )
        .await
        .expect_err("empty");
        assert!(matches!(err, FavsError::EmptyResult));
    }

    #[test]
    fn from_config_only_groups_in_all_mode() {
        let config = AppConfig::default();
        let single = PipelineRequest::from_config(
            &config,
            ReadMode::Single {
                source: None,
                profile: None,
            },
            "markdown",
            "",
        );
        assert!(!single.render.group_by_source);
        assert_eq!(single.renderer_options.style, "textual");

        let all = PipelineRequest::from_config(&config, ReadMode::All, "markdown", "table");
        assert!(all.render.group_by_source);
        assert_eq!(all.render.style, "table");
    }

    #[test]
    fn list_profiles_follows_preference() {
        let registry = registry();
        registry.register_source(Arc::new(StaticSource::new("zeta", "Zeta", vec![])));
        registry.register_source(Arc::new(StaticSource::new("chrome", "Chrome", vec![]).unavailable()));

        let listed = list_profiles(&registry, &AppConfig::default());
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "chrome");
        assert!(listed[0].profiles.is_empty());
        assert_eq!(listed[1].profiles.len(), 1);
    }
}

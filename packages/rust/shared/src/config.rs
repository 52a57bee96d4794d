//! Application configuration for favs.
//!
//! User config lives at `~/.favs/favs.toml`; a `favs.toml` or `.favs.toml` in
//! the working directory takes precedence. CLI flags override config file
//! values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::adapter::{RenderOptions, RendererOptions, SourceOptions};
use crate::error::{FavsError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "favs.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".favs";

/// Local config files checked in the working directory, in order.
const LOCAL_CONFIG_NAMES: &[&str] = &["favs.toml", ".favs.toml"];

/// Sources enabled when no config file says otherwise.
const DEFAULT_ENABLED_SOURCES: &[&str] = &["chrome", "edge", "firefox", "safari"];

// ---------------------------------------------------------------------------
// Config structs (matching favs.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Per-source settings keyed by reader name.
    #[serde(default = "default_sources")]
    pub sources: BTreeMap<String, SourceConfig>,

    /// Per-renderer settings keyed by renderer name.
    #[serde(default = "default_renderers")]
    pub renderers: BTreeMap<String, RendererConfig>,

    /// Filter, transform and render settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            renderers: default_renderers(),
            pipeline: PipelineConfig::default(),
        }
    }
}

fn default_sources() -> BTreeMap<String, SourceConfig> {
    DEFAULT_ENABLED_SOURCES
        .iter()
        .map(|name| {
            (
                name.to_string(),
                SourceConfig {
                    enabled: true,
                    ..Default::default()
                },
            )
        })
        .collect()
}

fn default_renderers() -> BTreeMap<String, RendererConfig> {
    let mut renderers = BTreeMap::new();
    renderers.insert(
        "markdown".to_string(),
        RendererConfig {
            enabled: true,
            style: "textual".into(),
            options: BTreeMap::new(),
        },
    );
    renderers
}

impl AppConfig {
    /// Settings for a source. Sources missing from the config are disabled.
    pub fn source(&self, name: &str) -> SourceConfig {
        self.sources.get(name).cloned().unwrap_or_default()
    }

    /// Settings for a renderer. Missing renderers get empty settings.
    pub fn renderer(&self, name: &str) -> RendererConfig {
        self.renderers.get(name).cloned().unwrap_or_default()
    }
}

/// `[sources.<name>]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Whether the source takes part in automatic selection and `--all`.
    #[serde(default)]
    pub enabled: bool,

    /// Profile to read in single-source mode.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile: String,

    /// Overrides the default data location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_path: Option<String>,

    /// Reader-specific options (e.g. credentials).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl SourceConfig {
    /// Reader options for the given profile selector.
    pub fn to_options(&self, profile: impl Into<String>) -> SourceOptions {
        SourceOptions {
            profile: profile.into(),
            custom_path: self.custom_path.clone(),
            options: self.options.clone(),
        }
    }
}

/// `[renderers.<name>]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// A disabled renderer is rejected by pipeline runs.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Default style for this renderer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub style: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            style: String::new(),
            options: BTreeMap::new(),
        }
    }
}

impl From<&RendererConfig> for RendererOptions {
    fn from(config: &RendererConfig) -> Self {
        Self {
            style: config.style.clone(),
            options: config.options.clone(),
        }
    }
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub filter: FilterRules,

    #[serde(default)]
    pub transform: TransformConfig,

    #[serde(default)]
    pub render: RenderConfig,
}

/// `[pipeline.filter]` section: the filter engine rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRules {
    /// Keep only records whose joined folder path contains one of these.
    #[serde(default)]
    pub include_folders: Vec<String>,

    /// Drop records whose joined folder path contains any of these.
    #[serde(default)]
    pub exclude_folders: Vec<String>,

    /// Drop records whose URL matches any of these regular expressions.
    #[serde(default)]
    pub exclude_url_patterns: Vec<String>,

    /// URL schemes to drop (case-insensitive).
    #[serde(default)]
    pub exclude_schemes: Vec<String>,

    /// URL schemes that produce a warning but are kept.
    #[serde(default)]
    pub warn_schemes: Vec<String>,

    /// Drop URLs longer than this (0 = unbounded).
    #[serde(default)]
    pub max_url_length: usize,

    /// Warn on URLs longer than this (0 = disabled).
    #[serde(default)]
    pub warn_url_length: usize,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            include_folders: Vec::new(),
            exclude_folders: vec!["Trash".into()],
            exclude_url_patterns: Vec::new(),
            exclude_schemes: vec!["data".into(), "javascript".into()],
            warn_schemes: vec![
                "file".into(),
                "chrome".into(),
                "about".into(),
                "blob".into(),
            ],
            max_url_length: 0,
            warn_url_length: 2048,
        }
    }
}

impl FilterRules {
    /// A rule set that keeps everything and warns about nothing.
    pub fn permissive() -> Self {
        Self {
            include_folders: Vec::new(),
            exclude_folders: Vec::new(),
            exclude_url_patterns: Vec::new(),
            exclude_schemes: Vec::new(),
            warn_schemes: Vec::new(),
            max_url_length: 0,
            warn_url_length: 0,
        }
    }
}

/// `[pipeline.transform]` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Drop repeated URLs, keeping the first occurrence.
    #[serde(default)]
    pub deduplicate: bool,

    /// Sort records by title, case-insensitively.
    #[serde(default)]
    pub sort: bool,
}

/// `[pipeline.render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_true")]
    pub include_metadata: bool,
    #[serde(default = "default_true")]
    pub include_dates: bool,
    #[serde(default = "default_true")]
    pub include_tags: bool,
    #[serde(default = "default_true")]
    pub include_profile: bool,
    #[serde(default = "default_true")]
    pub group_by_source: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            include_metadata: true,
            include_dates: true,
            include_tags: true,
            include_profile: true,
            group_by_source: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl RenderConfig {
    /// Render options with the given transform flags and style.
    pub fn to_options(&self, sort: bool, style: impl Into<String>) -> RenderOptions {
        RenderOptions {
            include_metadata: self.include_metadata,
            include_dates: self.include_dates,
            include_tags: self.include_tags,
            include_profile: self.include_profile,
            group_by_source: self.group_by_source,
            sort_alphabetically: sort,
            style: style.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.favs/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| FavsError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.favs/favs.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// First local config file that exists in `dir`, if any.
pub fn local_config_path(dir: &Path) -> Option<PathBuf> {
    LOCAL_CONFIG_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Load the application config.
///
/// Lookup order: `explicit`, a local file in the working directory, then the
/// user config file. Returns defaults when none of them exist.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }

    let cwd = std::env::current_dir().map_err(|e| FavsError::io(".", e))?;
    if let Some(path) = local_config_path(&cwd) {
        return load_config_from(&path);
    }

    let path = config_file_path()?;
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FavsError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| FavsError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FavsError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config).map_err(|e| FavsError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FavsError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[sources.chrome]"));
        assert!(toml_str.contains("javascript"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert!(parsed.source("firefox").enabled);
        assert_eq!(parsed.pipeline.filter.warn_url_length, 2048);
        assert_eq!(parsed.renderer("markdown").style, "textual");
    }

    #[test]
    fn unknown_sources_are_disabled() {
        let config = AppConfig::default();
        assert!(!config.source("brave").enabled);
        assert!(!config.source("import").enabled);
    }

    #[test]
    fn config_with_custom_source() {
        let toml_str = r#"
[sources.import]
enabled = true
custom_path = "/tmp/bookmarks.html"

[pipeline.filter]
exclude_schemes = ["ftp"]
max_url_length = 500

[pipeline.transform]
deduplicate = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let import = config.source("import");
        assert!(import.enabled);
        assert_eq!(import.custom_path.as_deref(), Some("/tmp/bookmarks.html"));
        // An explicit [sources] table replaces the default set.
        assert!(!config.source("chrome").enabled);
        assert_eq!(config.pipeline.filter.exclude_schemes, vec!["ftp"]);
        assert_eq!(config.pipeline.filter.max_url_length, 500);
        assert!(config.pipeline.transform.deduplicate);
        assert!(config.pipeline.render.include_metadata);
    }

    #[test]
    fn renderers_are_enabled_unless_turned_off() {
        let config: AppConfig = toml::from_str(
            r#"
[renderers.json]
style = "compact"

[renderers.html]
enabled = false
"#,
        )
        .expect("parse");
        assert!(config.renderer("json").enabled);
        assert!(!config.renderer("html").enabled);
        assert!(config.renderer("yaml").enabled);
    }

    #[test]
    fn local_config_is_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(local_config_path(dir.path()).is_none());

        std::fs::write(dir.path().join(".favs.toml"), "").expect("write");
        let found = local_config_path(dir.path()).expect("found");
        assert!(found.ends_with(".favs.toml"));

        let config = load_config(Some(&found)).expect("load");
        assert!(config.source("chrome").enabled);
    }

    #[test]
    fn render_config_to_options() {
        let render = RenderConfig {
            group_by_source: false,
            ..Default::default()
        };
        let opts = render.to_options(true, "table");
        assert!(!opts.group_by_source);
        assert!(opts.sort_alphabetically);
        assert_eq!(opts.style, "table");
    }
}

//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use favs_core::pipeline::{self, PipelineReport, PipelineRequest, ProgressReporter, ReadMode};
use favs_core::{AdapterRegistry, list_profiles};
use favs_server::Server;
use favs_shared::{AppConfig, CancellationToken, init_config, load_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// favs: browser bookmarks as context for AI assistants.
#[derive(Parser)]
#[command(
    name = "favs",
    version,
    about = "Export browser bookmarks as Markdown, JSON, YAML, OPML or HTML.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (default: ./favs.toml, ./.favs.toml or ~/.favs/favs.toml).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub export: ExportArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Options for the default export run.
#[derive(Args, Debug, Default)]
pub(crate) struct ExportArgs {
    /// Output file; `-` or nothing writes to stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Source to read (default: first available browser).
    #[arg(short, long)]
    pub browser: Option<String>,

    /// Profile name (default: configured profile, then "Default").
    #[arg(short, long)]
    pub profile: Option<String>,

    /// OPML or Netscape HTML file to read through the import source.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Read every available browser and profile.
    #[arg(long)]
    pub all: bool,

    /// Output format: markdown, json, yaml, opml or html.
    #[arg(long, default_value = "markdown")]
    pub format: String,

    /// Renderer style, e.g. textual, table or yaml for markdown.
    #[arg(long)]
    pub style: Option<String>,

    /// Sort alphabetically by title.
    #[arg(long)]
    pub sort: bool,

    /// Drop repeated URLs, keeping the first.
    #[arg(long)]
    pub dedup: bool,

    /// Omit the metadata header.
    #[arg(long)]
    pub no_metadata: bool,

    /// Do not group by source in --all mode.
    #[arg(long)]
    pub no_group: bool,

    /// URL schemes to exclude (comma-separated), replacing the configured list.
    #[arg(long, value_delimiter = ',')]
    pub exclude_schemes: Vec<String>,

    /// URL schemes that trigger a warning (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub warn_schemes: Vec<String>,

    /// Exclude URLs longer than this.
    #[arg(long)]
    pub max_url_length: Option<usize>,

    /// Warn on URLs longer than this.
    #[arg(long)]
    pub warn_url_length: Option<usize>,

    /// List available browser profiles and exit.
    #[arg(long)]
    pub list: bool,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Serve bookmarks over JSON-RPC on stdin/stdout.
    Serve,

    /// List registered sources and renderers.
    Adapters,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout only
/// carries rendered output or protocol frames.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "favs=info",
        1 => "favs=debug",
        _ => "favs=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        None if cli.export.list => cmd_list(config_path),
        None => cmd_export(config_path, &cli.export).await,
        Some(Command::Serve) => cmd_serve(config_path).await,
        Some(Command::Adapters) => cmd_adapters(),
        Some(Command::Config { action }) => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

/// A token cancelled on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            token.cancel();
        }
    });
    cancel
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Apply command-line overrides on top of the loaded config.
fn apply_overrides(config: &mut AppConfig, args: &ExportArgs) {
    let filter = &mut config.pipeline.filter;
    if !args.exclude_schemes.is_empty() {
        filter.exclude_schemes = args.exclude_schemes.clone();
    }
    if !args.warn_schemes.is_empty() {
        filter.warn_schemes = args.warn_schemes.clone();
    }
    if let Some(max) = args.max_url_length.filter(|n| *n > 0) {
        filter.max_url_length = max;
    }
    if let Some(warn) = args.warn_url_length.filter(|n| *n > 0) {
        filter.warn_url_length = warn;
    }

    let transform = &mut config.pipeline.transform;
    transform.sort |= args.sort;
    transform.deduplicate |= args.dedup;

    let render = &mut config.pipeline.render;
    if args.no_metadata {
        render.include_metadata = false;
    }
    if args.no_group {
        render.group_by_source = false;
    }

    if let Some(input) = &args.input {
        let import = config.sources.entry("import".to_string()).or_default();
        import.enabled = true;
        import.custom_path = Some(input.to_string_lossy().into_owned());
    }
}

fn read_mode(args: &ExportArgs) -> ReadMode {
    if args.all {
        return ReadMode::All;
    }
    let source = args
        .browser
        .clone()
        .or_else(|| args.input.as_ref().map(|_| "import".to_string()));
    ReadMode::Single {
        source,
        profile: args.profile.clone(),
    }
}

async fn cmd_export(config_path: Option<&Path>, args: &ExportArgs) -> Result<()> {
    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, args);

    let registry = AdapterRegistry::with_builtins();
    registry.configure_sources(&config);
    let request = PipelineRequest::from_config(
        &config,
        read_mode(args),
        &args.format,
        args.style.as_deref().unwrap_or_default(),
    );

    info!(format = %args.format, all = args.all, "exporting bookmarks");

    let cancel = cancel_on_ctrl_c();
    let reporter = CliProgress::new();
    let (bytes, report) = pipeline::run(&registry, &config, &request, &cancel, &reporter).await?;

    match args.output.as_deref().filter(|p| *p != Path::new("-")) {
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|e| eyre!("creating output directory {}: {e}", parent.display()))?;
            }
            std::fs::write(path, &bytes)
                .map_err(|e| eyre!("writing {}: {e}", path.display()))?;
            print_summary(path, &report);
        }
    }

    Ok(())
}

fn print_summary(path: &Path, report: &PipelineReport) {
    let sources: Vec<String> = report
        .sources
        .iter()
        .map(|s| format!("{}/{}", s.name, s.profile))
        .collect();

    println!();
    println!("  Bookmarks exported!");
    println!("  Sources:   {}", sources.join(", "));
    println!("  Bookmarks: {}", report.rendered);
    println!("  Excluded:  {}", report.excluded);
    println!("  Warnings:  {}", report.warnings.len());
    println!("  Path:      {}", path.display());
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_read(&self, name: &str, count: usize) {
        self.spinner.set_message(format!("Read {count} bookmarks from {name}"));
    }

    fn done(&self, _report: &PipelineReport) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

// ---------------------------------------------------------------------------
// Other commands
// ---------------------------------------------------------------------------

fn cmd_list(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = AdapterRegistry::with_builtins();
    registry.configure_sources(&config);

    println!("Available browser profiles:");
    println!();
    for source in list_profiles(&registry, &config) {
        let status = if source.available {
            "available"
        } else {
            "not available"
        };
        println!("  {} ({status})", source.display_name);
        println!("    Path: {}", source.path);
        if !source.profiles.is_empty() {
            println!("    Profiles:");
            for profile in &source.profiles {
                let marker = if profile.is_default { " (default)" } else { "" };
                println!("      - {}{marker}", profile.name);
            }
        }
        println!();
    }
    Ok(())
}

async fn cmd_serve(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = AdapterRegistry::with_builtins();
    registry.configure_sources(&config);
    let registry = Arc::new(registry);

    info!("starting protocol server on stdio");
    let cancel = cancel_on_ctrl_c();
    Server::new(registry, config).serve_stdio(&cancel).await?;
    Ok(())
}

fn cmd_adapters() -> Result<()> {
    let registry = AdapterRegistry::with_builtins();

    println!("Sources:");
    println!();
    for name in registry.source_names() {
        let Some(source) = registry.source(&name) else {
            continue;
        };
        let status = if source.available() {
            "available"
        } else {
            "not available"
        };
        println!("  {name:<12} {:<20} [{status}]", source.display_name());
    }

    println!();
    println!("Renderers:");
    println!();
    for name in registry.renderer_names() {
        let Some(renderer) = registry.renderer(&name) else {
            continue;
        };
        println!(
            "  {name:<12} {:<20} {}",
            renderer.display_name(),
            renderer.file_extensions().join(", ")
        );
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("favs").chain(args.iter().copied())).expect("parse")
    }

    #[test]
    fn export_flags() {
        let cli = parse(&[
            "-b",
            "firefox",
            "--format",
            "json",
            "--exclude-schemes",
            "data,javascript,file",
            "--max-url-length",
            "500",
        ]);
        assert!(cli.command.is_none());
        assert_eq!(cli.export.browser.as_deref(), Some("firefox"));
        assert_eq!(cli.export.format, "json");
        assert_eq!(cli.export.exclude_schemes, vec!["data", "javascript", "file"]);
        assert_eq!(cli.export.max_url_length, Some(500));
    }

    #[test]
    fn subcommands() {
        assert!(matches!(parse(&["serve"]).command, Some(Command::Serve)));
        assert!(matches!(
            parse(&["config", "show"]).command,
            Some(Command::Config {
                action: ConfigAction::Show
            })
        ));
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = AppConfig::default();
        let args = ExportArgs {
            warn_schemes: vec!["ftp".into()],
            warn_url_length: Some(100),
            max_url_length: Some(0),
            dedup: true,
            no_metadata: true,
            ..Default::default()
        };
        let max_before = config.pipeline.filter.max_url_length;

        apply_overrides(&mut config, &args);

        let filter = &config.pipeline.filter;
        assert_eq!(filter.warn_schemes, vec!["ftp"]);
        assert_eq!(filter.warn_url_length, 100);
        assert_eq!(filter.max_url_length, max_before);
        assert_eq!(filter.exclude_schemes, vec!["data", "javascript"]);
        assert!(config.pipeline.transform.deduplicate);
        assert!(!config.pipeline.render.include_metadata);
    }

    #[test]
    fn input_file_selects_import_source() {
        let mut config = AppConfig::default();
        let args = ExportArgs {
            input: Some(PathBuf::from("bookmarks.html")),
            ..Default::default()
        };
        apply_overrides(&mut config, &args);

        let import = config.source("import");
        assert!(import.enabled);
        assert_eq!(import.custom_path.as_deref(), Some("bookmarks.html"));
        assert_eq!(
            read_mode(&args),
            ReadMode::Single {
                source: Some("import".into()),
                profile: None,
            }
        );

        let all = ExportArgs {
            all: true,
            ..Default::default()
        };
        assert_eq!(read_mode(&all), ReadMode::All);
    }
}

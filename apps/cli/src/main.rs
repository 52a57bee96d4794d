//! favs: export browser bookmarks as context for AI assistants.
//!
//! Reads bookmarks from installed browsers or export files, filters them and
//! renders Markdown, JSON, YAML, OPML or Netscape HTML. `favs serve` exposes the
//! same data over a JSON-RPC protocol server on stdio.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}

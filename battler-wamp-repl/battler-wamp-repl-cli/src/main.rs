//! Interactive shell for WAMP routers.
//!
//! Connections, sessions, calls, registrations, publishers, and subscriptions are created with
//! commands and addressed by dotted paths of their names, like `local.alice.add.first`. Anything
//! created on a session that is still establishing runs once the session is ready.

mod command;
mod config;
mod format;
mod path;
mod repl;
mod shell;
mod tokenizer;

use std::path::PathBuf;

use anyhow::Result;
use battler_wamp_repl::{
    backend::WebSocketConnector,
    connection::ConnectionManager,
};
use clap::Parser;
use tracing_core::Level;

use crate::{
    config::ReplConfig,
    repl::Repl,
    shell::Shell,
};

#[derive(Debug, Parser)]
#[command(version, about = "Interactive shell for WAMP routers")]
struct Args {
    /// File to load and save line history. Defaults to history.txt in the configuration directory.
    #[arg(long)]
    history_file: Option<PathBuf>,
    /// Do not load or save line history.
    #[arg(long, conflicts_with = "history_file")]
    no_history: bool,
    /// Commands to run before the first prompt. Defaults to startup.repl in the configuration
    /// directory, if it exists.
    #[arg(long)]
    startup_script: Option<PathBuf>,
    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = ReplConfig::resolve(
        args.history_file,
        args.no_history,
        args.startup_script,
        config::config_dir().as_deref(),
    );
    let shell = Shell::new(ConnectionManager::new(Box::new(
        WebSocketConnector::default(),
    )));
    Repl::new(shell, config)?.run().await
}

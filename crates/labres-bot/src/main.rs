//! labres
//!
//! Runs machine reservation commands against the local registry, either one
//! command per invocation or line by line from stdin.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use labres_bot::{CommandHandler, PageSource, Reply};
use labres_core::config::{self, Config};
use labres_core::tracing_init::{default_filter, init_tracing};
use labres_registry::{MachineStore, Registry, RegistryDatabase};

#[derive(Parser, Debug)]
#[command(name = "labres")]
#[command(version, about = "Lab machine reservation registry")]
struct Cli {
    /// Path to SQLite database file.
    #[arg(long, env = "LABRES_DB_PATH", global = true)]
    db_path: Option<PathBuf>,

    /// Configuration file, layered over the global settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for labres crates (overridden by RUST_LOG).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run a single command, e.g. `labres exec --nick carol reserve lab01`.
    Exec {
        /// Nick the command is issued by.
        #[arg(long, env = "LABRES_NICK")]
        nick: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Command verb followed by its arguments.
        #[arg(required = true, trailing_var_arg = true)]
        words: Vec<String>,
    },
    /// Read `<nick> <command> [args...]` lines from stdin.
    Shell {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// Machines table page URL used by `update`.
    #[arg(long, conflicts_with = "file")]
    url: Option<String>,

    /// Local copy of the machines table page used by `update`.
    #[arg(long)]
    file: Option<PathBuf>,
}

impl SourceArgs {
    fn resolve(self, config: &Config) -> Option<PageSource> {
        let timeout = Duration::from_secs(config.importer.timeout_secs);
        if let Some(path) = self.file {
            return Some(PageSource::File(path));
        }
        self.url
            .or_else(|| config.importer.url.clone())
            .map(|url| PageSource::Url { url, timeout })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(&default_filter(level), cli.log_json || config.logging.json);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting labres");

    let db_path = cli
        .db_path
        .clone()
        .or_else(|| config.database.path.clone())
        .or_else(config::database_path)
        .ok_or_else(|| anyhow::anyhow!("Cannot determine database path"))?;
    info!(path = %db_path.display(), "Opening registry database");
    let registry = Registry::new(RegistryDatabase::open(&db_path).await?);

    match cli.command {
        Mode::Exec {
            nick,
            source,
            words,
        } => {
            let handler = CommandHandler::new(registry, source.resolve(&config));
            let replies = handler.handle_line(&nick, &words.join(" ")).await?;
            print_replies(&nick, &replies)?;
        }
        Mode::Shell { source } => {
            let handler = CommandHandler::new(registry, source.resolve(&config));
            run_shell(&handler).await?;
        }
    }

    Ok(())
}

/// Handle stdin lines until EOF. A storage fault is reported and the loop
/// keeps going.
async fn run_shell<S: MachineStore>(handler: &CommandHandler<S>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (nick, command) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        match handler.handle_line(nick, command).await {
            Ok(replies) => print_replies(nick, &replies)?,
            Err(e) => {
                error!(error = %e, nick = %nick, "Command failed");
                print_replies(nick, &[Reply::to_sender(format!("Internal error: {e}"))])?;
            }
        }
    }

    info!("Input closed, exiting");
    Ok(())
}

fn print_replies(nick: &str, replies: &[Reply]) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    for reply in replies {
        writeln!(out, "{}", reply.render(nick))?;
    }
    out.flush()
}

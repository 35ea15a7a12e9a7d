use std::path::PathBuf;
use std::process;

use clap::Parser;
use spooldb_core::api::Engine;
use spooldb_core::config::EngineConfig;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;

use commands::{CliResult, Command};
use display::OutputMode;

/// SpoolDB: run one command against databases of JSONL tables.
#[derive(Parser, Debug)]
#[command(name = "spooldb", version)]
struct Cli {
    /// Database root directory (default: ~/.local/share/spooldb/databases).
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Directory for sort runs and group partitions (default: a private temp dir).
    #[arg(long)]
    scratch: Option<PathBuf>,

    /// Records per in-memory sort batch.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Output results as machine-parseable JSON.
    #[arg(short, long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

fn default_root_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spooldb")
        .join("databases")
}

impl Cli {
    fn config(&self) -> EngineConfig {
        let root = self.root.clone().unwrap_or_else(default_root_dir);
        let mut config = EngineConfig::with_root_dir(root);
        config.scratch_dir = self.scratch.clone();
        if let Some(n) = self.chunk_size {
            config.default_chunk_size = n;
        }
        config
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = cli.config();
    debug!(
        root = %config.root_dir.display(),
        chunk_size = config.default_chunk_size,
        "starting spooldb"
    );
    let engine = Engine::new(config)?;
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Pretty
    };
    debug!(command = ?cli.command, "executing command");
    let result = cli.command.execute(&engine)?;
    display::render(result, mode, &mut std::io::stdout().lock())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

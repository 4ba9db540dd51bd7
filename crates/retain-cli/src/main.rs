mod config;
mod server;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use retain_core::{Engine, consolidate_memory, edit_distance, similarity};
use rmcp::{ServiceExt, transport::stdio};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "retain", about = "Adaptive memory engine CLI and MCP server")]
struct Cli {
    /// TOML config file (falls back to RETAIN_CONFIG, then defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio transport
    Serve,

    /// Show edit distance and similarity between two strings
    Similarity {
        a: String,
        b: String,
    },

    /// Store every non-empty line of the given files as a memory, then report
    Replay {
        /// Pattern file(s), one pattern per line
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Run memory consolidation after loading
        #[arg(long)]
        consolidate: bool,

        /// Retrieve memories containing this text after loading
        #[arg(long)]
        query: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let path = config::resolve_path(cli.config.as_deref());
    config::load(path.as_deref())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    // stdout carries the MCP transport; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Serve => cmd_serve(&cli).await,
        Commands::Similarity { a, b } => cmd_similarity(a, b),
        Commands::Replay {
            files,
            consolidate,
            query,
        } => cmd_replay(&cli, files, *consolidate, query.as_deref()),
        Commands::Config => cmd_config(&cli),
    }
}

async fn cmd_serve(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli)?;
    let engine = Engine::new(settings.engine).context("invalid engine config")?;
    tracing::info!(
        capacity = engine.config().capacity,
        "starting MCP server"
    );

    let server = server::RetainServer::new(engine);
    let scheduler = match settings.server.consolidate_every_secs {
        0 => None,
        secs => {
            tracing::info!("consolidating every {secs}s");
            Some(server.spawn_consolidation(Duration::from_secs(secs)))
        }
    };

    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server")?;
    service.waiting().await?;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    Ok(())
}

fn cmd_similarity(a: &str, b: &str) -> Result<()> {
    println!("distance:   {}", edit_distance(a, b));
    println!("similarity: {:.4}", similarity(a, b));
    Ok(())
}

fn cmd_replay(cli: &Cli, files: &[PathBuf], consolidate: bool, query: Option<&str>) -> Result<()> {
    let settings = load_settings(cli)?;
    let mut engine = Engine::new(settings.engine).context("invalid engine config")?;

    for path in files {
        let stored = replay_file(&mut engine, path)?;
        println!("replayed {} → {} patterns", path.display(), stored);
    }

    if consolidate {
        let report = consolidate_memory(&mut engine.memories);
        println!(
            "consolidated: pruned={}, merged={}, remaining={}",
            report.pruned, report.merged, report.remaining
        );
    }

    if let Some(query) = query {
        let found = engine.memories.retrieve_relevant(query);
        if found.is_empty() {
            println!("(no memories found)");
        }
        for memory in &found {
            println!(
                "match: {} (frequency={}, importance={:.3})",
                memory.pattern, memory.frequency, memory.importance
            );
        }
    }

    let stats = engine.memories.stats();
    println!("total:       {}", stats.total_memories);
    println!("active:      {}", stats.active_memories);
    println!("utilization: {:.3}", stats.utilization_rate);
    Ok(())
}

fn replay_file(engine: &mut Engine, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut stored = 0;
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        engine.memories.insert_default(line);
        stored += 1;
    }
    tracing::debug!(stored, "replayed {}", path.display());
    Ok(stored)
}

fn cmd_config(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli)?;
    print!("{}", config::render(&settings)?);
    Ok(())
}

//! autoload — inspect and drive the load registry from the command line.
//!
//! Resolves names, lists candidate units, loads a prefix through an external
//! interpreter, or keeps reloading changed units while watching the search path.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use autoload_core::{load_dotenv, HostEnvironment, Settings};
use autoload_registry::{CommandExecutor, LoadRegistry, LoaderOptions};

// ── CLI ─────────────────────────────────────────────────────────────

/// Resolve, list and load autoloadable units.
#[derive(Parser, Debug)]
#[command(name = "autoload", version, about)]
struct Cli {
    /// Path to a TOML settings file; environment variables are used when absent.
    #[arg(long, env = "AUTOLOAD_CONFIG")]
    config: Option<String>,

    /// Environment whose module path is searched.
    #[arg(long, env = "AUTOLOAD_ENVIRONMENT")]
    environment: Option<String>,

    /// Interpreter that executes each unit (`<interpreter> <file>`).
    #[arg(long, env = "AUTOLOAD_INTERPRETER", default_value = "/bin/sh")]
    interpreter: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the file a logical name resolves to.
    Resolve { name: String },

    /// List candidate unit files under a prefix without loading them.
    Files { prefix: String },

    /// Load every unit under a prefix and print the load records as JSON.
    Load {
        prefix: String,

        /// Execute units without sandboxing.
        #[arg(long)]
        no_wrap: bool,
    },

    /// Load a prefix, then reload changed units until interrupted.
    Watch {
        prefix: String,

        #[arg(long)]
        no_wrap: bool,
    },
}

fn settings(cli: &Cli) -> anyhow::Result<Settings> {
    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("failed to load settings from {path}"))?,
        None => Settings::from_env()?,
    };
    settings.log_summary();
    Ok(settings)
}

// ── main ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let settings = settings(&cli)?;
    let environment = cli.environment.clone().or_else(|| settings.environment.clone());

    let host = Arc::new(HostEnvironment::initialized_with(settings));
    let registry = Arc::new(LoadRegistry::from_host(
        host,
        CommandExecutor::new(&cli.interpreter),
    )?);
    let env = environment.as_deref();

    match cli.command {
        Command::Resolve { name } => match registry.resolve(&name, env)? {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("{name} not found on the search path"),
        },
        Command::Files { prefix } => {
            for file in registry.files_under(&prefix, env)? {
                println!("{file}");
            }
        }
        Command::Load { prefix, no_wrap } => {
            let scoped = registry.register_scope(
                "cli",
                &prefix,
                LoaderOptions::default().wrap(!no_wrap),
            )?;
            let loaded = scoped.load_all(env)?;
            info!(count = loaded.len(), prefix = %scoped.prefix(), "loaded units");
            println!("{}", serde_json::to_string_pretty(&registry.records())?);
        }
        Command::Watch { prefix, no_wrap } => {
            let scoped = registry.register_scope(
                "cli",
                &prefix,
                LoaderOptions::default().wrap(!no_wrap),
            )?;
            let loaded = scoped.load_all(env)?;
            info!(count = loaded.len(), prefix = %scoped.prefix(), "loaded units");

            let watcher = registry.watch(environment.clone())?;
            info!(directories = watcher.roots().len(), "press Ctrl-C to stop");
            // The process exits on Ctrl-C; park wakeups may be spurious.
            loop {
                std::thread::park();
            }
        }
    }

    Ok(())
}

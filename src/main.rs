//! CLI entrypoint.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use sphinx_kconfig::{BuildConfig, Inventory, Kconfig, KconfigDatabase, OutputFormat, SphinxBuilder};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Builder {
    Html,
    Latex,
}

impl From<Builder> for OutputFormat {
    fn from(builder: Builder) -> Self {
        match builder {
            Builder::Html => Self::Html,
            Builder::Latex => Self::Latex,
        }
    }
}

#[derive(Parser)]
#[command(name = "sphinx-kconfig", version, about = "Kconfig option reference and search for documentation builds")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the documentation in SOURCE into OUTPUT
    Build {
        source: PathBuf,
        output: PathBuf,

        /// Configuration file (YAML, TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of parallel jobs
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Output builder
        #[arg(short, long, value_enum, default_value = "html")]
        builder: Builder,

        /// Remove the output directory before building
        #[arg(long, default_value_t = false)]
        clean: bool,
    },
    /// Write the options database for a Kconfig tree
    Database {
        /// Root Kconfig file
        kconfig: PathBuf,
        output: PathBuf,
    },
    /// List the objects of an inventory file
    Inventory {
        path: PathBuf,

        /// Base URI the locations are resolved against
        #[arg(long, default_value = "")]
        uri: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Build {
            source,
            output,
            config,
            jobs,
            builder,
            clean,
        } => {
            let config = BuildConfig::load(config.as_deref()).context("Failed to load configuration")?;
            let mut sphinx = SphinxBuilder::new(config, source, output)?;
            sphinx.set_format(builder.into());
            if let Some(jobs) = jobs {
                sphinx.set_parallel_jobs(jobs);
            }
            if clean {
                sphinx.clean().await?;
            }

            let stats = sphinx.build().await?;
            info!(
                "Processed {} files in {:?}: {} references resolved, {} external, {} unresolved",
                stats.files_processed,
                stats.build_time,
                stats.references_resolved,
                stats.references_external,
                stats.references_unresolved
            );
            if stats.warnings > 0 {
                warn!("Build finished with {} warnings", stats.warnings);
            }
        }
        Command::Database { kconfig, output } => {
            let tree = Kconfig::load(&kconfig)
                .with_context(|| format!("Failed to load Kconfig tree from {}", kconfig.display()))?;
            let database = KconfigDatabase::build(&tree);
            let path = database.write(&output)?;
            info!("Wrote {} entries to {}", database.len(), path.display());
        }
        Command::Inventory { path, uri } => {
            let inventory = Inventory::load(&path, &uri)
                .with_context(|| format!("Failed to read inventory {}", path.display()))?;
            println!("{} {}", inventory.project, inventory.version);
            for (objtype, name, item) in inventory.iter() {
                println!("{:<16} {:<40} {}", objtype, name, item.uri);
            }
        }
    }

    Ok(())
}

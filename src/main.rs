mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

// Re-export from lib for internal use
use index_loader::{assembler, error, indexer, rewriter};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "index_loader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Djson {
            input,
            out_file,
            no_analyze_import,
        } => {
            cli::djson(&input, out_file.as_deref(), no_analyze_import)?;
        }
        Commands::Indexify {
            folders,
            index,
            deep,
            exclude,
            rename_default,
        } => {
            cli::indexify(&folders, &index, deep, &exclude, rename_default)?;
        }
        Commands::Rewrite {
            paths,
            modules,
            realtime_parse,
            debug,
        } => {
            cli::rewrite(&paths, &modules, realtime_parse, debug)?;
        }
    }

    Ok(())
}

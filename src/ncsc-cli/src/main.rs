mod cli;
mod commands;
mod config;
mod file_io;

use anyhow::Result;
use clap::Parser;
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Convert {
            input,
            output,
            platform,
            name_order,
        } => {
            let options = Config::load()?.options(platform.selected(), name_order);
            commands::convert::handle(&input, output.as_deref(), &options)?;
        }

        Commands::Inspect {
            input,
            platform,
            json,
        } => {
            let options = Config::load()?.options(platform.selected(), false);
            commands::inspect::handle(&input, &options, json)?;
        }

        Commands::Configure {
            platform,
            name_order,
            show,
        } => {
            commands::configure::handle(platform, name_order, show)?;
        }
    }

    Ok(())
}

/// Log to stderr; RUST_LOG takes precedence over --verbose
fn init_tracing(verbose: bool) {
    // The binary shares the library's crate name; command modules log at info
    let default_filter = if verbose {
        "ncsc=debug"
    } else {
        "ncsc=warn,ncsc::commands=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

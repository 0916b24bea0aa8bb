//! gitcat - a Git-backed versioned table catalog
//!
//! Command-line entry point: runs one statement with `-e`, or an
//! interactive shell.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gitcat::catalog::{CatalogFactory, Identity};
use gitcat::config::{CatalogConfig, ConfigError};
use gitcat::shell::{render, Repl, Session};

#[derive(Debug, Parser)]
#[command(name = "gitcat", version, about = "Git-backed versioned table catalog")]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Catalog repository location (path or file:// URI)
    #[arg(long)]
    uri: Option<String>,

    /// Branch or tag to work on (default: the repository's default branch)
    #[arg(long = "ref")]
    reference: Option<String>,

    /// Root directory for table locations
    #[arg(long)]
    warehouse: Option<String>,

    /// Append a random suffix to default table locations
    #[arg(long)]
    unique_table_location: bool,

    /// Author recorded on commits
    #[arg(short, long, default_value = "anonymous")]
    user: String,

    /// Execute one statement and exit
    #[arg(short, long)]
    execute: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args)?;
    let factory = CatalogFactory::from_config(config)?;
    let session = Session::new(factory.create(Identity::new(args.user.clone())));

    match args.execute {
        Some(sql) => {
            let output = session.execute(&sql)?;
            print!("{}", render(&output, usize::MAX));
        }
        None => Repl::new(session).run()?,
    }
    Ok(())
}

/// File values first, then flags on top.
fn load_config(args: &Args) -> Result<CatalogConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => CatalogConfig::from_file(path)?,
        None => CatalogConfig::new(
            args.uri.clone().unwrap_or_default(),
            args.warehouse.clone().unwrap_or_default(),
        ),
    };

    if let Some(uri) = &args.uri {
        config.uri = uri.clone();
    }
    if let Some(warehouse) = &args.warehouse {
        config.warehouse = warehouse.clone();
    }
    if let Some(reference) = &args.reference {
        config.reference = Some(reference.clone());
    }
    if args.unique_table_location {
        config.unique_table_location = true;
    }

    config.validate()?;
    Ok(config)
}

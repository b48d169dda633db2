//! mbesim CLI: simulate MBE growth recipes.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "mbesim",
    version,
    about = "MBE growth-recipe interpreter: replay a recipe second by second, chart the chamber"
)]
struct Cli {
    #[command(subcommand)]
    command: mbesim::cli::Commands,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match mbesim::cli::dispatch(cli.command) {
        Ok(status) => std::process::exit(status.exit_code()),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

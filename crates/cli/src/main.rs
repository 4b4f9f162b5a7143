//! Forkful CLI - Session-store migration and cart inspection tools.
//!
//! # Usage
//!
//! ```bash
//! # Create the tower-sessions table the storefront keeps carts in
//! forkful-cli migrate
//!
//! # Check a persisted cart blob and print what the storefront would load
//! forkful-cli cart validate --file cart.json
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run the session-store migration
//! - `cart validate` - Validate a persisted cart blob

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "forkful-cli")]
#[command(author, version, about = "Forkful CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the session-store migration
    Migrate,
    /// Inspect persisted carts
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Validate a persisted cart blob
    Validate {
        /// Path to the JSON blob
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::sessions().await?,
        Commands::Cart { action } => match action {
            CartAction::Validate { file } => {
                commands::cart::validate_file(&file).await?;
            }
        },
    }
    Ok(())
}

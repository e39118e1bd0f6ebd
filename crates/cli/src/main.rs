//! Shonifity CLI - Database migrations and maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! shon-cli migrate
//!
//! # Upsert catalog products from a YAML file
//! shon-cli seed products -f catalog.yaml
//!
//! # Strip invalid entries from every stored cart
//! shon-cli cart cleanup
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "shon-cli")]
#[command(author, version, about = "Shonifity CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Cart maintenance
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert catalog products (matched by name)
    Products {
        /// Path to the YAML catalog file
        #[arg(short, long)]
        file: String,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Remove entries for deleted products and non-positive quantities
    Cleanup,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
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
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => commands::seed::products(&file).await?,
        },
        Commands::Cart { action } => match action {
            CartAction::Cleanup => commands::cart::cleanup().await?,
        },
    }
    Ok(())
}

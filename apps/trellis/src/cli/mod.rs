//! # Trellis CLI Module
//!
//! ## Available Commands
//!
//! - `serve` - Start the HTTP server
//! - `check` - Load and verify the definitions file
//! - `render` - Run one call and print the result

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use trellis_core::TrellisError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Trellis - hypermedia resource server
///
/// Serves resources declared in a definitions file as self-describing
/// documents with fields, hints and links.
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the resource definitions
    #[arg(short = 'd', long, global = true, default_value = "definitions/shop.toml")]
    pub definitions: PathBuf,

    /// Shared state store: "memory" or "redb"
    #[arg(short = 'S', long, global = true, default_value = "memory")]
    pub store: String,

    /// Path to the redb database (redb store only)
    #[arg(short = 'D', long, global = true, default_value = "trellis.db")]
    pub database: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Load the definitions and report what they declare
    Check,

    /// Call one resource and print the response
    Render {
        /// Link path of the resource ("/" for the root)
        #[arg(default_value = "/")]
        path: String,

        /// Request method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// JSON object of submitted values
        #[arg(short, long)]
        body: Option<String>,

        /// Query parameter as name=value (repeatable)
        #[arg(short = 'Q', long = "query")]
        query: Vec<String>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), TrellisError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            cmd_serve(&cli.definitions, &cli.store, &cli.database, &host, port).await
        }
        Some(Commands::Render {
            path,
            method,
            body,
            query,
        }) => cmd_render(
            &cli.definitions,
            &cli.store,
            &cli.database,
            &path,
            &method,
            body.as_deref(),
            &query,
        ),
        Some(Commands::Check) | None => cmd_check(&cli.definitions, json_mode),
    }
}

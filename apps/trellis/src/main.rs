//! # Trellis - Hypermedia Resource Server
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  apps/trellis (THE BINARY)                │
//! │                                                           │
//! │  ┌─────────────┐   ┌─────────────┐   ┌────────────────┐  │
//! │  │    CLI      │   │  HTTP API   │   │  Definitions   │  │
//! │  │   (clap)    │   │   (axum)    │   │    (toml)      │  │
//! │  └──────┬──────┘   └──────┬──────┘   └───────┬────────┘  │
//! │         └─────────────────┼──────────────────┘           │
//! │                           ▼                              │
//! │                   ┌───────────────┐                      │
//! │                   │ trellis-core  │                      │
//! │                   │ (THE ENGINE)  │                      │
//! │                   └───────────────┘                      │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! trellis serve --definitions definitions/shop.toml --port 8080
//! trellis check --json-mode
//! trellis render /business-account -Q kind=business
//! trellis render /contact -X POST -b '{"email":"a@b.com"}'
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trellis::cli;

#[tokio::main]
async fn main() {
    // TRELLIS_LOG_FORMAT=json switches to machine-parseable output.
    let log_format = std::env::var("TRELLIS_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "trellis=info,trellis_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && matches!(cli.command, Some(cli::Commands::Serve { .. })) {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
  ╔╦╗╦═╗╔═╗╦  ╦  ╦╔═╗
   ║ ╠╦╝║╣ ║  ║  ║╚═╗
   ╩ ╩╚═╚═╝╩═╝╩═╝╩╚═╝

  Hypermedia Resource Server v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}

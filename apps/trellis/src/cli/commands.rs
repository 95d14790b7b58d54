//! # CLI Command Implementations

use crate::api::{self, AppState, parse_body};
use crate::definitions::Definitions;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use trellis_core::{MemoryJournal, MemoryStore, RedbStore, SharedStore, TrellisError, Verb};

// =============================================================================
// SHARED SETUP
// =============================================================================

/// Open the shared state store named on the command line.
pub fn open_store(kind: &str, database: &Path) -> Result<Arc<dyn SharedStore>, TrellisError> {
    match kind {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "redb" => Ok(Arc::new(RedbStore::open(database)?)),
        other => Err(TrellisError::Configuration(format!(
            "Unknown store '{}'. Use 'memory' or 'redb'.",
            other
        ))),
    }
}

fn load_state(definitions: &Path, store: &str, database: &Path) -> Result<AppState, TrellisError> {
    let definitions = Definitions::load(definitions)?;
    let store = open_store(store, database)?;
    Ok(AppState::new(definitions, store, Arc::new(MemoryJournal::new())))
}

/// Parse repeated `name=value` arguments.
pub fn parse_query(pairs: &[String]) -> Result<BTreeMap<String, String>, TrellisError> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .ok_or_else(|| {
                    TrellisError::Configuration(format!("Expected name=value, got '{}'", pair))
                })
        })
        .collect()
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_serve(
    definitions: &Path,
    store: &str,
    database: &Path,
    host: &str,
    port: u16,
) -> Result<(), TrellisError> {
    let state = load_state(definitions, store, database)?;

    println!("Trellis Resource Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:        {}", host);
    println!("  Port:        {}", port);
    println!("  Definitions: {}", definitions.display());
    println!("  Store:       {}", store);
    if store == "redb" {
        println!("  Database:    {}", database.display());
    }
    println!();
    println!("Endpoints:");
    println!("  GET  /        - Root resource");
    println!("  GET  /{{path}} - Resource");
    println!("  POST /{{path}} - Submit values");
    println!("  GET  /health  - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state).await
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Load the definitions and print what they declare.
pub fn cmd_check(definitions: &Path, json_mode: bool) -> Result<(), TrellisError> {
    let loaded = Definitions::load(definitions)?;
    let unit = loaded.config.unit.clone();
    let root = loaded.catalog.root_class(&unit).map(str::to_string);
    let classes: Vec<String> = loaded.classes().map(str::to_string).collect();
    let variants = loaded.catalog.variant_count();

    if json_mode {
        let report = serde_json::json!({
            "unit": unit,
            "root": root,
            "variants": variants,
            "classes": classes,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report)
                .map_err(|e| TrellisError::Serialization(e.to_string()))?
        );
        return Ok(());
    }

    println!("Definitions: {}", definitions.display());
    println!("  Unit:     {}", unit);
    println!("  Root:     {}", root.as_deref().unwrap_or("(none)"));
    println!("  Variants: {}", variants);
    println!("  Classes:");
    for class in &classes {
        println!("    - {}", class);
    }
    Ok(())
}

// =============================================================================
// RENDER COMMAND
// =============================================================================

/// Run one call and print the response as JSON.
pub fn cmd_render(
    definitions: &Path,
    store: &str,
    database: &Path,
    path: &str,
    method: &str,
    body: Option<&str>,
    query: &[String],
) -> Result<(), TrellisError> {
    let state = load_state(definitions, store, database)?;
    let verb: Verb = method.to_ascii_uppercase().parse()?;
    let query = parse_query(query)?;
    let values = parse_body(body.unwrap_or_default().as_bytes())
        .map_err(TrellisError::Configuration)?;

    let response = state.call(verb, path, query, values)?;
    let output = serde_json::json!({
        "status": response.status().code(),
        "location": response.location(),
        "document": response.document(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&output)
            .map_err(|e| TrellisError::Serialization(e.to_string()))?
    );
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs() {
        let query = parse_query(&["kind=business".to_string(), "empty=".to_string()])
            .expect("pairs");
        assert_eq!(query.get("kind").map(String::as_str), Some("business"));
        assert_eq!(query.get("empty").map(String::as_str), Some(""));
        assert!(parse_query(&["novalue".to_string()]).is_err());
        assert!(parse_query(&["=x".to_string()]).is_err());
    }

    #[test]
    fn unknown_store_is_rejected() {
        let err = open_store("postgres", Path::new("unused.db"))
            .err()
            .expect("unknown");
        assert!(matches!(err, TrellisError::Configuration(_)));
    }

    #[test]
    fn redb_store_opens_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store("redb", &dir.path().join("state.db"));
        assert!(store.is_ok());
    }
}

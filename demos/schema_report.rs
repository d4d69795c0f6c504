//! Print columns, foreign keys and a safe load order for every known table
//!
//! Reads `polystore.toml` (or the file named by `POLYSTORE_CONFIG`), e.g.
//!
//! ```toml
//! [database]
//! backend = "sqlite"
//! file_path = "content.db"
//! ```
//!
//! Run with `RUST_LOG=polystore=debug cargo run --example schema_report`.
//! Pass `--json` to print every edge as one JSON document instead.

use polystore::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    let handle = ConnectionHandle::open(&config.database).await?;
    handle.ping().await?;
    tracing::info!(db = handle.target(), backend = %handle.kind(), "connected");

    let mut known = Vec::new();
    for name in handle.list_tables().await? {
        match resolve_table(&name) {
            Ok(table) => known.push(table),
            Err(_) => tracing::info!(table = %name, "skipping table outside the content schema"),
        }
    }

    if std::env::args().any(|arg| arg == "--json") {
        let mut edges = Vec::new();
        for table in &known {
            edges.extend(handle.list_foreign_keys(*table, None).await?);
        }
        println!("{}", serde_json::to_string_pretty(&edges)?);
        handle.close().await;
        return Ok(());
    }

    for table in &known {
        let (types, order) = handle.list_columns(*table).await?;
        println!("{}", table);
        for (ordinal, name) in &order {
            println!("  {:>3} {:<32} {}", ordinal, name, types[name]);
        }
        for edge in handle.list_foreign_keys(*table, None).await? {
            println!(
                "  fk  {} -> {}.{} (on delete {})",
                edge.source_column, edge.target_table, edge.target_column, edge.on_delete_action
            );
        }
    }

    match handle.dependency_order(&known).await {
        Ok(ordered) => {
            let names: Vec<&str> = ordered.iter().map(DbTable::as_str).collect();
            println!("load order: {}", names.join(", "));
        }
        Err(StoreError::CyclicDependency(remaining)) => {
            tracing::warn!(?remaining, "foreign keys form a cycle; no load order exists");
        }
        Err(e) => return Err(e.into()),
    }

    handle.close().await;
    Ok(())
}

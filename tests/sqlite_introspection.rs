//! Integration tests against the embedded engine
//!
//! Every test opens its own in-memory (or temporary file) database, so they
//! run without any external service.

mod common;

use polystore::prelude::*;
use std::collections::HashSet;

async fn open_content_db() -> anyhow::Result<ConnectionHandle> {
    let config = DatabaseConfig::embedded(":memory:");
    let handle = ConnectionHandle::open_with_schema(&config, &common::schema()).await?;
    common::seed(&handle).await?;
    Ok(handle)
}

#[tokio::test]
async fn test_open_and_ping() -> anyhow::Result<()> {
    let handle = open_content_db().await?;
    assert_eq!(handle.kind(), BackendKind::Embedded);
    handle.ping().await?;
    handle.ping().await?;
    Ok(())
}

#[tokio::test]
async fn test_open_rejects_invalid_config() {
    let mut config = DatabaseConfig::embedded(":memory:");
    config.max_connections = 0;
    let err = ConnectionHandle::open(&config).await.unwrap_err();
    assert!(matches!(err, StoreError::Config(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_open_unreachable_file_fails_to_connect() {
    let config = DatabaseConfig::embedded("/nonexistent-dir/for/polystore/test.db");
    let err = ConnectionHandle::open(&config).await.unwrap_err();
    assert!(
        matches!(err, StoreError::ConnectionFailed { backend: BackendKind::Embedded, .. }),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_schema_file_is_applied_on_open() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let schema_path = dir.path().join("schema.sql");
    std::fs::write(&schema_path, common::CONTENT_SCHEMA)?;
    let db_path = dir.path().join("content.db");

    let config = DatabaseConfig::embedded(db_path.to_string_lossy().to_string())
        .with_schema_file(schema_path.to_string_lossy().to_string());
    let handle = ConnectionHandle::open(&config).await?;

    let tables = handle.list_tables().await?;
    assert_eq!(
        tables,
        vec!["content_data", "roles", "routes", "tokens", "users"]
    );
    handle.close().await;
    assert!(db_path.exists());
    Ok(())
}

#[tokio::test]
async fn test_foreign_keys_are_enforced() -> anyhow::Result<()> {
    let handle = open_content_db().await?;
    let err = handle
        .query(
            "INSERT INTO content_data (content_data_id, route_id) VALUES (1, 999)",
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::QueryFailed(_)), "got {:?}", err);
    Ok(())
}

#[tokio::test]
async fn test_execute_appends_table_name() -> anyhow::Result<()> {
    let handle = open_content_db().await?;
    let mut cursor = handle
        .execute("SELECT COUNT(*) AS total FROM", DbTable::Routes)
        .await?;
    assert_eq!(cursor.len(), 1);
    let row = cursor.next().expect("one row");
    assert_eq!(row.get("total").and_then(CanonicalValue::as_i64), Some(3));
    Ok(())
}

#[tokio::test]
async fn test_list_columns_preserves_physical_order() -> anyhow::Result<()> {
    let handle = open_content_db().await?;
    let (types, order) = handle.list_columns(DbTable::Routes).await?;

    let names: Vec<&str> = order.values().map(String::as_str).collect();
    assert_eq!(names, vec!["route_id", "slug", "title", "author_id"]);
    assert_eq!(order.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert_eq!(types.get("slug").map(String::as_str), Some("VARCHAR(255)"));
    assert_eq!(types.len(), 4);

    // Repeated calls against an unchanged schema are identical
    let again = handle.list_columns(DbTable::Routes).await?;
    assert_eq!(again, (types, order));
    Ok(())
}

#[tokio::test]
async fn test_missing_table_fails_introspection() -> anyhow::Result<()> {
    let handle = open_content_db().await?;

    let err = handle.list_columns(DbTable::Media).await.unwrap_err();
    assert!(
        matches!(err, StoreError::IntrospectionFailed { ref table, .. } if table == "media"),
        "got {:?}",
        err
    );

    let err = handle.list_foreign_keys(DbTable::Media, None).await.unwrap_err();
    assert!(matches!(err, StoreError::IntrospectionFailed { .. }), "got {:?}", err);
    Ok(())
}

#[tokio::test]
async fn test_foreign_key_discovery() -> anyhow::Result<()> {
    let handle = open_content_db().await?;

    let edges = handle
        .list_foreign_keys(DbTable::ContentData, Some("route_id"))
        .await?;
    assert_eq!(edges.len(), 1);
    let edge = &edges[0];
    assert_eq!(edge.source_table, "content_data");
    assert_eq!(edge.source_column, "route_id");
    assert_eq!(edge.target_table, "routes");
    assert_eq!(edge.target_column, "route_id");
    assert_eq!(edge.on_delete_action, "CASCADE");

    // No column means every edge of the table
    let all = handle.list_foreign_keys(DbTable::ContentData, None).await?;
    let sources: HashSet<&str> = all.iter().map(|e| e.source_column.as_str()).collect();
    assert_eq!(sources, HashSet::from(["route_id", "parent_id"]));

    // A table without edges legitimately has none
    assert!(handle.list_foreign_keys(DbTable::Roles, None).await?.is_empty());

    let err = handle
        .list_foreign_keys(DbTable::ContentData, Some("route_id; --"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidIdentifier(_)));
    Ok(())
}

#[tokio::test]
async fn test_dependency_order_and_referencing_edges() -> anyhow::Result<()> {
    let handle = open_content_db().await?;
    let tables = common::content_tables();

    let ordered = handle.dependency_order(&tables).await?;
    let position = |t: DbTable| ordered.iter().position(|o| *o == t).unwrap();
    assert_eq!(ordered.len(), tables.len());
    assert!(position(DbTable::Roles) < position(DbTable::Users));
    assert!(position(DbTable::Users) < position(DbTable::Routes));
    assert!(position(DbTable::Users) < position(DbTable::Tokens));
    assert!(position(DbTable::Routes) < position(DbTable::ContentData));

    let edges = handle.referencing_edges(DbTable::Users, &tables).await?;
    let mut sources: Vec<(&str, &str)> = edges
        .iter()
        .map(|e| (e.source_table.as_str(), e.source_column.as_str()))
        .collect();
    sources.sort_unstable();
    assert_eq!(sources, vec![("routes", "author_id"), ("tokens", "user_id")]);
    Ok(())
}

#[tokio::test]
async fn test_resolve_table_never_touches_the_database() -> anyhow::Result<()> {
    let handle = open_content_db().await?;
    handle.close().await;
    assert!(handle.is_closed());

    let err = handle.resolve_table("not_a_real_table").unwrap_err();
    assert!(matches!(err, StoreError::UnknownTable(_)));
    assert_eq!(handle.resolve_table("routes")?, DbTable::Routes);
    Ok(())
}

#[tokio::test]
async fn test_list_column_values() -> anyhow::Result<()> {
    let handle = open_content_db().await?;
    let table = handle.resolve_table("routes")?;

    let ids: Vec<String> = handle
        .list_column_values(table, "route_id")
        .await?
        .collect::<Result<_, _>>()?;
    assert_eq!(ids, vec!["1", "2", "3"]);

    let first: Vec<String> = handle
        .list_column_values(table, "slug")
        .await?
        .collect::<Result<_, _>>()?;
    let second: Vec<String> = handle
        .list_column_values(table, "slug")
        .await?
        .collect::<Result<_, _>>()?;
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_list_column_values_aborts_on_null() -> anyhow::Result<()> {
    let handle = open_content_db().await?;
    let values: Vec<_> = handle
        .list_column_values(DbTable::Routes, "title")
        .await?
        .collect();

    // "Home", then the NULL title of "about"; "Blog" is never produced
    assert_eq!(values.len(), 2);
    assert_eq!(values[0].as_deref().ok(), Some("Home"));
    assert!(matches!(
        &values[1],
        Err(StoreError::UnsupportedColumnType { column, .. }) if column == "title"
    ));
    Ok(())
}

#[tokio::test]
async fn test_list_column_values_rejects_unknown_columns() -> anyhow::Result<()> {
    let handle = open_content_db().await?;
    let err = handle
        .list_column_values(DbTable::Routes, "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidIdentifier(_)), "got {:?}", err);
    Ok(())
}

#[tokio::test]
async fn test_absent_nullables_round_trip() -> anyhow::Result<()> {
    let handle = open_content_db().await?;
    let p = |n| handle.kind().placeholder(n);
    let insert = format!(
        "INSERT INTO tokens (token_id, user_id, token, revoked, expires_at) VALUES ({}, {}, {}, {}, {})",
        p(1),
        p(2),
        p(3),
        p(4),
        p(5)
    );

    handle
        .query(
            &insert,
            &[
                CanonicalValue::Integer(1),
                CanonicalValue::NullableInteger(Nullable::null()),
                CanonicalValue::NullableText(Nullable::null()),
                CanonicalValue::NullableBool(Nullable::null()),
                CanonicalValue::NullableTimestamp(Nullable::null()),
            ],
        )
        .await?;
    handle
        .query(
            &insert,
            &[
                CanonicalValue::Integer(2),
                CanonicalValue::from(Some(1i64)),
                CanonicalValue::from("abc"),
                CanonicalValue::from(true),
                CanonicalValue::Timestamp("2024-03-01T12:30:00Z".into()),
            ],
        )
        .await?;

    let rows = handle
        .query("SELECT * FROM tokens ORDER BY token_id", &[])
        .await?;
    assert_eq!(rows.len(), 2);

    let absent = &rows[0];
    assert_eq!(
        absent.get("user_id"),
        Some(&CanonicalValue::NullableInteger(Nullable::null()))
    );
    assert_eq!(
        absent.get("token"),
        Some(&CanonicalValue::NullableText(Nullable::null()))
    );
    assert_eq!(
        absent.get("revoked"),
        Some(&CanonicalValue::NullableBool(Nullable::null()))
    );
    assert_eq!(
        absent.get("expires_at"),
        Some(&CanonicalValue::NullableTimestamp(Nullable::null()))
    );

    // Present values of a nullable column come back valid, in the same variant
    let present = &rows[1];
    assert_eq!(
        present.get("user_id"),
        Some(&CanonicalValue::NullableInteger(Nullable::some(1)))
    );
    assert_eq!(
        present.get("token"),
        Some(&CanonicalValue::NullableText(Nullable::some("abc".into())))
    );
    assert_eq!(
        present.get("revoked"),
        Some(&CanonicalValue::NullableBool(Nullable::some(true)))
    );
    assert_eq!(
        present.get("expires_at"),
        Some(&CanonicalValue::NullableTimestamp(Nullable::some(
            "2024-03-01T12:30:00Z".into()
        )))
    );
    Ok(())
}

#[tokio::test]
async fn test_present_nullables_round_trip() -> anyhow::Result<()> {
    let handle = open_content_db().await?;
    let written = [
        CanonicalValue::NullableInteger(Nullable::some(1)),
        CanonicalValue::NullableText(Nullable::some("t".into())),
        CanonicalValue::NullableBool(Nullable::some(false)),
        CanonicalValue::NullableTimestamp(Nullable::some("2024-03-01T12:30:00Z".into())),
    ];
    let mut params = vec![CanonicalValue::Integer(7)];
    params.extend(written.iter().cloned());
    handle
        .query(
            "INSERT INTO tokens (token_id, user_id, token, revoked, expires_at) VALUES (?, ?, ?, ?, ?)",
            &params,
        )
        .await?;

    let rows = handle
        .query(
            "SELECT user_id, token, revoked, expires_at FROM tokens WHERE token_id = ?",
            &[CanonicalValue::Integer(7)],
        )
        .await?;
    let read: Vec<CanonicalValue> = rows[0].iter().map(|(_, value)| value.clone()).collect();
    assert_eq!(read, written);

    // Declared NOT NULL columns keep the required form
    let rows = handle
        .query("SELECT slug FROM routes WHERE route_id = 1", &[])
        .await?;
    assert_eq!(rows[0].get("slug"), Some(&CanonicalValue::Text("home".into())));
    Ok(())
}

#[tokio::test]
async fn test_wide_identifiers_fit_the_embedded_engine() -> anyhow::Result<()> {
    let handle = open_content_db().await?;
    handle
        .query(
            "INSERT INTO roles (role_id, label) VALUES (?, ?)",
            &[
                CanonicalValue::Integer(5_000_000_000),
                CanonicalValue::from("archive"),
            ],
        )
        .await?;

    let rows = handle
        .query(
            "SELECT role_id FROM roles WHERE label = ?",
            &[CanonicalValue::from("archive")],
        )
        .await?;
    assert_eq!(
        rows[0].get("role_id").and_then(CanonicalValue::as_i64),
        Some(5_000_000_000)
    );
    Ok(())
}

#[tokio::test]
async fn test_calls_after_close_fail() -> anyhow::Result<()> {
    let handle = open_content_db().await?;
    handle.close().await;
    handle.close().await;

    assert!(matches!(handle.ping().await, Err(StoreError::Unreachable(_))));
    assert!(handle.list_columns(DbTable::Routes).await.is_err());
    Ok(())
}

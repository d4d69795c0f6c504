//! Shared fixtures for the integration tests

#![allow(dead_code)]

use polystore::prelude::*;

/// Portable subset of the content schema
///
/// Every statement here is valid on SQLite, MySQL and PostgreSQL. Foreign
/// keys are table constraints since MySQL ignores inline `REFERENCES`.
pub const CONTENT_SCHEMA: &str = r#"
-- roles and users
CREATE TABLE roles (
    role_id INTEGER PRIMARY KEY,
    label VARCHAR(64) NOT NULL
);
CREATE TABLE users (
    user_id INTEGER PRIMARY KEY,
    username VARCHAR(64) NOT NULL,
    role INTEGER NOT NULL,
    date_created TIMESTAMP,
    FOREIGN KEY (role) REFERENCES roles(role_id)
);

-- routing and content
CREATE TABLE routes (
    route_id INTEGER PRIMARY KEY,
    slug VARCHAR(255) NOT NULL UNIQUE,
    title VARCHAR(255),
    author_id INTEGER,
    FOREIGN KEY (author_id) REFERENCES users(user_id) ON DELETE SET NULL
);
CREATE TABLE content_data (
    content_data_id INTEGER PRIMARY KEY,
    parent_id INTEGER,
    route_id INTEGER NOT NULL,
    published BOOLEAN,
    date_modified TIMESTAMP,
    FOREIGN KEY (parent_id) REFERENCES content_data(content_data_id),
    FOREIGN KEY (route_id) REFERENCES routes(route_id) ON DELETE CASCADE
);
CREATE TABLE tokens (
    token_id INTEGER PRIMARY KEY,
    user_id INTEGER,
    token VARCHAR(255),
    revoked BOOLEAN,
    expires_at TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users(user_id)
);
"#;

pub const SEED: &str = r#"
INSERT INTO roles (role_id, label) VALUES (1, 'admin');
INSERT INTO roles (role_id, label) VALUES (2, 'editor');
INSERT INTO users (user_id, username, role) VALUES (1, 'ada', 1);
INSERT INTO routes (route_id, slug, title, author_id) VALUES (1, 'home', 'Home', 1);
INSERT INTO routes (route_id, slug, title, author_id) VALUES (2, 'about', NULL, 1);
INSERT INTO routes (route_id, slug, title, author_id) VALUES (3, 'blog', 'Blog', NULL);
"#;

pub fn schema() -> SchemaBundle {
    SchemaBundle::parse(CONTENT_SCHEMA)
}

pub async fn seed(handle: &ConnectionHandle) -> anyhow::Result<()> {
    for statement in SchemaBundle::parse(SEED).statements() {
        handle.query(statement, &[]).await?;
    }
    Ok(())
}

/// Content tables, referencing tables first
pub fn content_tables() -> Vec<DbTable> {
    vec![
        DbTable::ContentData,
        DbTable::Tokens,
        DbTable::Routes,
        DbTable::Users,
        DbTable::Roles,
    ]
}

use sha2::{Digest, Sha256};

/// Table holding the fingerprints of one feed.
///
/// SQLite cannot bind table names as parameters, so the feed name is hashed into a
/// namespace that is always a safe identifier.
pub fn table_name(feed_name: &str) -> String {
    let digest = Sha256::digest(feed_name.as_bytes());
    format!("rss_{}", hex::encode(&digest[..16]))
}

/// Field codes each feed was added with, keyed by its table name.
pub const CREATE_FEED_FIELDS: &str = r#"CREATE TABLE IF NOT EXISTS feed_fields (
    namespace TEXT PRIMARY KEY,
    fields TEXT NOT NULL
)"#;

pub const UPSERT_FEED_FIELDS: &str =
    "INSERT OR REPLACE INTO feed_fields (namespace, fields) VALUES (?1, ?2)";

pub const SELECT_FEED_FIELDS: &str = "SELECT fields FROM feed_fields WHERE namespace = ?1";

pub const DELETE_FEED_FIELDS: &str = "DELETE FROM feed_fields WHERE namespace = ?1";

pub fn create_table(table: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS "{table}" (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hash VARCHAR(32) NOT NULL UNIQUE
)"#
    )
}

pub fn drop_table(table: &str) -> String {
    format!(r#"DROP TABLE IF EXISTS "{table}""#)
}

// INSERT OR IGNORE makes repeated flushes of the same fingerprint a no-op
pub fn insert_hash(table: &str) -> String {
    format!(r#"INSERT OR IGNORE INTO "{table}" (hash) VALUES (?1)"#)
}

pub fn count_rows(table: &str) -> String {
    format!(r#"SELECT COUNT(*) FROM "{table}""#)
}

pub fn select_hashes(table: &str) -> String {
    format!(r#"SELECT id, hash FROM "{table}" ORDER BY id"#)
}

pub fn delete_oldest(table: &str) -> String {
    format!(
        r#"DELETE FROM "{table}" WHERE id NOT IN (
    SELECT id FROM "{table}" ORDER BY id DESC LIMIT ?1
)"#
    )
}

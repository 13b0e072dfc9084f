mod repository;
mod schema;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FieldSet, Fingerprint};

pub use repository::Repository;
pub use schema::table_name;

/// A fingerprint row as persisted, with its insertion sequence id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFingerprint {
    pub id: i64,
    pub fingerprint: Fingerprint,
}

/// Durable per-feed fingerprint tables, addressed by feed name.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Creates the feed's table unless it already exists.
    async fn create_table(&self, feed_name: &str) -> Result<()>;
    /// Drops the feed's table and forgets its fields.
    async fn drop_table(&self, feed_name: &str) -> Result<()>;
    /// Inserting a fingerprint that is already stored is a no-op.
    async fn insert_if_absent(&self, feed_name: &str, fingerprint: &Fingerprint) -> Result<()>;
    async fn count_rows(&self, feed_name: &str) -> Result<usize>;
    /// Deletes all but the newest `max_rows` rows; returns how many were deleted.
    async fn trim_oldest(&self, feed_name: &str, max_rows: usize) -> Result<usize>;
    /// All rows, oldest first.
    async fn select_all(&self, feed_name: &str) -> Result<Vec<StoredFingerprint>>;
    /// Records the fields the feed was added with, replacing earlier ones.
    async fn save_fields(&self, feed_name: &str, fields: FieldSet) -> Result<()>;
    async fn load_fields(&self, feed_name: &str) -> Result<Option<FieldSet>>;
}

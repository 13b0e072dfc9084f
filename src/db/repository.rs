use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{FieldSet, Fingerprint};

use super::schema;
use super::{FingerprintStore, StoredFingerprint};

/// How long a write waits for another writer before giving up with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::configure(conn).await
    }

    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::configure(conn).await
    }

    async fn configure(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl FingerprintStore for Repository {
    async fn create_table(&self, feed_name: &str) -> Result<()> {
        let table = schema::table_name(feed_name);
        self.conn
            .call(move |conn| {
                conn.execute(&schema::create_table(&table), [])?;
                Ok(())
            })
            .await?;
        tracing::debug!(
            "created sqlite table \"{}\" for feed \"{}\"",
            schema::table_name(feed_name),
            feed_name
        );
        Ok(())
    }

    async fn drop_table(&self, feed_name: &str) -> Result<()> {
        let table = schema::table_name(feed_name);
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(&schema::drop_table(&table), [])?;
                tx.execute(schema::CREATE_FEED_FIELDS, [])?;
                tx.execute(schema::DELETE_FEED_FIELDS, params![table])?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        tracing::debug!(
            "dropped sqlite table \"{}\" of feed \"{}\"",
            schema::table_name(feed_name),
            feed_name
        );
        Ok(())
    }

    async fn insert_if_absent(&self, feed_name: &str, fingerprint: &Fingerprint) -> Result<()> {
        let table = schema::table_name(feed_name);
        let hash = fingerprint.as_str().to_string();
        self.conn
            .call(move |conn| {
                conn.execute(&schema::insert_hash(&table), params![hash])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn count_rows(&self, feed_name: &str) -> Result<usize> {
        let table = schema::table_name(feed_name);
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 =
                    conn.query_row(&schema::count_rows(&table), [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn trim_oldest(&self, feed_name: &str, max_rows: usize) -> Result<usize> {
        let table = schema::table_name(feed_name);
        let limit = i64::try_from(max_rows).unwrap_or(i64::MAX);
        let deleted = self
            .conn
            .call(move |conn| {
                let deleted = conn.execute(&schema::delete_oldest(&table), params![limit])?;
                Ok(deleted)
            })
            .await?;
        if deleted > 0 {
            tracing::debug!(
                "removed {} rows in table \"{}\" of feed \"{}\"",
                deleted,
                schema::table_name(feed_name),
                feed_name
            );
        }
        Ok(deleted)
    }

    async fn select_all(&self, feed_name: &str) -> Result<Vec<StoredFingerprint>> {
        let table = schema::table_name(feed_name);
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&schema::select_hashes(&table))?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(StoredFingerprint {
                            id: row.get(0)?,
                            fingerprint: Fingerprint::from_stored(row.get(1)?),
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    async fn save_fields(&self, feed_name: &str, fields: FieldSet) -> Result<()> {
        let table = schema::table_name(feed_name);
        let codes = fields.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(schema::CREATE_FEED_FIELDS, [])?;
                conn.execute(schema::UPSERT_FEED_FIELDS, params![table, codes])?;
                Ok(())
            })
            .await?;
        tracing::debug!("saved fields \"{}\" of feed \"{}\"", fields, feed_name);
        Ok(())
    }

    async fn load_fields(&self, feed_name: &str) -> Result<Option<FieldSet>> {
        let table = schema::table_name(feed_name);
        let codes = self
            .conn
            .call(move |conn| {
                conn.execute(schema::CREATE_FEED_FIELDS, [])?;
                let codes: Option<String> = conn
                    .query_row(schema::SELECT_FEED_FIELDS, params![table], |row| row.get(0))
                    .optional()?;
                Ok(codes)
            })
            .await?;
        Ok(codes.and_then(|codes| {
            let fields = FieldSet::from_codes(&codes);
            if fields.is_none() {
                tracing::warn!(
                    "ignoring unknown fields \"{}\" stored for feed \"{}\"",
                    codes,
                    feed_name
                );
            }
            fields
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fp(value: &str) -> Fingerprint {
        Fingerprint::from(value)
    }

    async fn repository_with(feed: &str, hashes: &[&str]) -> Repository {
        let repo = Repository::in_memory().await.unwrap();
        repo.create_table(feed).await.unwrap();
        for hash in hashes {
            repo.insert_if_absent(feed, &fp(hash)).await.unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn insert_is_idempotent() {
        let repo = repository_with("news", &["h1", "h2"]).await;
        tokio_test::assert_ok!(repo.insert_if_absent("news", &fp("h1")).await);
        assert_eq!(repo.count_rows("news").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rows_come_back_in_insertion_order() {
        let repo = repository_with("news", &["h3", "h1", "h2"]).await;
        let rows = repo.select_all("news").await.unwrap();
        let hashes: Vec<&str> = rows.iter().map(|r| r.fingerprint.as_str()).collect();
        assert_eq!(hashes, ["h3", "h1", "h2"]);
        assert!(rows.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn trim_keeps_newest_rows() {
        let repo = repository_with("news", &["h1", "h2", "h3", "h4", "h5"]).await;
        assert_eq!(repo.trim_oldest("news", 3).await.unwrap(), 2);
        assert_eq!(repo.count_rows("news").await.unwrap(), 3);
        let hashes: Vec<String> = repo
            .select_all("news")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.fingerprint.to_string())
            .collect();
        assert_eq!(hashes, ["h3", "h4", "h5"]);

        assert_eq!(repo.trim_oldest("news", 3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn tables_are_per_feed() {
        let repo = repository_with("news", &["h1"]).await;
        repo.create_table("sports").await.unwrap();
        repo.insert_if_absent("sports", &fp("h1")).await.unwrap();
        repo.insert_if_absent("sports", &fp("h2")).await.unwrap();
        assert_eq!(repo.count_rows("news").await.unwrap(), 1);
        assert_eq!(repo.count_rows("sports").await.unwrap(), 2);

        repo.drop_table("sports").await.unwrap();
        assert!(repo.count_rows("sports").await.is_err());
        assert_eq!(repo.count_rows("news").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn create_table_keeps_existing_rows() {
        let repo = repository_with("news", &["h1"]).await;
        repo.create_table("news").await.unwrap();
        assert_eq!(repo.count_rows("news").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn fields_are_kept_until_the_table_is_dropped() {
        let repo = repository_with("news", &["h1"]).await;
        assert_eq!(repo.load_fields("news").await.unwrap(), None);

        let fields = FieldSet::from_codes("dl").unwrap();
        repo.save_fields("news", fields).await.unwrap();
        repo.save_fields("sports", FieldSet::all()).await.unwrap();
        assert_eq!(repo.load_fields("news").await.unwrap(), Some(fields));

        repo.drop_table("news").await.unwrap();
        assert_eq!(repo.load_fields("news").await.unwrap(), None);
        assert_eq!(repo.load_fields("sports").await.unwrap(), Some(FieldSet::all()));
    }

    #[tokio::test]
    async fn rows_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fingerprints.db");
        let path = path.to_str().unwrap();

        {
            let repo = Repository::new(path).await.unwrap();
            repo.create_table("news").await.unwrap();
            repo.insert_if_absent("news", &fp("h1")).await.unwrap();
            repo.save_fields("news", FieldSet::from_codes("alt").unwrap())
                .await
                .unwrap();
        }

        let repo = Repository::new(path).await.unwrap();
        let rows = repo.select_all("news").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fingerprint, fp("h1"));
        assert_eq!(
            repo.load_fields("news").await.unwrap().map(|f| f.to_string()),
            Some("falt".to_string())
        );
    }

    #[tokio::test]
    async fn locked_database_reports_contention() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fingerprints.db");

        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        repo.create_table("news").await.unwrap();

        let other = rusqlite::Connection::open(&path).unwrap();
        other.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let err = repo.insert_if_absent("news", &fp("h1")).await.unwrap_err();
        assert!(err.is_contention(), "{err}");

        let err = repo.load_fields("news").await.unwrap_err();
        assert!(err.is_contention(), "{err}");

        other.execute_batch("COMMIT").unwrap();
        tokio_test::assert_ok!(repo.insert_if_absent("news", &fp("h1")).await);
    }
}

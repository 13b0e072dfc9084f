//! Stand-ins for the network, the chat and a contended database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::{FingerprintStore, StoredFingerprint};
use crate::error::{AppError, Result};
use crate::feed::{FeedSource, FetchedFeed};
use crate::models::{FeedItem, FieldSet, Fingerprint};
use crate::notify::Notifier;

/// An item with only a description and a link, like feeds that publish no titles.
pub fn described(text: &str) -> FeedItem {
    let slug = text.to_lowercase().replace(' ', "-");
    FeedItem {
        description: Some(text.to_string()),
        link: Some(format!("https://example.com/{slug}")),
        ..Default::default()
    }
}

pub fn item(title: &str) -> FeedItem {
    let slug = title.to_lowercase().replace(' ', "-");
    FeedItem {
        title: Some(title.to_string()),
        link: Some(format!("https://example.com/{slug}")),
        guid: Some(format!("urn:example:{slug}")),
        ..Default::default()
    }
}

/// Serves canned entries per url; unknown urls fail like an unreachable host.
#[derive(Default)]
pub struct StubSource {
    feeds: Mutex<HashMap<String, Vec<FeedItem>>>,
    fetches: AtomicUsize,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, entries: Vec<FeedItem>) {
        self.feeds
            .lock()
            .unwrap()
            .insert(url.to_string(), entries);
    }

    pub fn remove(&self, url: &str) {
        self.feeds.lock().unwrap().remove(url);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StubSource {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.feeds.lock().unwrap().get(url) {
            Some(entries) => Ok(FetchedFeed {
                entries: entries.clone(),
            }),
            None => Err(anyhow::anyhow!("connection refused: {url}").into()),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    said: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn lines(&self) -> Vec<String> {
        self.said.lock().unwrap().iter().map(|(_, l)| l.clone()).collect()
    }

    pub fn channels(&self) -> Vec<String> {
        self.said.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn say(&self, channel: &str, message: &str) {
        self.said
            .lock()
            .unwrap()
            .push((channel.to_string(), message.to_string()));
    }
}

/// Wraps a store and fails every access to fingerprint tables with `SQLITE_BUSY` while
/// locked. Feed fields stay readable.
pub struct FailingStore<S> {
    inner: S,
    locked: AtomicBool,
}

impl<S> FailingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            locked: AtomicBool::new(false),
        }
    }

    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(busy());
        }
        Ok(())
    }
}

fn busy() -> AppError {
    AppError::Sqlite(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
        Some("database is locked".to_string()),
    ))
}

#[async_trait]
impl<S: FingerprintStore> FingerprintStore for FailingStore<S> {
    async fn create_table(&self, feed_name: &str) -> Result<()> {
        self.check()?;
        self.inner.create_table(feed_name).await
    }

    async fn drop_table(&self, feed_name: &str) -> Result<()> {
        self.inner.drop_table(feed_name).await
    }

    async fn insert_if_absent(&self, feed_name: &str, fingerprint: &Fingerprint) -> Result<()> {
        self.check()?;
        self.inner.insert_if_absent(feed_name, fingerprint).await
    }

    async fn count_rows(&self, feed_name: &str) -> Result<usize> {
        self.inner.count_rows(feed_name).await
    }

    async fn trim_oldest(&self, feed_name: &str, max_rows: usize) -> Result<usize> {
        self.inner.trim_oldest(feed_name, max_rows).await
    }

    async fn select_all(&self, feed_name: &str) -> Result<Vec<StoredFingerprint>> {
        self.check()?;
        self.inner.select_all(feed_name).await
    }

    async fn save_fields(&self, feed_name: &str, fields: FieldSet) -> Result<()> {
        self.inner.save_fields(feed_name, fields).await
    }

    async fn load_fields(&self, feed_name: &str) -> Result<Option<FieldSet>> {
        self.inner.load_fields(feed_name).await
    }
}

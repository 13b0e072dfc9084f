//! One update cycle for one feed.
//!
//! A cycle fetches the feed, fingerprints every entry oldest first, announces what is new
//! (or everything, in chatty mode) and writes the new fingerprints through to the store.
//! A failed fetch ends the cycle without touching the cache or the store. Store failures
//! never end a cycle: the cache stays authoritative and the feed is flushed again next time.
//! A feed whose hashes could not be read back at startup is not fetched until they can.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cache::RecencyCache;
use crate::db::FingerprintStore;
use crate::error::Result;
use crate::feed::FeedSource;
use crate::models::{FeedConfig, Fingerprint};
use crate::notify::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Announce only items not seen before.
    #[default]
    Normal,
    /// Announce every fetched item. Only unseen items are recorded.
    Chatty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    FetchFailed,
    /// The feed's hashes are still not restored from the store; nothing was fetched.
    Deferred,
    Done {
        fetched: usize,
        new: usize,
        emitted: usize,
    },
}

/// In-memory dedup state of one feed.
#[derive(Debug)]
pub struct FeedState {
    pub cache: RecencyCache,
    /// Set when a write-through failed; the whole cache is written on the next flush.
    pub needs_flush: bool,
    /// False until the cache holds what the store had for this feed.
    pub restored: bool,
}

impl FeedState {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: RecencyCache::new(capacity),
            needs_flush: false,
            restored: true,
        }
    }

    /// State of a feed whose hashes could not be read yet. Its first update restores them.
    pub fn unrestored(capacity: usize) -> Self {
        Self {
            restored: false,
            ..Self::new(capacity)
        }
    }

    /// Ensures the feed's table exists and rebuilds the cache from its rows.
    pub async fn restore(
        store: &dyn FingerprintStore,
        feed_name: &str,
        capacity: usize,
    ) -> Result<Self> {
        store.create_table(feed_name).await?;
        let rows = store.select_all(feed_name).await?;
        let mut state = Self::new(capacity);
        state.cache.extend(rows.into_iter().map(|row| row.fingerprint));
        tracing::debug!(
            "restored {} hashes of feed \"{}\"",
            state.cache.len(),
            feed_name
        );
        Ok(state)
    }
}

pub fn lock_state(state: &Mutex<FeedState>) -> MutexGuard<'_, FeedState> {
    // a panicking holder cannot leave the ring half-written, so the data is still usable
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Pipeline<'a> {
    pub source: &'a dyn FeedSource,
    pub store: &'a dyn FingerprintStore,
    pub notifier: &'a dyn Notifier,
    /// Rows kept per feed table.
    pub max_rows: usize,
}

impl Pipeline<'_> {
    pub async fn update(
        &self,
        feed: &FeedConfig,
        state: &Mutex<FeedState>,
        mode: UpdateMode,
    ) -> UpdateOutcome {
        if !lock_state(state).restored && !self.restore(&feed.name, state).await {
            return UpdateOutcome::Deferred;
        }

        let fetched = match self.source.fetch(&feed.url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::error!(
                    "unable to read url \"{}\" of feed \"{}\": {}",
                    feed.url,
                    feed.name,
                    e
                );
                return UpdateOutcome::FetchFailed;
            }
        };

        let mut lines = Vec::new();
        let mut new = Vec::new();
        let to_write = {
            let mut state = lock_state(state);
            // sources list newest first; announce and record in chronological order
            for item in fetched.entries.iter().rev() {
                let fingerprint = feed.format.fingerprint(&feed.name, item);
                let is_new = !state.cache.contains(&fingerprint);
                if is_new {
                    state.cache.append(fingerprint.clone());
                    new.push(fingerprint);
                }
                if is_new || mode == UpdateMode::Chatty {
                    lines.push(feed.format.format_line(&feed.name, item));
                }
            }
            if state.needs_flush {
                state.cache.values()
            } else {
                new.clone()
            }
        };

        // every new hash is cached already, so a failed write below is redone by a later flush
        for line in &lines {
            tracing::debug!("{}", line);
            self.notifier.say(&feed.channel, line);
        }

        if !to_write.is_empty() {
            let written = self.write_through(&feed.name, &to_write).await;
            lock_state(state).needs_flush = !written;
            if written {
                self.trim(&feed.name).await;
            }
        }

        UpdateOutcome::Done {
            fetched: fetched.entries.len(),
            new: new.len(),
            emitted: lines.len(),
        }
    }

    /// Writes the whole cache to the store and trims the table.
    pub async fn flush(&self, feed_name: &str, state: &Mutex<FeedState>) {
        let values = lock_state(state).cache.values();
        let written = self.write_through(feed_name, &values).await;
        lock_state(state).needs_flush = !written;
        if written {
            self.trim(feed_name).await;
        }
    }

    /// Rebuilds the cache of a feed that could not be restored at startup.
    async fn restore(&self, feed_name: &str, state: &Mutex<FeedState>) -> bool {
        let capacity = lock_state(state).cache.capacity();
        match FeedState::restore(self.store, feed_name, capacity).await {
            Ok(restored) => {
                *lock_state(state) = restored;
                true
            }
            Err(e) if e.is_contention() => {
                tracing::debug!("store busy, deferring update of feed \"{}\"", feed_name);
                false
            }
            Err(e) => {
                tracing::warn!("unable to restore hashes of feed \"{}\": {}", feed_name, e);
                false
            }
        }
    }

    /// Returns false when a write failed; the remaining rows are left for the next flush.
    async fn write_through(&self, feed_name: &str, fingerprints: &[Fingerprint]) -> bool {
        for fingerprint in fingerprints {
            if let Err(e) = self.store.insert_if_absent(feed_name, fingerprint).await {
                if e.is_contention() {
                    // a concurrent update holds the database; the cache still has the hash
                    tracing::debug!("store busy, deferring hashes of feed \"{}\"", feed_name);
                } else {
                    tracing::warn!("unable to save hashes of feed \"{}\": {}", feed_name, e);
                }
                return false;
            }
        }
        true
    }

    async fn trim(&self, feed_name: &str) {
        if let Err(e) = self.store.trim_oldest(feed_name, self.max_rows).await {
            tracing::warn!("unable to trim hashes of feed \"{}\": {}", feed_name, e);
        }
    }
}

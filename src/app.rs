use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt};
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::db::{FingerprintStore, Repository};
use crate::error::{Result, ValidationError};
use crate::feed::{FeedFetcher, FeedSource};
use crate::models::{ConfigLine, FeedConfig, FieldSet};
use crate::notify::{Notifier, StdoutNotifier};
use crate::pipeline::{FeedState, Pipeline, UpdateMode, UpdateOutcome};
use crate::registry::FeedRegistry;

/// Feeds updated at the same time during a scheduled tick.
const MAX_CONCURRENT_UPDATES: usize = 5;

pub struct App {
    pub registry: FeedRegistry,
    states: HashMap<String, Mutex<FeedState>>,
    /// Configured feeds whose fields are not known yet.
    unresolved: Vec<ConfigLine>,
    config: Config,
    config_path: Option<PathBuf>,

    // Services
    store: Arc<dyn FingerprintStore>,
    source: Arc<dyn FeedSource>,
    notifier: Arc<dyn Notifier>,
}

impl App {
    /// Opens the database, builds the HTTP fetcher and loads the configured feeds.
    pub async fn new(config: Config, config_path: PathBuf) -> Result<Self> {
        let store = Repository::new(&config.db_path).await?;
        let fetcher = FeedFetcher::new(config.fetch_timeout())?;

        let mut app = Self::from_parts(
            config,
            Arc::new(store),
            Arc::new(fetcher),
            Arc::new(StdoutNotifier),
        );
        app.config_path = Some(config_path);
        app.load_feeds().await?;
        Ok(app)
    }

    /// An app without any feeds loaded and without a config file to save to.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn FingerprintStore>,
        source: Arc<dyn FeedSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry: FeedRegistry::new(),
            states: HashMap::new(),
            unresolved: Vec::new(),
            config,
            config_path: None,
            store,
            source,
            notifier,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn pipeline(&self) -> Pipeline<'_> {
        Pipeline {
            source: self.source.as_ref(),
            store: self.store.as_ref(),
            notifier: self.notifier.as_ref(),
            max_rows: self.config.max_fingerprints_per_feed,
        }
    }

    /// Registers every feed line of the config with the fields stored when it was added and
    /// restores its hashes. Lines that cannot be used are logged and skipped. Lines without
    /// stored fields are kept unresolved until [`App::resolve_feeds`] can read the feed.
    /// Nothing is fetched here.
    pub async fn load_feeds(&mut self) -> Result<()> {
        for raw in self.config.feeds.clone() {
            let line = match ConfigLine::parse(&raw) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("skipping feed: {}", e);
                    continue;
                }
            };
            if let Err(e) = self.validate_new(&line.name, &line.channel, &line.url) {
                tracing::warn!("skipping feed \"{}\": {}", line.name, e);
                continue;
            }

            match self.stored_fields(&line.name).await? {
                Some(fields) => self.register(line, fields).await?,
                None => self.unresolved.push(line),
            }
        }

        tracing::debug!("read config from disk");
        Ok(())
    }

    /// Registers unresolved feeds whose fields are now known, from the store or else from
    /// the feed's newest entry. Returns how many were registered.
    pub async fn resolve_feeds(&mut self) -> Result<usize> {
        let mut pending = std::mem::take(&mut self.unresolved).into_iter();
        let mut resolved = 0;
        while let Some(line) = pending.next() {
            // sample only when the store has no fields; a busy store is asked again next time
            let fields = match self.store.load_fields(&line.name).await {
                Ok(Some(fields)) => Some(fields),
                Ok(None) => self.sample_fields(&line).await,
                Err(e) => {
                    tracing::warn!("unable to read fields of feed \"{}\": {}", line.name, e);
                    None
                }
            };
            let Some(fields) = fields else {
                self.unresolved.push(line);
                continue;
            };
            let name = line.name.clone();
            if let Err(e) = self.register(line.clone(), fields).await {
                self.unresolved.push(line);
                self.unresolved.extend(pending);
                return Err(e);
            }
            tracing::info!("feed \"{}\" resolved with fields \"{}\"", name, fields);
            resolved += 1;
        }
        Ok(resolved)
    }

    /// Configured feeds whose fields are not known yet, filtered by name or channel.
    pub fn unresolved(&self, filter: Option<&str>) -> Vec<&ConfigLine> {
        self.unresolved
            .iter()
            .filter(|line| filter.map_or(true, |f| line.name == f || line.channel == f))
            .collect()
    }

    fn validate_new(&self, name: &str, channel: &str, url: &str) -> Result<()> {
        if self.unresolved.iter().any(|line| line.name == name) {
            return Err(ValidationError::DuplicateName(name.to_string()).into());
        }
        self.registry.validate_new(name, channel, url)?;
        Ok(())
    }

    /// Fields recorded when the feed was added. A busy store reads as unknown.
    async fn stored_fields(&self, name: &str) -> Result<Option<FieldSet>> {
        match self.store.load_fields(name).await {
            Ok(fields) => Ok(fields),
            Err(e) if e.is_contention() => {
                tracing::warn!("store busy, fields of feed \"{}\" are read later", name);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Fields of the feed's newest entry, widened by the codes of the configured format so a
    /// format that was valid when it was written is never dropped. The result is stored.
    async fn sample_fields(&self, line: &ConfigLine) -> Option<FieldSet> {
        let fetched = match self.source.fetch(&line.url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!("unable to sample fields of feed \"{}\": {}", line.name, e);
                return None;
            }
        };
        let Some(sampled) = fetched.entries.first().and_then(FieldSet::from_item) else {
            tracing::warn!("feed \"{}\" has no item with a title or description", line.name);
            return None;
        };
        let fields = match &line.format {
            Some(raw) => sampled.with_codes(raw),
            None => sampled,
        };
        if let Err(e) = self.store.save_fields(&line.name, fields).await {
            tracing::warn!("unable to save fields of feed \"{}\": {}", line.name, e);
        }
        Some(fields)
    }

    async fn register(&mut self, line: ConfigLine, fields: FieldSet) -> Result<()> {
        let capacity = self.config.max_fingerprints_per_feed;
        let state = match FeedState::restore(self.store.as_ref(), &line.name, capacity).await {
            Ok(state) => state,
            Err(e) if e.is_contention() => {
                tracing::warn!(
                    "store busy, hashes of feed \"{}\" are restored on its next update",
                    line.name
                );
                FeedState::unrestored(capacity)
            }
            Err(e) => return Err(e),
        };
        let feed = line.into_feed_config(fields);
        let name = feed.name.clone();
        self.registry.insert(feed)?;
        self.states.insert(name, Mutex::new(state));
        Ok(())
    }

    /// Validates and registers a new feed. Nothing is changed when validation fails.
    pub async fn add_feed(
        &mut self,
        channel: &str,
        name: &str,
        url: &str,
        format: Option<&str>,
    ) -> Result<&FeedConfig> {
        self.validate_new(name, channel, url)?;

        let fetched = self
            .source
            .fetch(url)
            .await
            .map_err(|e| ValidationError::Unreachable {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let first = fetched
            .entries
            .first()
            .ok_or_else(|| ValidationError::NoItems(url.to_string()))?;
        let fields = FieldSet::from_item(first).ok_or(ValidationError::NoTitleOrDescription)?;

        let state = FeedState::restore(
            self.store.as_ref(),
            name,
            self.config.max_fingerprints_per_feed,
        )
        .await?;
        self.store.save_fields(name, fields).await?;
        let feed = FeedConfig::new(name, channel, url, fields, format);
        self.registry.insert(feed)?;
        self.states.insert(name.to_string(), Mutex::new(state));

        tracing::info!(
            "added rss feed \"{}\" to channel \"{}\" with url \"{}\"",
            name,
            channel,
            url
        );
        self.registry
            .get(name)
            .ok_or_else(|| ValidationError::UnknownFeed(name.to_string()).into())
    }

    /// Removes a feed together with its cache, its table and its stored fields.
    pub async fn remove_feed(&mut self, name: &str) -> Result<ConfigLine> {
        let unresolved = self.unresolved.iter().position(|line| line.name == name);
        if unresolved.is_none() && !self.registry.contains(name) {
            return Err(ValidationError::UnknownFeed(name.to_string()).into());
        }
        self.store.drop_table(name).await?;
        let line = match unresolved {
            Some(index) => self.unresolved.remove(index),
            None => {
                self.states.remove(name);
                ConfigLine::from(self.registry.remove(name)?)
            }
        };

        tracing::info!(
            "deleted rss feed \"{}\" in channel \"{}\" with url \"{}\"",
            line.name,
            line.channel,
            line.url
        );
        Ok(line)
    }

    /// Changes the format of a feed. Hashes recorded under the old format no longer match,
    /// so the items currently in the feed are announced once more on the next update.
    pub fn set_format(&mut self, name: &str, raw: &str) -> Result<&FeedConfig> {
        let feed = self.registry.set_format(name, raw)?;
        tracing::info!("set format of feed \"{}\" to \"{}\"", feed.name, feed.format);
        Ok(feed)
    }

    pub fn list(&self, filter: Option<&str>) -> Vec<&FeedConfig> {
        self.registry.list(filter)
    }

    /// Runs one update cycle for a single feed.
    pub async fn update_feed(&self, name: &str, mode: UpdateMode) -> Result<UpdateOutcome> {
        let (feed, state) = self
            .registry
            .get(name)
            .zip(self.states.get(name))
            .ok_or_else(|| ValidationError::UnknownFeed(name.to_string()))?;
        Ok(self.pipeline().update(feed, state, mode).await)
    }

    /// Runs a normal update cycle for every feed.
    pub async fn update_all(&self) -> Vec<(String, UpdateOutcome)> {
        let pipeline = self.pipeline();
        let pipeline = &pipeline;
        stream::iter(self.registry.iter())
            .filter_map(|feed| async move { self.states.get(&feed.name).map(|s| (feed, s)) })
            .map(|(feed, state)| async move {
                let outcome = pipeline.update(feed, state, UpdateMode::Normal).await;
                (feed.name.clone(), outcome)
            })
            .buffer_unordered(MAX_CONCURRENT_UPDATES)
            .collect()
            .await
    }

    /// Writes every cache to the store and trims the tables.
    pub async fn flush(&self) {
        let pipeline = self.pipeline();
        for feed in self.registry.iter() {
            if let Some(state) = self.states.get(&feed.name) {
                pipeline.flush(&feed.name, state).await;
            }
        }
    }

    /// Stores the current feed list in the config and writes it to disk.
    pub fn save_config(&mut self) -> Result<()> {
        self.config.feeds = self
            .registry
            .iter()
            .map(FeedConfig::config_line)
            .chain(self.unresolved.iter().map(ConfigLine::to_string))
            .collect();
        if let Some(path) = &self.config_path {
            self.config.save_to(path)?;
            tracing::debug!("saved config to disk");
        }
        Ok(())
    }

    /// Flushes hashes and saves the config. Called after every command and on exit.
    pub async fn persist(&mut self) -> Result<()> {
        self.flush().await;
        self.save_config()
    }

    /// Updates all feeds every configured interval until `shutdown` completes.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut interval = tokio::time::interval(self.config.update_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    if let Err(e) = self.resolve_feeds().await {
                        tracing::error!("unable to resolve feeds: {}", e);
                    }
                    let outcomes = self.update_all().await;
                    let new: usize = outcomes
                        .iter()
                        .map(|(_, outcome)| match outcome {
                            UpdateOutcome::Done { new, .. } => *new,
                            UpdateOutcome::FetchFailed | UpdateOutcome::Deferred => 0,
                        })
                        .sum();
                    tracing::debug!("updated {} feeds, {} new items", outcomes.len(), new);
                }
            }
        }

        tracing::info!("shutting down");
        self.persist().await
    }
}

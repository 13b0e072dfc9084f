use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::feed::FormatSpec;
use crate::models::FeedConfig;

pub const CHANNEL_MARKER: char = '#';

/// Configured feeds keyed by name.
#[derive(Debug, Clone, Default)]
pub struct FeedRegistry {
    feeds: BTreeMap<String, FeedConfig>,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks everything about a new feed that does not need the network.
    pub fn validate_new(&self, name: &str, channel: &str, url: &str) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if name.parse::<i64>().is_ok() {
            return Err(ValidationError::NumericName(name.to_string()));
        }
        if self.feeds.contains_key(name) {
            return Err(ValidationError::DuplicateName(name.to_string()));
        }
        if !channel.starts_with(CHANNEL_MARKER) {
            return Err(ValidationError::ChannelMarker(
                channel.to_string(),
                CHANNEL_MARKER,
            ));
        }
        if url::Url::parse(url).is_err() {
            return Err(ValidationError::InvalidUrl(url.to_string()));
        }
        Ok(())
    }

    pub fn insert(&mut self, config: FeedConfig) -> Result<(), ValidationError> {
        self.validate_new(&config.name, &config.channel, &config.url)?;
        self.feeds.insert(config.name.clone(), config);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<FeedConfig, ValidationError> {
        self.feeds
            .remove(name)
            .ok_or_else(|| ValidationError::UnknownFeed(name.to_string()))
    }

    /// Replaces a feed's format. Unlike config loading, an invalid format is refused.
    pub fn set_format(&mut self, name: &str, raw: &str) -> Result<&FeedConfig, ValidationError> {
        let config = self
            .feeds
            .get_mut(name)
            .ok_or_else(|| ValidationError::UnknownFeed(name.to_string()))?;
        config.format =
            FormatSpec::parse(raw, &config.fields).map_err(|reason| ValidationError::Format {
                raw: raw.to_string(),
                reason,
            })?;
        Ok(config)
    }

    pub fn get(&self, name: &str) -> Option<&FeedConfig> {
        self.feeds.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.feeds.contains_key(name)
    }

    /// All feeds, the single feed named `filter`, or every feed posting to channel `filter`.
    pub fn list(&self, filter: Option<&str>) -> Vec<&FeedConfig> {
        match filter {
            None => self.feeds.values().collect(),
            Some(name) if self.feeds.contains_key(name) => self.feeds.get(name).into_iter().collect(),
            Some(channel) => self
                .feeds
                .values()
                .filter(|feed| feed.channel == channel)
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedConfig> {
        self.feeds.values()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

use std::fmt;

use crate::error::ValidationError;
use crate::feed::FormatSpec;

use super::FieldSet;

/// A configured feed as owned by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub name: String,
    pub channel: String,
    pub url: String,
    pub format: FormatSpec,
    pub fields: FieldSet,
}

impl FeedConfig {
    /// Builds a feed config, falling back to the default format when `format` is missing
    /// or invalid for `fields`.
    pub fn new(
        name: &str,
        channel: &str,
        url: &str,
        fields: FieldSet,
        format: Option<&str>,
    ) -> Self {
        let format = match format {
            Some(raw) => FormatSpec::parse_or_default(name, raw, &fields),
            None => FormatSpec::default_for(&fields),
        };
        Self {
            name: name.to_string(),
            channel: channel.to_string(),
            url: url.to_string(),
            format,
            fields,
        }
    }

    /// `<channel> <name> <url> [<format>]`, the format omitted when it is the default.
    pub fn config_line(&self) -> String {
        if self.format.is_default_for(&self.fields) {
            format!("{} {} {}", self.channel, self.name, self.url)
        } else {
            format!("{} {} {} {}", self.channel, self.name, self.url, self.format)
        }
    }
}

/// One persisted feed line, split but not yet validated against a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLine {
    pub channel: String,
    pub name: String,
    pub url: String,
    pub format: Option<String>,
}

impl ConfigLine {
    pub fn parse(line: &str) -> Result<Self, ValidationError> {
        let atoms: Vec<&str> = line.split_whitespace().collect();
        match atoms.as_slice() {
            [channel, name, url] => Ok(Self {
                channel: channel.to_string(),
                name: name.to_string(),
                url: url.to_string(),
                format: None,
            }),
            [channel, name, url, format] => Ok(Self {
                channel: channel.to_string(),
                name: name.to_string(),
                url: url.to_string(),
                format: Some(format.to_string()),
            }),
            _ => Err(ValidationError::ConfigLine(line.to_string())),
        }
    }

    pub fn into_feed_config(self, fields: FieldSet) -> FeedConfig {
        FeedConfig::new(
            &self.name,
            &self.channel,
            &self.url,
            fields,
            self.format.as_deref(),
        )
    }
}

impl From<FeedConfig> for ConfigLine {
    fn from(feed: FeedConfig) -> Self {
        let format = (!feed.format.is_default_for(&feed.fields)).then(|| feed.format.to_string());
        Self {
            channel: feed.channel,
            name: feed.name,
            url: feed.url,
            format,
        }
    }
}

impl fmt::Display for ConfigLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.channel, self.name, self.url)?;
        if let Some(format) = &self.format {
            write!(f, " {}", format)?;
        }
        Ok(())
    }
}

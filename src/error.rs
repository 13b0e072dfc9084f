use thiserror::Error;

use crate::feed::FormatError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// True when the store could not be written because another writer holds the lock.
    pub fn is_contention(&self) -> bool {
        match self {
            AppError::Sqlite(e) => is_busy(e),
            AppError::Database(tokio_rusqlite::Error::Rusqlite(e)) => is_busy(e),
            _ => false,
        }
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}

/// Reasons an operator request is refused. Nothing is applied when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("feed name must not be empty")]
    EmptyName,

    #[error("feed name \"{0}\" must not be a number")]
    NumericName(String),

    #[error("feed name \"{0}\" is already in use, please choose a different name")]
    DuplicateName(String),

    #[error("channel \"{0}\" must start with a \"{1}\"")]
    ChannelMarker(String, char),

    #[error("url \"{0}\" is not valid")]
    InvalidUrl(String),

    #[error("unable to read feed at \"{url}\": {reason}")]
    Unreachable { url: String, reason: String },

    #[error("feed at \"{0}\" has no items")]
    NoItems(String),

    #[error("feed items have neither title nor description")]
    NoTitleOrDescription,

    #[error("feed \"{0}\" doesn't exist")]
    UnknownFeed(String),

    #[error("invalid config line \"{0}\"")]
    ConfigLine(String),

    #[error("invalid format \"{raw}\": {reason}")]
    Format { raw: String, reason: FormatError },
}

mod fetcher;
mod format;

pub use fetcher::{parse_feed, FeedFetcher, FeedSource, FetchedFeed};
pub use format::{FormatError, FormatSpec, SEPARATOR};

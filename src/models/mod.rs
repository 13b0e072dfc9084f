mod feed_config;
mod fingerprint;
mod item;

pub use feed_config::{ConfigLine, FeedConfig};
pub use fingerprint::Fingerprint;
pub use item::{FeedItem, Field, FieldSet};

//! Announces new items of RSS/Atom feeds to chat channels.
//!
//! Each configured feed is fetched on an interval. Items are identified by a fingerprint over
//! a configurable set of fields; fingerprints of recently seen items are kept in a bounded
//! in-memory ring per feed and mirrored to SQLite, so a restart does not announce old items.

pub mod app;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod registry;

#[cfg(test)]
mod test_support;

pub use app::App;
pub use config::Config;
pub use error::{AppError, Result, ValidationError};

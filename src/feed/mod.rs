//! Feed retrieval for the notification pipeline.
//!
//! - [`fetcher`] - HTTP retrieval behind the [`FeedFetcher`] trait
//! - [`parser`] - RSS/Atom parsing with `feed-rs` into [`ParsedFeed`]
//! - [`filter`] - selection of recent entries in publish order

mod fetcher;
mod filter;
mod parser;

pub use fetcher::{FeedFetcher, FetchError, HttpFeedFetcher};
pub use filter::recent_entries;
pub use parser::{parse_feed, FeedEntry, ParsedFeed};

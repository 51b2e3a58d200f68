//! Polls RSS/Atom feeds and pushes entries published in a recent window to
//! Discord channels, at most once per `(source, entry)` pair.
//!
//! A run is driven by [`checker::FeedChecker`]; [`scheduler::Scheduler`]
//! repeats it on an interval.

pub mod checker;
pub mod config;
pub mod dedup;
pub mod feed;
pub mod notify;
pub mod report;
pub mod scheduler;
pub mod storage;
pub mod util;

use anyhow::Result;
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;

use crate::util::{html_to_text, strip_control_chars};

/// A fetched feed, normalized for notification purposes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<FeedEntry>,
}

/// One article within a fetched feed.
///
/// Every field is optional because real-world feeds omit any of them.
/// `link` is unique within a source and doubles as the dedup key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub link: Option<String>,
    pub title: Option<String>,
    pub published: Option<DateTime<Utc>>,
    /// Plain-text rendering of the entry description.
    pub content_snippet: Option<String>,
    /// Raw HTML body (`content:encoded`, falling back to the description).
    pub raw_content: Option<String>,
    pub media_content_url: Option<String>,
    pub media_thumbnail_url: Option<String>,
    pub enclosure_url: Option<String>,
}

pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed> {
    let feed = parser::parse(bytes)?;

    let title = feed
        .title
        .map(|t| strip_control_chars(t.content.trim()).into_owned())
        .filter(|t| !t.is_empty());
    let entries = feed.entries.into_iter().map(convert_entry).collect();

    Ok(ParsedFeed { title, entries })
}

fn convert_entry(entry: Entry) -> FeedEntry {
    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref() != Some("enclosure"))
        .map(|l| l.href.trim().to_string())
        .filter(|l| !l.is_empty());
    let title = entry
        .title
        .map(|t| strip_control_chars(t.content.trim()).into_owned())
        .filter(|t| !t.is_empty());
    let published = entry.published.or(entry.updated);

    let summary = entry.summary.map(|s| s.content);
    let body = entry.content.and_then(|c| c.body);
    let content_snippet = summary
        .as_deref()
        .or(body.as_deref())
        .map(|html| strip_control_chars(&html_to_text(html)).into_owned())
        .filter(|s| !s.is_empty());
    let raw_content = body.or(summary);

    // feed-rs folds RSS <enclosure> into the media list, either as its own
    // object or merged into a sibling <media:content> object, so every
    // content URL is a candidate in document order.
    let content_urls: Vec<String> = entry
        .media
        .iter()
        .flat_map(|m| m.content.iter())
        .filter_map(|c| c.url.as_ref().map(|u| u.to_string()))
        .collect();
    let media_content_url = content_urls.first().cloned();
    let media_thumbnail_url = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.trim().to_string())
        .find(|uri| !uri.is_empty());
    let enclosure_url = content_urls
        .into_iter()
        .find(|url| !url.starts_with("blob:"))
        .or_else(|| {
            entry
                .links
                .iter()
                .find(|l| l.rel.as_deref() == Some("enclosure"))
                .map(|l| l.href.clone())
        });

    FeedEntry {
        link,
        title,
        published,
        content_snippet,
        raw_content,
        media_content_url,
        media_thumbnail_url,
        enclosure_url,
    }
}

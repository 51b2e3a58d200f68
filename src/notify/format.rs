use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;
use thiserror::Error;

use super::{
    ActionRow, Button, Embed, EmbedAuthor, EmbedImage, Notification, RoleMention,
    SUMMARIZE_BUTTON_ID, TRANSLATE_BUTTON_ID,
};
use crate::config::{EmbeddedImagePolicy, Source, Tag};
use crate::feed::FeedEntry;
use crate::util::{favicon_url, normalize_url, publisher_origin, truncate_chars, LinkError};

/// Descriptions longer than this many characters are cut and get "...".
pub const MAX_SNIPPET_LENGTH: usize = 512;

const BLOB_SCHEME: &str = "blob:";

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Entry has no link")]
    MissingLink,
    #[error("Entry has no title")]
    MissingTitle,
    #[error("Entry has no publish date")]
    MissingDate,
    #[error("Invalid entry link: {0}")]
    InvalidLink(#[from] LinkError),
}

/// Build the notification for one feed entry.
///
/// The author is the feed title, or the publisher origin of the entry link
/// when the feed has no title. At most one image is attached; see
/// [`resolve_image`] for the precedence. A role mention is added only when
/// the source enables it and the tag has a mention role.
pub fn format_notification(
    entry: &FeedEntry,
    feed_title: Option<&str>,
    source: &Source,
    tag: &Tag,
    policy: EmbeddedImagePolicy,
) -> Result<Notification, FormatError> {
    let link = entry.link.as_deref().ok_or(FormatError::MissingLink)?;
    let title = entry.title.as_deref().ok_or(FormatError::MissingTitle)?;
    let timestamp = entry.published.ok_or(FormatError::MissingDate)?;

    let origin = publisher_origin(link)?;
    let author = EmbedAuthor {
        name: feed_title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map_or_else(|| origin.clone(), str::to_string),
        icon_url: favicon_url(link)?,
        url: origin,
    };

    let description = entry
        .content_snippet
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(s, MAX_SNIPPET_LENGTH).into_owned());

    let embed = Embed {
        title: title.to_string(),
        url: link.to_string(),
        author,
        timestamp,
        description,
        image: resolve_image(entry, policy).map(|url| EmbedImage { url }),
    };

    let components = vec![ActionRow::new(vec![
        Button::primary(TRANSLATE_BUTTON_ID, "Translate"),
        Button::primary(SUMMARIZE_BUTTON_ID, "Summarize (AI)"),
    ])];

    let mention = (source.enable_role_mention && !tag.mention_role_id.is_empty()).then(|| {
        RoleMention {
            role_id: tag.mention_role_id.clone(),
        }
    });

    Ok(Notification {
        embed,
        components,
        mention,
    })
}

/// Pick the notification image, first applicable candidate wins:
///
/// 1. first `<img src>` in the raw HTML content, if `policy` admits it
/// 2. media content URL
/// 3. media thumbnail URL
/// 4. enclosure URL
///
/// Candidates 2-4 are skipped when they are `blob:` URLs. Every candidate is
/// normalized; one that fails normalization is skipped.
fn resolve_image(entry: &FeedEntry, policy: EmbeddedImagePolicy) -> Option<String> {
    let embedded = entry
        .raw_content
        .as_deref()
        .and_then(first_img_src)
        .filter(|src| embedded_image_allowed(src, policy));
    let not_blob = |url: &&str| !url.starts_with(BLOB_SCHEME);

    [
        embedded,
        entry.media_content_url.as_deref().filter(not_blob),
        entry.media_thumbnail_url.as_deref().filter(not_blob),
        entry.enclosure_url.as_deref().filter(not_blob),
    ]
    .into_iter()
    .flatten()
    .find_map(|candidate| match normalize_url(candidate) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::debug!(url = %candidate, error = %e, "Skipping image candidate");
            None
        }
    })
}

fn embedded_image_allowed(src: &str, policy: EmbeddedImagePolicy) -> bool {
    match policy {
        EmbeddedImagePolicy::BlobOnly => src.starts_with(BLOB_SCHEME),
        EmbeddedImagePolicy::ExcludeBlob => !src.starts_with(BLOB_SCHEME),
        EmbeddedImagePolicy::Disabled => false,
    }
}

/// First `<img ... src="...">` in an HTML fragment, matched case-insensitively.
static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r#"<img[^>]+src="([^">]+)""#)
        .case_insensitive(true)
        .build()
        .expect("img src pattern is valid")
});

/// Returns the `src` of the first `<img>` tag with a double-quoted,
/// non-empty `src` attribute.
pub fn first_img_src(html: &str) -> Option<&str> {
    IMG_SRC
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

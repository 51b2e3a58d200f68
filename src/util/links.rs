use thiserror::Error;
use url::Url;

/// Favicon lookup service used for notification author icons.
const FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons";

/// Errors that can occur while normalizing or inspecting a link.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL has no host component (e.g. `mailto:`).
    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Normalizes a URL before it is embedded in a notification.
///
/// - Protocol-relative input (`//cdn.example.com/a.png`) gets `https:`
/// - Input without a scheme gets `http://`
/// - Non-HTTP(S) schemes (`blob:`, `data:`) are returned unchanged
/// - Host is lower-cased and a leading `www.` removed
/// - Default ports are dropped
/// - `utm_*` tracking parameters are removed, the rest sorted by key
/// - A trailing slash on the path is removed
///
/// # Examples
///
/// ```
/// use newspush::util::normalize_url;
///
/// assert_eq!(
///     normalize_url("HTTPS://WWW.Example.com:443/img.png?utm_source=rss&b=2&a=1").unwrap(),
///     "https://example.com/img.png?a=1&b=2"
/// );
/// assert_eq!(normalize_url("//cdn.example.com/a.jpg").unwrap(), "https://cdn.example.com/a.jpg");
/// ```
pub fn normalize_url(input: &str) -> Result<String, LinkError> {
    let trimmed = input.trim();

    let candidate = if trimmed.starts_with("//") {
        format!("https:{trimmed}")
    } else if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let mut url = Url::parse(&candidate)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Ok(trimmed.to_string());
    }

    let host = url
        .host_str()
        .ok_or_else(|| LinkError::MissingHost(trimmed.to_string()))?
        .to_ascii_lowercase();
    if let Some(bare) = host.strip_prefix("www.") {
        if bare.contains('.') {
            url.set_host(Some(bare))?;
        }
    }

    if url.query().is_some() {
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !k.starts_with("utm_"))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
    }

    if url.path().len() > 1 && url.path().ends_with('/') {
        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(&path);
    }

    let mut out = url.to_string();
    // `Url` always serializes an empty path as "/"
    if url.path() == "/" && url.query().is_none() && url.fragment().is_none() {
        out.pop();
    }
    Ok(out)
}

fn has_scheme(s: &str) -> bool {
    match s.find(':') {
        Some(i) if i > 0 => {
            let scheme = &s[..i];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                // "example.com:8080/feed" is a host with a port, not a scheme
                && !s[i + 1..].starts_with(|c: char| c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Returns the publisher origin (`scheme://host[:port]`) of a link.
pub fn publisher_origin(link: &str) -> Result<String, LinkError> {
    let url = Url::parse(link)?;
    if url.host_str().is_none() {
        return Err(LinkError::MissingHost(link.to_string()));
    }
    Ok(url.origin().ascii_serialization())
}

/// Returns a favicon lookup URL for the host of a link.
pub fn favicon_url(link: &str) -> Result<String, LinkError> {
    let url = Url::parse(link)?;
    let host = url
        .host_str()
        .ok_or_else(|| LinkError::MissingHost(link.to_string()))?;
    Ok(format!("{FAVICON_SERVICE}?domain={host}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain_https_unchanged() {
        assert_eq!(
            normalize_url("https://example.com/images/a.png").unwrap(),
            "https://example.com/images/a.png"
        );
    }

    #[test]
    fn test_normalize_strips_www_and_default_port() {
        assert_eq!(
            normalize_url("http://www.Example.COM:80/a.png").unwrap(),
            "http://example.com/a.png"
        );
    }

    #[test]
    fn test_normalize_protocol_relative() {
        assert_eq!(
            normalize_url("//cdn.example.com/x.jpg").unwrap(),
            "https://cdn.example.com/x.jpg"
        );
    }

    #[test]
    fn test_normalize_adds_http_scheme() {
        assert_eq!(
            normalize_url("example.com/pic.jpg").unwrap(),
            "http://example.com/pic.jpg"
        );
        assert_eq!(
            normalize_url("example.com:8080/pic.jpg").unwrap(),
            "http://example.com:8080/pic.jpg"
        );
    }

    #[test]
    fn test_normalize_query_handling() {
        assert_eq!(
            normalize_url("https://example.com/a?utm_source=feed&utm_medium=rss").unwrap(),
            "https://example.com/a"
        );
        assert_eq!(
            normalize_url("https://example.com/a?z=1&a=2").unwrap(),
            "https://example.com/a?a=2&z=1"
        );
    }

    #[test]
    fn test_normalize_trailing_slash() {
        assert_eq!(
            normalize_url("https://example.com/dir/").unwrap(),
            "https://example.com/dir"
        );
        assert_eq!(
            normalize_url("https://example.com/").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn test_normalize_non_http_untouched() {
        assert_eq!(
            normalize_url("blob:https://example.com/uuid").unwrap(),
            "blob:https://example.com/uuid"
        );
    }

    #[test]
    fn test_normalize_invalid() {
        assert!(normalize_url("http://").is_err());
    }

    #[test]
    fn test_publisher_origin() {
        assert_eq!(
            publisher_origin("https://news.example.com/2024/01/post?id=1").unwrap(),
            "https://news.example.com"
        );
        assert_eq!(
            publisher_origin("http://example.com:8080/post").unwrap(),
            "http://example.com:8080"
        );
        assert!(publisher_origin("not a url").is_err());
    }

    #[test]
    fn test_favicon_url_uses_host() {
        assert_eq!(
            favicon_url("https://news.example.com/2024/01/post").unwrap(),
            "https://www.google.com/s2/favicons?domain=news.example.com"
        );
        assert!(favicon_url("mailto:someone@example.com").is_err());
    }
}

//! User-defined blocking exceptions.
//!
//! An exception is a user override that forces a would-be-blocked host or
//! page to be allowed. The `source` field holds a normalized host (HOST) or
//! host plus path (PAGE); normalization strips whitespace, schemes, query
//! strings, fragments, and trailing slashes so that set semantics on
//! `(source, kind)` deduplicate equivalent entries.

use url::Url;

use crate::error::{Error, Result};

/// Whether an exception covers a whole host or a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// Every URL on the host is excepted
    Host,
    /// Only the exact page (host + path) is excepted
    Page,
}

/// A user-defined exception to the blocking rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockingException {
    /// Normalized host (HOST) or host + path (PAGE)
    pub source: String,
    /// Scope of the exception
    pub kind: ExceptionKind,
}

impl BlockingException {
    /// Create an exception from already-normalized parts.
    pub fn new(source: impl Into<String>, kind: ExceptionKind) -> Self {
        Self {
            source: source.into(),
            kind,
        }
    }

    /// Create a HOST exception from a URL, keeping only the host part.
    ///
    /// Fails with [`Error::UrlFormat`] if no host can be extracted.
    pub fn for_host(raw_url: &str) -> Result<Self> {
        let (host, _) = parse_host_and_path(raw_url)?;
        Ok(Self::new(host, ExceptionKind::Host))
    }

    /// Create a PAGE exception from a URL, keeping the host and path with
    /// any trailing slash, query, and fragment removed.
    ///
    /// Fails with [`Error::UrlFormat`] if no host can be extracted.
    pub fn for_page(raw_url: &str) -> Result<Self> {
        let (host, path) = parse_host_and_path(raw_url)?;
        Ok(Self::new(format!("{host}{path}"), ExceptionKind::Page))
    }
}

/// Extract the normalized host and path from a raw URL.
///
/// A scheme is synthesized when absent so that bare hosts such as
/// `somehost.eu/contact` still parse. The query and fragment are dropped by
/// taking only `Url::path`, and a trailing slash is stripped.
pub(crate) fn parse_host_and_path(raw_url: &str) -> Result<(String, String)> {
    let trimmed = raw_url.trim();
    let parsed = Url::parse(trimmed)
        .or_else(|_| Url::parse(&format!("https://{trimmed}")))
        .map_err(|e| Error::UrlFormat(format!("cannot parse {trimmed:?}: {e}")))?;

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::UrlFormat(format!("URL does not contain a host: {trimmed:?}")))?;

    let path = parsed.path().trim_end_matches('/');
    Ok((host.to_string(), path.to_string()))
}

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use log::debug;
use roxmltree::{Document, Node};
use url::Url;

use crate::error::ParseError;
use crate::version::Version;

const ITEM: &str = "item";

/// One release entry from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCandidate {
    pub version: Version,
    pub title: Option<String>,
    pub changelog_url: Option<String>,
    pub download_url: Option<String>,
    pub download_url_64: Option<String>,
}

impl ReleaseCandidate {
    /// Download link for a host of the given pointer width.
    ///
    /// A non-empty `url64` wins on 64-bit hosts; everything else gets `url`.
    #[must_use]
    pub fn download_url_for(&self, width: PointerWidth) -> Option<&str> {
        if width == PointerWidth::Bits64
            && let Some(url64) = self.download_url_64.as_deref().filter(|u| !u.is_empty())
        {
            return Some(url64);
        }
        self.download_url.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

impl PointerWidth {
    #[must_use]
    pub fn host() -> Self {
        if cfg!(target_pointer_width = "64") {
            Self::Bits64
        } else {
            Self::Bits32
        }
    }
}

/// Parse a feed document into its usable release entries, in document order.
///
/// Items are the root element itself when it is an `<item>`, otherwise the
/// `<item>` children of the root. Items without a parseable `<version>` are
/// dropped; a well-formed document with no usable item yields an empty list.
///
/// The document encoding comes from its byte order mark, then from the XML
/// declaration, and defaults to UTF-8.
///
/// # Errors
/// Returns an error when the document does not decode in its encoding or is
/// not well-formed XML.
pub fn parse_feed(body: &[u8], origin: &Url) -> Result<Vec<ReleaseCandidate>, ParseError> {
    let text = decode_document(body)?;
    let document = Document::parse(&text).map_err(ParseError::Malformed)?;

    let root = document.root_element();
    let items: Vec<Node<'_, '_>> = if root.has_tag_name(ITEM) {
        vec![root]
    } else {
        root.children()
            .filter(|node| node.is_element() && node.has_tag_name(ITEM))
            .collect()
    };

    let candidates = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| parse_item(index, item, origin))
        .collect();
    Ok(candidates)
}

fn decode_document(body: &[u8]) -> Result<Cow<'_, str>, ParseError> {
    let (encoding, bom_len) = Encoding::for_bom(body)
        .unwrap_or_else(|| (declared_encoding(body).unwrap_or(UTF_8), 0));
    encoding
        .decode_without_bom_handling_and_without_replacement(&body[bom_len..])
        .ok_or(ParseError::Encoding {
            encoding: encoding.name(),
        })
}

/// The `encoding` pseudo-attribute of an ASCII-compatible XML declaration.
fn declared_encoding(body: &[u8]) -> Option<&'static Encoding> {
    let declaration = body.strip_prefix(b"<?xml")?;
    let end = declaration.windows(2).position(|pair| pair == b"?>")?;
    let declaration = std::str::from_utf8(&declaration[..end]).ok()?;
    let (_, rest) = declaration.split_once("encoding")?;
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let label = rest[1..].split(quote).next()?;
    // Without a BOM the bytes are ASCII-compatible, whatever the label says.
    Encoding::for_label(label.as_bytes()).filter(|encoding| encoding.is_ascii_compatible())
}

/// The entry a check cycle acts on: the last usable one in document order.
#[must_use]
pub fn select_candidate(candidates: Vec<ReleaseCandidate>) -> Option<ReleaseCandidate> {
    candidates.into_iter().last()
}

fn parse_item(index: usize, item: Node<'_, '_>, origin: &Url) -> Option<ReleaseCandidate> {
    let Some(raw_version) = child_text(item, "version") else {
        debug!("Skipping feed item {index}: no <version>");
        return None;
    };
    let version = match raw_version.parse::<Version>() {
        Ok(version) => version,
        Err(error) => {
            debug!("Skipping feed item {index}: {error}");
            return None;
        }
    };

    Some(ReleaseCandidate {
        version,
        title: child_text(item, "title").filter(|t| !t.is_empty()),
        changelog_url: child_url(item, "changelog", origin),
        download_url: child_url(item, "url", origin),
        download_url_64: child_url(item, "url64", origin),
    })
}

fn child_text(item: Node<'_, '_>, name: &str) -> Option<String> {
    let child = item
        .children()
        .find(|node| node.is_element() && node.has_tag_name(name))?;
    let text: String = child
        .descendants()
        .filter(Node::is_text)
        .filter_map(|node| node.text())
        .collect();
    Some(text.trim().to_string())
}

fn child_url(item: Node<'_, '_>, name: &str, origin: &Url) -> Option<String> {
    child_text(item, name)
        .filter(|raw| !raw.is_empty())
        .map(|raw| resolve_url(origin, raw))
}

/// Resolve a feed-relative link against the feed's origin. Links that are
/// already absolute, or that cannot be resolved, pass through untouched.
fn resolve_url(origin: &Url, raw: String) -> String {
    match Url::parse(&raw) {
        Ok(_) => raw,
        Err(url::ParseError::RelativeUrlWithoutBase) => origin
            .join(&raw)
            .map(String::from)
            .unwrap_or(raw),
        Err(_) => raw,
    }
}

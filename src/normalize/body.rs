//! Body normalization: one authoritative raw body and one plain-text body.
//!
//! Precedence for the raw body:
//! 1. the binary HTML extended property, decoded with the configured encoding
//! 2. the structured body content
//! 3. `""`
//!
//! The plain-text body always derives from the structured body, so it never
//! depends on whether the store returned the binary property.

use encoding_rs::Encoding;
use tracing::warn;

use super::html::HtmlConverter;
use crate::model::mail::{BodyKind, StructuredBody};

/// Label used when the configured body encoding is unknown.
pub const DEFAULT_BODY_ENCODING: &str = "utf-8";

/// Look up an encoding by WHATWG label, falling back to UTF-8.
pub fn encoding_for_label(label: &str) -> &'static Encoding {
    Encoding::for_label(label.trim().as_bytes()).unwrap_or_else(|| {
        warn!(label, "Unknown body encoding, using UTF-8");
        encoding_rs::UTF_8
    })
}

/// Decode the binary HTML property. A byte-order mark overrides `encoding`.
pub fn decode_html_property(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(
            encoding = used.name(),
            len = bytes.len(),
            "HTML property contained malformed sequences"
        );
    }
    text.into_owned()
}

/// The authoritative raw body.
///
/// An empty HTML property counts as absent.
pub fn raw_body(
    html_property: Option<&[u8]>,
    body: Option<&StructuredBody>,
    encoding: &'static Encoding,
) -> String {
    match html_property {
        Some(bytes) if !bytes.is_empty() => decode_html_property(bytes, encoding),
        _ => body
            .map(|b| b.content_or_empty().to_string())
            .unwrap_or_default(),
    }
}

/// The plain-text body: structured content as-is when it is already text,
/// otherwise run through `converter`.
pub fn plain_text_body(body: Option<&StructuredBody>, converter: &dyn HtmlConverter) -> String {
    let Some(body) = body else {
        return String::new();
    };
    let content = body.content_or_empty();
    match body.kind {
        BodyKind::Text => content.to_string(),
        BodyKind::Html => converter.html_to_plain_text(content),
    }
}

/// `true` iff the structured body is HTML-typed.
pub fn is_html(body: Option<&StructuredBody>) -> bool {
    body.is_some_and(|b| b.kind == BodyKind::Html)
}

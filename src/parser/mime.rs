//! Turn a raw RFC 5322 message into a [`StoreItem`].
//!
//! Headers are read with our own parser (encoded-words, folding, dates, the
//! Outlook `Thread-*` fields). Body parts and attachments come from
//! `mail-parser`.

use base64::Engine;
use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::{debug, warn};

use super::calendar::meeting_from_ics;
use super::header::{self, HeaderMap};
use crate::model::address::EmailAddress;
use crate::model::mail::{BodyKind, StructuredBody};
use crate::normalize::conversation::decode_hex;
use crate::store::{RawAttachment, StoreItem, PROP_TAG_CONVERSATION_ID, PROP_TAG_HTML};

/// Header carrying the native conversation id as 32 hex digits.
pub const CONVERSATION_ID_HEADER: &str = "x-conversation-id";

/// A parsed message plus the threading headers a reply needs.
#[derive(Debug, Clone, Default)]
pub struct ParsedMessage {
    pub item: StoreItem,
    pub message_id: Option<String>,
    pub references: Vec<String>,
    pub reply_to: Vec<EmailAddress>,
}

/// Parse a complete raw message.
///
/// Never fails: unparseable bodies yield an item with headers only.
pub fn parse_message(raw: &[u8]) -> ParsedMessage {
    let header_end = header::find_header_end(raw).unwrap_or(raw.len());
    let headers = HeaderMap::parse(&raw[..header_end]);

    let mut item = StoreItem {
        subject: headers.get_decoded("subject"),
        conversation_topic: headers.get_decoded("thread-topic"),
        conversation_index: headers
            .get("thread-index")
            .and_then(decode_thread_index)
            .unwrap_or_default(),
        from: headers
            .get_decoded("from")
            .map(|v| EmailAddress::parse(&v))
            .filter(|a| !a.address.is_empty()),
        sender: headers
            .get_decoded("sender")
            .map(|v| EmailAddress::parse(&v))
            .filter(|a| !a.address.is_empty()),
        to: address_list(&headers, "to"),
        cc: address_list(&headers, "cc"),
        mime_content: raw.to_vec(),
        ..StoreItem::default()
    };

    item.sent_on = headers.get("date").and_then(header::parse_date);
    // The topmost Received field is the final hop
    item.received_on = headers
        .get_all("received")
        .find_map(header::parse_received_date)
        .or(item.sent_on);

    if let Some(native) = headers
        .get(CONVERSATION_ID_HEADER)
        .and_then(|v| decode_hex(v).ok())
    {
        item.set_extended(PROP_TAG_CONVERSATION_ID, native);
    }

    match MessageParser::default().parse(raw) {
        Some(msg) => fill_from_parts(&mut item, &msg),
        None => warn!("mail-parser could not parse message body"),
    }

    ParsedMessage {
        item,
        message_id: headers.get("message-id").map(header::extract_angle_bracket),
        references: headers
            .get("references")
            .map(header::extract_all_angle_brackets)
            .unwrap_or_default(),
        reply_to: address_list(&headers, "reply-to"),
    }
}

fn address_list(headers: &HeaderMap, name: &str) -> Vec<EmailAddress> {
    headers
        .get_all(name)
        .flat_map(|v| EmailAddress::parse_list(&header::decode_encoded_words(v)))
        .collect()
}

/// `Thread-Index` is the base64 of the binary conversation index.
fn decode_thread_index(value: &str) -> Option<Vec<u8>> {
    let compact: String = value.split_whitespace().collect();
    match base64::engine::general_purpose::STANDARD.decode(compact) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(error = %e, "Ignoring undecodable Thread-Index");
            None
        }
    }
}

fn fill_from_parts(item: &mut StoreItem, msg: &mail_parser::Message<'_>) {
    let html = msg.html_part(0).and_then(|p| match &p.body {
        PartType::Html(html) => Some(html.to_string()),
        _ => None,
    });
    let text = msg.text_part(0).and_then(|p| match &p.body {
        PartType::Text(text) => Some(text.to_string()),
        _ => None,
    });

    item.body = match (html, text) {
        (Some(html), _) => {
            item.set_extended(PROP_TAG_HTML, html.as_bytes().to_vec());
            Some(StructuredBody {
                kind: BodyKind::Html,
                content: Some(html),
            })
        }
        (None, Some(text)) => Some(StructuredBody::text(text)),
        (None, None) => None,
    };

    item.meeting = msg
        .parts
        .iter()
        .filter(|p| is_calendar(p))
        .find_map(|p| meeting_from_ics(&String::from_utf8_lossy(p.contents())));

    item.attachments = msg.attachments().map(raw_attachment).collect();
    debug!(
        attachments = item.attachments.len(),
        meeting = item.meeting.is_some(),
        "Parsed message parts"
    );
}

fn is_calendar(part: &MessagePart<'_>) -> bool {
    part.content_type().is_some_and(|ct| {
        ct.ctype().eq_ignore_ascii_case("text")
            && ct.subtype().is_some_and(|s| s.eq_ignore_ascii_case("calendar"))
    })
}

fn raw_attachment(part: &MessagePart<'_>) -> RawAttachment {
    let name = part.attachment_name().map(String::from);

    if let PartType::Message(inner) = &part.body {
        return RawAttachment::Item {
            name,
            subject: inner.subject().map(String::from),
            mime_content: part.contents().to_vec(),
        };
    }

    let content_type = part.content_type().map(|ct| match ct.subtype() {
        Some(sub) => format!("{}/{}", ct.ctype(), sub),
        None => ct.ctype().to_string(),
    });
    let is_inline = part
        .content_disposition()
        .is_some_and(|d| d.ctype().eq_ignore_ascii_case("inline"));

    RawAttachment::File {
        name,
        content_type,
        content_id: part.content_id().map(String::from),
        is_inline,
        content: part.contents().to_vec(),
    }
}

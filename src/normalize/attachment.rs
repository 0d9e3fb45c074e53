//! Attachment classification: raw store attachments to typed variants.

use tracing::{debug, warn};

use crate::model::attachment::{Attachment, FileAttachment, ItemAttachment};
use crate::store::RawAttachment;

/// Classify attachments in their original order.
///
/// File and item attachments are kept; every other kind is skipped with a
/// diagnostic. Never fails, and skipped entries leave no gap.
pub fn classify(raw: &[RawAttachment]) -> Vec<Attachment> {
    let classified: Vec<Attachment> = raw
        .iter()
        .enumerate()
        .filter_map(|(idx, att)| classify_one(idx, att))
        .collect();

    debug!(
        total = raw.len(),
        kept = classified.len(),
        "Classified attachments"
    );
    classified
}

fn classify_one(idx: usize, raw: &RawAttachment) -> Option<Attachment> {
    match raw {
        RawAttachment::File {
            name,
            content_type,
            content_id,
            is_inline,
            content,
        } => Some(Attachment::File(FileAttachment {
            name: name
                .clone()
                .unwrap_or_else(|| format!("attachment_{idx}")),
            content_type: content_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            content_id: content_id.clone(),
            is_inline: *is_inline,
            content: content.clone(),
        })),
        RawAttachment::Item {
            name,
            subject,
            mime_content,
        } => Some(Attachment::Item(ItemAttachment {
            name: name
                .clone()
                .or_else(|| subject.clone())
                .unwrap_or_else(|| format!("item_{idx}")),
            subject: subject.clone(),
            mime_content: mime_content.clone(),
        })),
        RawAttachment::Reference { name, url } => {
            warn!(
                index = idx,
                name = name.as_deref().unwrap_or(""),
                url = %url,
                "Skipping reference attachment"
            );
            None
        }
        RawAttachment::Other { kind, name } => {
            warn!(
                index = idx,
                kind = %kind,
                name = name.as_deref().unwrap_or(""),
                "Skipping unsupported attachment kind"
            );
            None
        }
    }
}

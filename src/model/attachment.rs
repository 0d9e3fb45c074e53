//! Typed attachment variants.
//!
//! Only file payloads and embedded store items are represented. Other kinds
//! reported by a store are dropped during classification.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{NormalizeError, Result};

/// A file payload attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    /// Filename. Generated if the store reports none.
    pub name: String,

    /// MIME content type (e.g. `"application/pdf"`).
    pub content_type: String,

    /// Content-ID for inline attachments referenced from HTML.
    pub content_id: Option<String>,

    /// `true` if the attachment is embedded in the HTML body.
    pub is_inline: bool,

    /// Decoded payload bytes.
    pub content: Vec<u8>,
}

/// A store item (message, meeting request, …) embedded as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAttachment {
    /// Display name of the attachment.
    pub name: String,

    /// Subject of the embedded item, when known.
    pub subject: Option<String>,

    /// MIME serialization of the embedded item.
    pub mime_content: Vec<u8>,
}

/// A classified attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    File(FileAttachment),
    Item(ItemAttachment),
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Self::File(f) => &f.name,
            Self::Item(i) => &i.name,
        }
    }

    /// Retrievable content: the file payload, or the embedded item's MIME bytes.
    pub fn content(&self) -> &[u8] {
        match self {
            Self::File(f) => &f.content,
            Self::Item(i) => &i.mime_content,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    pub fn is_item(&self) -> bool {
        matches!(self, Self::Item(_))
    }

    /// Write the content into `dir` under a sanitized name.
    ///
    /// Embedded items get an `.eml` extension. Existing files are never
    /// overwritten: a counter is appended instead. Returns the path written.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| NormalizeError::io(dir, e))?;

        let mut filename = sanitize_filename_part(self.name(), 150);
        if self.is_item() && !filename.to_lowercase().ends_with(".eml") {
            filename.push_str(".eml");
        }
        let path = unique_path(&dir.join(filename));

        let mut file = std::fs::File::create(&path).map_err(|e| NormalizeError::io(&path, e))?;
        file.write_all(self.content())
            .map_err(|e| NormalizeError::io(&path, e))?;

        tracing::debug!(path = %path.display(), bytes = self.content().len(), "Saved attachment");
        Ok(path)
    }
}

/// Sanitize a string for use in filenames.
///
/// Replaces invalid characters with `_` and truncates to `max_len` characters.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | '@') {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

/// If `path` already exists, append a counter to make it unique.
pub(crate) fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    let with_suffix = |suffix: &str| {
        if ext.is_empty() {
            parent.join(format!("{stem}_{suffix}"))
        } else {
            parent.join(format!("{stem}_{suffix}.{ext}"))
        }
    };

    (1..1000)
        .map(|i| with_suffix(&i.to_string()))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| with_suffix("dup"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, content: &[u8]) -> Attachment {
        Attachment::File(FileAttachment {
            name: name.to_string(),
            content_type: "application/octet-stream".to_string(),
            content_id: None,
            is_inline: false,
            content: content.to_vec(),
        })
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename_part("hello world", 20), "hello_world");
        assert_eq!(sanitize_filename_part("a/b\\c:d*e", 20), "a_b_c_d_e");
        assert_eq!(sanitize_filename_part("", 20), "unknown");
        assert_eq!(sanitize_filename_part("abcdef", 3), "abc");
    }

    #[test]
    fn test_variant_accessors() {
        let item = Attachment::Item(ItemAttachment {
            name: "Forwarded".to_string(),
            subject: Some("Fwd".to_string()),
            mime_content: b"Subject: Fwd\r\n\r\nbody".to_vec(),
        });
        assert!(item.is_item());
        assert_eq!(item.name(), "Forwarded");
        assert!(item.content().starts_with(b"Subject:"));

        let f = file("report.pdf", b"%PDF");
        assert!(f.is_file());
        assert_eq!(f.content(), b"%PDF");
    }

    #[test]
    fn test_save_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let a = file("report.pdf", b"one");
        let b = file("report.pdf", b"two");

        let first = a.save_to(dir.path()).unwrap();
        let second = b.save_to(dir.path()).unwrap();

        assert_ne!(first, second);
        assert_eq!(second.file_name().unwrap(), "report_1.pdf");
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[test]
    fn test_save_item_gets_eml_extension() {
        let dir = tempfile::tempdir().unwrap();
        let item = Attachment::Item(ItemAttachment {
            name: "Meeting notes".to_string(),
            subject: None,
            mime_content: b"Subject: x\r\n\r\n".to_vec(),
        });
        let path = item.save_to(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "Meeting_notes.eml");
    }
}

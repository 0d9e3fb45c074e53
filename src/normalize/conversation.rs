//! Conversation identity: a thread-stable hex key from either the store's
//! native 16-byte conversation id or the running conversation index.
//!
//! Conversation index layout (Outlook thread index):
//!
//! ```text
//! ┌──────────────────────────────┬─────────────────────┬──────────────┬─────┐
//! │ FILETIME, high 48 bits (6 B) │ thread GUID (16 B)  │ child (5 B)  │ ... │
//! └──────────────────────────────┴─────────────────────┴──────────────┴─────┘
//! ```
//!
//! Every reply appends one 5-byte child block; the 22-byte header and the
//! GUID in it never change across the thread.

use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{NormalizeError, Result};

/// Length of the conversation index header.
pub const HEADER_LEN: usize = 22;

/// Byte offset of the thread GUID inside the header.
pub const GUID_OFFSET: usize = 6;

/// Length of the thread GUID / native conversation id.
pub const GUID_LEN: usize = 16;

/// Length of one child block appended per reply.
pub const CHILD_BLOCK_LEN: usize = 5;

/// 100-ns intervals between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_EPOCH: u64 = 116_444_736_000_000_000;

/// Which representation the visible conversation id is built from.
///
/// This is a caller policy, not something derived from the data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationIdMode {
    /// Hex of the full conversation index (changes with every reply).
    #[default]
    Index,
    /// Hex of the thread GUID only (stable across the whole thread).
    GuidOnly,
}

impl FromStr for ConversationIdMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "index" => Ok(Self::Index),
            "guid-only" | "guid" => Ok(Self::GuidOnly),
            other => Err(format!(
                "unknown conversation id mode '{other}' (expected 'index' or 'guid-only')"
            )),
        }
    }
}

impl std::fmt::Display for ConversationIdMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index => f.write_str("index"),
            Self::GuidOnly => f.write_str("guid-only"),
        }
    }
}

/// Resolve the visible conversation id.
///
/// - `Index`: uppercase hex of every byte of `index`.
/// - `GuidOnly`: uppercase hex of `native` when present; otherwise the
///   32 hex characters of `index` starting at character 12 (the GUID in the
///   header). An index shorter than [`HEADER_LEN`] is rejected with
///   [`NormalizeError::MalformedConversationIndex`].
pub fn resolve(
    mode: ConversationIdMode,
    native: Option<&[u8; GUID_LEN]>,
    index: &[u8],
) -> Result<String> {
    match (mode, native) {
        (ConversationIdMode::Index, _) => Ok(encode_hex_upper(index)),
        (ConversationIdMode::GuidOnly, Some(guid)) => Ok(encode_hex_upper(guid)),
        (ConversationIdMode::GuidOnly, None) => {
            if index.len() < HEADER_LEN {
                return Err(NormalizeError::MalformedConversationIndex { len: index.len() });
            }
            let full = encode_hex_upper(index);
            let start = GUID_OFFSET * 2;
            Ok(full[start..start + GUID_LEN * 2].to_string())
        }
    }
}

/// Interpret the raw native conversation id property.
///
/// A value that is not exactly 16 bytes is treated as absent.
pub fn native_guid(raw: Option<&[u8]>) -> Option<[u8; GUID_LEN]> {
    let raw = raw?;
    match <[u8; GUID_LEN]>::try_from(raw) {
        Ok(guid) => Some(guid),
        Err(_) => {
            warn!(
                len = raw.len(),
                "Ignoring native conversation id with unexpected length"
            );
            None
        }
    }
}

/// Read-only view over a well-formed conversation index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationIndex<'a> {
    bytes: &'a [u8],
}

impl<'a> ConversationIndex<'a> {
    /// Wrap `bytes`, requiring at least a full header.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(NormalizeError::MalformedConversationIndex { len: bytes.len() });
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The thread GUID embedded in the header.
    pub fn guid(&self) -> [u8; GUID_LEN] {
        let mut guid = [0u8; GUID_LEN];
        guid.copy_from_slice(&self.bytes[GUID_OFFSET..GUID_OFFSET + GUID_LEN]);
        guid
    }

    /// Time the thread was started, from the truncated header FILETIME.
    ///
    /// Precision is 2^16 × 100 ns (about 6.5 ms). `None` for times before 1970.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let filetime = BigEndian::read_u48(&self.bytes[..GUID_OFFSET]) << 16;
        let since_unix = filetime.checked_sub(FILETIME_UNIX_EPOCH)?;
        let secs = i64::try_from(since_unix / 10_000_000).ok()?;
        let nanos = ((since_unix % 10_000_000) * 100) as u32;
        DateTime::from_timestamp(secs, nanos)
    }

    /// Number of replies recorded after the header.
    ///
    /// Trailing bytes that do not fill a whole child block are not counted.
    pub fn reply_depth(&self) -> usize {
        self.child_blocks().count()
    }

    /// The 5-byte child blocks, oldest first.
    pub fn child_blocks(&self) -> impl Iterator<Item = &'a [u8]> {
        self.bytes[HEADER_LEN..].chunks_exact(CHILD_BLOCK_LEN)
    }
}

/// Uppercase hex, two digits per byte, no separators.
pub fn encode_hex_upper(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Inverse of [`encode_hex_upper`]; accepts either case.
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    hex::decode(s).map_err(|e| NormalizeError::InvalidHex(format!("'{s}': {e}")))
}

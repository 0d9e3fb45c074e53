//! RFC 5322 header parsing: folding, encoded-words (RFC 2047), and date parsing.

use base64::Engine;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

/// Unfolded header fields in message order, names lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    fields: Vec<(String, String)>,
}

impl HeaderMap {
    /// Parse a raw header block. Non-UTF-8 bytes are read as Windows-1252.
    pub fn parse(raw: &[u8]) -> Self {
        let raw = raw.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(raw);
        let text = match std::str::from_utf8(raw) {
            Ok(s) => std::borrow::Cow::Borrowed(s),
            Err(_) => encoding_rs::WINDOWS_1252.decode(raw).0,
        };
        Self {
            fields: unfold(&text),
        }
    }

    /// First value for `name` (case-insensitive), raw.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// Every value for `name`, in message order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        // Stored names are already lowercase
        let name = name.to_ascii_lowercase();
        self.fields
            .iter()
            .filter(move |(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First value for `name` with RFC 2047 encoded-words decoded.
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(decode_encoded_words)
    }
}

/// Byte offset where the header block ends (start of the first blank line).
pub fn find_header_end(data: &[u8]) -> Option<usize> {
    (0..data.len()).find(|&i| data[i..].starts_with(b"\n\n") || data[i..].starts_with(b"\r\n\r\n"))
}

/// Join continuation lines (leading space or tab) with the previous field.
///
/// Also used for iCalendar content.
pub(crate) fn unfold(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            result.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }

    result
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Undecodable tokens are kept as they are.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two encoded words is dropped (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        match decode_one_word(&remaining[start + 2..]) {
            Some((text, consumed)) => {
                result.push_str(&text);
                remaining = &remaining[start + 2 + consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = &remaining[start + 2..];
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?enc?text?=`; returns the text and the bytes consumed.
fn decode_one_word(s: &str) -> Option<(String, usize)> {
    let (charset, rest) = s.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let encoded = &rest[..end];
    let consumed = charset.len() + 1 + encoding.len() + 1 + end + 2;

    let bytes = match encoding {
        "B" | "b" => base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .ok()?,
        "Q" | "q" => decode_q(encoded),
        _ => return None,
    };

    Some((decode_charset(charset, &bytes), consumed))
}

/// Q-encoding: `_` is a space, `=XX` is a byte.
fn decode_q(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => out.push(b' '),
            b'=' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                        continue;
                    }
                    None => out.push(b'='),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    out
}

fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    // RFC 2231 language suffix: "utf-8*en"
    let label = charset.split('*').next().unwrap_or(charset);
    match encoding_rs::Encoding::for_label(label.as_bytes()) {
        Some(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
        None => {
            warn!(charset, "Unknown charset, falling back to UTF-8 lossy");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Content between the first `<` and the following `>`, brackets included.
pub fn extract_angle_bracket(s: &str) -> String {
    extract_all_angle_brackets(s)
        .into_iter()
        .next()
        .unwrap_or_else(|| s.trim().to_string())
}

/// Every `<…>` token (for `References`).
pub fn extract_all_angle_brackets(s: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut remaining = s;
    while let Some(start) = remaining.find('<') {
        let Some(len) = remaining[start..].find('>') else {
            break;
        };
        result.push(remaining[start..=start + len].to_string());
        remaining = &remaining[start + len + 1..];
    }
    result
}

/// Date from a `Received:` trace field (the part after the last `;`).
pub fn parse_received_date(received: &str) -> Option<DateTime<Utc>> {
    let (_, date) = received.rsplit_once(';')?;
    parse_date(date)
}

/// Parse an email date in the common RFC 2822 / ISO 8601 forms and their
/// usual broken variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // "(PST)" style trailing comments, then day-of-week, then named zones
    let no_comment = match trimmed.find(" (") {
        Some(pos) => &trimmed[..pos],
        None => trimmed,
    };
    let no_dow = strip_day_of_week(no_comment);
    let candidate = replace_named_tz(no_dow);

    const FORMATS: &[&str] = &[
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&candidate, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

fn strip_day_of_week(s: &str) -> &str {
    const DAYS: &[&str] = &["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    DAYS.iter()
        .find_map(|day| s.strip_prefix(day))
        .map(|rest| rest.trim_start_matches(',').trim())
        .unwrap_or(s)
}

/// Replace a trailing timezone abbreviation with its numeric offset.
fn replace_named_tz(s: &str) -> String {
    const ZONES: &[(&str, &str)] = &[
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("UT", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
    ];
    for (name, offset) in ZONES {
        if let Some(head) = s.strip_suffix(name) {
            if head.ends_with(' ') {
                return format!("{head}{offset}");
            }
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(
            decode_encoded_words("=?ISO-8859-1?Q?R=E9sum=E9_du_projet?="),
            "Résumé du projet"
        );
    }

    #[test]
    fn test_decode_adjacent_words_and_plain_text() {
        assert_eq!(
            decode_encoded_words("=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="),
            "Hola mundo"
        );
        assert_eq!(
            decode_encoded_words("Re: =?UTF-8?B?SG9sYQ==?= there"),
            "Re: Hola there"
        );
    }

    #[test]
    fn test_undecodable_word_is_kept() {
        assert_eq!(decode_encoded_words("=?x?Z?abc?="), "=?x?Z?abc?=");
    }

    #[test]
    fn test_header_map() {
        let raw = b"Subject: This is a long\r\n\tsubject line\r\nReceived: a\r\nReceived: b\r\n";
        let headers = HeaderMap::parse(raw);
        assert_eq!(headers.get("SUBJECT"), Some("This is a long subject line"));
        assert_eq!(headers.get_all("received").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(headers.get("to"), None);
    }

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end(b"From: a@b.com\nSubject: Hi\n\nBody\n"), Some(25));
        assert_eq!(
            find_header_end(b"From: a@b.com\r\nSubject: Hi\r\n\r\nBody\r\n"),
            Some(26)
        );
        assert_eq!(find_header_end(b"Subject: no body"), None);
    }

    #[test]
    fn test_parse_dates() {
        let expected = "2024-01-04 10:00";
        for input in [
            "Thu, 04 Jan 2024 10:00:00 +0000",
            "04 Jan 2024 10:00:00 +0000",
            "Thu, 04 Jan 2024 05:00:00 EST",
            "2024-01-04T10:00:00Z",
            "Thu, 4 Jan 2024 10:00:00 +0000 (UTC)",
        ] {
            let dt = parse_date(input).unwrap_or_else(|| panic!("failed on {input}"));
            assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), expected, "{input}");
        }
        assert!(parse_date("not a date").is_none());
    }

    #[test]
    fn test_parse_received_date() {
        let received = "from mx.example.com by mail.example.com; Thu, 04 Jan 2024 10:00:05 +0000";
        let dt = parse_received_date(received).unwrap();
        assert_eq!(dt.format("%H:%M:%S").to_string(), "10:00:05");
        assert!(parse_received_date("no date here").is_none());
    }

    #[test]
    fn test_angle_brackets() {
        assert_eq!(extract_angle_bracket(" <msg001@example.com> "), "<msg001@example.com>");
        let refs = extract_all_angle_brackets("<a@b.com> <c@d.com>");
        assert_eq!(refs, vec!["<a@b.com>", "<c@d.com>"]);
    }
}

//! HTML-to-plain-text conversion.
//!
//! The body normalizer only depends on the [`HtmlConverter`] trait. Callers
//! with a better renderer plug it in; [`TagStripConverter`] is the built-in
//! fallback.

/// Converts an HTML document to plain text. Must be a pure function.
pub trait HtmlConverter {
    fn html_to_plain_text(&self, html: &str) -> String;
}

impl<F> HtmlConverter for F
where
    F: Fn(&str) -> String,
{
    fn html_to_plain_text(&self, html: &str) -> String {
        self(html)
    }
}

/// Tags whose opening or closing form starts a new line.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "tr", "li", "h1", "h2", "h3", "h4", "h5", "h6", "table", "blockquote",
];

const ENTITIES: &[(&str, &str)] = &[
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&nbsp;", " "),
    ("&#160;", " "),
    // Last, so "&amp;lt;" decodes to "&lt;" and not "<"
    ("&amp;", "&"),
];

/// Simple tag-stripping converter.
///
/// - Drops `<script>` and `<style>` blocks
/// - Breaks lines at `<br>` and block elements
/// - Decodes common entities
/// - Collapses runs of blank lines to one
#[derive(Debug, Clone, Copy, Default)]
pub struct TagStripConverter;

impl HtmlConverter for TagStripConverter {
    fn html_to_plain_text(&self, html: &str) -> String {
        let mut text = html.to_string();
        for tag in ["script", "style"] {
            text = remove_tag_block(&text, tag);
        }

        let mut stripped = String::with_capacity(text.len());
        let mut rest = text.as_str();
        while let Some(open) = rest.find('<') {
            stripped.push_str(&rest[..open]);
            let Some(close) = rest[open..].find('>') else {
                // Unterminated tag, drop the remainder
                rest = "";
                break;
            };
            if starts_line(&rest[open + 1..open + close]) {
                stripped.push('\n');
            }
            rest = &rest[open + close + 1..];
        }
        stripped.push_str(rest);

        let decoded = ENTITIES
            .iter()
            .fold(stripped, |acc, (entity, ch)| acc.replace(entity, ch));

        collapse_blank_lines(&decoded)
    }
}

/// Whether the tag body (text between `<` and `>`) breaks the line.
fn starts_line(tag: &str) -> bool {
    let name: String = tag
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    name == "br" || BLOCK_TAGS.contains(&name.as_str())
}

fn collapse_blank_lines(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut prev_was_blank = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
                prev_was_blank = true;
            }
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }
    cleaned.trim().to_string()
}

/// Remove an entire tag block (e.g. `<script>…</script>`), case-insensitively.
fn remove_tag_block(html: &str, tag: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut result = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = lower[pos..].find(&open).map(|i| i + pos) {
        result.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => return result,
        }
    }
    result.push_str(&html[pos..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(html: &str) -> String {
        TagStripConverter.html_to_plain_text(html)
    }

    #[test]
    fn test_paragraphs() {
        let text = convert("<p>Hello <b>world</b></p><p>Second paragraph</p>");
        assert_eq!(text, "Hello world\n\nSecond paragraph");
    }

    #[test]
    fn test_line_breaks() {
        assert_eq!(convert("one<br>two<BR/>three"), "one\ntwo\nthree");
    }

    #[test]
    fn test_entities() {
        assert_eq!(convert("Tom &amp; Jerry &lt;3&gt;"), "Tom & Jerry <3>");
        assert_eq!(convert("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_removes_scripts_and_styles() {
        assert_eq!(
            convert("Before<SCRIPT>alert('x')</SCRIPT><style>p{}</style>After"),
            "BeforeAfter"
        );
    }

    #[test]
    fn test_inline_tags_do_not_break() {
        assert_eq!(convert("<p>hi</p>"), "hi");
        assert_eq!(convert("<span>a</span><i>b</i>"), "ab");
    }

    #[test]
    fn test_closure_converter() {
        let upper = |html: &str| html.to_uppercase();
        assert_eq!(upper.html_to_plain_text("<p>x</p>"), "<P>X</P>");
    }
}

use chrono::{Local, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*/?\s*p\s*/?>").expect("valid paragraph regex"));
static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*br\s*/?>").expect("valid line break regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank run regex"));

/// Converts the HTML fragments the API uses for `text` into plain text.
pub fn html_to_text(input: &str) -> String {
    let text = PARAGRAPH.replace_all(input, "\n\n");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");
    let decoded = html_escape::decode_html_entities(&text);
    BLANK_RUN
        .replace_all(decoded.trim(), "\n\n")
        .into_owned()
}

/// Local date and time for a unix timestamp in seconds.
pub fn format_timestamp(secs: i64) -> String {
    match Local.timestamp_opt(secs, 0).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "unknown time".to_string(),
    }
}

pub fn host_of(link: &str) -> Option<String> {
    let parsed = Url::parse(link).ok()?;
    let host = parsed.host_str()?;
    Some(host.trim_start_matches("www.").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_become_blank_lines() {
        let text = html_to_text("First<p>Second<p>Third");
        assert_eq!(text, "First\n\nSecond\n\nThird");
    }

    #[test]
    fn tags_are_stripped_and_entities_decoded() {
        let text = html_to_text(
            r#"See <a href="https://example.com/">example.com</a> &amp; <i>more</i> &#x27;here&#x27;"#,
        );
        assert_eq!(text, "See example.com & more 'here'");
    }

    #[test]
    fn host_drops_www() {
        assert_eq!(
            host_of("https://www.example.com/a/b").as_deref(),
            Some("example.com")
        );
        assert_eq!(host_of("not a url"), None);
    }

    #[test]
    fn timestamp_formats_as_local_time() {
        let formatted = format_timestamp(1_175_714_200);
        assert_eq!(formatted.len(), "2007-04-04 19:16:40".len());
        assert!(formatted.starts_with("2007-04-0"));
    }
}

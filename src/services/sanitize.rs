//! Free-text validation for user submitted content.
//!
//! Runs before any network call; failures surface as `TrackerError::Validation`.

use crate::error::{TrackerError, TrackerResult};

pub const TITLE_MIN_LEN: usize = 3;
pub const TITLE_MAX_LEN: usize = 120;
pub const DISCUSSION_MAX_LEN: usize = 2000;
pub const COMMENT_MAX_LEN: usize = 1000;
pub const TOKEN_ID_MAX_LEN: usize = 64;

/// Trim, strip control characters (newlines survive), HTML-escape, and enforce length.
pub fn sanitize_text(field: &str, input: &str, min_len: usize, max_len: usize) -> TrackerResult<String> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| *c == '\n' || !c.is_control())
        .collect();
    let cleaned = cleaned.trim();

    let len = cleaned.chars().count();
    if len == 0 {
        return Err(TrackerError::Validation(format!("{} must not be empty", field)));
    }
    if len < min_len {
        return Err(TrackerError::Validation(format!(
            "{} must be at least {} characters",
            field, min_len
        )));
    }
    if len > max_len {
        return Err(TrackerError::Validation(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }

    Ok(escape_html(cleaned))
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Identifiers are slugs: lowercase ascii, digits, '-' and '_'.
pub fn validate_id(field: &str, id: &str) -> TrackerResult<()> {
    let valid = !id.is_empty()
        && id.len() <= TOKEN_ID_MAX_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(TrackerError::Validation(format!("invalid {}", field)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_markup_and_strips_controls() {
        let out = sanitize_text("comment", "  <b>moon</b> & \"soon\"\u{0007}\nok ", 1, 100).unwrap();
        assert_eq!(out, "&lt;b&gt;moon&lt;/b&gt; &amp; &quot;soon&quot;\nok");
    }

    #[test]
    fn test_length_limits() {
        assert!(matches!(
            sanitize_text("title", "   ", 3, 10),
            Err(TrackerError::Validation(_))
        ));
        assert!(sanitize_text("title", "ab", 3, 10).is_err());
        assert!(sanitize_text("title", "abcdefghijk", 3, 10).is_err());
        assert_eq!(sanitize_text("title", "abc", 3, 10).unwrap(), "abc");
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("token id", "fuel-network").is_ok());
        assert!(validate_id("token id", "9f1c2a_b").is_ok());
        assert!(validate_id("token id", "").is_err());
        assert!(validate_id("token id", "Fuel").is_err());
        assert!(validate_id("token id", "../etc").is_err());
    }
}

//! PII Masker (spec §4.6). Applied only to text destined for persistence
//! (pending memory cards, session summaries) — never to `Say` text.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w.+-]+@[\w-]+\.[\w.-]+").expect("valid regex"));

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\+?\d{1,3}[-\s]?)?(\(?\d{2,4}\)?[-\s]?){2,4}\d{3,4}").expect("valid regex"));

static ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z]{1,4}-?\d{6,}\b").expect("valid regex"));

/// Replace email addresses, phone-like digit runs, and long id tokens
/// with fixed placeholders before a value is written to the store.
pub fn mask(text: &str) -> String {
    let masked = EMAIL_RE.replace_all(text, "[email]");
    let masked = PHONE_RE.replace_all(&masked, "[phone]");
    let masked = ID_RE.replace_all(&masked, "[id]");
    masked.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_email_addresses() {
        assert_eq!(mask("reach me at a.b@example.com please"), "reach me at [email] please");
    }

    #[test]
    fn masks_phone_numbers() {
        assert_eq!(mask("call 090-1234-5678 now"), "call [phone] now");
    }

    #[test]
    fn masks_long_id_tokens() {
        assert_eq!(mask("ticket ABC-123456 opened"), "ticket [id] opened");
    }

    #[test]
    fn leaves_ordinary_text_untouched() {
        assert_eq!(mask("すきなたべものはいちごです"), "すきなたべものはいちごです");
    }
}

//! Input validation helpers.

use std::sync::OnceLock;

use regex::Regex;

/// Loose RFC-style email check; enough to catch swapped or truncated
/// addresses before the SMTP transport is built.
pub fn is_valid_email(address: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("static regex")
    });
    re.is_match(address)
}

/// YouTube video ids are exactly 11 URL-safe base64 characters.
pub fn is_valid_video_id(id: &str) -> bool {
    static ID_RE: OnceLock<Regex> = OnceLock::new();
    let re = ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static regex"));
    re.is_match(id)
}

//! Filesystem-safe names for downloaded files

use lazy_regex::regex_replace_all;

/// Fallback name used when the reported title sanitizes to nothing.
pub const FALLBACK_NAME: &str = "download";

/// Maximum length of a sanitized name, in characters.
const MAX_LEN: usize = 100;

/// Sanitize a media title into a filesystem-safe file stem.
///
/// Strips characters that are reserved on Windows and problematic elsewhere
/// (`\ / * ? : " < > |`), collapses whitespace runs into single spaces,
/// trims leading/trailing spaces and dots and caps the result at 100
/// characters. A missing or empty title yields [`FALLBACK_NAME`]; the
/// result is never empty.
pub fn sanitize_filename(title: Option<&str>) -> String {
    let Some(raw) = title else {
        return FALLBACK_NAME.to_string();
    };

    let cleaned = regex_replace_all!(r#"[\\/*?:"<>|]"#, raw, "");
    let cleaned = regex_replace_all!(r"\s+", &cleaned, " ");
    let cleaned = cleaned.trim().trim_matches('.').trim();

    let capped: String = cleaned.chars().take(MAX_LEN).collect();
    let capped = capped.trim().trim_matches('.').trim().to_string();

    if capped.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        capped
    }
}

//! Armored text normalization
//!
//! Every armored block that enters the service (uploaded keys, generated
//! keys before storage, ciphertext and private keys in decrypt requests)
//! passes through [`normalize`] so that parsing is insensitive to the
//! newline and whitespace changes introduced by browsers, form encoders
//! and copy/paste.

/// Normalize an armored block.
///
/// Line endings become LF, leading and trailing whitespace is removed and
/// the result ends with exactly one newline. Carriage returns at the end of
/// a line are dropped even when repeated, which keeps the function
/// idempotent for inputs like `"a\r\r\nb"`.
pub fn normalize(text: &str) -> String {
    let joined = text
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .collect::<Vec<_>>()
        .join("\n");

    let mut out = String::with_capacity(joined.len() + 1);
    out.push_str(joined.trim());
    out.push('\n');
    out
}

/// [`normalize`] that passes `None` through untouched.
pub fn normalize_opt(text: Option<&str>) -> Option<String> {
    text.map(normalize)
}

/// True when a normalized block carries no content besides its newline.
pub fn is_blank(normalized: &str) -> bool {
    normalized.trim().is_empty()
}

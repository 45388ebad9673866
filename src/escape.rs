//! Repository URL escaping
//!
//! Turns an arbitrary URL into a token usable as a file basename. The
//! bundle publishing service derives bundle filenames with the exact same
//! rule, so this must stay byte-for-byte compatible with it: changing the
//! accepted character set breaks discovery of every published bundle.

/// Escape a URL so it only contains ASCII digits, ASCII letters, `%` and `_`.
///
/// Works on bytes: every other byte becomes a single `_`, so a multibyte
/// UTF-8 character turns into one `_` per byte and the output length in
/// bytes equals the input length.
pub fn escape_url(url: &str) -> String {
    url.bytes()
        .map(|b| if is_kept(b) { char::from(b) } else { '_' })
        .collect()
}

fn is_kept(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'%' || b == b'_'
}

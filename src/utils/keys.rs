use once_cell::sync::Lazy;
use regex::Regex;

/// Longest key segment the store accepts, in bytes
pub const KEY_MAX_BYTES: usize = 768;

/// Characters that cannot appear in a key segment: `.`, `#`, `$`, `[`, `]`, `/`
/// and ASCII control characters.
static FORBIDDEN_KEY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.#$\[\]/\x00-\x1F\x7F]").expect("valid key regex"));

/// Check whether a string can be used as a single store key segment
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= KEY_MAX_BYTES && !FORBIDDEN_KEY_CHARS.is_match(key)
}

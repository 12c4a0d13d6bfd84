//! Normalization applied to extracted document text before chunking.

use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

static DISALLOWED_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9áéíóúÁÉÍÓÚüÜ\s.,;:¡¿]+").expect("character class pattern compiles")
});

/// Flatten line breaks, collapse whitespace, trim, and blank out unsupported symbols.
///
/// Letters (including Spanish accented vowels), digits, whitespace and `. , ; : ¡ ¿` survive.
/// Any other run of characters becomes a single space. The replacement is not collapsed again,
/// so a symbol between two spaces leaves three spaces behind.
pub fn clean_text(text: &str) -> String {
    let flattened = text.replace('\n', " ");
    let collapsed = WHITESPACE_RUN.replace_all(&flattened, " ");
    DISALLOWED_RUN
        .replace_all(collapsed.trim(), " ")
        .into_owned()
}

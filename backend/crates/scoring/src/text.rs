use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Remove diacritics by decomposing to NFD and dropping combining marks.
pub fn strip_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Lowercase, strip diacritics and collapse whitespace runs to a single space.
/// Phrase matching and duplicate detection both compare folded text.
pub fn fold(text: &str) -> String {
    let stripped = strip_diacritics(&text.to_lowercase());
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

//! Small pure helpers shared across the ranking pipeline.

/// Rolling string hash used to derive deterministic tie-breakers.
///
/// Matches the widely deployed `(h << 5) - h + code` JavaScript idiom so
/// that seeds produce the same ordering as the legacy stack: the hash walks
/// UTF-16 code units, wraps in signed 32-bit arithmetic, and returns the
/// absolute value.
pub fn hash_string(input: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    hash.unsigned_abs()
}

/// True when `word` appears in `text` as a whole token.
///
/// Tokens are maximal runs of alphanumeric characters plus apostrophes, so
/// "no navy tops" contains "navy" but "unavoidable" does not.
pub fn contains_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .any(|token| token.eq_ignore_ascii_case(word))
}

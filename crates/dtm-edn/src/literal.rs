//! Validity predicates for literal text typed by users.

/// Whether `text` is an EDN integer literal.
///
/// When `allow_negative` is false a leading `-` is rejected, which is how
/// result offsets and limits are checked.
#[must_use]
pub fn valid_integer(text: &str, allow_negative: bool) -> bool {
    let unsigned = match text.strip_prefix('-') {
        Some(rest) if allow_negative => rest,
        Some(_) => return false,
        None => text.strip_prefix('+').unwrap_or(text),
    };
    let digits = unsigned.strip_suffix('N').unwrap_or(unsigned);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

/// Whether `text` is an EDN boolean literal.
#[must_use]
pub fn valid_boolean(text: &str) -> bool {
    matches!(text, "true" | "false")
}

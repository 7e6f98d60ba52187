//! Username grammar and rename rules.

/// Longest accepted username.
pub const MAX_USERNAME_LEN: usize = 14;

/// Outcome of a rename request. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsernameVerdict {
    /// Longer than [`MAX_USERNAME_LEN`].
    TooLong,
    /// Does not match the username grammar.
    Invalid,
    /// Identical to the current name.
    Unchanged,
    /// The rename goes ahead.
    Accepted,
}

/// Check `name` against the grammar, ignoring length.
///
/// A name is a letter followed by letters and digits, or the default
/// `PLAYER_<digits>` form.
#[must_use]
pub fn is_valid_username(name: &str) -> bool {
    if let Some(digits) = name.strip_prefix("PLAYER_") {
        return !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
    }

    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric())
}

/// Decide what happens when a player named `current` asks to be `requested`.
#[must_use]
pub fn judge_rename(current: &str, requested: &str) -> UsernameVerdict {
    if requested.chars().count() > MAX_USERNAME_LEN {
        UsernameVerdict::TooLong
    } else if !is_valid_username(requested) {
        UsernameVerdict::Invalid
    } else if requested == current {
        UsernameVerdict::Unchanged
    } else {
        UsernameVerdict::Accepted
    }
}

//! Input validation for identifiers arriving from outside the process.

use crate::error::CoreError;

/// Maximum accepted length of a path-supplied user id.
pub const MAX_USER_ID_LEN: usize = 128;

/// Validate a user id taken from a request path.
///
/// Rejects empty ids, ids longer than [`MAX_USER_ID_LEN`], and ids
/// containing whitespace or `/`.
pub fn validate_user_id(user_id: &str) -> Result<(), CoreError> {
    if user_id.is_empty() {
        return Err(CoreError::Validation("user id is missing".into()));
    }
    if user_id.chars().count() > MAX_USER_ID_LEN {
        return Err(CoreError::Validation(format!(
            "user id exceeds {MAX_USER_ID_LEN} characters"
        )));
    }
    if user_id.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(CoreError::Validation(
            "user id must not contain whitespace or '/'".into(),
        ));
    }
    Ok(())
}

use super::error::ApiError;

/// Maximum allowed length for identifiers (config keys, secret names,
/// policy ids).
pub const MAX_ID_LENGTH: usize = 256;

/// Maximum allowed length for scope/algorithm/environment string fields.
pub const MAX_SHORT_STRING_LENGTH: usize = 128;

/// Maximum allowed length for secret plaintext submitted via the API.
pub const MAX_SECRET_LENGTH: usize = 16 * 1024;

/// Validate that a string field does not exceed `max_len` bytes.
pub fn validate_string_length(
    field_name: &str,
    value: &str,
    max_len: usize,
) -> Result<(), ApiError> {
    if value.len() > max_len {
        return Err(ApiError::BadRequest {
            code: "VALIDATION_ERROR",
            message: format!(
                "{field_name} exceeds maximum length of {max_len} characters (got {})",
                value.len()
            ),
        });
    }
    Ok(())
}

//! Request parameter validation helpers shared across handlers.

use crate::api::error::ApiError;

/// Rejects an empty or whitespace-only string field.
pub fn validate_not_empty(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::ValidationError(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Rejects a string field longer than `max_len`.
pub fn validate_string_length(field: &str, value: &str, max_len: usize) -> Result<(), ApiError> {
    if value.len() > max_len {
        return Err(ApiError::ValidationError(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(())
}

/// Clamps a `limit`/`offset` pagination pair to sane bounds, matching spec
/// §6's `GET /chat/sessions?limit&offset` contract.
pub fn validate_pagination(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(50).clamp(1, 200);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Rejects a malformed UUID-shaped identifier (session ids are UUIDs per
/// spec §3; plan/task/job ids are integers and don't go through this check).
pub fn validate_uuid(field: &str, value: &str) -> Result<(), ApiError> {
    uuid::Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| ApiError::ValidationError(format!("{field} must be a valid UUID")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_field() {
        assert!(validate_not_empty("name", "  ").is_err());
        assert!(validate_not_empty("name", "ok").is_ok());
    }

    #[test]
    fn clamps_pagination() {
        let (limit, offset) = validate_pagination(Some(1000), Some(-5));
        assert_eq!(limit, 200);
        assert_eq!(offset, 0);
    }

    #[test]
    fn validates_uuid_shape() {
        assert!(validate_uuid("session_id", "not-a-uuid").is_err());
        assert!(validate_uuid("session_id", &uuid::Uuid::new_v4().to_string()).is_ok());
    }
}

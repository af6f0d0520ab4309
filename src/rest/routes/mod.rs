//! Route handlers for the REST API.

pub mod health;
pub mod orders;
pub mod sections;
pub mod sessions;

use crate::rest::error::ApiError;

/// Session and order ids double as file names, so only a safe alphabet is accepted
pub(crate) fn validate_id(kind: &str, id: &str) -> Result<(), ApiError> {
    let valid = !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("Invalid {} id '{}'", kind, id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("session", "3f2b-aa_01").is_ok());
        assert!(matches!(
            validate_id("order", "../1"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(validate_id("order", "").is_err());
    }
}

use axum::http::{HeaderMap, StatusCode};
use uuid::Uuid;

use crate::domain::error::{DomainError, DomainResult};

use super::auth::AuthService;

#[inline]
pub fn validate_auth_token(headers: &HeaderMap, service: &AuthService) -> Result<Uuid, StatusCode> {
    let jwt_header_token = match headers.get("Authorization").map(|token| token.to_str()) {
        Some(Ok(token)) => token,
        _ => {
            return Err(StatusCode::UNAUTHORIZED);
        }
    };
    //validate our token
    match service.verify_token(jwt_header_token) {
        Ok(user) => Ok(user),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Raw Authorization header value, handed to use cases that resolve the
/// caller themselves.
#[inline]
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, StatusCode> {
    match headers.get("Authorization").map(|token| token.to_str()) {
        Some(Ok(token)) => Ok(token),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

pub fn status_for(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Auth(_) => StatusCode::UNAUTHORIZED,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::BusinessRule(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::InvalidTransition { .. } => StatusCode::CONFLICT,
        DomainError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[inline]
pub fn check_password(password: &str) -> DomainResult<()> {
    if password.len() < 8 {
        return Err(DomainError::validation(
            "Password must be at least 8 characters",
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(DomainError::validation(
            "Password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(DomainError::validation(
            "Password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_digit(10)) {
        return Err(DomainError::validation(
            "Password must contain at least one digit",
        ));
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err(DomainError::validation(
            "Password must contain at least one special character",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rules() {
        assert!(check_password("Va1id!pass").is_ok());
        assert!(check_password("short1!").is_err());
        assert!(check_password("noupper1!aaa").is_err());
        assert!(check_password("NOLOWER1!AAA").is_err());
        assert!(check_password("NoDigits!aaa").is_err());
        assert!(check_password("NoSpecial1aaa").is_err());
    }

    #[test]
    fn error_mapping_matches_the_taxonomy() {
        assert_eq!(
            status_for(&DomainError::validation("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&DomainError::Auth("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&DomainError::NotFound("user")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&DomainError::business_rule("x")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&DomainError::Repository("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

use axum::http::{header, HeaderMap, StatusCode};
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::service::ServiceError;

#[derive(Clone, Default)]
pub struct AdminCredentials {
    pub user: String,
    pub password: String,
}

/// Gate for the `/admin` surface: HTTP basic auth against configured
/// credentials.
pub fn require_admin(
    credentials: &AdminCredentials,
    headers: &HeaderMap,
) -> Result<(), ServiceError> {
    if credentials.user.is_empty() || credentials.password.is_empty() {
        return Err(ServiceError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "admin_unconfigured",
            "admin credentials not configured".to_string(),
        ));
    }

    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let Some(encoded) = header.strip_prefix("Basic ") else {
        return Err(unauthorized());
    };
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());
    let Some(decoded) = decoded else {
        return Err(unauthorized());
    };
    let Some((user, password)) = decoded.split_once(':') else {
        return Err(unauthorized());
    };

    if digest_eq(user, &credentials.user) && digest_eq(password, &credentials.password) {
        Ok(())
    } else {
        Err(unauthorized())
    }
}

/// Hashing both sides first keeps the comparison time independent of where
/// the inputs differ.
fn digest_eq(left: &str, right: &str) -> bool {
    Sha256::digest(left.as_bytes()) == Sha256::digest(right.as_bytes())
}

fn unauthorized() -> ServiceError {
    ServiceError::new(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "unauthorized".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn configured() -> AdminCredentials {
        AdminCredentials {
            user: "admin".to_string(),
            password: "s3cret".to_string(),
        }
    }

    fn basic_header(user: &str, password: &str) -> HeaderMap {
        let token =
            base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn unconfigured_credentials_are_service_unavailable() {
        let err = require_admin(&AdminCredentials::default(), &HeaderMap::new()).unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let err = require_admin(&configured(), &HeaderMap::new()).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn wrong_password_is_unauthorized() {
        let headers = basic_header("admin", "wrong");
        let err = require_admin(&configured(), &headers).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn valid_credentials_pass() {
        let headers = basic_header("admin", "s3cret");
        assert!(require_admin(&configured(), &headers).is_ok());
    }
}

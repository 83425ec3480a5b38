use domain::auth::entity::JwtClaims;
use domain::auth::rbac::Role;
use domain::common::entity::Environment;

use crate::http::error::ApiError;

/// Require at least Operator role (rejects Viewer with 403).
pub fn require_write_access(claims: &JwtClaims) -> Result<(), ApiError> {
    if claims.role() == Role::Viewer {
        return Err(ApiError::Forbidden {
            code: "INSUFFICIENT_ROLE",
            message: "viewer role cannot perform write operations".to_string(),
        });
    }
    Ok(())
}

/// Require Operator or Admin for reading secret plaintext.
pub fn require_secret_read(claims: &JwtClaims) -> Result<(), ApiError> {
    if claims.role() == Role::Viewer {
        return Err(ApiError::Forbidden {
            code: "INSUFFICIENT_ROLE",
            message: "viewer role cannot read secret values".to_string(),
        });
    }
    Ok(())
}

/// Require Admin role (rotation, revocation, policy administration).
pub fn require_admin(claims: &JwtClaims) -> Result<(), ApiError> {
    if claims.role() != Role::Admin {
        return Err(ApiError::Forbidden {
            code: "INSUFFICIENT_ROLE",
            message: "operation requires admin role".to_string(),
        });
    }
    Ok(())
}

/// Require Admin role OR Operator with a matching environment claim.
///
/// - Writes to `global` require Admin (they affect every environment).
/// - Writes to a specific environment require Admin OR an Operator whose
///   `environments` claim covers it.
/// - Viewer is always rejected.
pub fn require_environment_write(
    claims: &JwtClaims,
    environment: &Environment,
) -> Result<(), ApiError> {
    let role = claims.role();

    if role == Role::Viewer {
        return Err(ApiError::Forbidden {
            code: "INSUFFICIENT_ROLE",
            message: "viewer role cannot perform write operations".to_string(),
        });
    }

    if role == Role::Admin {
        return Ok(());
    }

    if environment.is_global() {
        return Err(ApiError::Forbidden {
            code: "INSUFFICIENT_ROLE",
            message: "the global environment requires admin role".to_string(),
        });
    }

    if claims.has_environment(&environment.0) {
        Ok(())
    } else {
        Err(ApiError::Forbidden {
            code: "ENVIRONMENT_FORBIDDEN",
            message: format!("access denied for environment '{environment}'"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_claims(role: Option<&str>, environments: Option<Vec<&str>>) -> JwtClaims {
        JwtClaims {
            sub: "test-user".to_string(),
            exp: 9_999_999_999,
            iat: 0,
            iss: None,
            role: role.map(String::from),
            environments: environments.map(|envs| envs.into_iter().map(String::from).collect()),
        }
    }

    fn env(s: &str) -> Environment {
        Environment(s.to_string())
    }

    // ── require_write_access ─────────────────────────────────────────

    #[test]
    fn admin_can_write() {
        assert!(require_write_access(&make_claims(Some("admin"), None)).is_ok());
    }

    #[test]
    fn operator_can_write() {
        assert!(require_write_access(&make_claims(Some("operator"), None)).is_ok());
    }

    #[test]
    fn viewer_cannot_write() {
        assert!(require_write_access(&make_claims(Some("viewer"), None)).is_err());
    }

    #[test]
    fn missing_role_defaults_to_viewer() {
        assert!(require_write_access(&make_claims(None, None)).is_err());
    }

    // ── require_secret_read ──────────────────────────────────────────

    #[test]
    fn operator_can_read_secrets() {
        assert!(require_secret_read(&make_claims(Some("operator"), None)).is_ok());
    }

    #[test]
    fn viewer_cannot_read_secrets() {
        assert!(require_secret_read(&make_claims(Some("viewer"), None)).is_err());
    }

    // ── require_admin ────────────────────────────────────────────────

    #[test]
    fn only_admin_passes_admin_gate() {
        assert!(require_admin(&make_claims(Some("admin"), None)).is_ok());
        assert!(require_admin(&make_claims(Some("operator"), None)).is_err());
        assert!(require_admin(&make_claims(Some("viewer"), None)).is_err());
    }

    // ── require_environment_write ────────────────────────────────────

    #[test]
    fn admin_writes_anywhere() {
        let claims = make_claims(Some("admin"), None);
        assert!(require_environment_write(&claims, &env("prod")).is_ok());
        assert!(require_environment_write(&claims, &Environment::global()).is_ok());
    }

    #[test]
    fn operator_needs_matching_environment() {
        let claims = make_claims(Some("operator"), Some(vec!["staging"]));
        assert!(require_environment_write(&claims, &env("staging")).is_ok());
        assert!(require_environment_write(&claims, &env("prod")).is_err());
    }

    #[test]
    fn operator_unrestricted_when_no_environment_claim() {
        let claims = make_claims(Some("operator"), None);
        assert!(require_environment_write(&claims, &env("prod")).is_ok());
    }

    #[test]
    fn global_requires_admin() {
        let claims = make_claims(Some("operator"), Some(vec!["global"]));
        assert!(require_environment_write(&claims, &Environment::global()).is_err());
    }

    #[test]
    fn viewer_always_rejected() {
        let claims = make_claims(Some("viewer"), Some(vec!["prod"]));
        assert!(require_environment_write(&claims, &env("prod")).is_err());
    }
}

use domain::auth::entity::JwtClaims;
use domain::auth::error::AuthError;

/// Secondary port for validating API credentials.
///
/// Implemented by the JWT provider in the adapter layer; the HTTP
/// middleware consults it when authentication is enabled.
pub trait AuthProvider: Send + Sync {
    /// Validate a bearer token and return its claims.
    fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_provider_is_object_safe() {
        fn _check(provider: &dyn AuthProvider) {
            let _ = provider.validate_token("t");
        }
    }
}

use serde::Deserialize;

use super::rbac::Role;

/// JWT claims extracted from a validated token.
///
/// Contains standard JWT claims plus RBAC fields for environment-scoped
/// access control (role, environments).
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    /// Subject — the authenticated identity (required).
    pub sub: String,

    /// Expiration time (Unix timestamp, required).
    pub exp: u64,

    /// Issued-at time (Unix timestamp).
    #[serde(default)]
    pub iat: u64,

    /// Issuer — optional, validated when configured.
    pub iss: Option<String>,

    /// RBAC role claim: "admin", "operator", or "viewer".
    #[serde(default)]
    pub role: Option<String>,

    /// Environment scoping: environments the identity may write.
    #[serde(default)]
    pub environments: Option<Vec<String>>,
}

impl JwtClaims {
    /// Parse the role claim, defaulting to `Viewer` (least privilege).
    pub fn role(&self) -> Role {
        self.role
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or(Role::Viewer)
    }

    /// Check whether the claims grant write access to the environment.
    ///
    /// Returns `true` if `environments` is `None` (unrestricted) or
    /// contains `env`.
    pub fn has_environment(&self, env: &str) -> bool {
        match &self.environments {
            None => true,
            Some(list) => list.iter().any(|e| e == env),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_from_json() {
        let json = r#"{"sub":"user-1","exp":9999999999,"iat":1000000000}"#;
        let claims: JwtClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp, 9_999_999_999);
        assert!(claims.iss.is_none());
        assert!(claims.role.is_none());
    }

    #[test]
    fn claims_with_rbac_fields() {
        let json = r#"{"sub":"svc","exp":1,"role":"admin","environments":["prod","staging"]}"#;
        let claims: JwtClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.role(), Role::Admin);
        assert!(claims.has_environment("prod"));
        assert!(!claims.has_environment("dev"));
    }

    #[test]
    fn role_defaults_to_viewer() {
        let json = r#"{"sub":"svc","exp":1}"#;
        let claims: JwtClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.role(), Role::Viewer);
    }

    #[test]
    fn unknown_role_defaults_to_viewer() {
        let json = r#"{"sub":"svc","exp":1,"role":"superadmin"}"#;
        let claims: JwtClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.role(), Role::Viewer);
    }

    #[test]
    fn has_environment_unrestricted_when_none() {
        let json = r#"{"sub":"svc","exp":1}"#;
        let claims: JwtClaims = serde_json::from_str(json).unwrap();
        assert!(claims.has_environment("anything"));
    }
}

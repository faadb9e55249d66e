//! Credentials for write access to the identifier service
//!
//! Obtaining and refreshing tokens happens elsewhere; the client only needs to
//! know whether a bearer token is available.

use std::fmt;

/// An OAuth access token sent as `Authorization: Bearer ...`
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Source of credentials
pub trait AuthProvider {
    /// The current credential, if logged in
    fn authorizer(&self) -> Option<BearerToken>;

    fn is_logged_in(&self) -> bool {
        self.authorizer().is_some()
    }
}

/// Anonymous access; reads only
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl AuthProvider for NoAuth {
    fn authorizer(&self) -> Option<BearerToken> {
        None
    }
}

/// A fixed token, e.g. from configuration or the environment
#[derive(Debug, Clone)]
pub struct StaticToken(BearerToken);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(BearerToken::new(token))
    }

    /// `Some` only for a non-blank token
    pub fn from_optional(token: Option<&str>) -> Option<Self> {
        token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(Self::new)
    }
}

impl AuthProvider for StaticToken {
    fn authorizer(&self) -> Option<BearerToken> {
        Some(self.0.clone())
    }
}

impl<A: AuthProvider> AuthProvider for Option<A> {
    fn authorizer(&self) -> Option<BearerToken> {
        self.as_ref().and_then(AuthProvider::authorizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logged_in_state() {
        assert!(!NoAuth.is_logged_in());
        assert!(StaticToken::new("abc").is_logged_in());
        assert!(!None::<StaticToken>.is_logged_in());
        assert!(StaticToken::from_optional(Some("  ")).is_none());
    }

    #[test]
    fn test_token_is_not_logged() {
        let token = BearerToken::new("secret-value");
        assert!(!format!("{:?}", token).contains("secret-value"));
        assert_eq!(token.header_value(), "Bearer secret-value");
    }
}

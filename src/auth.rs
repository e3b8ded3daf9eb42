//! Credential store
//!
//! The notification client reads the bearer token once per connection
//! attempt through [`CredentialProvider`]. [`SessionCredentials`] is the
//! mutable store the REST client writes after login and clears on a 401.

use std::sync::Arc;

use parking_lot::RwLock;

/// Bearer token material
///
/// `Debug` is redacted so tokens never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(Arc<str>);

impl AuthToken {
    /// Wrap a raw token
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building the `Authorization` header
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Read-only access to the current auth material
pub trait CredentialProvider: Send + Sync + 'static {
    /// Current bearer token, if the user is signed in
    fn bearer_token(&self) -> Option<AuthToken>;
}

/// A fixed token (or none)
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    token: Option<AuthToken>,
}

impl StaticCredentials {
    /// Always present the given token
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self {
            token: Some(AuthToken::new(token)),
        }
    }

    /// Connect without credentials
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl CredentialProvider for StaticCredentials {
    fn bearer_token(&self) -> Option<AuthToken> {
        self.token.clone()
    }
}

#[derive(Debug, Default)]
struct Session {
    token: Option<AuthToken>,
    username: Option<String>,
}

/// Session-scoped credentials, set on login and cleared on logout
#[derive(Debug, Default)]
pub struct SessionCredentials {
    session: RwLock<Session>,
}

impl SessionCredentials {
    /// Create an empty (signed out) store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the token and user name from a successful login
    pub fn set(&self, token: impl Into<Arc<str>>, username: impl Into<String>) {
        let mut session = self.session.write();
        session.token = Some(AuthToken::new(token));
        session.username = Some(username.into());
    }

    /// Forget the current session
    pub fn clear(&self) {
        let mut session = self.session.write();
        session.token = None;
        session.username = None;
    }

    /// Whether a token is present
    pub fn is_authenticated(&self) -> bool {
        self.session.read().token.is_some()
    }

    /// Signed-in user name
    pub fn username(&self) -> Option<String> {
        self.session.read().username.clone()
    }
}

impl CredentialProvider for SessionCredentials {
    fn bearer_token(&self) -> Option<AuthToken> {
        self.session.read().token.clone()
    }
}

impl<T: CredentialProvider> CredentialProvider for Arc<T> {
    fn bearer_token(&self) -> Option<AuthToken> {
        (**self).bearer_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AuthToken::new("secret-jwt");
        assert_eq!(format!("{:?}", token), "AuthToken(<redacted>)");
        assert_eq!(token.expose(), "secret-jwt");
    }

    #[test]
    fn test_static_credentials() {
        assert_eq!(
            StaticCredentials::new("abc").bearer_token(),
            Some(AuthToken::new("abc"))
        );
        assert!(StaticCredentials::anonymous().bearer_token().is_none());
    }

    #[test]
    fn test_session_set_and_clear() {
        let creds = SessionCredentials::new();
        assert!(!creds.is_authenticated());

        creds.set("jwt", "alice");
        assert!(creds.is_authenticated());
        assert_eq!(creds.username().as_deref(), Some("alice"));
        assert_eq!(creds.bearer_token().unwrap().expose(), "jwt");

        creds.clear();
        assert!(!creds.is_authenticated());
        assert!(creds.username().is_none());
        assert!(creds.bearer_token().is_none());
    }

    #[test]
    fn test_shared_session_sees_updates() {
        let creds = Arc::new(SessionCredentials::new());
        let provider: Arc<dyn CredentialProvider> = creds.clone();

        assert!(provider.bearer_token().is_none());
        creds.set("fresh", "bob");
        assert_eq!(provider.bearer_token().unwrap().expose(), "fresh");
    }
}

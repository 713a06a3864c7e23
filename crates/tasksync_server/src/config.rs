//! Server configuration.

use crate::auth::AuthConfig;

/// How requests are authenticated.
#[derive(Debug, Clone, Default)]
pub enum AuthMode {
    /// No authentication.
    #[default]
    Disabled,
    /// Bearer token must equal a shared secret.
    SharedSecret(Vec<u8>),
    /// Bearer token must be an HMAC-signed, unexpired token.
    Signed(AuthConfig),
}

/// Configuration for the reference server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum accepted PUT body size in bytes.
    pub max_body_bytes: usize,
    /// Authentication mode.
    pub auth: AuthMode,
}

impl ServerConfig {
    /// Creates a configuration with a 10 MiB body limit and no auth.
    pub fn new() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024,
            auth: AuthMode::Disabled,
        }
    }

    /// Sets the maximum body size.
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Requires the bearer token to equal `secret`.
    pub fn with_shared_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.auth = AuthMode::SharedSecret(secret.into());
        self
    }

    /// Requires HMAC-signed tokens.
    pub fn with_signed_tokens(mut self, config: AuthConfig) -> Self {
        self.auth = AuthMode::Signed(config);
        self
    }

    /// Returns true if requests must carry a token.
    pub fn requires_auth(&self) -> bool {
        !matches!(self.auth, AuthMode::Disabled)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

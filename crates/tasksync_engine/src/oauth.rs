//! OAuth2 authorization-code flow with PKCE.
//!
//! The browser redirect and consent screens are external; this module only
//! produces the authorization URL, keeps the code verifier across the
//! redirect in a [`MetadataStore`], and exchanges the returned code for a
//! token.
//!
//! ```rust
//! use tasksync_engine::oauth::PkceVerifier;
//!
//! let verifier = PkceVerifier::from_string("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk").unwrap();
//! assert_eq!(verifier.challenge(), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
//! ```

use crate::error::{SyncError, SyncResult};
use crate::http::HttpClient;
use crate::transport::TokenProvider;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tasksync_store::MetadataStore;

const STATE_KEY: &str = "oauth.pkce_state";
const VERIFIER_KEY: &str = "oauth.pkce_verifier";
const TOKEN_KEY: &str = "oauth.token";

/// A PKCE code verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Generates a verifier from 32 random bytes (43 characters).
    pub fn generate() -> Self {
        Self(random_token())
    }

    /// Wraps an existing verifier.
    ///
    /// Returns `None` unless it is 43 to 128 unreserved characters.
    pub fn from_string(verifier: impl Into<String>) -> Option<Self> {
        let verifier = verifier.into();
        let unreserved = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~');
        ((43..=128).contains(&verifier.len()) && verifier.chars().all(unreserved))
            .then_some(Self(verifier))
    }

    /// The verifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The S256 code challenge: base64url(SHA-256(verifier)) without padding.
    pub fn challenge(&self) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(self.0.as_bytes()))
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// OAuth client registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthConfig {
    /// Public client id.
    pub client_id: String,
    /// Authorization endpoint.
    pub authorize_url: String,
    /// Token endpoint.
    pub token_url: String,
    /// Redirect URI registered for the client.
    pub redirect_uri: String,
    /// Requested scope, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// State and verifier of an authorization in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceSession {
    /// Anti-CSRF state echoed by the provider.
    pub state: String,
    /// Code verifier sent with the token request.
    pub verifier: PkceVerifier,
}

impl PkceSession {
    /// Starts a new session with a random state and verifier.
    pub fn new() -> Self {
        Self {
            state: random_token(),
            verifier: PkceVerifier::generate(),
        }
    }

    /// Persists the session so it survives the redirect.
    pub fn save(&self, store: &dyn MetadataStore) -> SyncResult<()> {
        store.set_many(&[
            (STATE_KEY, self.state.clone()),
            (VERIFIER_KEY, self.verifier.as_str().to_string()),
        ])?;
        Ok(())
    }

    /// Loads a persisted session, `None` if there is none or it is invalid.
    pub fn load(store: &dyn MetadataStore) -> SyncResult<Option<Self>> {
        let state = store.get(STATE_KEY)?;
        let verifier = store.get(VERIFIER_KEY)?.and_then(PkceVerifier::from_string);
        Ok(state
            .zip(verifier)
            .map(|(state, verifier)| Self { state, verifier }))
    }

    /// Removes the persisted session.
    pub fn clear(store: &dyn MetadataStore) -> SyncResult<()> {
        store.remove_many(&[STATE_KEY, VERIFIER_KEY])?;
        Ok(())
    }

    /// Builds the URL the user is sent to.
    pub fn authorization_url(&self, config: &OAuthConfig) -> SyncResult<String> {
        let challenge = self.verifier.challenge();
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("state", self.state.as_str()),
            ("code_challenge", challenge.as_str()),
            ("code_challenge_method", "S256"),
        ];
        if let Some(scope) = &config.scope {
            params.push(("scope", scope.as_str()));
        }
        let url = reqwest::Url::parse_with_params(&config.authorize_url, &params)
            .map_err(|e| SyncError::OAuth(format!("invalid authorize url: {e}")))?;
        Ok(url.into())
    }
}

impl Default for PkceSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    /// Bearer token for API calls.
    pub access_token: String,
    /// Token type, normally "bearer".
    #[serde(default)]
    pub token_type: String,
    /// Lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Refresh token, if issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Exchanges an authorization code for a token.
///
/// # Errors
///
/// Returns [`SyncError::OAuth`] if `returned_state` does not match the
/// session or the token endpoint rejects the request.
pub fn exchange_code<C: HttpClient + ?Sized>(
    client: &C,
    config: &OAuthConfig,
    session: &PkceSession,
    returned_state: &str,
    code: &str,
) -> SyncResult<OAuthToken> {
    if returned_state != session.state {
        return Err(SyncError::OAuth("state mismatch".into()));
    }

    let response = client
        .post_form(
            &config.token_url,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", config.redirect_uri.as_str()),
                ("client_id", config.client_id.as_str()),
                ("code_verifier", session.verifier.as_str()),
            ],
        )
        .map_err(crate::http::failure_to_error)?;

    if !response.is_success() {
        return Err(SyncError::OAuth(format!(
            "token endpoint returned {}: {}",
            response.status,
            String::from_utf8_lossy(&response.body)
        )));
    }
    serde_json::from_slice(&response.body)
        .map_err(|e| SyncError::OAuth(format!("invalid token response: {e}")))
}

/// The complete PKCE flow over a metadata store.
///
/// Also serves as the [`TokenProvider`] for transports once a token has been
/// obtained.
pub struct PkceFlow<C: HttpClient, M: MetadataStore> {
    config: OAuthConfig,
    client: C,
    store: M,
}

impl<C: HttpClient, M: MetadataStore> PkceFlow<C, M> {
    /// Creates a flow.
    pub fn new(config: OAuthConfig, client: C, store: M) -> Self {
        Self {
            config,
            client,
            store,
        }
    }

    /// Starts an authorization and returns the URL to open.
    pub fn begin(&self) -> SyncResult<String> {
        let session = PkceSession::new();
        session.save(&self.store)?;
        session.authorization_url(&self.config)
    }

    /// Completes the authorization after the redirect.
    ///
    /// The pending session is cleared whether or not the exchange succeeds.
    pub fn complete(&self, returned_state: &str, code: &str) -> SyncResult<OAuthToken> {
        let session = PkceSession::load(&self.store)?
            .ok_or_else(|| SyncError::OAuth("no authorization in progress".into()))?;
        PkceSession::clear(&self.store)?;

        let token = exchange_code(&self.client, &self.config, &session, returned_state, code)?;
        let encoded = serde_json::to_string(&token)
            .map_err(|e| SyncError::OAuth(format!("cannot store token: {e}")))?;
        self.store.set_many(&[(TOKEN_KEY, encoded)])?;
        tracing::info!("oauth authorization completed");
        Ok(token)
    }

    /// The stored token, if any.
    pub fn token(&self) -> SyncResult<Option<OAuthToken>> {
        let Some(raw) = self.store.get(TOKEN_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable stored token");
                Ok(None)
            }
        }
    }

    /// Forgets the stored token.
    pub fn sign_out(&self) -> SyncResult<()> {
        self.store.remove_many(&[TOKEN_KEY])?;
        Ok(())
    }
}

impl<C: HttpClient, M: MetadataStore> TokenProvider for PkceFlow<C, M> {
    fn access_token(&self) -> SyncResult<Option<String>> {
        Ok(self.token()?.map(|t| t.access_token))
    }
}

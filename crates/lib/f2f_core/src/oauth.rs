//! External login through Facebook and Instagram.
//!
//! The HTTP layer only sees [`ExternalAuthProvider`]; [`GraphOAuthProvider`]
//! is the production implementation speaking the authorization-code flow.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::auth::ExternalIdentity;
use crate::ttl::{TtlMap, spawn_sweeper};

/// TTL for pending login states (10 minutes).
const STATE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, thiserror::Error)]
pub enum ExternalAuthError {
    #[error("Unsupported provider: {0}")]
    UnknownProvider(String),

    /// The user declined, or the callback failed CSRF/state checks.
    #[error("Authentication failed: {0}")]
    Denied(String),

    /// The provider could not be reached or answered with garbage.
    #[error("Provider error: {0}")]
    Provider(String),
}

/// Query parameters delivered to the callback endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[async_trait]
pub trait ExternalAuthProvider: Send + Sync {
    /// Start a login and return the URL to redirect the browser to.
    async fn begin(&self, provider: &str) -> Result<String, ExternalAuthError>;

    /// Finish a login from the callback parameters.
    async fn complete(
        &self,
        provider: &str,
        params: CallbackParams,
    ) -> Result<ExternalIdentity, ExternalAuthError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocialProvider {
    Facebook,
    Instagram,
}

impl SocialProvider {
    pub fn parse(name: &str) -> Result<Self, ExternalAuthError> {
        match name {
            "facebook" => Ok(Self::Facebook),
            "instagram" => Ok(Self::Instagram),
            other => Err(ExternalAuthError::UnknownProvider(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
        }
    }

    fn authorize_url(self) -> &'static str {
        match self {
            Self::Facebook => "https://www.facebook.com/v18.0/dialog/oauth",
            Self::Instagram => "https://api.instagram.com/oauth/authorize",
        }
    }

    fn token_url(self) -> &'static str {
        match self {
            Self::Facebook => "https://graph.facebook.com/v18.0/oauth/access_token",
            Self::Instagram => "https://api.instagram.com/oauth/access_token",
        }
    }

    fn profile_url(self) -> &'static str {
        match self {
            Self::Facebook => "https://graph.facebook.com/me",
            Self::Instagram => "https://graph.instagram.com/me",
        }
    }

    fn scope(self) -> &'static str {
        match self {
            Self::Facebook => "email,public_profile",
            Self::Instagram => "user_profile",
        }
    }

    fn profile_fields(self) -> &'static str {
        match self {
            Self::Facebook => "id,name,email,picture.type(large)",
            Self::Instagram => "id,username",
        }
    }
}

impl fmt::Display for SocialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// App credentials registered with a provider.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Generate a cryptographic state parameter (CSRF token).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

// =============================================================================
// Pending login state
// =============================================================================

/// A login started by `begin` and not yet completed.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub provider: SocialProvider,
}

/// Pending login states keyed by the state parameter. Each state is
/// single-use and lives for [`STATE_TTL`].
pub struct OAuthStateStore {
    states: TtlMap<PendingLogin>,
}

impl OAuthStateStore {
    pub fn new() -> Self {
        Self {
            states: TtlMap::new(STATE_TTL),
        }
    }

    pub fn insert(&self, state_key: String, pending: PendingLogin) {
        self.states.insert(state_key, pending);
    }

    /// Take (remove and return) a pending state entry.
    /// Returns `None` if not found or expired.
    pub fn take(&self, state_key: &str) -> Option<PendingLogin> {
        self.states.take(state_key)
    }

    /// Evict expired entries.
    pub fn cleanup(&self) -> usize {
        self.states.cleanup()
    }

    /// Spawn a periodic cleanup task that stops when `shutdown` is cancelled.
    pub fn spawn_cleanup_task(
        self: &Arc<Self>,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        spawn_sweeper("oauth_states", shutdown, move || store.cleanup())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Graph API provider
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GraphProfile {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    picture: Option<GraphPicture>,
}

#[derive(Debug, Deserialize)]
struct GraphPicture {
    data: GraphPictureData,
}

#[derive(Debug, Deserialize)]
struct GraphPictureData {
    url: String,
}

impl GraphProfile {
    fn into_identity(self, provider: SocialProvider) -> ExternalIdentity {
        ExternalIdentity {
            provider: provider.as_str().to_string(),
            provider_user_id: self.id,
            name: self.name.or(self.username).unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            avatar_url: self.picture.map(|p| p.data.url).unwrap_or_default(),
        }
    }
}

/// Authorization-code flow against the Facebook and Instagram Graph APIs.
pub struct GraphOAuthProvider {
    http: reqwest::Client,
    base_url: String,
    clients: HashMap<SocialProvider, ClientCredentials>,
    states: Arc<OAuthStateStore>,
}

impl GraphOAuthProvider {
    /// `base_url` is the public origin of this service; callbacks are
    /// registered as `{base_url}/auth/{provider}/callback`.
    pub fn new(base_url: impl Into<String>, states: Arc<OAuthStateStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            clients: HashMap::new(),
            states,
        }
    }

    /// Enable a provider.
    pub fn with_client(mut self, provider: SocialProvider, credentials: ClientCredentials) -> Self {
        self.clients.insert(provider, credentials);
        self
    }

    pub fn enabled_providers(&self) -> Vec<SocialProvider> {
        let mut enabled: Vec<_> = self.clients.keys().copied().collect();
        enabled.sort_by_key(|p| p.as_str());
        enabled
    }

    pub fn callback_url(&self, provider: SocialProvider) -> String {
        format!("{}/auth/{provider}/callback", self.base_url)
    }

    fn client_for(
        &self,
        name: &str,
    ) -> Result<(SocialProvider, &ClientCredentials), ExternalAuthError> {
        let provider = SocialProvider::parse(name)?;
        let credentials = self
            .clients
            .get(&provider)
            .ok_or_else(|| ExternalAuthError::UnknownProvider(name.to_string()))?;
        Ok((provider, credentials))
    }

    async fn exchange_code(
        &self,
        provider: SocialProvider,
        credentials: &ClientCredentials,
        code: &str,
    ) -> Result<String, ExternalAuthError> {
        let redirect_uri = self.callback_url(provider);
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let resp = self
            .http
            .post(provider.token_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| ExternalAuthError::Provider(format!("Token exchange failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(%provider, %status, %body, "token exchange rejected");
            return Err(ExternalAuthError::Denied("token exchange rejected".into()));
        }

        let token = resp
            .json::<TokenResponse>()
            .await
            .map_err(|e| ExternalAuthError::Provider(format!("Token response parse error: {e}")))?;
        Ok(token.access_token)
    }

    async fn fetch_profile(
        &self,
        provider: SocialProvider,
        access_token: &str,
    ) -> Result<GraphProfile, ExternalAuthError> {
        let resp = self
            .http
            .get(provider.profile_url())
            .query(&[
                ("fields", provider.profile_fields()),
                ("access_token", access_token),
            ])
            .send()
            .await
            .map_err(|e| ExternalAuthError::Provider(format!("Profile request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(ExternalAuthError::Provider(format!(
                "Profile request HTTP {status}"
            )));
        }

        resp.json::<GraphProfile>()
            .await
            .map_err(|e| ExternalAuthError::Provider(format!("Profile parse error: {e}")))
    }
}

#[async_trait]
impl ExternalAuthProvider for GraphOAuthProvider {
    async fn begin(&self, provider: &str) -> Result<String, ExternalAuthError> {
        let (provider, credentials) = self.client_for(provider)?;

        let state = generate_state();
        let redirect_uri = self.callback_url(provider);
        let url = url::Url::parse_with_params(
            provider.authorize_url(),
            &[
                ("client_id", credentials.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", provider.scope()),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| ExternalAuthError::Provider(format!("authorize url: {e}")))?;

        self.states.insert(state, PendingLogin { provider });
        debug!(%provider, "started external login");
        Ok(url.into())
    }

    async fn complete(
        &self,
        provider: &str,
        params: CallbackParams,
    ) -> Result<ExternalIdentity, ExternalAuthError> {
        let (provider, credentials) = self.client_for(provider)?;

        if let Some(error) = params.error {
            let reason = params.error_description.unwrap_or(error);
            return Err(ExternalAuthError::Denied(reason));
        }

        let state = params
            .state
            .ok_or_else(|| ExternalAuthError::Denied("missing state".into()))?;
        match self.states.take(&state) {
            Some(pending) if pending.provider == provider => {}
            _ => return Err(ExternalAuthError::Denied("invalid or expired state".into())),
        }

        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ExternalAuthError::Denied("missing authorization code".into()))?;

        let access_token = self.exchange_code(provider, credentials, &code).await?;
        let profile = self.fetch_profile(provider, &access_token).await?;
        Ok(profile.into_identity(provider))
    }
}

// =============================================================================
// Tests
// =============================================================================

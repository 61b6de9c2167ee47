//! Interactive authentication for Microsoft Graph
//!
//! Implements the authorization-code flow for a native application that
//! receives its redirect on a private URI scheme (`driveport://auth`).
//!
//! ## Flow
//!
//! 1. Build the authorization URL (client id, scopes, redirect URI and a
//!    random `state`)
//! 2. Register the host's [`IPresentationContext`] and ask it to show the URL
//! 3. Validate the callback URL it returns and extract the `code`
//! 4. Redeem the code at the token endpoint through the [`TokenRefresher`]
//!
//! The flow is only ever ended by the presentation context. There is no
//! timeout: a login whose page is never completed stays in
//! [`AuthState::AwaitingCallback`] until the caller drops the future.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use driveport_core::{
    config::AuthConfig,
    domain::{DriveError, DriveResult, OAuthToken},
    ports::{AuthorizationRequest, IPresentationContext, PresentationOutcome},
};
use oauth2::{
    basic::BasicClient, AuthUrl, ClientId, CsrfToken, EndpointNotSet, EndpointSet, RedirectUrl,
    Scope,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    refresh::TokenRefresher,
    session::{SessionGuard, SessionRegistry},
};

type AuthorizeClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet>;

// ============================================================================
// AuthState
// ============================================================================

/// Where the most recent login stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No login has been started
    #[default]
    Idle,
    /// The authorization page is shown and no callback arrived yet
    AwaitingCallback,
    /// A token was issued
    Authenticated,
    /// The user dismissed the page
    CancelledByUser,
    /// The login ended with any other error
    Failed,
}

impl AuthState {
    /// Terminal state reached by a finished login
    fn settled(result: &DriveResult<OAuthToken>) -> Self {
        match result {
            Ok(_) => AuthState::Authenticated,
            Err(DriveError::CancelledByUser) => AuthState::CancelledByUser,
            Err(_) => AuthState::Failed,
        }
    }

    /// Returns true once the login can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuthState::Authenticated | AuthState::CancelledByUser | AuthState::Failed
        )
    }
}

// ============================================================================
// Callback parsing
// ============================================================================

/// Extracts the authorization code from a redirect URL
///
/// The provider's `error_description` (or bare `error`) wins over everything
/// else and is surfaced as [`DriveError::ServerSide`] with percent-escapes
/// and `+` decoded. A URL that does not parse, a `state` other than
/// `expected_state`, or a missing `code` is
/// [`DriveError::MisformattedResponse`].
pub fn parse_callback(callback: &str, expected_state: &str) -> DriveResult<String> {
    let url = Url::parse(callback)
        .map_err(|e| DriveError::misformatted(format!("invalid callback URL: {e}")))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(message) = error_description
        .filter(|s| !s.is_empty())
        .or(error.filter(|s| !s.is_empty()))
    {
        return Err(DriveError::ServerSide(message));
    }

    if state.as_deref() != Some(expected_state) {
        return Err(DriveError::misformatted("callback state does not match"));
    }

    code.filter(|c| !c.is_empty())
        .ok_or_else(|| DriveError::misformatted("callback carries no authorization code"))
}

// ============================================================================
// GraphAuthenticator
// ============================================================================

/// Runs the interactive login through a host-provided presentation context
pub struct GraphAuthenticator {
    client: AuthorizeClient,
    scopes: Vec<String>,
    callback_scheme: String,
    refresher: TokenRefresher,
    sessions: Arc<SessionRegistry>,
    state: Mutex<AuthState>,
}

impl GraphAuthenticator {
    /// Creates an authenticator for the given auth settings
    pub fn new(auth: &AuthConfig, refresher: TokenRefresher) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(auth.effective_client_id().to_string()))
            .set_auth_uri(
                AuthUrl::new(auth.authorize_url.clone()).context("Invalid authorization URL")?,
            )
            .set_redirect_uri(
                RedirectUrl::new(auth.redirect_uri.clone()).context("Invalid redirect URI")?,
            );
        let callback_scheme = auth
            .callback_scheme()
            .context("Redirect URI has no scheme")?;

        Ok(Self {
            client,
            scopes: auth.scopes.clone(),
            callback_scheme,
            refresher,
            sessions: Arc::new(SessionRegistry::new()),
            state: Mutex::new(AuthState::Idle),
        })
    }

    /// State of the most recent login
    pub fn state(&self) -> AuthState {
        self.state.lock().map(|s| *s).unwrap_or(AuthState::Failed)
    }

    /// Sessions currently awaiting a callback
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Builds the authorization URL and the `state` value it carries
    pub fn authorization_url(&self) -> (Url, CsrfToken) {
        self.client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .url()
    }

    /// Shows the login page through `context` and returns the issued token
    ///
    /// Only a weak reference to `context` is kept while the page is shown;
    /// the caller stays its owner.
    ///
    /// # Errors
    /// - [`DriveError::CancelledByUser`] when the user dismissed the page
    /// - [`DriveError::General`] when the context failed or was released
    /// - [`DriveError::ServerSide`] when the provider reported an error in
    ///   the callback or at the token endpoint
    /// - [`DriveError::MisformattedResponse`] for an unusable callback
    pub async fn authenticate(
        &self,
        context: &Arc<dyn IPresentationContext>,
        ephemeral: bool,
    ) -> DriveResult<OAuthToken> {
        let session = self.sessions.register(context);

        self.set_state(AuthState::AwaitingCallback);
        let result = self.run_session(&session, ephemeral).await;
        let settled = AuthState::settled(&result);
        self.set_state(settled);

        match &result {
            Ok(_) => info!(session_id = %session.id(), "Authentication completed"),
            Err(DriveError::CancelledByUser) => {
                info!(session_id = %session.id(), "Authentication cancelled by user")
            }
            Err(e) => warn!(session_id = %session.id(), error = %e, "Authentication failed"),
        }
        result
    }

    async fn run_session(&self, session: &SessionGuard, ephemeral: bool) -> DriveResult<OAuthToken> {
        let (url, csrf) = self.authorization_url();
        let request = AuthorizationRequest {
            session_id: session.id(),
            url,
            callback_scheme: self.callback_scheme.clone(),
            ephemeral,
        };

        debug!(session_id = %session.id(), ephemeral, "Presenting authorization page");
        let context = session.context()?;
        let outcome = context.present(request).await;
        drop(context);

        let callback = match outcome {
            PresentationOutcome::Callback(callback) => callback,
            PresentationOutcome::Cancelled => return Err(DriveError::CancelledByUser),
            PresentationOutcome::Failed(reason) => return Err(DriveError::general(reason)),
        };

        let code = parse_callback(&callback, csrf.secret())?;
        debug!(session_id = %session.id(), "Received authorization code");
        self.refresher.redeem_code(&code).await
    }

    fn set_state(&self, state: AuthState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }
}

impl std::fmt::Debug for GraphAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphAuthenticator")
            .field("scopes", &self.scopes)
            .field("callback_scheme", &self.callback_scheme)
            .field("state", &self.state())
            .finish()
    }
}

//! Token refresh
//!
//! Decides per call whether the caller's token can be used as-is and, when
//! it cannot, exchanges the refresh token for a new one at the token
//! endpoint. The same endpoint also redeems the authorization code at the end
//! of the interactive login.
//!
//! Freshness is judged only from the token's issue time and declared
//! lifespan; the server is never asked whether a token is still valid.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use driveport_core::{
    config::AuthConfig,
    domain::{
        lifespan_from_secs, DriveError, DriveResult, OAuthToken, DEFAULT_REFRESH_FRACTION,
        MAX_TOKEN_LIFESPAN_SECS,
    },
    ports::IClock,
};
use oauth2::{
    basic::{BasicClient, BasicErrorResponse, BasicTokenResponse},
    AsyncHttpClient, AuthorizationCode, ClientId, EndpointNotSet, EndpointSet, HttpClientError,
    HttpRequest, HttpResponse, RedirectUrl, RefreshToken, RequestTokenError, Scope, TokenResponse,
    TokenUrl,
};
use tracing::{debug, info};

use crate::pool::WorkerPool;

type TokenClient =
    BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

type ExchangeError = RequestTokenError<HttpClientError<reqwest::Error>, BasicErrorResponse>;

/// Grant presented to the token endpoint
#[derive(Debug, Clone)]
enum Grant {
    AuthorizationCode(String),
    RefreshToken(String),
}

impl Grant {
    fn name(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode(_) => "authorization_code",
            Grant::RefreshToken(_) => "refresh_token",
        }
    }

    /// Refresh token to keep when the response does not rotate it
    fn previous_refresh(&self) -> &str {
        match self {
            Grant::AuthorizationCode(_) => "",
            Grant::RefreshToken(refresh_token) => refresh_token,
        }
    }
}

/// Result of a freshness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// The caller's token is still usable and was returned unchanged
    Current(OAuthToken),
    /// The caller's token was stale; this replacement must be used and
    /// persisted
    Refreshed(OAuthToken),
}

impl Freshness {
    /// Returns true when a new token was issued
    pub fn is_refreshed(&self) -> bool {
        matches!(self, Freshness::Refreshed(_))
    }

    /// The token to use for the dependent call
    pub fn token(&self) -> &OAuthToken {
        match self {
            Freshness::Current(token) | Freshness::Refreshed(token) => token,
        }
    }

    /// Consumes the check, returning the token to use
    pub fn into_token(self) -> OAuthToken {
        match self {
            Freshness::Current(token) | Freshness::Refreshed(token) => token,
        }
    }
}

/// Exchanges authorization codes and refresh tokens at the token endpoint
#[derive(Clone)]
pub struct TokenRefresher {
    client: TokenClient,
    http: reqwest::Client,
    pool: WorkerPool,
    clock: Arc<dyn IClock>,
    redirect_uri: String,
    scopes: Vec<String>,
    refresh_fraction: f64,
}

impl TokenRefresher {
    /// Creates a refresher for the given auth settings
    ///
    /// # Errors
    /// Fails with [`DriveError::General`] if the token URL or the redirect
    /// URI is invalid.
    pub fn new(
        auth: &AuthConfig,
        http: reqwest::Client,
        pool: WorkerPool,
        clock: Arc<dyn IClock>,
    ) -> DriveResult<Self> {
        let client = BasicClient::new(ClientId::new(auth.effective_client_id().to_string()))
            .set_token_uri(TokenUrl::new(auth.token_url.clone()).map_err(DriveError::general)?)
            .set_redirect_uri(
                RedirectUrl::new(auth.redirect_uri.clone()).map_err(DriveError::general)?,
            );
        Ok(Self {
            client,
            http,
            pool,
            clock,
            redirect_uri: auth.redirect_uri.clone(),
            scopes: auth.scopes.clone(),
            refresh_fraction: DEFAULT_REFRESH_FRACTION,
        })
    }

    /// Overrides the fraction of the lifespan after which tokens are
    /// refreshed
    pub fn with_refresh_fraction(mut self, fraction: f64) -> Self {
        self.refresh_fraction = fraction;
        self
    }

    /// The configured refresh fraction
    pub fn refresh_fraction(&self) -> f64 {
        self.refresh_fraction
    }

    /// Client id sent with every exchange
    pub fn client_id(&self) -> &str {
        self.client.client_id().as_str()
    }

    /// Returns `token` unchanged while it is fresh, otherwise a refreshed one
    ///
    /// # Errors
    /// - [`DriveError::CannotRefreshToken`] if the token is stale and carries
    ///   no refresh token (no network call is made)
    /// - any exchange failure, see [`TokenRefresher::refresh`]
    pub async fn ensure_fresh(&self, token: &OAuthToken) -> DriveResult<Freshness> {
        let now = self.clock.now();
        if token.is_fresh_with(now, self.refresh_fraction) {
            return Ok(Freshness::Current(token.clone()));
        }

        if !token.can_refresh() {
            debug!(acquired = %token.acquired(), "Token is stale and has no refresh token");
            return Err(DriveError::CannotRefreshToken);
        }

        debug!(
            acquired = %token.acquired(),
            lifespan_secs = token.lifespan().num_seconds(),
            "Token past refresh threshold"
        );
        self.refresh(token.refresh_token())
            .await
            .map(Freshness::Refreshed)
    }

    /// Exchanges a refresh token for a new token
    ///
    /// If the response carries no refresh token, `refresh_token` is kept.
    pub async fn refresh(&self, refresh_token: &str) -> DriveResult<OAuthToken> {
        if refresh_token.is_empty() {
            return Err(DriveError::CannotRefreshToken);
        }
        info!("Refreshing access token");
        let token = self
            .exchange(Grant::RefreshToken(refresh_token.to_string()))
            .await?;
        info!(acquired = %token.acquired(), "Access token refreshed");
        Ok(token)
    }

    /// Redeems the authorization code returned by the interactive login
    pub async fn redeem_code(&self, code: &str) -> DriveResult<OAuthToken> {
        info!("Exchanging authorization code for tokens");
        self.exchange(Grant::AuthorizationCode(code.to_string())).await
    }

    /// Presents `grant` at the token endpoint on the worker pool
    async fn exchange(&self, grant: Grant) -> DriveResult<OAuthToken> {
        let client = self.client.clone();
        let http = self.http.clone();
        let redirect_uri = self.redirect_uri.clone();
        let scopes = self.scopes.clone();
        let request_grant = grant.clone();
        let empty_body = Arc::new(AtomicBool::new(false));
        let seen_empty = empty_body.clone();

        let result = self
            .pool
            .run(async move {
                let send = move |request: HttpRequest| {
                    let http = http.clone();
                    let seen_empty = seen_empty.clone();
                    async move {
                        let response: HttpResponse = http.call(request).await?;
                        seen_empty.store(response.body().is_empty(), Ordering::Relaxed);
                        Ok::<_, HttpClientError<reqwest::Error>>(response)
                    }
                };

                match request_grant {
                    Grant::AuthorizationCode(code) => {
                        client
                            .exchange_code(AuthorizationCode::new(code))
                            .add_extra_param("scope", scopes.join(" "))
                            .request_async(&send)
                            .await
                    }
                    Grant::RefreshToken(refresh_token) => {
                        let refresh_token = RefreshToken::new(refresh_token);
                        client
                            .exchange_refresh_token(&refresh_token)
                            .add_scopes(scopes.into_iter().map(Scope::new))
                            .add_extra_param("redirect_uri", redirect_uri)
                            .request_async(&send)
                            .await
                    }
                }
            })
            .await?;

        let body = result.map_err(|e| classify(e, empty_body.load(Ordering::Relaxed)))?;
        self.issued_token(&grant, &body)
    }

    /// Builds the token from a successful response
    fn issued_token(&self, grant: &Grant, body: &BasicTokenResponse) -> DriveResult<OAuthToken> {
        let access_token = body.access_token().secret();
        if access_token.is_empty() {
            return Err(DriveError::misformatted("access_token is empty"));
        }

        let expires_in = body
            .expires_in()
            .ok_or_else(|| DriveError::misformatted("expires_in is missing"))?;
        let lifespan = i64::try_from(expires_in.as_secs())
            .ok()
            .and_then(lifespan_from_secs)
            .ok_or_else(|| {
                DriveError::misformatted(format!(
                    "expires_in {}s outside 1..={MAX_TOKEN_LIFESPAN_SECS}s",
                    expires_in.as_secs()
                ))
            })?;

        let previous_refresh = grant.previous_refresh();
        let refresh_token = body
            .refresh_token()
            .map(|t| t.secret().as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or(previous_refresh)
            .to_string();

        debug!(
            grant = grant.name(),
            expires_in = lifespan.num_seconds(),
            rotated = refresh_token != previous_refresh,
            "Token endpoint exchange succeeded"
        );

        Ok(OAuthToken::new(
            access_token.clone(),
            refresh_token,
            self.clock.now(),
            lifespan,
        ))
    }
}

/// Maps a failed exchange onto the error taxonomy
///
/// `empty_body` reports whether the endpoint answered with no body at all.
fn classify(error: ExchangeError, empty_body: bool) -> DriveError {
    match error {
        RequestTokenError::ServerResponse(response) => DriveError::ServerSide(
            response
                .error_description()
                .cloned()
                .unwrap_or_else(|| response.error().to_string()),
        ),
        RequestTokenError::Request(e) => DriveError::general(e),
        _ if empty_body => DriveError::EmptyResponse,
        RequestTokenError::Parse(e, _) => DriveError::misformatted(e.to_string()),
        RequestTokenError::Other(message) => DriveError::misformatted(message),
    }
}

impl std::fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefresher")
            .field("token_url", &self.client.token_uri().as_str())
            .field("client_id", &self.client_id())
            .field("refresh_fraction", &self.refresh_fraction)
            .finish()
    }
}

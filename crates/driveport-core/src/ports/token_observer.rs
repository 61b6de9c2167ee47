//! Token update port (driven/secondary port)
//!
//! The core never persists tokens. Whenever a call replaces the caller's
//! token, the replacement is handed to an [`ITokenObserver`] before the
//! dependent request is sent, so the host can store it and stop handing out
//! the old one.

use crate::domain::OAuthToken;

/// Receives every token issued by a login or a silent refresh
pub trait ITokenObserver: Send + Sync {
    /// Called with the new token before it is used
    fn token_updated(&self, token: &OAuthToken);
}

impl<F> ITokenObserver for F
where
    F: Fn(&OAuthToken) + Send + Sync,
{
    fn token_updated(&self, token: &OAuthToken) {
        self(token)
    }
}

/// Observer that drops every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTokenObserver;

impl ITokenObserver for NoopTokenObserver {
    fn token_updated(&self, _token: &OAuthToken) {}
}

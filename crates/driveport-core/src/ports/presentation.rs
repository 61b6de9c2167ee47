//! Presentation context port (driven/secondary port)
//!
//! The login page is shown by the host application: a system browser, an
//! embedded web view, or an OS authentication session. The core only hands
//! it an [`AuthorizationRequest`] and waits for a [`PresentationOutcome`].
//!
//! ## Design Notes
//!
//! - `present` may never complete if the user abandons the page. The core
//!   imposes no timeout; implementations report [`PresentationOutcome::Cancelled`]
//!   when the user dismisses the surface.
//! - The core keeps only a weak reference to the context while a session is
//!   in flight. The host owns it.

use url::Url;

use crate::domain::SessionId;

/// What the presentation surface must open
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Session this request belongs to
    pub session_id: SessionId,
    /// Fully-built authorization URL
    pub url: Url,
    /// URI scheme of the redirect the surface must intercept
    pub callback_scheme: String,
    /// Prefer a private/ephemeral browsing session
    pub ephemeral: bool,
}

/// How the presentation surface finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationOutcome {
    /// The provider redirected to the callback URL. The raw string is
    /// validated by the core.
    Callback(String),
    /// The user dismissed the surface
    Cancelled,
    /// The surface could not be shown or lost its connection
    Failed(String),
}

/// Port trait for the surface that hosts the interactive login
#[async_trait::async_trait]
pub trait IPresentationContext: Send + Sync {
    /// Shows the authorization page and resolves once the flow leaves it
    async fn present(&self, request: AuthorizationRequest) -> PresentationOutcome;
}

//! System browser presentation context
//!
//! Opens the authorization page in the user's default browser. The browser
//! hands the `driveport://` redirect to the OS, which hands it to the host
//! application; the host then passes it on with
//! [`SystemBrowser::deliver_callback`]. Closing the login window cannot be
//! observed from here, so the host reports it with [`SystemBrowser::cancel`].

use std::sync::Mutex;

use async_trait::async_trait;
use driveport_core::ports::{AuthorizationRequest, IPresentationContext, PresentationOutcome};
use tokio::sync::oneshot;
use tracing::{debug, warn};

type Opener = Box<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// Presentation context backed by the default web browser
pub struct SystemBrowser {
    pending: Mutex<Option<oneshot::Sender<PresentationOutcome>>>,
    opener: Opener,
}

impl Default for SystemBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBrowser {
    /// Creates a context that opens URLs with `webbrowser`
    pub fn new() -> Self {
        Self::with_opener(webbrowser::open)
    }

    /// Creates a context that opens URLs with `opener`
    pub fn with_opener<F>(opener: F) -> Self
    where
        F: Fn(&str) -> std::io::Result<()> + Send + Sync + 'static,
    {
        Self {
            pending: Mutex::new(None),
            opener: Box::new(opener),
        }
    }

    /// Hands the redirect URL received by the host to the waiting login
    ///
    /// Returns false when no login is waiting.
    pub fn deliver_callback(&self, callback: impl Into<String>) -> bool {
        self.finish(PresentationOutcome::Callback(callback.into()))
    }

    /// Reports that the user abandoned the login page
    ///
    /// Returns false when no login is waiting.
    pub fn cancel(&self) -> bool {
        self.finish(PresentationOutcome::Cancelled)
    }

    /// Returns true while a login is waiting for its callback
    pub fn is_waiting(&self) -> bool {
        self.pending
            .lock()
            .map(|p| p.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }

    fn finish(&self, outcome: PresentationOutcome) -> bool {
        let sender = match self.pending.lock() {
            Ok(mut pending) => pending.take(),
            Err(_) => None,
        };
        match sender {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl IPresentationContext for SystemBrowser {
    async fn present(&self, request: AuthorizationRequest) -> PresentationOutcome {
        let (tx, rx) = oneshot::channel();
        match self.pending.lock() {
            // A newer login replaces an abandoned one; its receiver sees the
            // dropped sender
            Ok(mut pending) => *pending = Some(tx),
            Err(_) => return PresentationOutcome::Failed("browser state poisoned".to_string()),
        }

        if request.ephemeral {
            debug!("Private browsing is not available for the system browser");
        }

        if let Err(e) = (self.opener)(request.url.as_str()) {
            warn!(error = %e, "Failed to open the system browser");
            if let Ok(mut pending) = self.pending.lock() {
                pending.take();
            }
            return PresentationOutcome::Failed(format!("could not open browser: {e}"));
        }
        debug!(session_id = %request.session_id, "Opened authorization page in browser");

        rx.await.unwrap_or_else(|_| {
            PresentationOutcome::Failed("login superseded by another session".to_string())
        })
    }
}

impl std::fmt::Debug for SystemBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemBrowser")
            .field("waiting", &self.is_waiting())
            .finish()
    }
}

//! Driveport Graph - Microsoft Graph drive client
//!
//! Provides the async adapter between a host application and the
//! signed-in user's OneDrive:
//! - Interactive login through a host-provided presentation context
//! - Silent token refresh before every call
//! - Folder listings, item metadata, downloads and drive information
//! - Single-range uploads through upload sessions
//!
//! ## Modules
//!
//! - [`auth`] - Authorization-code login and callback validation
//! - [`browser`] - Presentation context backed by the system browser
//! - [`client`] - The drive client and its request pipeline
//! - [`pool`] - Bounded worker pool every HTTP exchange runs on
//! - [`refresh`] - Token freshness checks and token endpoint exchanges
//! - [`response`] - Response classification into [`DriveError`]
//! - [`session`] - Weak registry of logins in progress
//! - [`upload`] - Upload sessions and the upload size ceiling
//!
//! [`DriveError`]: driveport_core::domain::DriveError

pub mod auth;
pub mod browser;
pub mod client;
pub mod pool;
pub mod refresh;
pub mod response;
pub mod session;
pub mod upload;

pub use auth::{AuthState, GraphAuthenticator};
pub use browser::SystemBrowser;
pub use client::{GraphDriveClient, GraphDriveClientBuilder};
pub use pool::{WorkerPool, DEFAULT_MAX_CONCURRENT};
pub use refresh::{Freshness, TokenRefresher};
pub use session::{SessionGuard, SessionRegistry};
pub use upload::MAX_UPLOAD_SIZE;

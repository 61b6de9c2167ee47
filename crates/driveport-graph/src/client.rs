//! Drive client for Microsoft Graph
//!
//! [`GraphDriveClient`] is the entry point of the adapter. Every operation
//! takes the caller's current [`OAuthToken`] and follows the same pipeline:
//!
//! 1. Ask the [`TokenRefresher`] whether the token is still fresh. A
//!    replacement is reported to the [`ITokenObserver`] before anything else
//!    happens, and is used for the rest of the call.
//! 2. Send exactly one request (one per page for listings) through the
//!    [`WorkerPool`] with `Authorization: Bearer <token>`.
//! 3. Classify the response with [`crate::response`].
//!
//! Results are never cached and failed requests are never retried.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use driveport_core::{config::Config, domain::{OAuthToken, RemotePath}};
//! use driveport_graph::{browser::SystemBrowser, client::GraphDriveClient};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = GraphDriveClient::builder(Config::default())
//!     .observer(|token: &OAuthToken| println!("store token acquired at {}", token.acquired()))
//!     .build()?;
//!
//! let browser: Arc<dyn driveport_core::ports::IPresentationContext> =
//!     Arc::new(SystemBrowser::new());
//! let token = client.authenticate(&browser, false).await?;
//! for item in client.list_folder(&token, &RemotePath::root()).await? {
//!     println!("{}", item.item_path);
//! }
//! # Ok(())
//! # }
//! ```

use std::{collections::HashSet, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use driveport_core::{
    config::Config,
    domain::{
        DriveError, DriveInfo, DriveResult, DriveType, FileInfo, OAuthToken, RemoteFileItem,
        RemotePath,
    },
    ports::{IClock, IPresentationContext, ITokenObserver, NoopTokenObserver, SystemClock},
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, info};
use url::Url;

use crate::{
    auth::GraphAuthenticator,
    pool::WorkerPool,
    refresh::{Freshness, TokenRefresher},
    response::{self, RawResponse},
};

/// Characters left as-is in a path segment (RFC 3986 unreserved)
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

// ============================================================================
// Graph API response types
// ============================================================================

/// A driveItem as returned by listings and metadata lookups
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDriveItem {
    id: Option<String>,
    name: Option<String>,
    size: Option<u64>,
    created_date_time: Option<String>,
    last_modified_date_time: Option<String>,
    /// Only present on folders
    folder: Option<Value>,
}

/// One page of a children listing
#[derive(Debug, Deserialize)]
struct ChildrenPage {
    /// Items are decoded one by one so a bad entry only drops itself
    value: Vec<Value>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

/// Response from the drive root
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDrive {
    id: String,
    name: Option<String>,
    drive_type: Option<String>,
    owner: Option<IdentitySet>,
}

#[derive(Debug, Deserialize)]
struct IdentitySet {
    user: Option<Identity>,
}

#[derive(Debug, Deserialize)]
struct Identity {
    email: Option<String>,
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl GraphDriveItem {
    /// Converts to a [`RemoteFileItem`] located at `path`
    ///
    /// Returns `None` when `id` or `name` is missing or empty.
    fn into_remote_item(self, path: RemotePath) -> Option<RemoteFileItem> {
        let item_id = self.id.filter(|s| !s.is_empty())?;
        let name = self.name.filter(|s| !s.is_empty())?;
        let file_info = FileInfo::new(
            name,
            self.size,
            parse_timestamp(self.created_date_time.as_deref()),
            parse_timestamp(self.last_modified_date_time.as_deref()),
        );

        Some(RemoteFileItem {
            item_id,
            item_path: path,
            is_folder: self.folder.is_some(),
            file_info,
        })
    }

    /// Decodes a listing entry located in `folder`
    fn listing_entry(value: Value, folder: &RemotePath) -> Option<RemoteFileItem> {
        let item: GraphDriveItem = match serde_json::from_value(value) {
            Ok(item) => item,
            Err(e) => {
                debug!(error = %e, "Dropping undecodable listing entry");
                return None;
            }
        };
        let name = item.name.as_deref().filter(|s| !s.is_empty())?;
        let path = match folder.join(name) {
            Ok(path) => path,
            Err(e) => {
                debug!(error = %e, "Dropping listing entry with unusable name");
                return None;
            }
        };
        item.into_remote_item(path)
    }
}

impl From<GraphDrive> for DriveInfo {
    fn from(drive: GraphDrive) -> Self {
        DriveInfo {
            id: drive.id,
            name: drive.name.unwrap_or_default(),
            drive_type: drive
                .drive_type
                .as_deref()
                .map(DriveType::from_provider)
                .unwrap_or_default(),
            owner_email: drive.owner.and_then(|o| o.user).and_then(|u| u.email),
        }
    }
}

// ============================================================================
// GraphDriveClient
// ============================================================================

/// Client for the signed-in user's drive
pub struct GraphDriveClient {
    http: Client,
    pool: WorkerPool,
    refresher: TokenRefresher,
    authenticator: GraphAuthenticator,
    observer: Arc<dyn ITokenObserver>,
    /// Drive API root without a trailing slash
    base_url: String,
}

impl GraphDriveClient {
    /// Starts building a client from `config`
    pub fn builder(config: Config) -> GraphDriveClientBuilder {
        GraphDriveClientBuilder::new(config)
    }

    /// Creates a client from `config` with the system clock and no token
    /// observer
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Drive API root
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The worker pool requests run on
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// The interactive login
    pub fn authenticator(&self) -> &GraphAuthenticator {
        &self.authenticator
    }

    /// Runs the interactive login and reports the new token to the observer
    ///
    /// See [`GraphAuthenticator::authenticate`].
    pub async fn authenticate(
        &self,
        context: &Arc<dyn IPresentationContext>,
        ephemeral: bool,
    ) -> DriveResult<OAuthToken> {
        let token = self.authenticator.authenticate(context, ephemeral).await?;
        self.observer.token_updated(&token);
        Ok(token)
    }

    /// Returns a token that is fresh enough for the next call
    ///
    /// When `token` had to be replaced the observer is notified before this
    /// returns.
    pub async fn fresh_token(&self, token: &OAuthToken) -> DriveResult<OAuthToken> {
        match self.refresher.ensure_fresh(token).await? {
            Freshness::Current(token) => Ok(token),
            Freshness::Refreshed(token) => {
                self.observer.token_updated(&token);
                Ok(token)
            }
        }
    }

    /// Lists the children of the folder at `path`
    ///
    /// Follows `@odata.nextLink` until the listing is complete. Entries
    /// without an id or name are skipped.
    pub async fn list_folder(
        &self,
        token: &OAuthToken,
        path: &RemotePath,
    ) -> DriveResult<Vec<RemoteFileItem>> {
        let token = self.fresh_token(token).await?;

        let mut items = Vec::new();
        let mut url = self.item_url(path, Some("children"));
        let mut visited = HashSet::new();
        let mut pages = 0usize;
        loop {
            visited.insert(url.clone());
            let raw = self
                .pool
                .execute(self.authorized(Method::GET, &url, &token))
                .await?;
            let page: ChildrenPage = response::parse_typed(raw)?;
            pages += 1;

            let total = page.value.len();
            let before = items.len();
            items.extend(
                page.value
                    .into_iter()
                    .filter_map(|value| GraphDriveItem::listing_entry(value, path)),
            );
            let dropped = total - (items.len() - before);
            if dropped > 0 {
                debug!(path = %path, dropped, "Skipped listing entries without id or name");
            }

            match page.next_link {
                Some(next) if !next.is_empty() => url = self.next_page_url(next, &visited)?,
                _ => break,
            }
        }

        debug!(path = %path, count = items.len(), pages, "Listed folder");
        Ok(items)
    }

    /// Checks a `@odata.nextLink` before it is followed
    ///
    /// The link must share the drive API's origin, so the bearer token never
    /// leaves it, and must not name a page already fetched.
    fn next_page_url(&self, next: String, visited: &HashSet<String>) -> DriveResult<String> {
        if visited.contains(&next) {
            return Err(DriveError::misformatted(format!(
                "nextLink repeats a fetched page: {next}"
            )));
        }
        let base = Url::parse(&self.base_url).map_err(DriveError::general)?;
        let link = Url::parse(&next)
            .map_err(|e| DriveError::misformatted(format!("nextLink is not a URL: {e}")))?;
        if link.origin() != base.origin() {
            return Err(DriveError::misformatted(format!(
                "nextLink leaves the drive API: {}",
                link.origin().ascii_serialization()
            )));
        }
        Ok(next)
    }

    /// Fetches the item at `path`
    ///
    /// # Errors
    /// [`DriveError::MisformattedResponse`] when the item has no id or name.
    pub async fn get_item_metadata(
        &self,
        token: &OAuthToken,
        path: &RemotePath,
    ) -> DriveResult<RemoteFileItem> {
        let token = self.fresh_token(token).await?;

        let url = self.item_url(path, None);
        let raw = self
            .pool
            .execute(self.authorized(Method::GET, &url, &token))
            .await?;
        let item: GraphDriveItem = response::parse_typed(raw)?;

        item.into_remote_item(path.clone())
            .ok_or_else(|| DriveError::misformatted("item has no id or name"))
    }

    /// Downloads the content of the file at `path`
    ///
    /// An empty body is an empty file. A JSON body carrying an `error`
    /// object is reported as [`DriveError::ServerSide`].
    pub async fn download_file(&self, token: &OAuthToken, path: &RemotePath) -> DriveResult<Vec<u8>> {
        let token = self.fresh_token(token).await?;

        let url = self.item_url(path, Some("content"));
        let raw = self
            .pool
            .execute(self.authorized(Method::GET, &url, &token))
            .await?
            .map_err(DriveError::general)?;

        if !raw.status.is_success() {
            return Err(status_failure(raw));
        }
        if let Some(err) = response::embedded_error(&raw) {
            return Err(err);
        }

        debug!(path = %path, bytes = raw.body.len(), "Downloaded file");
        Ok(raw.body)
    }

    /// Fetches information about the drive itself
    pub async fn get_drive_info(&self, token: &OAuthToken) -> DriveResult<DriveInfo> {
        let token = self.fresh_token(token).await?;

        let raw = self
            .pool
            .execute(self.authorized(Method::GET, &self.base_url, &token))
            .await?;
        let drive: GraphDrive = response::parse_typed(raw)?;
        if drive.id.is_empty() {
            return Err(DriveError::misformatted("drive has no id"));
        }

        let info = DriveInfo::from(drive);
        info!(drive_id = %info.id, drive_type = %info.drive_type, "Fetched drive info");
        Ok(info)
    }

    /// Builds a request carrying the bearer token
    pub(crate) fn authorized(&self, method: Method, url: &str, token: &OAuthToken) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(token.access_token())
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Address of the item at `path`, optionally followed by an action
    /// segment such as `children` or `content`
    ///
    /// - `/` → `{base}/root` or `{base}/root/{action}`
    /// - `/a b/c` → `{base}/root:/a%20b/c` or `{base}/root:/a%20b/c:/{action}`
    pub(crate) fn item_url(&self, path: &RemotePath, action: Option<&str>) -> String {
        if path.is_root() {
            return match action {
                Some(action) => format!("{}/root/{action}", self.base_url),
                None => format!("{}/root", self.base_url),
            };
        }

        let encoded = encode_path(path);
        match action {
            Some(action) => format!("{}/root:{encoded}:/{action}", self.base_url),
            None => format!("{}/root:{encoded}", self.base_url),
        }
    }
}

impl std::fmt::Debug for GraphDriveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphDriveClient")
            .field("base_url", &self.base_url)
            .field("max_concurrent", &self.pool.max_concurrent())
            .finish()
    }
}

/// Percent-encodes every segment of `path`, keeping the separators
pub fn encode_path(path: &RemotePath) -> String {
    path.segments()
        .map(|segment| format!("/{}", utf8_percent_encode(segment, PATH_SEGMENT)))
        .collect()
}

/// Classifies a non-success response that is not expected to carry JSON
fn status_failure(raw: RawResponse) -> DriveError {
    match response::parse_document(Ok(raw)) {
        Err(e) => e,
        Ok(_) => DriveError::misformatted("error status with a success payload"),
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`GraphDriveClient`]
pub struct GraphDriveClientBuilder {
    config: Config,
    clock: Option<Arc<dyn IClock>>,
    observer: Option<Arc<dyn ITokenObserver>>,
    handle: Option<Handle>,
    http: Option<Client>,
}

impl GraphDriveClientBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            clock: None,
            observer: None,
            handle: None,
            http: None,
        }
    }

    /// Clock used to judge token freshness
    pub fn clock(mut self, clock: Arc<dyn IClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Receives every token issued by a login or a refresh
    pub fn observer(mut self, observer: impl ITokenObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Shared observer, see [`GraphDriveClientBuilder::observer`]
    pub fn shared_observer(mut self, observer: Arc<dyn ITokenObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Runtime the worker pool spawns requests on
    ///
    /// Defaults to the runtime `build` is called from.
    pub fn runtime_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Preconfigured HTTP client, replacing the one built from the config
    pub fn http_client(mut self, http: Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Builds the client
    ///
    /// # Errors
    /// Fails if the configuration does not validate, an endpoint URL is
    /// invalid, or no runtime handle was given and none is current.
    pub fn build(self) -> Result<GraphDriveClient> {
        let errors = self.config.validate();
        if let Some(first) = errors.first() {
            anyhow::bail!("Invalid configuration: {first}");
        }

        let handle = match self.handle {
            Some(handle) => handle,
            None => Handle::try_current().context("No tokio runtime to run requests on")?,
        };
        let pool = WorkerPool::new(self.config.api.max_concurrent_requests, handle);

        let http = match self.http {
            Some(http) => http,
            None => Client::builder()
                .timeout(Duration::from_secs(self.config.api.request_timeout_secs))
                .build()
                .context("Failed to build HTTP client")?,
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let observer = self
            .observer
            .unwrap_or_else(|| Arc::new(NoopTokenObserver));

        let refresher = TokenRefresher::new(&self.config.auth, http.clone(), pool.clone(), clock)
            .context("Invalid token endpoint")?
            .with_refresh_fraction(self.config.tokens.refresh_fraction);
        let authenticator = GraphAuthenticator::new(&self.config.auth, refresher.clone())?;

        let base_url = self.config.api.base_url.trim_end_matches('/').to_string();
        info!(
            base_url = %base_url,
            max_concurrent = pool.max_concurrent(),
            client_id = refresher.client_id(),
            "Drive client ready"
        );

        Ok(GraphDriveClient {
            http,
            pool,
            refresher,
            authenticator,
            observer,
            base_url,
        })
    }
}

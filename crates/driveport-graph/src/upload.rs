//! Uploads to the drive (OneDrive)
//!
//! Every upload goes through an upload session, sent in one piece:
//!
//! 1. [`create_upload_session`] asks the drive for a pre-authenticated
//!    upload URL at the target path
//! 2. [`put_content`] PUTs the whole payload to that URL in a single range
//!
//! Payloads of [`MAX_UPLOAD_SIZE`] or more are rejected before any request
//! is made, including the token refresh. Splitting larger payloads into
//! several ranges is not supported.
//!
//! ## Microsoft Graph API References
//!
//! - [Upload large files](https://learn.microsoft.com/en-us/graph/api/driveitem-createuploadsession)

use driveport_core::domain::{DriveError, DriveResult, OAuthToken, RemotePath};
use reqwest::{
    header::{CONTENT_LENGTH, CONTENT_RANGE},
    Method,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::{client::GraphDriveClient, response};

/// Largest payload accepted, exclusive: 60 MiB
pub const MAX_UPLOAD_SIZE: u64 = 60 * 1024 * 1024;

/// Response from `createUploadSession`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadSessionResponse {
    upload_url: String,
}

/// The stored item returned once all bytes arrived
#[derive(Debug, Deserialize)]
struct UploadedItem {
    name: String,
}

/// Checks the payload size against [`MAX_UPLOAD_SIZE`]
///
/// Empty payloads are rejected too: a single range cannot describe zero
/// bytes.
pub fn check_upload_size(len: u64) -> DriveResult<()> {
    if len >= MAX_UPLOAD_SIZE {
        return Err(DriveError::server("upload too large"));
    }
    if len == 0 {
        return Err(DriveError::server("upload is empty"));
    }
    Ok(())
}

/// Value of the `Content-Range` header for a single-range upload of `len`
/// bytes
fn content_range(len: u64) -> String {
    format!("bytes 0-{}/{}", len - 1, len)
}

/// Creates an upload session for the file at `path`
///
/// An existing item with the same name is kept; the drive renames the new
/// one.
///
/// # Returns
/// The pre-authenticated upload URL
///
/// # Errors
/// [`DriveError::MisformattedResponse`] if the response has no `uploadUrl` or
/// it is not an absolute URL.
pub async fn create_upload_session(
    client: &GraphDriveClient,
    token: &OAuthToken,
    path: &RemotePath,
) -> DriveResult<Url> {
    let url = client.item_url(path, Some("createUploadSession"));
    debug!(path = %path, "Creating upload session");

    let body = json!({
        "item": {
            "@microsoft.graph.conflictBehavior": "rename"
        }
    });
    let request = client.authorized(Method::POST, &url, token).json(&body);
    let raw = client.pool().execute(request).await?;
    let session: UploadSessionResponse = response::parse_typed(raw)?;

    Url::parse(&session.upload_url)
        .map_err(|e| DriveError::misformatted(format!("uploadUrl is not a URL: {e}")))
}

/// Sends the whole payload to an upload URL
///
/// The upload URL carries its own credentials, so no `Authorization` header
/// is sent.
///
/// # Returns
/// The name the drive stored the file under
pub async fn put_content(
    client: &GraphDriveClient,
    upload_url: Url,
    data: Vec<u8>,
) -> DriveResult<String> {
    let len = data.len() as u64;
    check_upload_size(len)?;

    let range = content_range(len);
    debug!(content_range = %range, "Uploading content");

    let request = client
        .http()
        .put(upload_url)
        .header(CONTENT_LENGTH, len.to_string())
        .header(CONTENT_RANGE, range)
        .body(data);
    let raw = client.pool().execute(request).await?;
    let item: UploadedItem = response::parse_typed(raw)?;

    if item.name.is_empty() {
        return Err(DriveError::misformatted("uploaded item has no name"));
    }
    Ok(item.name)
}

impl GraphDriveClient {
    /// Uploads `data` to the file at `path`
    ///
    /// # Returns
    /// The name the drive stored the file under, which differs from the
    /// requested one when a file of that name already existed
    ///
    /// # Errors
    /// `ServerSide("upload too large")` for payloads of [`MAX_UPLOAD_SIZE`]
    /// or more, before any network call.
    pub async fn upload_file(
        &self,
        token: &OAuthToken,
        path: &RemotePath,
        data: Vec<u8>,
    ) -> DriveResult<String> {
        check_upload_size(data.len() as u64)?;

        let token = self.fresh_token(token).await?;
        let upload_url = create_upload_session(self, &token, path).await?;
        let size = data.len();
        let name = put_content(self, upload_url, data).await?;

        info!(path = %path, stored_as = %name, bytes = size, "Upload completed");
        Ok(name)
    }
}

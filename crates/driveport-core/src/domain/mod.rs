//! Domain layer
//!
//! Pure value types shared by the adapters: the OAuth token model, drive
//! entities, validated newtypes and the error taxonomy.

pub mod drive;
pub mod errors;
pub mod newtypes;
pub mod token;

pub use drive::{DriveInfo, DriveType, FileInfo, RemoteFileItem};
pub use errors::{BoxError, DomainError, DriveError, DriveResult};
pub use newtypes::{RemotePath, SessionId};
pub use token::{lifespan_from_secs, OAuthToken, DEFAULT_REFRESH_FRACTION, MAX_TOKEN_LIFESPAN_SECS};

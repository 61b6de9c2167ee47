//! Drive entities
//!
//! Read-only snapshots decoded from drive API responses. None of them are
//! cached; callers discard them after use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::RemotePath;

/// Kind of drive behind the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveType {
    /// Consumer drive
    Personal,
    /// Work or school drive
    Business,
    /// SharePoint document library
    SharePointLibrary,
}

impl DriveType {
    /// Maps the provider's `driveType` value. Unknown values fall back to
    /// [`DriveType::Personal`].
    pub fn from_provider(value: &str) -> Self {
        match value {
            "business" => DriveType::Business,
            "documentLibrary" => DriveType::SharePointLibrary,
            _ => DriveType::Personal,
        }
    }
}

impl Default for DriveType {
    fn default() -> Self {
        DriveType::Personal
    }
}

impl std::fmt::Display for DriveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DriveType::Personal => "personal",
            DriveType::Business => "business",
            DriveType::SharePointLibrary => "sharepoint_library",
        };
        write!(f, "{}", s)
    }
}

/// Information about the signed-in user's drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveInfo {
    pub id: String,
    pub name: String,
    pub drive_type: DriveType,
    pub owner_email: Option<String>,
}

/// Provider-agnostic file attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    /// Size in bytes, when reported
    pub size: Option<u64>,
    /// Creation time, `None` when absent or unparsable
    pub created: Option<DateTime<Utc>>,
    /// Last modification time, `None` when absent or unparsable
    pub modified: Option<DateTime<Utc>>,
    /// The drive API has no trash concept here; always false
    pub is_trashed: bool,
    /// Not applicable to this provider; always `None`
    pub exclude_from_backup: Option<bool>,
}

impl FileInfo {
    /// Creates file attributes with the provider's fixed trash/backup values
    pub fn new(
        name: impl Into<String>,
        size: Option<u64>,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            created,
            modified,
            is_trashed: false,
            exclude_from_backup: None,
        }
    }
}

/// A file or folder in the drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileItem {
    /// Provider item id, never empty
    pub item_id: String,
    /// Full path, synthesized from the queried folder and the item name
    pub item_path: RemotePath,
    /// True when the provider marked the item with a folder facet
    pub is_folder: bool,
    pub file_info: FileInfo,
}

impl RemoteFileItem {
    /// Item name, never empty
    pub fn name(&self) -> &str {
        &self.file_info.name
    }
}

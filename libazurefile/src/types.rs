//! Core data model: share identity, share options, credentials, mount targets
//! and usage snapshots.
//!
//! Everything here is a caller-owned value object.  Nothing in the crate keeps
//! these alive beyond the call that received them.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::MountError;

// ---------------------------------------------------------------------------
// Share identity
// ---------------------------------------------------------------------------

/// Separator used by the orchestrator's volume handle,
/// `<resource-group>#<account>#<share>`.
const VOLUME_HANDLE_SEPARATOR: char = '#';

/// Storage account plus share name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ShareIdentity {
    pub account_name: String,
    pub share_name: String,
}

impl ShareIdentity {
    pub fn new(account_name: impl Into<String>, share_name: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            share_name: share_name.into(),
        }
    }

    /// Parse a volume handle of the form `<rg>#<account>#<share>[#...]`.
    ///
    /// Trailing segments (secret namespace, uuid suffixes) are ignored.
    /// Returns `None` when the account or share segment is missing or empty.
    pub fn from_volume_handle(handle: &str) -> Option<Self> {
        let mut parts = handle.split(VOLUME_HANDLE_SEPARATOR);
        let _resource_group = parts.next()?;
        let account = parts.next().filter(|s| !s.is_empty())?;
        let share = parts.next().filter(|s| !s.is_empty())?;
        Some(Self::new(account, share))
    }

    /// Render the volume handle the orchestrator stores for this share.
    pub fn volume_handle(&self, resource_group: &str) -> String {
        format!(
            "{resource_group}{sep}{}{sep}{}",
            self.account_name,
            self.share_name,
            sep = VOLUME_HANDLE_SEPARATOR
        )
    }
}

impl fmt::Display for ShareIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_name, self.share_name)
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Storage account key.  Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountKey(String);

impl AccountKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccountKey(<redacted>)")
    }
}

impl From<&str> for AccountKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// Share options
// ---------------------------------------------------------------------------

/// File share protocol.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShareProtocol {
    #[default]
    Smb,
    Nfs,
}

/// Options for creating a share.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShareOptions {
    /// Requested quota in GiB.
    pub requested_gib: i64,
    #[serde(default)]
    pub protocol: ShareProtocol,
    /// Access tier, e.g. `"Hot"`, `"Cool"`, `"TransactionOptimized"`.
    #[serde(default)]
    pub access_tier: Option<String>,
    /// Arbitrary storage-class parameters forwarded to the backend.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl ShareOptions {
    pub fn with_size(requested_gib: i64) -> Self {
        Self {
            requested_gib,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Mount targets
// ---------------------------------------------------------------------------

/// A host path to mount onto, with its mount options.
///
/// `sensitive_mount_options` (e.g. `password=...`) travel on a separate
/// channel from `mount_options` and are redacted from `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MountTarget {
    pub path: PathBuf,
    pub fs_type: String,
    pub mount_options: Vec<String>,
    pub sensitive_mount_options: Vec<String>,
}

impl MountTarget {
    pub fn new(path: impl Into<PathBuf>, fs_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fs_type: fs_type.into(),
            ..Default::default()
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mount_options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sensitive_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitive_mount_options = options.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn ensure_path(&self) -> Result<(), MountError> {
        if self.path.as_os_str().is_empty() {
            return Err(MountError::InvalidArgument("target path is empty".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for MountTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountTarget")
            .field("path", &self.path)
            .field("fs_type", &self.fs_type)
            .field("mount_options", &self.mount_options)
            .field(
                "sensitive_mount_options",
                &format_args!("<{} redacted>", self.sensitive_mount_options.len()),
            )
            .finish()
    }
}

/// Observed state of a path, recomputed on every lifecycle call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountPointStatus {
    pub exists: bool,
    pub is_mount_point: bool,
    pub is_corrupted: bool,
}

impl MountPointStatus {
    pub(crate) const ABSENT: Self = Self {
        exists: false,
        is_mount_point: false,
        is_corrupted: false,
    };

    pub(crate) const CORRUPTED: Self = Self {
        exists: true,
        is_mount_point: true,
        is_corrupted: true,
    };

    /// A mount that can be used as-is.
    pub fn is_healthy_mount(&self) -> bool {
        self.is_mount_point && !self.is_corrupted
    }
}

/// Point-in-time capacity snapshot of a mounted volume.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub total_inodes: u64,
    pub used_inodes: u64,
    pub available_inodes: u64,
}

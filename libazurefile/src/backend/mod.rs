//! Remote share backend capability.
//!
//! [`BackendClient`] opens a [`ShareSession`] from an account name and key;
//! the session issues the share calls.  A session is opened per operation and
//! dropped with it, so no client state outlives a single request.
//!
//! Errors crossing this boundary are [`BackendError`] values whose `message`
//! is the backend's own text, kept verbatim.

pub mod memory;

use std::fmt;

use async_trait::async_trait;

use crate::types::{AccountKey, ShareOptions};

/// Backend-reported failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendErrorKind {
    /// The share (or account resource) already exists.
    AlreadyExists,
    /// The share (or account) does not exist.
    NotFound,
    /// Throttled, timed out or otherwise temporarily unreachable.
    Unavailable,
    /// The backend refused the request.
    Rejected,
}

/// Opaque backend error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::AlreadyExists, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unavailable, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Rejected, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind == BackendErrorKind::Unavailable
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for BackendError {}

/// Factory for authenticated backend sessions.
///
/// Implementations must be safe to share across concurrent operations on
/// unrelated shares.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Open a session for `account` using `key`.
    async fn open_session(
        &self,
        account: &str,
        key: &AccountKey,
    ) -> Result<Box<dyn ShareSession>, BackendError>;
}

/// Share operations scoped to one storage account.
#[async_trait]
pub trait ShareSession: Send + Sync {
    /// Create share `name` with the requested quota.  Must report
    /// [`BackendErrorKind::AlreadyExists`] when the share is already there.
    async fn create_file_share(&self, name: &str, options: &ShareOptions)
    -> Result<(), BackendError>;

    /// Delete share `name`.  Must report [`BackendErrorKind::NotFound`] when
    /// the share is absent.
    async fn delete_file_share(&self, name: &str) -> Result<(), BackendError>;

    /// Set the quota of share `name` to `size_gib`.
    async fn resize_file_share(&self, name: &str, size_gib: i64) -> Result<(), BackendError>;

    /// Current quota of share `name`, in GiB.
    async fn get_share_quota(&self, name: &str) -> Result<i64, BackendError>;
}

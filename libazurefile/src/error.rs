//! Error types for share provisioning and mount lifecycle operations.
//!
//! Each component has its own [`thiserror::Error`] enum.  Both top-level
//! enums ([`ProvisionError`] and [`MountError`]) expose a coarse
//! [`ErrorKind`] so that the orchestrator's reconcile loop can pick a retry
//! policy without parsing messages, while `Display` keeps the full
//! human-readable detail (including the backend's own message, verbatim).

use std::time::Duration;

use thiserror::Error;

use crate::backend::{BackendError, BackendErrorKind};

/// Coarse classification shared by every error in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad identity, name, size or argument.  The caller must fix the input.
    Validation,
    /// The backend could not be reached or a session could not be opened.
    BackendUnavailable,
    /// The backend rejected the request.
    BackendOperationFailed,
    /// The requested quota lies outside the valid range.
    QuotaExceeded,
    /// A mount, unmount or mount-point probe failed.
    MountFailed,
    /// A leftover mount directory could not be removed.
    CleanupFailed,
    /// Usage statistics could not be read for the target.
    StatUnavailable,
    /// The caller cancelled the operation or its deadline expired.
    Cancelled,
}

/// Quota range violation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuotaError {
    #[error("invalid value {value} for quota, valid values are [{min}, {max}]")]
    OutOfRange { value: i64, min: i64, max: i64 },
}

/// Backend naming rule violation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error(
        "azure: account name is not valid: it must be between 3 and 24 characters, \
         and only may contain numbers and lowercase letters: {0}"
    )]
    InvalidAccountName(String),

    #[error(
        "share name is not valid: it must be between 3 and 63 characters of lowercase \
         letters, numbers and single hyphens, starting and ending with a letter or number: {0}"
    )]
    InvalidShareName(String),
}

/// Errors returned by [`crate::provisioner::ShareProvisioner`].
#[derive(Debug, Error, Clone)]
pub enum ProvisionError {
    /// `create_share` was called without share options.
    #[error("shareOptions of account({account}) is nil")]
    MissingOptions { account: String },

    /// Rendered as a client construction failure, which is where the backend
    /// SDK itself would reject the name.
    #[error("error creating azure client: {0}")]
    InvalidAccountName(NameError),

    /// The share name breaks the backend naming rules.
    #[error("{0}")]
    InvalidShareName(NameError),

    /// No session could be opened for the account.
    #[error("error creating azure client: {source}")]
    BackendSessionError {
        /// Storage account the session was opened for.
        account: String,
        #[source]
        source: BackendError,
    },

    /// The backend refused to create the share.
    #[error("failed to create file share {share}, err: {source}")]
    BackendCreateFailed {
        share: String,
        #[source]
        source: BackendError,
    },

    /// The backend refused to delete an existing share.
    #[error("failed to delete file share {share}, err: {source}")]
    BackendDeleteFailed {
        share: String,
        #[source]
        source: BackendError,
    },

    /// The current quota could not be read, including when the share is
    /// missing.
    #[error("failed to get quota of file share {share}, err: {source}")]
    BackendQueryFailed {
        share: String,
        #[source]
        source: BackendError,
    },

    /// The backend refused to grow the share.
    #[error(
        "failed to set quota on file share {share} to {requested}GiB \
         (valid values are [{min}, {max}]), err: {source}"
    )]
    BackendResizeFailed {
        share: String,
        /// Requested quota in GiB.
        requested: i64,
        /// Lower bound of the configured quota range.
        min: i64,
        /// Upper bound of the configured quota range.
        max: i64,
        #[source]
        source: BackendError,
    },

    /// The requested size lies outside the quota range.
    #[error("failed to set quota on file share {share}, err: {source}")]
    QuotaExceeded {
        share: String,
        #[source]
        source: QuotaError,
    },

    /// The caller's cancellation token fired during a backend call or a
    /// retry backoff.
    #[error("{operation} on file share {share} was cancelled")]
    Cancelled {
        /// Backend call in flight, e.g. `"resize"`.
        operation: &'static str,
        share: String,
    },

    /// A single backend call exceeded the context timeout.
    #[error("{operation} on file share {share} timed out after {after:?}")]
    TimedOut {
        operation: &'static str,
        share: String,
        /// The timeout that expired.
        after: Duration,
    },
}

impl From<NameError> for ProvisionError {
    fn from(e: NameError) -> Self {
        match e {
            NameError::InvalidAccountName(_) => Self::InvalidAccountName(e),
            NameError::InvalidShareName(_) => Self::InvalidShareName(e),
        }
    }
}

impl ProvisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingOptions { .. }
            | Self::InvalidAccountName(_)
            | Self::InvalidShareName(_) => ErrorKind::Validation,
            Self::BackendSessionError { .. } => ErrorKind::BackendUnavailable,
            Self::BackendCreateFailed { source, .. }
            | Self::BackendDeleteFailed { source, .. }
            | Self::BackendQueryFailed { source, .. }
            | Self::BackendResizeFailed { source, .. } => match source.kind {
                BackendErrorKind::Unavailable => ErrorKind::BackendUnavailable,
                _ => ErrorKind::BackendOperationFailed,
            },
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::Cancelled { .. } | Self::TimedOut { .. } => ErrorKind::Cancelled,
        }
    }

    /// Whether repeating the same request may succeed.
    ///
    /// Validation and quota errors never are.  Backend rejections are only
    /// retryable when the embedded backend code says the condition is
    /// transient.
    pub fn is_retryable(&self) -> bool {
        match self.kind() {
            ErrorKind::BackendUnavailable | ErrorKind::Cancelled => true,
            ErrorKind::BackendOperationFailed => matches!(
                self,
                Self::BackendCreateFailed { source, .. }
                    | Self::BackendDeleteFailed { source, .. }
                    | Self::BackendQueryFailed { source, .. }
                    | Self::BackendResizeFailed { source, .. }
                    if source.is_transient()
            ),
            _ => false,
        }
    }
}

/// Errors returned by [`crate::coordinator::MountLifecycleCoordinator`].
///
/// Reasons carry the OS error only; mount options are never embedded since
/// they may contain credentials.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MountError {
    /// The caller supplied an empty source or path.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The mount state of a path could not be determined.
    #[error("failed to probe mount point {path}: {reason}")]
    ProbeFailed {
        /// Path whose status was probed.
        path: String,
        /// OS error text.
        reason: String,
    },

    /// Preparing the directory or mounting onto it failed.
    #[error("mount failed at {path}: {reason}")]
    MountFailed {
        /// Filesystem path where the mount was attempted.
        path: String,
        /// OS error text.
        reason: String,
    },

    /// An unmount operation failed.
    #[error("unmount failed at {path}: {reason}")]
    UnmountFailed {
        /// Filesystem path where the unmount was attempted.
        path: String,
        /// OS error text.
        reason: String,
    },

    /// The directory left after unmounting could not be removed, typically
    /// because it is busy or not empty.
    #[error("failed to clean up mount directory {path}: {reason}")]
    CleanupFailed {
        /// Directory that was being removed.
        path: String,
        /// OS error text.
        reason: String,
    },

    /// The path is not a live mount point or `statvfs` failed.
    #[error("volume stats unavailable for {path}: {reason}")]
    StatUnavailable {
        /// Path usage was requested for.
        path: String,
        /// Why no statistics were returned.
        reason: String,
    },
}

impl MountError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::Validation,
            Self::ProbeFailed { .. } | Self::MountFailed { .. } | Self::UnmountFailed { .. } => {
                ErrorKind::MountFailed
            }
            Self::CleanupFailed { .. } => ErrorKind::CleanupFailed,
            Self::StatUnavailable { .. } => ErrorKind::StatUnavailable,
        }
    }

    /// Every mount error except bad input may be retried; the coordinator
    /// re-derives the mount point state on each call.
    pub fn is_retryable(&self) -> bool {
        self.kind() != ErrorKind::Validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_account_name_display() {
        let err = ProvisionError::from(NameError::InvalidAccountName("ut".into()));
        assert_eq!(
            err.to_string(),
            "error creating azure client: azure: account name is not valid: it must be \
             between 3 and 24 characters, and only may contain numbers and lowercase letters: ut"
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());
    }

    #[test]
    fn quota_exceeded_display() {
        let err = ProvisionError::QuotaExceeded {
            share: "pvc-1".into(),
            source: QuotaError::OutOfRange {
                value: 6000,
                min: 1,
                max: 5120,
            },
        };
        assert_eq!(
            err.to_string(),
            "failed to set quota on file share pvc-1, err: invalid value 6000 for quota, \
             valid values are [1, 5120]"
        );
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
    }

    #[test]
    fn backend_message_is_preserved() {
        let err = ProvisionError::BackendCreateFailed {
            share: "pvc-1".into(),
            source: BackendError::rejected("ShareBeingDeleted: the share is being deleted"),
        };
        assert!(
            err.to_string()
                .ends_with("err: ShareBeingDeleted: the share is being deleted")
        );
        assert_eq!(err.kind(), ErrorKind::BackendOperationFailed);
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_backend_failure_is_retryable() {
        let err = ProvisionError::BackendResizeFailed {
            share: "pvc-1".into(),
            requested: 20,
            min: 1,
            max: 5120,
            source: BackendError::unavailable("ServerBusy"),
        };
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("to 20GiB (valid values are [1, 5120])"));
    }

    #[test]
    fn mount_error_kinds() {
        let err = MountError::CleanupFailed {
            path: "/mnt/t".into(),
            reason: "Device or resource busy".into(),
        };
        assert_eq!(err.kind(), ErrorKind::CleanupFailed);
        assert!(err.is_retryable());
        assert!(!MountError::InvalidArgument("empty path".into()).is_retryable());
    }
}

//! Host mount capability.
//!
//! [`MountExecutor`] is the only place the crate touches mount syscalls.  Two
//! implementations exist and are selected when the driver is composed:
//!
//! | Executor | Used when |
//! |---|---|
//! | [`HostMountExecutor`] | Linux hosts, `MountMode::Host` |
//! | [`DegradedMountExecutor`] | `MountMode::Degraded`, chosen explicitly |

pub mod degraded;
#[cfg(target_os = "linux")]
pub mod host;

use std::io;
use std::path::Path;

use async_trait::async_trait;
use nix::errno::Errno;

pub use degraded::DegradedMountExecutor;
#[cfg(target_os = "linux")]
pub use host::HostMountExecutor;

use crate::types::VolumeUsage;

/// OS-level mount operations.
///
/// Implementations must be safe to call concurrently for unrelated paths.
/// Sensitive options are handed over separately and must only ever reach the
/// kernel, never a log line or an error message.
#[async_trait]
pub trait MountExecutor: Send + Sync {
    async fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: &str,
        options: &[String],
        sensitive_options: &[String],
    ) -> io::Result<()>;

    async fn unmount(&self, target: &Path) -> io::Result<()>;

    async fn is_mount_point(&self, path: &Path) -> io::Result<bool>;

    /// `Ok(false)` only when the path is definitely absent.  Errors such as
    /// `ENOTCONN` from a dead network mount are returned as-is so callers can
    /// recognise corruption.
    async fn path_exists(&self, path: &Path) -> io::Result<bool>;

    async fn stat_volume(&self, target: &Path) -> io::Result<VolumeUsage>;
}

/// Errors a stat on a broken network mount produces.
const CORRUPTED_MOUNT_ERRNOS: [Errno; 5] = [
    Errno::ENOTCONN,
    Errno::ESTALE,
    Errno::EIO,
    Errno::EACCES,
    Errno::EHOSTDOWN,
];

/// Whether `err` indicates a mount point whose backing connection is gone.
pub fn is_corrupted_mount(err: &io::Error) -> bool {
    err.raw_os_error()
        .is_some_and(|code| CORRUPTED_MOUNT_ERRNOS.iter().any(|e| *e as i32 == code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_signals() {
        for errno in CORRUPTED_MOUNT_ERRNOS {
            assert!(is_corrupted_mount(&io::Error::from(errno)), "{errno}");
        }
        assert!(!is_corrupted_mount(&io::Error::from(Errno::ENOENT)));
        assert!(!is_corrupted_mount(&io::Error::other("not an os error")));
    }
}

//! Mount lifecycle: stage, publish, unpublish, unstage.
//!
//! ```text
//! Unmounted --stage--> Staged --publish--> Published
//!     ^                  |                     |
//!     +-----unstage------+<----unpublish-------+
//! ```
//!
//! No state is kept between calls.  Each call probes the target path
//! ([`MountPointStatus`]) and acts on what it finds, so a repeated call after
//! a partial failure converges instead of assuming a clean start.  Callers
//! must serialize calls against the same path.

use std::io;
use std::path::Path;
use std::sync::Arc;

use nix::errno::Errno;
use tracing::{debug, info, instrument, warn};

use crate::error::MountError;
use crate::mount::{MountExecutor, is_corrupted_mount};
use crate::types::{MountPointStatus, MountTarget, VolumeUsage};

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Drives mounts through an injected [`MountExecutor`].
///
/// Holds no per-volume state, so one instance serves every volume on the
/// host.
pub struct MountLifecycleCoordinator {
    executor: Arc<dyn MountExecutor>,
    extensive_check: bool,
}

impl MountLifecycleCoordinator {
    pub fn new(executor: Arc<dyn MountExecutor>) -> Self {
        Self {
            executor,
            extensive_check: true,
        }
    }

    /// With extensive checking, a mount point whose connection is gone
    /// (`ENOTCONN`, `ESTALE`, ...) is treated as corrupted and cleaned up or
    /// remounted.  Without it, such a path fails the call.
    pub fn with_extensive_check(mut self, enabled: bool) -> Self {
        self.extensive_check = enabled;
        self
    }

    /// Mount `source` at the staging path.
    ///
    /// A healthy existing mount is left alone.  A corrupted one is unmounted
    /// and mounted again.
    #[instrument(skip_all, fields(source = %source, path = %target.path.display()))]
    pub async fn stage(&self, source: &str, target: &MountTarget) -> Result<(), MountError> {
        if source.is_empty() {
            return Err(MountError::InvalidArgument("mount source is empty".into()));
        }
        target.ensure_path()?;

        let status = self.probe(&target.path).await?;
        if status.is_healthy_mount() {
            debug!("staging path already mounted, assuming idempotent retry");
            return Ok(());
        }
        if status.is_corrupted {
            warn!("staging path is a corrupted mount, remounting");
            self.unmount(&target.path).await?;
        }

        self.prepare_dir(&target.path).await?;
        self.mount(source, target, &target.mount_options).await?;

        info!(
            fs_type = %target.fs_type,
            options = ?target.mount_options,
            "volume staged"
        );
        Ok(())
    }

    /// Bind-mount the staged volume at `target.path`.
    #[instrument(skip_all, fields(staging_path = %staging_path.display(), path = %target.path.display(), read_only = read_only))]
    pub async fn publish(
        &self,
        staging_path: &Path,
        target: &MountTarget,
        read_only: bool,
    ) -> Result<(), MountError> {
        if staging_path.as_os_str().is_empty() {
            return Err(MountError::InvalidArgument("staging path is empty".into()));
        }
        target.ensure_path()?;

        let status = self.probe(&target.path).await?;
        if status.is_healthy_mount() {
            debug!("target already mounted, assuming idempotent retry");
            return Ok(());
        }
        if status.is_corrupted {
            warn!("publish path is a corrupted mount, remounting");
            self.unmount(&target.path).await?;
        }

        self.prepare_dir(&target.path).await?;

        let mut options = vec!["bind".to_owned()];
        if read_only {
            options.push("ro".to_owned());
        }
        options.extend(
            target
                .mount_options
                .iter()
                .filter(|o| !matches!(o.as_str(), "bind" | "ro"))
                .cloned(),
        );
        self.mount(&staging_path.to_string_lossy(), target, &options)
            .await?;

        info!(options = ?options, "volume published");
        Ok(())
    }

    /// Remove the workload bind mount and its directory.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn unpublish(&self, path: &Path) -> Result<(), MountError> {
        self.cleanup(path).await?;
        info!("volume unpublished");
        Ok(())
    }

    /// Remove the staging mount and its directory.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn unstage(&self, path: &Path) -> Result<(), MountError> {
        self.cleanup(path).await?;
        info!("volume unstaged");
        Ok(())
    }

    /// Capacity and inode usage of a live mount.  Never mounts anything.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn get_volume_usage(&self, path: &Path) -> Result<VolumeUsage, MountError> {
        if path.as_os_str().is_empty() {
            return Err(MountError::InvalidArgument("volume path is empty".into()));
        }
        let unavailable = |reason: String| MountError::StatUnavailable {
            path: display(path),
            reason,
        };

        let status = self.probe(path).await.map_err(|e| unavailable(e.to_string()))?;
        if !status.exists {
            return Err(unavailable("path does not exist".into()));
        }
        if status.is_corrupted {
            return Err(unavailable("mount point is corrupted".into()));
        }
        if !status.is_mount_point {
            return Err(unavailable("not a mount point".into()));
        }

        self.executor
            .stat_volume(path)
            .await
            .map_err(|e| unavailable(e.to_string()))
    }

    /// Unmount if needed, then remove the directory.
    async fn cleanup(&self, path: &Path) -> Result<(), MountError> {
        if path.as_os_str().is_empty() {
            return Err(MountError::InvalidArgument("target path is empty".into()));
        }

        let status = self.probe(path).await?;
        if !status.exists {
            debug!("path does not exist, nothing to clean up");
            return Ok(());
        }

        if status.is_corrupted {
            warn!("corrupted mount point, forcing cleanup");
            self.unmount(path).await?;
        } else if status.is_mount_point {
            self.unmount(path).await?;
        } else {
            debug!("path is not mounted, removing directory");
        }

        self.remove_dir(path).await
    }

    /// Derive the current [`MountPointStatus`] of `path`.
    async fn probe(&self, path: &Path) -> Result<MountPointStatus, MountError> {
        let probe_failed = |e: io::Error| MountError::ProbeFailed {
            path: display(path),
            reason: e.to_string(),
        };

        let exists = match self.executor.path_exists(path).await {
            Ok(exists) => exists,
            Err(e) if self.extensive_check && is_corrupted_mount(&e) => {
                debug!(error = %e, "existence check hit a corrupted mount");
                return Ok(MountPointStatus::CORRUPTED);
            }
            Err(e) => return Err(probe_failed(e)),
        };
        if !exists {
            return Ok(MountPointStatus::ABSENT);
        }

        match self.executor.is_mount_point(path).await {
            Ok(is_mount_point) => Ok(MountPointStatus {
                exists: true,
                is_mount_point,
                is_corrupted: false,
            }),
            Err(e) if self.extensive_check && is_corrupted_mount(&e) => {
                debug!(error = %e, "mount point check hit a corrupted mount");
                Ok(MountPointStatus::CORRUPTED)
            }
            Err(e) => Err(probe_failed(e)),
        }
    }

    async fn prepare_dir(&self, path: &Path) -> Result<(), MountError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| MountError::MountFailed {
                path: display(path),
                reason: format!("prepare directory: {e}"),
            })
    }

    async fn mount(
        &self,
        source: &str,
        target: &MountTarget,
        options: &[String],
    ) -> Result<(), MountError> {
        self.executor
            .mount(
                source,
                &target.path,
                &target.fs_type,
                options,
                &target.sensitive_mount_options,
            )
            .await
            .map_err(|e| MountError::MountFailed {
                path: display(&target.path),
                reason: e.to_string(),
            })
    }

    async fn unmount(&self, path: &Path) -> Result<(), MountError> {
        self.executor
            .unmount(path)
            .await
            .map_err(|e| MountError::UnmountFailed {
                path: display(path),
                reason: e.to_string(),
            })
    }

    async fn remove_dir(&self, path: &Path) -> Result<(), MountError> {
        let result = match tokio::fs::remove_dir(path).await {
            Err(e) if e.raw_os_error() == Some(Errno::ENOTDIR as i32) => {
                tokio::fs::remove_file(path).await
            }
            other => other,
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MountError::CleanupFailed {
                path: display(path),
                reason: e.to_string(),
            }),
        }
    }
}

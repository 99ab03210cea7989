//! No-op mount executor for hosts without native mount support.
//!
//! Mount and unmount report success without doing anything, and statistics
//! come back zeroed.  Existence checks still look at the real filesystem, and
//! any existing directory is reported as a mount point so that the
//! coordinator's cleanup path (unmount, then remove the directory) still
//! removes leftover directories for real.
//!
//! This executor is only ever selected through `MountMode::Degraded`.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use super::MountExecutor;
use crate::types::VolumeUsage;

#[derive(Debug, Default, Clone, Copy)]
pub struct DegradedMountExecutor;

impl DegradedMountExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MountExecutor for DegradedMountExecutor {
    async fn mount(
        &self,
        source: &str,
        target: &Path,
        _fs_type: &str,
        _options: &[String],
        _sensitive_options: &[String],
    ) -> io::Result<()> {
        debug!(source, target = %target.display(), "degraded mode, skipping mount");
        Ok(())
    }

    async fn unmount(&self, target: &Path) -> io::Result<()> {
        debug!(target = %target.display(), "degraded mode, skipping unmount");
        Ok(())
    }

    async fn is_mount_point(&self, path: &Path) -> io::Result<bool> {
        self.path_exists(path).await
    }

    async fn path_exists(&self, path: &Path) -> io::Result<bool> {
        tokio::fs::try_exists(path).await
    }

    async fn stat_volume(&self, _target: &Path) -> io::Result<VolumeUsage> {
        Ok(VolumeUsage::default())
    }
}

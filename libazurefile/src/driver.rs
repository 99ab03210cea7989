//! Composition root.
//!
//! [`FileShareDriver`] wires a [`ShareProvisioner`] and a
//! [`MountLifecycleCoordinator`] together from a [`DriverConfig`] and exposes
//! the eight operations an orchestrator plugin calls.  The RPC layer in front
//! of it only has to translate requests and map [`ErrorKind`]s to status
//! codes.
//!
//! [`ErrorKind`]: crate::error::ErrorKind

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::backend::BackendClient;
use crate::config::{ConfigError, DriverConfig, MountMode};
use crate::coordinator::MountLifecycleCoordinator;
use crate::error::{MountError, ProvisionError};
use crate::mount::{DegradedMountExecutor, MountExecutor};
use crate::provisioner::{OperationContext, ShareProvisioner};
use crate::types::{AccountKey, MountTarget, ShareIdentity, ShareOptions, VolumeUsage};

/// Share provisioning and mount lifecycle behind one handle.
pub struct FileShareDriver {
    provisioner: ShareProvisioner,
    coordinator: MountLifecycleCoordinator,
    backend_timeout: Option<Duration>,
    mount_mode: MountMode,
}

/// Pick the mount executor for `mode`.
fn executor_for(mode: MountMode) -> Result<Arc<dyn MountExecutor>, ConfigError> {
    match mode {
        MountMode::Degraded => {
            warn!("degraded mount mode selected, mount and unmount are no-ops");
            Ok(Arc::new(DegradedMountExecutor::new()))
        }
        #[cfg(target_os = "linux")]
        MountMode::Host => Ok(Arc::new(crate::mount::HostMountExecutor::new())),
        #[cfg(not(target_os = "linux"))]
        MountMode::Host => Err(ConfigError::UnsupportedMountMode(mode)),
    }
}

impl FileShareDriver {
    /// Build a driver with the mount executor `config.mount_mode` selects.
    pub fn new(config: &DriverConfig, backend: Arc<dyn BackendClient>) -> Result<Self, ConfigError> {
        let executor = executor_for(config.mount_mode)?;
        Self::with_executor(config, backend, executor)
    }

    /// Build a driver around a caller-supplied mount executor.
    pub fn with_executor(
        config: &DriverConfig,
        backend: Arc<dyn BackendClient>,
        executor: Arc<dyn MountExecutor>,
    ) -> Result<Self, ConfigError> {
        let quota = config.quota()?;
        info!(
            min_quota_gib = quota.min_gib(),
            max_quota_gib = quota.max_gib(),
            mount_mode = ?config.mount_mode,
            extensive_mount_check = config.extensive_mount_check,
            "file share driver configured"
        );

        Ok(Self {
            provisioner: ShareProvisioner::new(backend, quota).with_retry(config.retry),
            coordinator: MountLifecycleCoordinator::new(executor)
                .with_extensive_check(config.extensive_mount_check),
            backend_timeout: config.backend_timeout(),
            mount_mode: config.mount_mode,
        })
    }

    pub fn mount_mode(&self) -> MountMode {
        self.mount_mode
    }

    /// A fresh context carrying the configured backend timeout.
    pub fn context(&self) -> OperationContext {
        match self.backend_timeout {
            Some(timeout) => OperationContext::new().with_timeout(timeout),
            None => OperationContext::new(),
        }
    }

    /// Create a share.  See [`ShareProvisioner::create_share`].
    pub async fn create_share(
        &self,
        ctx: &OperationContext,
        identity: &ShareIdentity,
        key: &AccountKey,
        options: Option<&ShareOptions>,
    ) -> Result<(), ProvisionError> {
        self.provisioner
            .create_share(ctx, identity, key, options)
            .await
    }

    /// Delete a share; an absent share counts as deleted.
    pub async fn delete_share(
        &self,
        ctx: &OperationContext,
        identity: &ShareIdentity,
        key: &AccountKey,
    ) -> Result<(), ProvisionError> {
        self.provisioner.delete_share(ctx, identity, key).await
    }

    /// Grow a share's quota.  Shrink requests succeed without effect.
    pub async fn resize_share(
        &self,
        ctx: &OperationContext,
        identity: &ShareIdentity,
        key: &AccountKey,
        requested_gib: i64,
    ) -> Result<(), ProvisionError> {
        self.provisioner
            .resize_share(ctx, identity, key, requested_gib)
            .await
    }

    /// Mount `source` at the node-wide staging path.
    pub async fn stage_volume(&self, source: &str, target: &MountTarget) -> Result<(), MountError> {
        self.coordinator.stage(source, target).await
    }

    /// Bind-mount a staged volume into a workload's path.
    pub async fn publish_volume(
        &self,
        staging_path: &Path,
        target: &MountTarget,
        read_only: bool,
    ) -> Result<(), MountError> {
        self.coordinator
            .publish(staging_path, target, read_only)
            .await
    }

    /// Unmount and remove a workload's volume path.
    pub async fn unpublish_volume(&self, target_path: &Path) -> Result<(), MountError> {
        self.coordinator.unpublish(target_path).await
    }

    /// Unmount and remove the staging path.
    pub async fn unstage_volume(&self, staging_path: &Path) -> Result<(), MountError> {
        self.coordinator.unstage(staging_path).await
    }

    /// Usage of a mounted volume; fails unless it is a live mount.
    pub async fn get_volume_usage(&self, volume_path: &Path) -> Result<VolumeUsage, MountError> {
        self.coordinator.get_volume_usage(volume_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::InMemoryBackend;
    use crate::error::ErrorKind;

    fn degraded() -> DriverConfig {
        DriverConfig {
            mount_mode: MountMode::Degraded,
            ..Default::default()
        }
    }

    #[test]
    fn context_carries_configured_timeout() {
        let backend = Arc::new(InMemoryBackend::new());
        let driver = FileShareDriver::new(&degraded(), backend.clone()).unwrap();
        assert_eq!(driver.context().timeout(), Some(Duration::from_secs(60)));

        let config = DriverConfig {
            backend_timeout_secs: None,
            ..degraded()
        };
        let driver = FileShareDriver::new(&config, backend).unwrap();
        assert_eq!(driver.context().timeout(), None);
    }

    #[test]
    fn rejects_invalid_quota_range() {
        let config = DriverConfig {
            min_quota_gib: 100,
            max_quota_gib: 10,
            ..degraded()
        };
        let err = FileShareDriver::new(&config, Arc::new(InMemoryBackend::new()))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::InvalidQuotaRange { min: 100, max: 10 }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn host_mode_on_linux() {
        let driver =
            FileShareDriver::new(&DriverConfig::default(), Arc::new(InMemoryBackend::new()))
                .unwrap();
        assert_eq!(driver.mount_mode(), MountMode::Host);
    }

    #[cfg(not(target_os = "linux"))]
    #[test]
    fn host_mode_requires_linux() {
        let err = FileShareDriver::new(&DriverConfig::default(), Arc::new(InMemoryBackend::new()))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::UnsupportedMountMode(MountMode::Host)));
    }

    #[tokio::test]
    async fn custom_quota_range_applies_to_create() {
        let backend = Arc::new(InMemoryBackend::new().with_account("acct", "key"));
        let config = DriverConfig {
            max_quota_gib: 100,
            ..degraded()
        };
        let driver = FileShareDriver::new(&config, backend.clone()).unwrap();
        let id = ShareIdentity::new("acct", "pvc-1");
        let key = AccountKey::from("key");

        let err = driver
            .create_share(
                &driver.context(),
                &id,
                &key,
                Some(&ShareOptions::with_size(200)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
        assert!(err.to_string().contains("valid values are [1, 100]"));
        assert_eq!(backend.calls().total(), 0);
    }
}

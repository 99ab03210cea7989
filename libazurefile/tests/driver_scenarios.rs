//! End-to-end scenarios through `FileShareDriver` with an in-memory backend
//! and the degraded mount executor over real temporary directories.

use std::sync::Arc;

use libazurefile::backend::memory::{BackendOp, InMemoryBackend};
use libazurefile::{
    AccountKey, BackendError, DriverConfig, ErrorKind, FileShareDriver, MountTarget,
    OperationContext, ProvisionError, ShareIdentity, ShareOptions, VolumeUsage,
};
use tokio_util::sync::CancellationToken;

const ACCOUNT: &str = "unittest";
const KEY: &str = "dW5pdHRlc3Q=";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

fn driver(backend: &Arc<InMemoryBackend>) -> FileShareDriver {
    init_tracing();
    let config = DriverConfig::from_lookup(|key| match key {
        "AZUREFILE_MOUNT_MODE" => Some("degraded".to_owned()),
        "AZUREFILE_BACKEND_RETRIES" => Some("2".to_owned()),
        _ => None,
    })
    .unwrap();
    FileShareDriver::new(&config, backend.clone()).unwrap()
}

#[tokio::test]
async fn delete_with_short_account_name_is_rejected_locally() {
    let backend = Arc::new(InMemoryBackend::new());
    let driver = driver(&backend);

    let err = driver
        .delete_share(
            &driver.context(),
            &ShareIdentity::new("ut", "pvc-1"),
            &AccountKey::from("ut"),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "error creating azure client: azure: account name is not valid: it must be between 3 \
         and 24 characters, and only may contain numbers and lowercase letters: ut"
    );
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(backend.calls().total(), 0);
}

#[tokio::test]
async fn resize_to_negative_size_is_a_no_op() {
    let backend = Arc::new(
        InMemoryBackend::new()
            .with_account(ACCOUNT, KEY)
            .with_share(ACCOUNT, "pvc-1", 10),
    );
    let driver = driver(&backend);

    driver
        .resize_share(
            &driver.context(),
            &ShareIdentity::new(ACCOUNT, "pvc-1"),
            &AccountKey::from(KEY),
            -2,
        )
        .await
        .unwrap();

    assert_eq!(backend.share_quota(ACCOUNT, "pvc-1"), Some(10));
    assert_eq!(backend.calls().mutations(), 0);
}

#[tokio::test]
async fn resize_above_ceiling_reports_valid_range() {
    let backend = Arc::new(
        InMemoryBackend::new()
            .with_account(ACCOUNT, KEY)
            .with_share(ACCOUNT, "pvc-1", 10),
    );
    let driver = driver(&backend);

    let err = driver
        .resize_share(
            &driver.context(),
            &ShareIdentity::new(ACCOUNT, "pvc-1"),
            &AccountKey::from(KEY),
            6000,
        )
        .await
        .unwrap_err();

    assert!(
        err.to_string()
            .contains("invalid value 6000 for quota, valid values are [1, 5120]"),
        "{err}"
    );
    assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
    assert_eq!(backend.calls().total(), 0);
}

#[tokio::test]
async fn create_without_options_names_the_account() {
    let backend = Arc::new(InMemoryBackend::new().with_account(ACCOUNT, KEY));
    let driver = driver(&backend);

    let err = driver
        .create_share(
            &driver.context(),
            &ShareIdentity::new(ACCOUNT, "pvc-1"),
            &AccountKey::from(KEY),
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "shareOptions of account(unittest) is nil");
    assert!(matches!(err, ProvisionError::MissingOptions { .. }));
    assert_eq!(backend.calls().total(), 0);
}

#[tokio::test]
async fn share_lifecycle_from_volume_handle() {
    let backend = Arc::new(InMemoryBackend::new().with_account(ACCOUNT, KEY));
    let driver = driver(&backend);
    let ctx = driver.context();
    let key = AccountKey::from(KEY);

    let id = ShareIdentity::from_volume_handle("rg#unittest#pvc-4c2f").unwrap();
    let options = ShareOptions::with_size(100);

    driver.create_share(&ctx, &id, &key, Some(&options)).await.unwrap();
    driver.create_share(&ctx, &id, &key, Some(&options)).await.unwrap();
    assert_eq!(backend.share_quota(ACCOUNT, "pvc-4c2f"), Some(100));

    driver.resize_share(&ctx, &id, &key, 200).await.unwrap();
    assert_eq!(backend.share_quota(ACCOUNT, "pvc-4c2f"), Some(200));

    driver.resize_share(&ctx, &id, &key, 150).await.unwrap();
    assert_eq!(backend.share_quota(ACCOUNT, "pvc-4c2f"), Some(200));

    driver.delete_share(&ctx, &id, &key).await.unwrap();
    driver.delete_share(&ctx, &id, &key).await.unwrap();
    assert_eq!(backend.share_quota(ACCOUNT, "pvc-4c2f"), None);
}

#[tokio::test]
async fn transient_backend_failure_is_retried() {
    let backend = Arc::new(InMemoryBackend::new().with_account(ACCOUNT, KEY));
    backend.fail_next(
        BackendOp::Create,
        BackendError::unavailable("ServerBusy: The server is currently unable to receive requests."),
    );
    let driver = driver(&backend);

    driver
        .create_share(
            &OperationContext::new(),
            &ShareIdentity::new(ACCOUNT, "pvc-1"),
            &AccountKey::from(KEY),
            Some(&ShareOptions::with_size(5)),
        )
        .await
        .unwrap();

    assert_eq!(backend.share_quota(ACCOUNT, "pvc-1"), Some(5));
    assert_eq!(backend.calls().create, 2);
}

#[tokio::test]
async fn cancelled_operation_is_not_success() {
    let backend = Arc::new(InMemoryBackend::new().with_account(ACCOUNT, KEY));
    let driver = driver(&backend);
    let token = CancellationToken::new();
    token.cancel();

    let err = driver
        .create_share(
            &driver.context().with_cancellation(token),
            &ShareIdentity::new(ACCOUNT, "pvc-1"),
            &AccountKey::from(KEY),
            Some(&ShareOptions::with_size(5)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(backend.share_quota(ACCOUNT, "pvc-1"), None);
}

#[tokio::test]
async fn mount_lifecycle_in_degraded_mode() {
    let backend = Arc::new(InMemoryBackend::new());
    let driver = driver(&backend);
    let tmp = tempfile::tempdir().unwrap();
    let staging = tmp.path().join("plugins/file.csi.azure.com/pv/pvc-1/globalmount");
    let publish = tmp.path().join("pods/uid/volumes/pvc-1/mount");

    let stage_target = MountTarget::new(&staging, "cifs")
        .with_options(["dir_mode=0777", "file_mode=0777", "vers=3.0"])
        .with_sensitive_options(["username=unittest", "password=secret"]);
    driver
        .stage_volume("//unittest.file.core.windows.net/pvc-1", &stage_target)
        .await
        .unwrap();
    assert!(staging.is_dir());

    driver
        .publish_volume(&staging, &MountTarget::new(&publish, ""), true)
        .await
        .unwrap();
    assert!(publish.is_dir());

    assert_eq!(
        driver.get_volume_usage(&publish).await.unwrap(),
        VolumeUsage::default()
    );

    driver.unpublish_volume(&publish).await.unwrap();
    assert!(!publish.exists());
    driver.unstage_volume(&staging).await.unwrap();
    assert!(!staging.exists());

    driver.unpublish_volume(&publish).await.unwrap();
    driver.unstage_volume(&staging).await.unwrap();

    let err = driver.get_volume_usage(&publish).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StatUnavailable);
}

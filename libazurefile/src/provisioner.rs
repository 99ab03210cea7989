//! Share provisioning: idempotent create, delete and resize.
//!
//! Every operation validates its input before a backend session is opened,
//! so malformed requests fail fast with an actionable error and leave no
//! partial backend state.  Backend calls run under the caller's
//! [`OperationContext`]; transient failures are retried with bounded backoff,
//! and a cancelled or timed-out call is reported as such, never as success.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backend::{BackendClient, BackendError, BackendErrorKind, ShareSession};
use crate::config::RetryPolicy;
use crate::error::ProvisionError;
use crate::naming;
use crate::quota::QuotaPolicy;
use crate::types::{AccountKey, ShareIdentity, ShareOptions};

/// Cancellation and deadline supplied by the caller for one operation.
///
/// The timeout applies to each backend call individually.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Why a backend call did not produce a value.
enum CallFailure {
    Backend(BackendError),
    Cancelled,
    TimedOut(Duration),
}

impl CallFailure {
    fn into_error<W>(self, operation: &'static str, share: &str, wrap: W) -> ProvisionError
    where
        W: FnOnce(BackendError) -> ProvisionError,
    {
        match self {
            Self::Backend(source) => wrap(source),
            Self::Cancelled => ProvisionError::Cancelled {
                operation,
                share: share.to_owned(),
            },
            Self::TimedOut(after) => ProvisionError::TimedOut {
                operation,
                share: share.to_owned(),
                after,
            },
        }
    }
}

async fn bounded<T>(timeout: Option<Duration>, fut: impl Future<Output = T>) -> Result<T, Duration> {
    match timeout {
        Some(after) => tokio::time::timeout(after, fut).await.map_err(|_| after),
        None => Ok(fut.await),
    }
}

/// Orchestrates share capacity operations against a [`BackendClient`].
pub struct ShareProvisioner {
    backend: Arc<dyn BackendClient>,
    quota: QuotaPolicy,
    retry: RetryPolicy,
}

impl ShareProvisioner {
    pub fn new(backend: Arc<dyn BackendClient>, quota: QuotaPolicy) -> Self {
        Self {
            backend,
            quota,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn quota_policy(&self) -> &QuotaPolicy {
        &self.quota
    }

    /// Create the share described by `identity`.
    ///
    /// A share that already exists counts as success.
    #[instrument(skip_all, fields(account = %identity.account_name, share = %identity.share_name))]
    pub async fn create_share(
        &self,
        ctx: &OperationContext,
        identity: &ShareIdentity,
        key: &AccountKey,
        options: Option<&ShareOptions>,
    ) -> Result<(), ProvisionError> {
        let options = options.ok_or_else(|| ProvisionError::MissingOptions {
            account: identity.account_name.clone(),
        })?;
        naming::validate_account_name(&identity.account_name)?;
        naming::validate_share_name(&identity.share_name)?;
        self.check_quota(&identity.share_name, options.requested_gib)?;

        let session = self.open_session(ctx, identity, key).await?;
        let session = session.as_ref();
        let share = identity.share_name.as_str();

        match self
            .call(ctx, "create", share, move || {
                session.create_file_share(share, options)
            })
            .await
        {
            Ok(()) => {
                info!(
                    requested_gib = options.requested_gib,
                    protocol = ?options.protocol,
                    "file share created"
                );
                Ok(())
            }
            Err(CallFailure::Backend(e)) if e.kind == BackendErrorKind::AlreadyExists => {
                debug!(error = %e, "file share already exists");
                Ok(())
            }
            Err(failure) => Err(failure.into_error("create", share, |source| {
                ProvisionError::BackendCreateFailed {
                    share: share.to_owned(),
                    source,
                }
            })),
        }
    }

    /// Delete the share described by `identity`.
    ///
    /// A share that is already gone counts as success.
    #[instrument(skip_all, fields(account = %identity.account_name, share = %identity.share_name))]
    pub async fn delete_share(
        &self,
        ctx: &OperationContext,
        identity: &ShareIdentity,
        key: &AccountKey,
    ) -> Result<(), ProvisionError> {
        naming::validate_account_name(&identity.account_name)?;
        naming::validate_share_name(&identity.share_name)?;

        let session = self.open_session(ctx, identity, key).await?;
        let session = session.as_ref();
        let share = identity.share_name.as_str();

        match self
            .call(ctx, "delete", share, move || session.delete_file_share(share))
            .await
        {
            Ok(()) => {
                info!("file share deleted");
                Ok(())
            }
            Err(CallFailure::Backend(e)) if e.kind == BackendErrorKind::NotFound => {
                debug!(error = %e, "file share already absent");
                Ok(())
            }
            Err(failure) => Err(failure.into_error("delete", share, |source| {
                ProvisionError::BackendDeleteFailed {
                    share: share.to_owned(),
                    source,
                }
            })),
        }
    }

    /// Grow the share quota to `requested_gib`.
    ///
    /// The current quota is re-read from the backend on every call.  Requests
    /// at or below it succeed without touching the backend: shares are never
    /// shrunk.
    #[instrument(skip_all, fields(account = %identity.account_name, share = %identity.share_name, requested_gib = requested_gib))]
    pub async fn resize_share(
        &self,
        ctx: &OperationContext,
        identity: &ShareIdentity,
        key: &AccountKey,
        requested_gib: i64,
    ) -> Result<(), ProvisionError> {
        naming::validate_account_name(&identity.account_name)?;
        let share = identity.share_name.as_str();

        // No share can grow past the ceiling, whatever its name or current size.
        if requested_gib > self.quota.max_gib() {
            self.check_quota(share, requested_gib)?;
        }
        naming::validate_share_name(share)?;

        let session = self.open_session(ctx, identity, key).await?;
        let session = session.as_ref();

        let current_gib = self
            .call(ctx, "get quota", share, move || session.get_share_quota(share))
            .await
            .map_err(|failure| {
                failure.into_error("get quota", share, |source| {
                    ProvisionError::BackendQueryFailed {
                        share: share.to_owned(),
                        source,
                    }
                })
            })?;

        if !self.quota.needs_growth(current_gib, requested_gib) {
            warn!(
                current_gib,
                "file share size is already greater or equal than requested size"
            );
            return Ok(());
        }
        self.check_quota(share, requested_gib)?;

        self.call(ctx, "resize", share, move || {
            session.resize_file_share(share, requested_gib)
        })
        .await
        .map_err(|failure| {
            failure.into_error("resize", share, |source| {
                ProvisionError::BackendResizeFailed {
                    share: share.to_owned(),
                    requested: requested_gib,
                    min: self.quota.min_gib(),
                    max: self.quota.max_gib(),
                    source,
                }
            })
        })?;

        info!(current_gib, "file share quota updated");
        Ok(())
    }

    fn check_quota(&self, share: &str, requested_gib: i64) -> Result<(), ProvisionError> {
        self.quota
            .validate(requested_gib)
            .map_err(|source| ProvisionError::QuotaExceeded {
                share: share.to_owned(),
                source,
            })
    }

    async fn open_session(
        &self,
        ctx: &OperationContext,
        identity: &ShareIdentity,
        key: &AccountKey,
    ) -> Result<Box<dyn ShareSession>, ProvisionError> {
        let backend = self.backend.as_ref();
        let account = identity.account_name.as_str();
        let share = identity.share_name.as_str();

        self.call(ctx, "open session", share, move || {
            backend.open_session(account, key)
        })
        .await
        .map_err(|failure| {
            failure.into_error("open session", share, |source| {
                ProvisionError::BackendSessionError {
                    account: account.to_owned(),
                    source,
                }
            })
        })
    }

    /// Run one backend call under `ctx`, retrying transient failures.
    async fn call<T, F, Fut>(
        &self,
        ctx: &OperationContext,
        operation: &'static str,
        share: &str,
        mut f: F,
    ) -> Result<T, CallFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt = 1;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(CallFailure::Cancelled),
                outcome = bounded(ctx.timeout, f()) => outcome,
            };

            match outcome {
                Err(after) => return Err(CallFailure::TimedOut(after)),
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) if err.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(operation, share, attempt, error = %err, ?delay, "transient backend failure, retrying");
                    tokio::select! {
                        biased;
                        _ = ctx.cancel.cancelled() => return Err(CallFailure::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Ok(Err(err)) => return Err(CallFailure::Backend(err)),
            }
        }
    }
}

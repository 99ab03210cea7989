//! In-process share backend.
//!
//! [`InMemoryBackend`] keeps accounts and share quotas in concurrent maps and
//! mimics the backend's error codes.  It records every call it receives and
//! can be told to fail upcoming calls, which makes it suitable both for local
//! runs without a storage account and for asserting call counts in tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::{BackendClient, BackendError, ShareSession};
use crate::types::{AccountKey, ShareOptions};

/// Backend entry points, used for call accounting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    OpenSession,
    Create,
    Delete,
    Resize,
    GetQuota,
}

/// Snapshot of how many times each entry point was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCalls {
    pub open_session: usize,
    pub create: usize,
    pub delete: usize,
    pub resize: usize,
    pub get_quota: usize,
}

impl BackendCalls {
    pub fn total(&self) -> usize {
        self.open_session + self.create + self.delete + self.resize + self.get_quota
    }

    /// Calls that change backend state.
    pub fn mutations(&self) -> usize {
        self.create + self.delete + self.resize
    }
}

#[derive(Default)]
struct State {
    /// Account name to key.
    accounts: DashMap<String, String>,
    /// `(account, share)` to quota in GiB.
    shares: DashMap<(String, String), i64>,
    calls: DashMap<BackendOp, usize>,
    faults: DashMap<BackendOp, VecDeque<BackendError>>,
}

impl State {
    /// Record a call to `op` and return the injected failure, if any.
    fn enter(&self, op: BackendOp) -> Result<(), BackendError> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.faults.get_mut(&op).and_then(|mut q| q.pop_front()) {
            Some(err) => {
                debug!(?op, error = %err, "injected backend failure");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn count(&self, op: BackendOp) -> usize {
        self.calls.get(&op).map(|c| *c).unwrap_or(0)
    }
}

/// Concurrent in-memory [`BackendClient`].
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a storage account.
    pub fn with_account(self, account: &str, key: &str) -> Self {
        self.state
            .accounts
            .insert(account.to_owned(), key.to_owned());
        self
    }

    /// Seed an existing share.
    pub fn with_share(self, account: &str, share: &str, quota_gib: i64) -> Self {
        self.state
            .shares
            .insert((account.to_owned(), share.to_owned()), quota_gib);
        self
    }

    /// Fail the next call to `op` with `err`.  Repeated calls queue up.
    pub fn fail_next(&self, op: BackendOp, err: BackendError) {
        self.state.faults.entry(op).or_default().push_back(err);
    }

    pub fn share_quota(&self, account: &str, share: &str) -> Option<i64> {
        self.state
            .shares
            .get(&(account.to_owned(), share.to_owned()))
            .map(|q| *q)
    }

    pub fn calls(&self) -> BackendCalls {
        BackendCalls {
            open_session: self.state.count(BackendOp::OpenSession),
            create: self.state.count(BackendOp::Create),
            delete: self.state.count(BackendOp::Delete),
            resize: self.state.count(BackendOp::Resize),
            get_quota: self.state.count(BackendOp::GetQuota),
        }
    }
}

#[async_trait]
impl BackendClient for InMemoryBackend {
    async fn open_session(
        &self,
        account: &str,
        key: &AccountKey,
    ) -> Result<Box<dyn ShareSession>, BackendError> {
        self.state.enter(BackendOp::OpenSession)?;
        match self.state.accounts.get(account) {
            None => Err(BackendError::not_found(format!(
                "StorageAccountNotFound: storage account {account} not found"
            ))),
            Some(expected) if expected.as_str() != key.expose() => Err(BackendError::rejected(
                "AuthenticationFailed: server failed to authenticate the request",
            )),
            Some(_) => Ok(Box::new(InMemorySession {
                state: Arc::clone(&self.state),
                account: account.to_owned(),
            })),
        }
    }
}

struct InMemorySession {
    state: Arc<State>,
    account: String,
}

impl InMemorySession {
    fn key(&self, name: &str) -> (String, String) {
        (self.account.clone(), name.to_owned())
    }
}

fn share_not_found() -> BackendError {
    BackendError::not_found("ShareNotFound: The specified share does not exist.")
}

#[async_trait]
impl ShareSession for InMemorySession {
    async fn create_file_share(
        &self,
        name: &str,
        options: &ShareOptions,
    ) -> Result<(), BackendError> {
        self.state.enter(BackendOp::Create)?;
        match self.state.shares.entry(self.key(name)) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(BackendError::already_exists(
                "ShareAlreadyExists: The specified share already exists.",
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(options.requested_gib);
                Ok(())
            }
        }
    }

    async fn delete_file_share(&self, name: &str) -> Result<(), BackendError> {
        self.state.enter(BackendOp::Delete)?;
        self.state
            .shares
            .remove(&self.key(name))
            .map(|_| ())
            .ok_or_else(share_not_found)
    }

    async fn resize_file_share(&self, name: &str, size_gib: i64) -> Result<(), BackendError> {
        self.state.enter(BackendOp::Resize)?;
        let mut quota = self
            .state
            .shares
            .get_mut(&self.key(name))
            .ok_or_else(share_not_found)?;
        *quota = size_gib;
        Ok(())
    }

    async fn get_share_quota(&self, name: &str) -> Result<i64, BackendError> {
        self.state.enter(BackendOp::GetQuota)?;
        self.state
            .shares
            .get(&self.key(name))
            .map(|q| *q)
            .ok_or_else(share_not_found)
    }
}

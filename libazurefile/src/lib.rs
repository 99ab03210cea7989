//! # libazurefile: network file share driver core
//!
//! `libazurefile` provisions, resizes and removes remote file shares and
//! drives their mount lifecycle on a host (stage, publish, unpublish,
//! unstage) on behalf of a container orchestrator.  The RPC surface, secret
//! retrieval and metrics live outside this crate; the remote storage API and
//! OS mount syscalls are injected through capability traits.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Data model: `ShareIdentity`, `ShareOptions`, `MountTarget`, usage. |
//! | [`error`] | `ProvisionError`, `MountError` and the shared `ErrorKind`. |
//! | [`quota`] | [`QuotaPolicy`] range checks and grow-only resize decisions. |
//! | [`naming`] | Account and share name rules. |
//! | [`backend`] | [`BackendClient`] / [`ShareSession`] traits and an in-memory backend. |
//! | [`provisioner`] | [`ShareProvisioner`]: idempotent create, delete, resize. |
//! | [`mount`] | [`MountExecutor`] trait with host and degraded implementations. |
//! | [`coordinator`] | [`MountLifecycleCoordinator`]: the mount state machine. |
//! | [`config`] | [`DriverConfig`] from code, JSON or the environment. |
//! | [`driver`] | [`FileShareDriver`], the composition root. |

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod mount;
pub mod naming;
pub mod provisioner;
pub mod quota;
pub mod types;

pub use backend::{BackendClient, BackendError, BackendErrorKind, ShareSession};
pub use config::{ConfigError, DriverConfig, MountMode, RetryPolicy};
pub use coordinator::MountLifecycleCoordinator;
pub use driver::FileShareDriver;
pub use error::{ErrorKind, MountError, NameError, ProvisionError, QuotaError};
pub use mount::MountExecutor;
pub use provisioner::{OperationContext, ShareProvisioner};
pub use quota::QuotaPolicy;
pub use types::*;

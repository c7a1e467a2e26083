//! Federation engine behind the `kubectl-vaultlogin` credential plugin.
//!
//! An external identity (AppRole credentials or a projected service account
//! token) is exchanged for a Vault token, which in turn is used to issue a
//! short-lived bearer token for the downstream Kubernetes cluster. The result
//! is returned to kubectl as an `ExecCredential` on stdout.

pub mod context;
pub mod env;
pub mod error;
pub mod exchange;
pub mod exec;
pub mod federate;
#[cfg(any(test, feature = "testing"))]
pub mod placeholder;
pub mod strategy;
pub mod validate;
pub mod vault;

pub use context::{FederationSession, MIN_TOKEN_LIFETIME, SessionParams, resolve_cluster_name};
pub use env::EnvVars;
pub use error::{ErrorKind, FederationError, Result};
pub use exchange::{CredentialExchange, VaultExchange, issuance_mount};
pub use exec::ExecCredential;
pub use federate::{Federation, FederationArgs, Stage, federate};
#[cfg(any(test, feature = "testing"))]
pub use placeholder::PlaceholderExchange;
pub use strategy::{AppRoleLogin, LoginStrategy, ServiceAccountLogin};
pub use vault::{VaultClient, VaultSettings};

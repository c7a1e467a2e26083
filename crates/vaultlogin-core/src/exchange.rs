//! Backend seam of the federation: authenticate, then issue a cluster token.

use tracing::debug;

use crate::context::FederationSession;
use crate::env::EnvVars;
use crate::error::{FederationError, Result};
use crate::strategy::LoginStrategy;
use crate::vault::{VaultClient, VaultSettings};

/// Vault kubernetes secrets engines are mounted per cluster under this base.
pub const KUBERNETES_SECRETS_BASE: &str = "kubernetes";

/// Mount of the secrets engine that issues tokens for `cluster_name`.
///
/// Derived from the resolved cluster name only, so callers cannot point
/// issuance at another cluster's policy.
pub fn issuance_mount(cluster_name: &str) -> String {
    format!("{KUBERNETES_SECRETS_BASE}/{cluster_name}")
}

/// Exchanges a workload identity for a downstream bearer token.
pub trait CredentialExchange {
    /// Logs in with `strategy` and keeps the resulting backend session.
    fn authenticate(&mut self, strategy: &LoginStrategy, session: &FederationSession) -> Result<()>;

    /// Issues a bearer token for `session.cluster_name` using the
    /// authenticated backend session.
    fn issue(&mut self, session: &FederationSession) -> Result<String>;
}

/// Production exchange backed by a live Vault server.
#[derive(Debug)]
pub struct VaultExchange {
    settings: VaultSettings,
    client: Option<VaultClient>,
}

impl VaultExchange {
    pub fn new(settings: VaultSettings) -> Self {
        Self {
            settings,
            client: None,
        }
    }

    pub fn from_env(env: &EnvVars) -> Self {
        Self::new(VaultSettings::from_env(env))
    }
}

impl CredentialExchange for VaultExchange {
    fn authenticate(&mut self, strategy: &LoginStrategy, session: &FederationSession) -> Result<()> {
        let mut client = VaultClient::new(session.vault_address.clone(), &self.settings)?;
        strategy.login(&mut client, &session.params)?;
        debug!(strategy = strategy.name(), mount = strategy.mount(), "vault login succeeded");
        self.client = Some(client);
        Ok(())
    }

    fn issue(&mut self, session: &FederationSession) -> Result<String> {
        let role = &session.params.issuance_role;
        let cluster = &session.cluster_name;
        let mount = issuance_mount(cluster);
        let context = format!("cluster={cluster}, role={role}, mount=/{mount}");
        let client = self
            .client
            .as_ref()
            .filter(|client| client.is_authenticated())
            .ok_or_else(|| {
                FederationError::backend(
                    "vault kubernetes credentials",
                    context.clone(),
                    "no authenticated vault session",
                )
            })?;
        let token = client
            .generate_kubernetes_credentials(&mount, role, &self.settings.kubernetes_namespace)
            .map_err(|message| {
                FederationError::backend("vault kubernetes credentials", context.clone(), message)
            })?;
        if token.is_empty() {
            return Err(FederationError::backend(
                "vault kubernetes credentials",
                context,
                "vault returned an empty service_account_token",
            ));
        }
        Ok(token)
    }
}

//! Environment snapshot consumed by the federation engine.
//!
//! The process environment is captured once at start-up and threaded through
//! by reference so nothing below the CLI reads `std::env` directly.

use std::collections::HashMap;

/// ExecCredential supplied by kubectl.
pub const KUBERNETES_EXEC_INFO: &str = "KUBERNETES_EXEC_INFO";
pub const APPROLE_ROLE_ID: &str = "APPROLE_ROLE_ID";
pub const APPROLE_SECRET_ID: &str = "APPROLE_SECRET_ID";
/// Role in Vault's kubernetes auth backend used for the service-account login.
pub const VAULT_K8S_LOGIN_ROLE: &str = "VAULT_K8S_LOGIN_ROLE";
/// Role in Vault's kubernetes secrets engine used to issue bearer tokens.
pub const VAULT_K8S_SECRET_ROLE: &str = "VAULT_K8S_SECRET_ROLE";
pub const TOKEN_DURATION: &str = "TOKEN_DURATION";
pub const VAULT_AUTH_MOUNT: &str = "VAULT_AUTH_MOUNT";
pub const VAULT_NAMESPACE: &str = "VAULT_NAMESPACE";
pub const VAULT_CACERT: &str = "VAULT_CACERT";
pub const VAULT_K8S_NAMESPACE: &str = "VAULT_K8S_NAMESPACE";

/// Immutable view over environment variables. Empty values read as unset.
#[derive(Clone, Debug, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the current process environment, skipping non UTF-8 entries.
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }
}

impl<K, V> FromIterator<(K, V)> for EnvVars
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

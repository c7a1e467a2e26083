//! The two ways this plugin proves its identity to Vault.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::context::SessionParams;
use crate::env::{APPROLE_ROLE_ID, APPROLE_SECRET_ID, EnvVars};
use crate::error::{FederationError, Result};
use crate::validate::is_absolute_path;
use crate::vault::VaultClient;

pub const DEFAULT_APPROLE_MOUNT: &str = "/approle";
pub const DEFAULT_PSAT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
/// Kubernetes auth mounts must live under this prefix.
pub const KUBERNETES_AUTH_PREFIX: &str = "/kubernetes";

/// Login strategy, selected once per invocation.
#[derive(Clone, Debug)]
pub enum LoginStrategy {
    AppRole(AppRoleLogin),
    ServiceAccount(ServiceAccountLogin),
}

impl LoginStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AppRole(_) => "approle",
            Self::ServiceAccount(_) => "psat",
        }
    }

    pub fn mount(&self) -> &str {
        match self {
            Self::AppRole(login) => &login.mount,
            Self::ServiceAccount(login) => &login.mount,
        }
    }

    /// Checks path grammar without touching the filesystem or network.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::AppRole(login) => login.validate(),
            Self::ServiceAccount(login) => login.validate(),
        }
    }

    /// Authenticates `client`, leaving it bound to the new Vault token.
    pub fn login(&self, client: &mut VaultClient, params: &SessionParams) -> Result<()> {
        match self {
            Self::AppRole(login) => login.login(client),
            Self::ServiceAccount(login) => login.login(client, params),
        }
    }
}

/// AppRole login. The role and secret identifiers come from the environment
/// so they never show up in process listings or shell history.
#[derive(Clone)]
pub struct AppRoleLogin {
    pub mount: String,
    role_id: Option<String>,
    secret_id: Option<String>,
}

impl AppRoleLogin {
    pub fn from_env(mount: impl Into<String>, env: &EnvVars) -> Self {
        Self {
            mount: mount.into(),
            role_id: env.get(APPROLE_ROLE_ID).map(str::to_string),
            secret_id: env.get(APPROLE_SECRET_ID).map(str::to_string),
        }
    }

    fn validate(&self) -> Result<()> {
        if !is_absolute_path(&self.mount) {
            return Err(FederationError::config(format!(
                "vault-approle-auth-mount must be of a form of an absolute path with alphanumeric \
                 path elements, ex. /approle: {}",
                self.mount
            )));
        }
        Ok(())
    }

    fn login(&self, client: &mut VaultClient) -> Result<()> {
        let missing = |name: &str| FederationError::config(format!("{name} is unset or empty"));
        let role_id = self.role_id.as_deref().ok_or_else(|| missing(APPROLE_ROLE_ID))?;
        let secret_id = self
            .secret_id
            .as_deref()
            .ok_or_else(|| missing(APPROLE_SECRET_ID))?;
        client.approle_login(&self.mount, role_id, secret_id)
    }
}

impl fmt::Debug for AppRoleLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppRoleLogin")
            .field("mount", &self.mount)
            .field("role_id", &self.role_id.as_ref().map(|_| "<redacted>"))
            .field("secret_id", &self.secret_id.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Kubernetes auth login with a projected service account token read from disk.
#[derive(Clone, Debug)]
pub struct ServiceAccountLogin {
    pub mount: String,
    pub token_path: PathBuf,
}

impl ServiceAccountLogin {
    pub fn new(mount: impl Into<String>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            mount: mount.into(),
            token_path: token_path.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if !is_absolute_path(&self.mount) {
            return Err(FederationError::config(format!(
                "vault-kubernetes-auth-mount must be of a form of an absolute path with \
                 alphanumeric path elements, ex. /kubernetes/argocd: {}",
                self.mount
            )));
        }
        if !self.mount.starts_with(KUBERNETES_AUTH_PREFIX) {
            return Err(FederationError::config(format!(
                "malformed vault authentication mount path: {}. The value should be in the form \
                 of {KUBERNETES_AUTH_PREFIX}*",
                self.mount
            )));
        }
        if !self.token_path.is_absolute() {
            return Err(FederationError::config(format!(
                "psat-path must be an absolute path to a token file: {}",
                self.token_path.display()
            )));
        }
        Ok(())
    }

    fn login(&self, client: &mut VaultClient, params: &SessionParams) -> Result<()> {
        let jwt = fs::read_to_string(&self.token_path).map_err(|source| FederationError::Io {
            what: "projected service account token",
            path: self.token_path.clone(),
            source,
        })?;
        client.kubernetes_login(&self.mount, &params.login_role, jwt.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn approle_mount_must_be_absolute() {
        let login = LoginStrategy::AppRole(AppRoleLogin::from_env("approle", &EnvVars::new()));
        let err = login.validate().unwrap_err();
        assert!(err.to_string().contains("vault-approle-auth-mount"));

        let login = LoginStrategy::AppRole(AppRoleLogin::from_env(
            DEFAULT_APPROLE_MOUNT,
            &EnvVars::new(),
        ));
        assert!(login.validate().is_ok());
        assert_eq!(login.name(), "approle");
        assert_eq!(login.mount(), "/approle");
    }

    #[test]
    fn kubernetes_mount_grammar() {
        let login = LoginStrategy::ServiceAccount(ServiceAccountLogin::new("wrong", DEFAULT_PSAT_PATH));
        let err = login.validate().unwrap_err();
        assert!(err.to_string().contains("absolute path"));

        let login = LoginStrategy::ServiceAccount(ServiceAccountLogin::new("/approle", DEFAULT_PSAT_PATH));
        let err = login.validate().unwrap_err();
        assert!(err.to_string().contains("malformed vault authentication mount path"));

        let login = LoginStrategy::ServiceAccount(ServiceAccountLogin::new(
            "/kubernetes/argocd",
            DEFAULT_PSAT_PATH,
        ));
        assert!(login.validate().is_ok());
        assert_eq!(login.name(), "psat");
    }

    #[test]
    fn token_path_must_be_absolute() {
        let login = ServiceAccountLogin::new("/kubernetes/argocd", "token");
        let err = login.validate().unwrap_err();
        assert!(err.to_string().contains("psat-path"));
    }

    #[test]
    fn approle_credentials_are_redacted() {
        let env = EnvVars::from_iter([(APPROLE_ROLE_ID, "role-123"), (APPROLE_SECRET_ID, "s3cr3t")]);
        let rendered = format!("{:?}", AppRoleLogin::from_env("/approle", &env));
        assert!(!rendered.contains("role-123"));
        assert!(!rendered.contains("s3cr3t"));
    }

    #[test]
    fn approle_login_requires_credentials() {
        let address = url::Url::parse("https://vault.example.com:8200").unwrap();
        let mut client = VaultClient::new(address, &Default::default()).unwrap();
        let login = LoginStrategy::AppRole(AppRoleLogin::from_env("/approle", &EnvVars::new()));
        let err = login.login(&mut client, &SessionParams::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains(APPROLE_ROLE_ID));
        assert!(!client.is_authenticated());
    }

    #[test]
    fn unreadable_token_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let address = url::Url::parse("https://vault.example.com:8200").unwrap();
        let mut client = VaultClient::new(address, &Default::default()).unwrap();
        let login = LoginStrategy::ServiceAccount(ServiceAccountLogin::new(
            "/kubernetes/argocd",
            dir.path().join("missing-token"),
        ));
        let err = login.login(&mut client, &SessionParams::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}

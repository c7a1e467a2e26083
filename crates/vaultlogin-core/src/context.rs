//! Per-invocation federation context: which downstream cluster, which Vault
//! roles and how long the issued credential is advertised to live.

use std::fmt;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{info, warn};
use url::Url;

use crate::env::{EnvVars, TOKEN_DURATION, VAULT_K8S_LOGIN_ROLE, VAULT_K8S_SECRET_ROLE};
use crate::error::{FederationError, Result};
use crate::exec::ExecCredential;
use crate::validate::is_valid_hostname;

pub const DEFAULT_LOGIN_ROLE: &str = "kvl-login";
pub const DEFAULT_ISSUANCE_ROLE: &str = "kvl-edit-role";
/// Vault refuses kubernetes credentials with a TTL under ten minutes, so the
/// advertised lifetime never drops below fifteen.
pub const MIN_TOKEN_LIFETIME: Duration = Duration::from_secs(15 * 60);

/// Role names and token lifetime resolved from environment overrides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionParams {
    pub login_role: String,
    pub issuance_role: String,
    pub lifetime: Duration,
}

impl SessionParams {
    pub fn from_env(env: &EnvVars) -> Result<Self> {
        Ok(Self {
            login_role: env.get_or(VAULT_K8S_LOGIN_ROLE, DEFAULT_LOGIN_ROLE).to_string(),
            issuance_role: env
                .get_or(VAULT_K8S_SECRET_ROLE, DEFAULT_ISSUANCE_ROLE)
                .to_string(),
            lifetime: resolve_lifetime(env.get(TOKEN_DURATION))?,
        })
    }
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            login_role: DEFAULT_LOGIN_ROLE.to_string(),
            issuance_role: DEFAULT_ISSUANCE_ROLE.to_string(),
            lifetime: MIN_TOKEN_LIFETIME,
        }
    }
}

/// Everything a federation run accumulates between validation and emission.
#[derive(Clone)]
pub struct FederationSession {
    pub vault_address: Url,
    pub cluster_name: String,
    pub params: SessionParams,
    /// Request received from kubectl, echoed back in the response.
    pub credential: ExecCredential,
    /// Bearer token, set once issuance succeeded.
    pub token: Option<String>,
}

impl FederationSession {
    /// Resolves session parameters, the inbound ExecCredential and the
    /// downstream cluster name.
    pub fn build(vault_address: Url, cluster_override: Option<&str>, env: &EnvVars) -> Result<Self> {
        let params = SessionParams::from_env(env)?;
        let credential = ExecCredential::from_env(env)?;
        let cluster_name = resolve_cluster_name(&credential, cluster_override)?;
        Ok(Self {
            vault_address,
            cluster_name,
            params,
            credential,
            token: None,
        })
    }
}

impl fmt::Debug for FederationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederationSession")
            .field("vault_address", &self.vault_address.as_str())
            .field("cluster_name", &self.cluster_name)
            .field("params", &self.params)
            .field("token_issued", &self.token.is_some())
            .finish()
    }
}

/// Parses a lifetime override such as `30m` or `1h30m`, clamping it to
/// [`MIN_TOKEN_LIFETIME`]. Negative values clamp like any other short value.
/// An unparsable override, or one whose expiry cannot be represented, is fatal.
pub fn resolve_lifetime(raw: Option<&str>) -> Result<Duration> {
    let Some(raw) = raw else {
        return Ok(MIN_TOKEN_LIFETIME);
    };
    let trimmed = raw.trim();
    let (negative, magnitude) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let parsed = humantime::parse_duration(magnitude).map_err(|err| {
        FederationError::config(format!(
            "{TOKEN_DURATION} must be a duration such as 30m or 1h: {raw}: {err}"
        ))
    })?;
    if negative || parsed < MIN_TOKEN_LIFETIME {
        warn!(
            requested = %raw,
            "token lifetime below the 15m minimum, using the minimum instead"
        );
        return Ok(MIN_TOKEN_LIFETIME);
    }
    let representable = time::Duration::try_from(parsed)
        .ok()
        .and_then(|lifetime| OffsetDateTime::now_utc().checked_add(lifetime))
        .is_some();
    if !representable {
        return Err(FederationError::config(format!(
            "{TOKEN_DURATION} {raw} is out of range for an expiration timestamp"
        )));
    }
    Ok(parsed)
}

/// Determines the downstream cluster name.
///
/// When the ExecCredential describes the cluster, the leftmost label of its
/// server hostname wins and `override_name` is ignored. Otherwise the override
/// is used, provided it is a valid hostname.
pub fn resolve_cluster_name(
    credential: &ExecCredential,
    override_name: Option<&str>,
) -> Result<String> {
    let override_name = override_name.filter(|name| !name.is_empty());
    match credential.spec.cluster.as_ref() {
        Some(cluster) => {
            let name = cluster_name_from_server(&cluster.server)?;
            if let Some(discarded) = override_name.filter(|value| *value != name) {
                info!(
                    cluster = %name,
                    discarded = %discarded,
                    "cluster name taken from ExecCredential; cluster-name flag ignored"
                );
            }
            Ok(name)
        }
        None => {
            let name = override_name.ok_or_else(|| {
                FederationError::config(
                    "cluster info (ExecCredential.spec.cluster) not provided as part of the \
                     ExecCredential and cluster-name flag is unset or empty",
                )
            })?;
            if !is_valid_hostname(name) {
                return Err(FederationError::config(format!(
                    "cluster-name must be a string that is a valid dns name: {name}"
                )));
            }
            Ok(name.to_string())
        }
    }
}

fn cluster_name_from_server(server: &str) -> Result<String> {
    let url = Url::parse(server).map_err(|err| {
        FederationError::config(format!(
            "cannot parse cluster server url {server:?} from ExecCredential: {err}"
        ))
    })?;
    let host = url.host_str().filter(|host| !host.is_empty()).ok_or_else(|| {
        FederationError::config(format!(
            "cluster server url {server:?} from ExecCredential has no host"
        ))
    })?;
    let label = host.split('.').next().unwrap_or(host);
    if !is_valid_hostname(label) {
        return Err(FederationError::config(format!(
            "cluster name derived from {server:?} must be a valid dns label: {label}"
        )));
    }
    Ok(label.to_string())
}

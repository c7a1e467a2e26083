//! `client.authentication.k8s.io` ExecCredential request/response codec.
//!
//! kubectl hands the request to the plugin through `KUBERNETES_EXEC_INFO` and
//! reads the response from stdout. Fields this plugin does not interpret are
//! carried through untouched so the response mirrors the request.

use std::io::Write;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::env::{EnvVars, KUBERNETES_EXEC_INFO};
use crate::error::{FederationError, Result};

pub const EXEC_CREDENTIAL_KIND: &str = "ExecCredential";
pub const CLIENT_AUTHENTICATION_GROUP: &str = "client.authentication.k8s.io";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredential {
    pub kind: String,
    pub api_version: String,
    #[serde(default)]
    pub spec: ExecCredentialSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecCredentialStatus>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecCredentialSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<Cluster>,
    #[serde(default)]
    pub interactive: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Target cluster as described in the kubeconfig that invoked the plugin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub server: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredentialStatus {
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration_timestamp: Option<OffsetDateTime>,
    pub token: String,
}

impl ExecCredential {
    /// Reads the request kubectl placed in `KUBERNETES_EXEC_INFO`.
    pub fn from_env(env: &EnvVars) -> Result<Self> {
        let raw = env.get(KUBERNETES_EXEC_INFO).ok_or_else(|| {
            FederationError::config(format!(
                "kubectl-vaultlogin is a kubectl credential plugin and requires an ExecCredential \
                 to be provided in the {KUBERNETES_EXEC_INFO} env variable; exiting as the variable \
                 is unset or empty"
            ))
        })?;
        Self::decode(raw)
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let credential: Self = serde_json::from_str(raw)
            .map_err(|err| FederationError::Decode(format!("{err}; input={raw:?}")))?;
        if credential.kind != EXEC_CREDENTIAL_KIND {
            return Err(FederationError::Decode(format!(
                "unexpected kind {:?}, expected {EXEC_CREDENTIAL_KIND}",
                credential.kind
            )));
        }
        let group = credential.api_version.split('/').next().unwrap_or_default();
        if group != CLIENT_AUTHENTICATION_GROUP {
            return Err(FederationError::Decode(format!(
                "unsupported apiVersion {:?}",
                credential.api_version
            )));
        }
        Ok(credential)
    }

    /// Attaches the issued token, expiring `lifetime` after `now`.
    pub fn assemble(
        mut self,
        token: String,
        now: OffsetDateTime,
        lifetime: Duration,
    ) -> Result<Self> {
        // kubectl compares whole seconds; drop the sub-second part.
        let expires_at = time::Duration::try_from(lifetime)
            .ok()
            .and_then(|lifetime| now.checked_add(lifetime))
            .and_then(|at| OffsetDateTime::from_unix_timestamp(at.unix_timestamp()).ok())
            .ok_or_else(|| {
                FederationError::config(format!(
                    "token lifetime {} is out of range",
                    humantime::format_duration(lifetime)
                ))
            })?;
        self.status = Some(ExecCredentialStatus {
            expiration_timestamp: Some(expires_at),
            token,
        });
        Ok(self)
    }

    /// Serialises the credential as a single newline-terminated JSON line.
    ///
    /// The document is fully encoded before anything is written, so an
    /// encoding failure never leaves partial output behind.
    pub fn emit<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        let mut line = serde_json::to_vec(self).map_err(FederationError::Encode)?;
        line.push(b'\n');
        out.write_all(&line).map_err(FederationError::Emit)?;
        out.flush().map_err(FederationError::Emit)
    }
}

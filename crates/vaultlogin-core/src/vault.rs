//! Minimal HashiCorp Vault HTTP client covering the login and kubernetes
//! secrets engine endpoints used during federation.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::env::{EnvVars, VAULT_CACERT, VAULT_K8S_NAMESPACE, VAULT_NAMESPACE};
use crate::error::{FederationError, Result};

/// Hard ceiling for every Vault round trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_KUBERNETES_NAMESPACE: &str = "kube-priv";

/// Transport options for reaching Vault, read from the environment.
#[derive(Clone, Debug)]
pub struct VaultSettings {
    pub namespace: Option<String>,
    pub ca_bundle: Option<PathBuf>,
    pub kubernetes_namespace: String,
    pub timeout: Duration,
}

impl VaultSettings {
    pub fn from_env(env: &EnvVars) -> Self {
        Self {
            namespace: env.get(VAULT_NAMESPACE).map(str::to_string),
            ca_bundle: env.get(VAULT_CACERT).map(PathBuf::from),
            kubernetes_namespace: env
                .get_or(VAULT_K8S_NAMESPACE, DEFAULT_KUBERNETES_NAMESPACE)
                .to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self::from_env(&EnvVars::new())
    }
}

/// A session against one Vault server. Holds the client token once a login
/// succeeded.
pub struct VaultClient {
    http: Client,
    address: Url,
    namespace: Option<String>,
    timeout: Duration,
    token: Option<String>,
}

impl fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultClient")
            .field("address", &self.address.as_str())
            .field("namespace", &self.namespace)
            .field("timeout", &self.timeout)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl VaultClient {
    pub fn new(address: Url, settings: &VaultSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .timeout(settings.timeout);
        if let Some(path) = settings.ca_bundle.as_ref() {
            let pem = fs::read(path).map_err(|source| FederationError::Io {
                what: "vault CA bundle",
                path: path.clone(),
                source,
            })?;
            let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|err| {
                FederationError::config(format!(
                    "failed to parse {VAULT_CACERT} {}: {err}",
                    path.display()
                ))
            })?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }
        let http = builder.build().map_err(|err| {
            FederationError::config(format!("failure preparing vault client: {err}"))
        })?;
        Ok(Self {
            http,
            address,
            namespace: settings.namespace.clone(),
            timeout: settings.timeout,
            token: None,
        })
    }

    pub fn address(&self) -> &Url {
        &self.address
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// `POST auth/{mount}/login` with AppRole credentials.
    pub fn approle_login(&mut self, mount: &str, role_id: &str, secret_id: &str) -> Result<()> {
        let body = json!({ "role_id": role_id, "secret_id": secret_id });
        self.login(mount, body).map_err(|message| {
            FederationError::backend("vault approle login", format!("mount={mount}"), message)
        })
    }

    /// `POST auth/{mount}/login` presenting a service account JWT.
    pub fn kubernetes_login(&mut self, mount: &str, role: &str, jwt: &str) -> Result<()> {
        let body = json!({ "jwt": jwt, "role": role });
        self.login(mount, body).map_err(|message| {
            FederationError::backend(
                "vault kubernetes login",
                format!("mount={mount}, role={role}"),
                message,
            )
        })
    }

    /// `POST {mount}/creds/{role}` on a kubernetes secrets engine, returning
    /// the generated service account token.
    pub fn generate_kubernetes_credentials(
        &self,
        mount: &str,
        role: &str,
        kubernetes_namespace: &str,
    ) -> std::result::Result<String, String> {
        let path = format!("{}/creds/{role}", mount.trim_matches('/'));
        let body = json!({ "kubernetes_namespace": kubernetes_namespace });
        let response: SecretResponse<KubernetesCredentials> = self.call(Method::POST, &path, body)?;
        Ok(response.data.service_account_token)
    }

    fn login(&mut self, mount: &str, body: Value) -> std::result::Result<(), String> {
        let path = format!("auth/{}/login", mount.trim_matches('/'));
        let response: LoginResponse = self.call(Method::POST, &path, body)?;
        let token = response
            .auth
            .map(|auth| auth.client_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| "login response did not include auth.client_token".to_string())?;
        self.set_token(token);
        Ok(())
    }

    fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Value,
    ) -> std::result::Result<T, String> {
        let response = self.send(method, path, body)?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|err| self.transport_failure("reading vault response", &err))?;
        if !status.is_success() {
            return Err(describe_failure(status, &text));
        }
        serde_json::from_str(&text)
            .map_err(|err| format!("failed to decode vault response: {err}"))
    }

    fn send(&self, method: Method, path: &str, body: Value) -> std::result::Result<Response, String> {
        let url = format!(
            "{}/v1/{}",
            self.address.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut builder = self.http.request(method, url).json(&body);
        if let Some(token) = &self.token {
            builder = builder.header("X-Vault-Token", token);
        }
        if let Some(namespace) = &self.namespace {
            builder = builder.header("X-Vault-Namespace", namespace);
        }
        builder
            .send()
            .map_err(|err| self.transport_failure("vault request", &err))
    }

    fn transport_failure(&self, what: &str, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            format!(
                "{what} timed out after {}",
                humantime::format_duration(self.timeout)
            )
        } else {
            format!("{what} failed: {err}")
        }
    }
}

fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => format!("{status}: {}", parsed.errors.join("; ")),
        _ if body.trim().is_empty() => status.to_string(),
        _ => format!("{status}: {}", body.trim()),
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: Option<LoginAuth>,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
}

#[derive(Deserialize)]
struct SecretResponse<T> {
    data: T,
}

#[derive(Deserialize)]
struct KubernetesCredentials {
    service_account_token: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<String>,
}

//! Offline stand-in for Vault used to exercise the envelope pipeline.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Serialize;
use tracing::debug;

use crate::context::FederationSession;
use crate::error::{FederationError, Result};
use crate::exchange::CredentialExchange;
use crate::strategy::LoginStrategy;

const PLACEHOLDER_SIGNING_KEY: &[u8] = b"kubectl-vaultlogin-placeholder";
pub const PLACEHOLDER_SUBJECT: &str = "system:serviceaccount:kubectl-vaultlogin:placeholder";

/// Skips the backend entirely and issues a locally signed HS256 JWT.
#[derive(Debug, Default)]
pub struct PlaceholderExchange {
    authenticated_with: Option<&'static str>,
}

impl PlaceholderExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoding key matching the tokens this exchange issues.
    pub fn decoding_key() -> jsonwebtoken::DecodingKey {
        jsonwebtoken::DecodingKey::from_secret(PLACEHOLDER_SIGNING_KEY)
    }

    pub fn authenticated_with(&self) -> Option<&'static str> {
        self.authenticated_with
    }
}

#[derive(Serialize)]
struct PlaceholderClaims<'a> {
    sub: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

impl CredentialExchange for PlaceholderExchange {
    fn authenticate(&mut self, strategy: &LoginStrategy, _session: &FederationSession) -> Result<()> {
        debug!(strategy = strategy.name(), "placeholder exchange: skipping vault login");
        self.authenticated_with = Some(strategy.name());
        Ok(())
    }

    fn issue(&mut self, session: &FederationSession) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        let claims = PlaceholderClaims {
            sub: PLACEHOLDER_SUBJECT,
            aud: &session.cluster_name,
            iat: now,
            exp: now.saturating_add(session.params.lifetime.as_secs()),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(PLACEHOLDER_SIGNING_KEY),
        )
        .map_err(|err| {
            FederationError::backend(
                "placeholder token",
                format!("cluster={}", session.cluster_name),
                err.to_string(),
            )
        })
    }
}

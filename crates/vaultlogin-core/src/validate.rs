//! Input predicates applied before any file or network access.

use std::path::Path;

use url::Url;

use crate::error::{FederationError, Result};

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Accepts only a bare `https` origin: no path, query or fragment.
pub fn validate_vault_address(addr: &str) -> Result<Url> {
    let malformed = || FederationError::config(format!("mal formed vault-address: {addr}"));
    if addr.trim() != addr {
        return Err(malformed());
    }
    let url = Url::parse(addr).map_err(|_| malformed())?;
    if url.scheme() != "https" {
        return Err(FederationError::config(format!(
            "only https is allowed in vault-address: {addr}"
        )));
    }
    // `Url` always reports "/" for https, so inspect what follows the authority.
    let authority = match addr.split_once("://") {
        Some((_, rest)) if url.host_str().is_some_and(|host| !host.is_empty()) => rest,
        _ => return Err(malformed()),
    };
    if authority.contains('/') {
        return Err(FederationError::config(format!(
            "relative paths are not allowed in vault-address: {addr}"
        )));
    }
    if url.query().is_some() {
        return Err(FederationError::config(format!(
            "queries are not allowed in vault-address: {addr}"
        )));
    }
    if url.fragment().is_some() {
        return Err(FederationError::config(format!(
            "fragments are not allowed in vault-address: {addr}"
        )));
    }
    Ok(url)
}

pub fn is_absolute_path(path: &str) -> bool {
    Path::new(path).is_absolute()
}

/// DNS hostname grammar: dot separated labels of 1-63 alphanumerics or
/// hyphens that neither start nor end with a hyphen, at most 253 bytes overall.
/// A single trailing dot is tolerated.
pub fn is_valid_hostname(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_HOSTNAME_LEN {
        return false;
    }
    let name = name.strip_suffix('.').unwrap_or(name);
    !name.is_empty() && name.split('.').all(is_valid_label)
}

fn is_valid_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            label.len() <= MAX_LABEL_LEN
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}

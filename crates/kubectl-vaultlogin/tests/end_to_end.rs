use std::io::Write;

use clap::Parser;
use kubectl_vaultlogin::{BIN_NAME, Cli, execute};
use serde_json::Value;
use vaultlogin_core::env::KUBERNETES_EXEC_INFO;
use vaultlogin_core::{EnvVars, ErrorKind, FederationError, PlaceholderExchange};

const REQUEST: &str = r#"{"kind":"ExecCredential","apiVersion":"client.authentication.k8s.io/v1","spec":{"cluster":{"server":"https://k8s.example.com","config":null},"interactive":false}}"#;

fn run(argv: &[&str], env: &EnvVars) -> (anyhow::Result<()>, PlaceholderExchange, Vec<u8>) {
    let cli = Cli::try_parse_from(std::iter::once(BIN_NAME).chain(argv.iter().copied()))
        .expect("argv parses");
    let mut exchange = PlaceholderExchange::new();
    let mut out = Vec::new();
    let result = execute(&cli, env, &mut exchange, &mut out);
    (result, exchange, out)
}

fn federation_error(err: &anyhow::Error) -> &FederationError {
    err.downcast_ref::<FederationError>().expect("federation error")
}

#[test]
fn approle_emits_completed_exec_credential() {
    let env = EnvVars::new().with(KUBERNETES_EXEC_INFO, REQUEST);
    let (result, exchange, out) = run(
        &[
            "federate",
            "approle",
            "--vault-address=https://vault.example.com:8200",
        ],
        &env,
    );
    result.unwrap();
    assert_eq!(exchange.authenticated_with(), Some("approle"));

    let response: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(response["spec"]["cluster"]["server"], "https://k8s.example.com");
    assert!(response["spec"]["cluster"]["config"].is_null());
    assert_eq!(response["spec"]["interactive"], false);

    let token = response["status"]["token"].as_str().unwrap();
    assert!(!token.is_empty());
    assert_eq!(token.split('.').count(), 3);
    let expires = response["status"]["expirationTimestamp"].as_str().unwrap();
    assert!(expires.ends_with('Z'), "{expires}");
}

#[test]
fn psat_emits_completed_exec_credential() {
    let mut token_file = tempfile::NamedTempFile::new().unwrap();
    write!(token_file, "projected-token").unwrap();
    let token_path = token_file.path().to_str().unwrap();
    let env = EnvVars::new().with(KUBERNETES_EXEC_INFO, REQUEST);

    let (result, exchange, out) = run(
        &[
            "-v",
            "https://vault.example.com:8200",
            "federate",
            "psat",
            "-a",
            "/kubernetes/argocd",
            "-p",
            token_path,
        ],
        &env,
    );
    result.unwrap();
    assert_eq!(exchange.authenticated_with(), Some("psat"));
    let response: Value = serde_json::from_slice(&out).unwrap();
    assert!(!response["status"]["token"].as_str().unwrap().is_empty());
}

#[test]
fn cluster_flag_applies_without_descriptor() {
    let env = EnvVars::new().with(
        KUBERNETES_EXEC_INFO,
        r#"{"kind":"ExecCredential","apiVersion":"client.authentication.k8s.io/v1","spec":{"interactive":false}}"#,
    );
    let (result, _, out) = run(
        &[
            "federate",
            "approle",
            "-v",
            "https://vault.example.com:8200",
            "-c",
            "c1",
        ],
        &env,
    );
    result.unwrap();
    let response: Value = serde_json::from_slice(&out).unwrap();
    assert!(response["spec"].get("cluster").is_none());
}

#[test]
fn invalid_cluster_flag_is_rejected() {
    let env = EnvVars::new().with(
        KUBERNETES_EXEC_INFO,
        r#"{"kind":"ExecCredential","apiVersion":"client.authentication.k8s.io/v1","spec":{"interactive":false}}"#,
    );
    let (result, exchange, out) = run(&["federate", "approle", "-c", "not a hostname"], &env);
    let err = result.unwrap_err();
    assert_eq!(federation_error(&err).kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("valid dns name"), "{err}");
    assert!(exchange.authenticated_with().is_none());
    assert!(out.is_empty());
}

#[test]
fn missing_envelope_is_a_configuration_error() {
    let (result, exchange, out) = run(
        &["federate", "approle", "-v", "https://vault.example.com:8200"],
        &EnvVars::new(),
    );
    let err = result.unwrap_err();
    assert_eq!(federation_error(&err).kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("unset or empty"), "{err}");
    assert!(exchange.authenticated_with().is_none());
    assert!(out.is_empty());
}

#[test]
fn psat_requires_a_mount() {
    let err = Cli::try_parse_from([BIN_NAME, "federate", "psat"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
}

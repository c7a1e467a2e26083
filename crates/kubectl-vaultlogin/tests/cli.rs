use assert_cmd::Command;
use predicates::prelude::*;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const REQUEST: &str = r#"{"kind":"ExecCredential","apiVersion":"client.authentication.k8s.io/v1","spec":{"cluster":{"server":"https://k8s.example.com","config":null},"interactive":false}}"#;

fn plugin() -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kubectl-vaultlogin");
    cmd.env_clear();
    cmd
}

#[test]
fn help_lists_subcommands() -> Result<()> {
    plugin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("federate"))
        .stdout(predicate::str::contains("--vault-address"));
    Ok(())
}

#[test]
fn bare_invocation_prints_help() -> Result<()> {
    plugin()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("federate"));
    Ok(())
}

#[test]
fn federate_without_method_prints_help() -> Result<()> {
    plugin()
        .arg("federate")
        .assert()
        .success()
        .stdout(predicate::str::contains("approle"))
        .stdout(predicate::str::contains("psat"));
    Ok(())
}

#[test]
fn version_subcommand() -> Result<()> {
    plugin()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::diff(format!(
            "kubectl-vaultlogin {}\n",
            env!("CARGO_PKG_VERSION")
        )));
    Ok(())
}

#[test]
fn psat_without_mount_is_a_usage_error() -> Result<()> {
    plugin()
        .env("KUBERNETES_EXEC_INFO", REQUEST)
        .args(["federate", "psat"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("--vault-kubernetes-auth-mount"))
        .stderr(predicate::str::contains("Usage"))
        .stderr(predicate::str::contains("Error [kubectl-vaultlogin]").not());
    Ok(())
}

#[test]
fn missing_envelope_fails_without_usage() -> Result<()> {
    plugin()
        .args(["federate", "approle", "-v", "https://vault.example.com:8200"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::starts_with("Error [kubectl-vaultlogin]: "))
        .stderr(predicate::str::contains("unset or empty"))
        .stderr(predicate::str::contains("Usage").not());
    Ok(())
}

#[test]
fn plain_http_vault_is_rejected() -> Result<()> {
    plugin()
        .env("KUBERNETES_EXEC_INFO", REQUEST)
        .args(["federate", "approle", "--vault-address", "http://vault.example.com:8200"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("only https is allowed"));
    Ok(())
}

#[test]
fn kubernetes_mount_outside_prefix_is_rejected() -> Result<()> {
    plugin()
        .env("KUBERNETES_EXEC_INFO", REQUEST)
        .args(["federate", "psat", "-a", "/approle"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(
            "malformed vault authentication mount path",
        ));
    Ok(())
}

#[test]
fn kubernetes_mount_falls_back_to_env() -> Result<()> {
    plugin()
        .env("KUBERNETES_EXEC_INFO", REQUEST)
        .env("VAULT_AUTH_MOUNT", "relative/mount")
        .args(["federate", "psat"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("vault-kubernetes-auth-mount"))
        .stderr(predicate::str::contains("relative/mount"));
    Ok(())
}

#[test]
fn unreadable_token_file_is_reported() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("token");
    plugin()
        .env("KUBERNETES_EXEC_INFO", REQUEST)
        .args(["federate", "psat", "-a", "/kubernetes/argocd", "-p"])
        .arg(&missing)
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("projected service account token"));
    Ok(())
}

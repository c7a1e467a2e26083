//! Command tree of the `kubectl-vaultlogin` credential plugin.
//!
//! Parsing lives here rather than in `main` so tests can drive the exact
//! argv handling with an injected [`CredentialExchange`].

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use vaultlogin_core::strategy::{DEFAULT_APPROLE_MOUNT, DEFAULT_PSAT_PATH};
use vaultlogin_core::{
    AppRoleLogin, CredentialExchange, EnvVars, FederationArgs, LoginStrategy, ServiceAccountLogin,
    federate,
};

pub mod telemetry;

pub const BIN_NAME: &str = "kubectl-vaultlogin";
pub const DEFAULT_VAULT_ADDRESS: &str = "https://localhost:8200";

#[derive(Parser, Debug)]
#[command(
    name = BIN_NAME,
    version,
    about = "Federate workload identities into Kubernetes bearer tokens through HashiCorp Vault",
    long_about = "kubectl-vaultlogin is a client-go credential plugin. kubectl passes an \
                  ExecCredential in KUBERNETES_EXEC_INFO; the plugin logs in to Vault, asks the \
                  kubernetes secrets engine for a short-lived service account token and prints \
                  the completed ExecCredential on stdout."
)]
pub struct Cli {
    /// Vault address, https only, without path, query or fragment
    #[arg(short = 'v', long, global = true, default_value = DEFAULT_VAULT_ADDRESS)]
    pub vault_address: String,
    /// Cluster name used when the ExecCredential carries no cluster
    #[arg(short = 'c', long, global = true)]
    pub cluster_name: Option<String>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Exchange a workload identity for a Kubernetes bearer token
    Federate(FederateCmd),
    /// Print the plugin version
    Version,
}

#[derive(Args, Debug)]
pub struct FederateCmd {
    #[command(subcommand)]
    pub method: Option<FederateMethod>,
}

#[derive(Subcommand, Debug)]
pub enum FederateMethod {
    /// Log in with APPROLE_ROLE_ID and APPROLE_SECRET_ID
    Approle(AppRoleArgs),
    /// Log in with a projected service account token
    Psat(PsatArgs),
}

#[derive(Args, Debug)]
pub struct AppRoleArgs {
    /// Mount path of the AppRole auth method
    #[arg(short = 'a', long = "vault-approle-auth-mount", default_value = DEFAULT_APPROLE_MOUNT)]
    pub mount: String,
}

#[derive(Args, Debug)]
pub struct PsatArgs {
    /// Mount path of the kubernetes auth method, ex. /kubernetes/argocd
    #[arg(short = 'a', long = "vault-kubernetes-auth-mount", env = "VAULT_AUTH_MOUNT")]
    pub mount: String,
    /// Projected service account token file
    #[arg(short = 'p', long = "psat-path", default_value = DEFAULT_PSAT_PATH)]
    pub psat_path: PathBuf,
}

impl FederateMethod {
    fn strategy(&self, env: &EnvVars) -> LoginStrategy {
        match self {
            Self::Approle(args) => LoginStrategy::AppRole(AppRoleLogin::from_env(args.mount.clone(), env)),
            Self::Psat(args) => LoginStrategy::ServiceAccount(ServiceAccountLogin::new(
                args.mount.clone(),
                args.psat_path.clone(),
            )),
        }
    }
}

impl Cli {
    fn federation_args(&self, method: &FederateMethod, env: &EnvVars) -> FederationArgs {
        FederationArgs {
            vault_address: self.vault_address.clone(),
            cluster_name: self.cluster_name.clone(),
            strategy: method.strategy(env),
        }
    }
}

/// Runs the parsed command. Federation failures come back as
/// [`vaultlogin_core::FederationError`] inside the returned error.
pub fn execute<E, W>(cli: &Cli, env: &EnvVars, exchange: &mut E, out: &mut W) -> Result<()>
where
    E: CredentialExchange + ?Sized,
    W: Write + ?Sized,
{
    match &cli.command {
        None => write_help(&[], out),
        Some(Command::Version) => {
            writeln!(out, "{BIN_NAME} {}", env!("CARGO_PKG_VERSION")).context("writing version")
        }
        Some(Command::Federate(FederateCmd { method: None })) => write_help(&["federate"], out),
        Some(Command::Federate(FederateCmd {
            method: Some(method),
        })) => {
            let args = cli.federation_args(method, env);
            federate(&args, env, exchange, out)?;
            Ok(())
        }
    }
}

fn write_help<W: Write + ?Sized>(path: &[&str], out: &mut W) -> Result<()> {
    let mut command = Cli::command();
    command.build();
    let mut target = &mut command;
    for name in path {
        target = target
            .find_subcommand_mut(name)
            .with_context(|| format!("unknown subcommand {name}"))?;
    }
    let help = target.render_help();
    write!(out, "{help}").context("writing help")?;
    out.flush().context("writing help")
}

use std::io;
use std::process::ExitCode;

use clap::Parser;
use kubectl_vaultlogin::{BIN_NAME, Cli, execute, telemetry};
use vaultlogin_core::{EnvVars, VaultExchange};

fn main() -> ExitCode {
    // Usage errors exit here with clap's code and usage text.
    let cli = Cli::parse();
    let env = EnvVars::from_process();
    if let Err(err) = telemetry::init(&env) {
        eprintln!("warning: logging disabled: {err:#}");
    }

    let mut exchange = VaultExchange::from_env(&env);
    let mut out = io::stdout().lock();
    match execute(&cli, &env, &mut exchange, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error [{BIN_NAME}]: {err}");
            ExitCode::FAILURE
        }
    }
}

//! Sequential federation run: validate, build context, authenticate, issue,
//! assemble and emit. Any failure aborts the run before stdout is touched.

use std::io::Write;

use time::OffsetDateTime;
use tracing::{debug, info_span};

use crate::context::FederationSession;
use crate::env::EnvVars;
use crate::error::{FederationError, Result};
use crate::exchange::CredentialExchange;
use crate::exec::ExecCredential;
use crate::strategy::LoginStrategy;
use crate::validate::validate_vault_address;

/// Operator supplied configuration for one invocation.
#[derive(Clone, Debug)]
pub struct FederationArgs {
    pub vault_address: String,
    /// Fallback when the ExecCredential carries no cluster.
    pub cluster_name: Option<String>,
    pub strategy: LoginStrategy,
}

/// Orchestrator states. `Failed` is terminal and reachable from every step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Validating,
    ContextBuilding,
    Authenticating,
    Issuing,
    Assembling,
    Emitting,
    Done,
    Failed,
}

/// Drives a single federation run.
pub struct Federation<'a, E: ?Sized> {
    args: &'a FederationArgs,
    env: &'a EnvVars,
    exchange: &'a mut E,
    stage: Stage,
}

impl<'a, E> Federation<'a, E>
where
    E: CredentialExchange + ?Sized,
{
    pub fn new(args: &'a FederationArgs, env: &'a EnvVars, exchange: &'a mut E) -> Self {
        Self {
            args,
            env,
            exchange,
            stage: Stage::Validating,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Runs every stage in order and writes the response to `out`.
    pub fn run<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<()> {
        let span = info_span!("federate", strategy = self.args.strategy.name());
        let _guard = span.enter();
        match self.steps(out) {
            Ok(()) => {
                self.advance(Stage::Done);
                Ok(())
            }
            Err(err) => {
                debug!(stage = ?self.stage, error = %err, "federation failed");
                self.stage = Stage::Failed;
                Err(err)
            }
        }
    }

    fn steps<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<()> {
        let vault_address = validate_vault_address(&self.args.vault_address)?;
        self.args.strategy.validate()?;

        self.advance(Stage::ContextBuilding);
        let mut session = FederationSession::build(
            vault_address,
            self.args.cluster_name.as_deref(),
            self.env,
        )?;

        self.advance(Stage::Authenticating);
        self.exchange.authenticate(&self.args.strategy, &session)?;

        self.advance(Stage::Issuing);
        session.token = Some(self.exchange.issue(&session)?);

        self.advance(Stage::Assembling);
        let response = assemble(session)?;

        self.advance(Stage::Emitting);
        response.emit(out)
    }

    fn advance(&mut self, next: Stage) {
        debug!(from = ?self.stage, to = ?next, "federation stage");
        self.stage = next;
    }
}

fn assemble(session: FederationSession) -> Result<ExecCredential> {
    let FederationSession {
        credential,
        params,
        token,
        cluster_name,
        ..
    } = session;
    let token = token.ok_or_else(|| {
        FederationError::backend(
            "assemble ExecCredential",
            format!("cluster={cluster_name}"),
            "no token was issued",
        )
    })?;
    credential.assemble(token, OffsetDateTime::now_utc(), params.lifetime)
}

/// Convenience wrapper around [`Federation::run`].
pub fn federate<E, W>(
    args: &FederationArgs,
    env: &EnvVars,
    exchange: &mut E,
    out: &mut W,
) -> Result<()>
where
    E: CredentialExchange + ?Sized,
    W: Write + ?Sized,
{
    Federation::new(args, env, exchange).run(out)
}

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vaultlogin_core::EnvVars;

/// Filter directives, `tracing_subscriber::EnvFilter` syntax.
pub const LOG_ENV: &str = "KVL_LOG";
/// `json` switches to JSON lines, anything else keeps the text format.
pub const LOG_FORMAT_ENV: &str = "KVL_LOG_FORMAT";
pub const DEFAULT_DIRECTIVES: &str = "warn";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env(env: &EnvVars) -> Self {
        match env.get(LOG_FORMAT_ENV) {
            Some(value) if value.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Builds the filter from `KVL_LOG`, falling back to `warn` when the variable
/// is unset or does not parse.
pub fn env_filter(env: &EnvVars) -> anyhow::Result<EnvFilter> {
    let directives = env.get(LOG_ENV).unwrap_or(DEFAULT_DIRECTIVES);
    Ok(EnvFilter::try_new(directives).or_else(|_| EnvFilter::try_new(DEFAULT_DIRECTIVES))?)
}

/// Installs the global subscriber. Everything goes to stderr; stdout is
/// reserved for the ExecCredential.
pub fn init(env: &EnvVars) -> anyhow::Result<()> {
    let env_filter = env_filter(env)?;

    let (json, text) = match LogFormat::from_env(env) {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(false)
                    .with_writer(std::io::stderr),
            ),
            None,
        ),
        LogFormat::Text => (
            None,
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(text)
        .try_init()
        .ok();

    Ok(())
}

use {
    anyhow::{Context as _, Result, ensure},
    stash_sdk::crypto::Password,
    std::env,
    tracing::debug,
};

pub const PASSWORD_ENV: &str = "STASH_PASSWORD";

const PROMPT: &str = "Password: ";

/// Returns the first non-empty password of `flag`, `env` and `config`, asking `prompt` if
/// none is set.
#[inline]
pub fn resolve(
    flag: Option<String>,
    env: Option<String>,
    config: Option<String>,
    prompt: impl FnOnce() -> Result<String>,
) -> Result<Password> {
    let sources = [("command line", flag), ("environment", env), ("config", config)];
    for (source, value) in sources {
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            debug!("using password from {source}");
            return Ok(value.into());
        }
    }
    let value = prompt()?;
    ensure!(!value.is_empty(), "no password provided");
    Ok(value.into())
}

/// Resolves the password of this invocation, reading `$STASH_PASSWORD` and prompting on the
/// terminal if needed.
#[inline]
pub fn resolve_for_process(flag: Option<String>, config: Option<String>) -> Result<Password> {
    resolve(flag, env::var(PASSWORD_ENV).ok(), config, || {
        rpassword::prompt_password(PROMPT).context("failed to read password")
    })
}

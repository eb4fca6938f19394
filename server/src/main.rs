use {
    anyhow::{Context as _, Result},
    stash_relay::{Config, run},
    std::env,
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = env::args_os()
        .nth(1)
        .context("usage: stash-relay <config.json5>")?;
    let config: Config = json5::from_str(&fs_err::read_to_string(config_path)?)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter)?)
        .init();
    run(config).await
}

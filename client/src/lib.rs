pub mod cli;
pub mod config;
pub mod password;
pub mod term;

use {
    crate::{
        cli::{Cli, Command},
        config::Config,
        term::TermLayer,
    },
    anyhow::{Context as _, Result},
    stash_sdk::{archive::StdinSource, pipeline},
    std::{
        env,
        io::{self, Write as _},
    },
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, prelude::*},
};

#[inline]
pub fn run(cli: Cli, config: Config) -> Result<()> {
    let backend = config.backend()?;
    debug!("opening {backend:?}");
    let store = backend.open()?;
    let password = password::resolve_for_process(cli.password, config.password)?;

    match cli.command {
        Command::Copy { paths } => {
            let id = pipeline::copy(
                store.as_ref(),
                password,
                &paths,
                &mut StdinSource::from_process(),
            )?;
            info!("Stash ID: {id}");
        }
        Command::Paste { id } => {
            let destination = env::current_dir().context("failed to get current directory")?;
            let mut stdout = io::stdout().lock();
            pipeline::paste(store.as_ref(), password, &id, &destination, &mut stdout)?;
            stdout.flush().context("failed to write stdout")?;
        }
    }
    Ok(())
}

/// `RUST_LOG` takes precedence over `-v`, which takes precedence over the config.
#[inline]
pub fn setup_logger(verbose: bool, log_filter: Option<&str>) -> Result<()> {
    let directives = if verbose {
        "debug"
    } else {
        log_filter.unwrap_or("info")
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid log filter {directives:?}"))?,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(TermLayer)
        .try_init()?;
    Ok(())
}

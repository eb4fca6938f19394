use {
    anyhow::Result,
    clap::Parser as _,
    stash::{cli::Cli, config::Config, run, setup_logger},
    std::process,
};

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    setup_logger(cli.verbose, config.log_filter.as_deref())?;
    run(cli, config)
}

#[expect(clippy::print_stderr, clippy::exit, reason = "top-level error report")]
fn main() {
    if let Err(err) = try_main() {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

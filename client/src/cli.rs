use {
    clap::{Parser, Subcommand},
    derivative::Derivative,
    stash_protocol::StashId,
    std::path::PathBuf,
};

/// Copy files, directories or stdin into an encrypted stash and paste them anywhere.
#[derive(Derivative, Parser)]
#[derivative(Debug)]
#[command(name = "stash", version)]
pub struct Cli {
    /// Config file [default: ~/.stash]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Show debug output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Encryption password. Falls back to $STASH_PASSWORD, the config file and a prompt.
    #[arg(short, long, global = true)]
    #[derivative(Debug = "ignore")]
    pub password: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Copy files and directories (or stdin, if no paths are given) to a new stash.
    #[command(visible_alias = "c")]
    Copy {
        /// Files and directories to copy. `-` reads stdin at that position.
        paths: Vec<PathBuf>,
    },
    /// Unpack a stash into the current directory.
    #[command(visible_alias = "p")]
    Paste { id: StashId },
}

#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory as _};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn command_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn copy() {
        let cli = parse(&["stash", "copy"]);
        assert_eq!(cli.command, Command::Copy { paths: Vec::new() });
        assert!(!cli.verbose);
        assert!(cli.password.is_none());

        let cli = parse(&["stash", "c", "a.txt", "-", "dir"]);
        assert_eq!(
            cli.command,
            Command::Copy {
                paths: vec!["a.txt".into(), "-".into(), "dir".into()]
            }
        );
    }

    #[test]
    fn paste() {
        let cli = parse(&["stash", "p", "Ab3dEf"]);
        assert_eq!(
            cli.command,
            Command::Paste {
                id: "Ab3dEf".parse().unwrap()
            }
        );
        Cli::try_parse_from(["stash", "paste"]).unwrap_err();
        Cli::try_parse_from(["stash", "paste", "../etc"]).unwrap_err();
    }

    #[test]
    fn global_flags() {
        let before = parse(&["stash", "-v", "-p", "pw", "--config", "/tmp/cfg", "c", "x"]);
        let after = parse(&["stash", "c", "x", "--verbose", "--password", "pw", "--config", "/tmp/cfg"]);
        for cli in [before, after] {
            assert!(cli.verbose);
            assert_eq!(cli.password.as_deref(), Some("pw"));
            assert_eq!(cli.config, Some("/tmp/cfg".into()));
            assert_eq!(cli.command, Command::Copy { paths: vec!["x".into()] });
        }
    }

    #[test]
    fn debug_hides_password() {
        let cli = parse(&["stash", "-p", "hunter2", "c"]);
        assert!(!format!("{cli:?}").contains("hunter2"));
    }
}

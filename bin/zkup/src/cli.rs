use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "zkup")]
#[command(
    author,
    version,
    about = "Install and run a dockerized L1 + L2 development environment"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "ZKUP_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a zkup.toml settings file.
    ///
    /// Values from `ZKUP_`-prefixed environment variables take precedence over the file.
    #[arg(long, alias = "conf", env = "ZKUP_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Command {
    /// Fetch the latest environment, start it and wait until the L2 contracts are deployed.
    Install,
    /// Same as install, for an environment that is already installed.
    Update,
    /// Start the containers of an installed environment.
    Start,
    /// Stop the containers, keeping their state.
    Stop,
    /// Remove the containers and their volumes.
    Clean,
    /// Show the state of every service and the installed version.
    Status,
    /// Print the logs of the environment.
    Logs,
    /// Print the chain ids, RPC endpoints and rich accounts file.
    Info,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommand_and_verbosity() {
        let cli = Cli::try_parse_from(["zkup", "-v", "debug", "install"]).unwrap();
        assert_eq!(cli.command, Command::Install);
        assert_eq!(cli.verbosity, LevelFilter::DEBUG);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["zkup"]).is_err());
        assert!(Cli::try_parse_from(["zkup", "deploy"]).is_err());
    }

    #[test]
    fn test_command_display() {
        assert_eq!(Command::Status.to_string(), "status");
        assert_eq!(Command::Clean.to_string(), "clean");
    }
}

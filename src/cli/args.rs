//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// envmirror - live mirror of a key/value store's env namespace
///
/// Bulk-loads `env` keys from the store, keeps them current through change
/// notifications, and drives an animated circle from the mirrored values.
#[derive(Parser, Debug)]
#[command(name = "envmirror")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ENVMIRROR_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mirror the store and animate the circle from it
    Run(RunArgs),

    /// Print the mirrored keys once and exit
    Dump(DumpArgs),

    /// Check whether key names would be admitted to the mirror
    Check(CheckArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Stop after this many frames (runs until Ctrl-C otherwise)
    #[arg(short, long)]
    pub frames: Option<u64>,

    /// Ticks per second (overrides [sketch] fps)
    #[arg(long)]
    pub fps: Option<u32>,

    /// Key pattern to mirror (overrides [mirror] pattern)
    #[arg(short, long)]
    pub pattern: Option<String>,
}

/// Arguments for the dump command
#[derive(Parser, Debug)]
pub struct DumpArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Key pattern to mirror (overrides [mirror] pattern)
    #[arg(short, long)]
    pub pattern: Option<String>,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Key names to check
    #[arg(required = true)]
    pub keys: Vec<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., store.host)
        key: String,
        /// Value to set
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run() {
        let cli = Cli::parse_from(["envmirror", "run", "--frames", "10", "--fps", "60"]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.frames, Some(10));
                assert_eq!(args.fps, Some(60));
                assert!(args.pattern.is_none());
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_dump() {
        let cli = Cli::parse_from(["envmirror", "dump", "--json", "-p", "env.display*"]);
        match cli.command {
            Commands::Dump(args) => {
                assert!(args.json);
                assert_eq!(args.pattern.as_deref(), Some("env.display*"));
            }
            _ => panic!("expected Dump command"),
        }
    }

    #[test]
    fn cli_check_requires_keys() {
        assert!(Cli::try_parse_from(["envmirror", "check"]).is_err());

        let cli = Cli::parse_from(["envmirror", "check", "env/color", "junk/x"]);
        match cli.command {
            Commands::Check(args) => assert_eq!(args.keys, vec!["env/color", "junk/x"]),
            _ => panic!("expected Check command"),
        }
    }

    #[test]
    fn cli_parses_config_set() {
        let cli = Cli::parse_from(["envmirror", "config", "set", "store.port", "6380"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                action: Some(ConfigAction::Set { key, value }),
            }) => {
                assert_eq!(key, "store.port");
                assert_eq!(value, "6380");
            }
            _ => panic!("expected Config Set command"),
        }
    }

    #[test]
    fn cli_verbose_levels() {
        let cli = Cli::parse_from(["envmirror", "dump"]);
        assert_eq!(cli.verbose, 0);

        let cli = Cli::parse_from(["envmirror", "-v", "dump"]);
        assert_eq!(cli.verbose, 1);

        let cli = Cli::parse_from(["envmirror", "-vv", "dump"]);
        assert_eq!(cli.verbose, 2);
    }
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "sluice",
    about = "Sluice - queue messages of any size through a spool directory",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Transport configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the effective transport configuration
    Config(ConfigArgs),
    /// Send files as messages
    Send(SendArgs),
    /// Drain messages from a spool
    Receive(ReceiveArgs),
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Print the configuration as TOML, ready to save and edit
    #[arg(long)]
    pub toml: bool,
}

#[derive(Args)]
pub struct SendArgs {
    /// Spool directory shared by sender and receiver
    #[arg(long)]
    pub spool: PathBuf,
    /// Files to send, one message each
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args)]
pub struct ReceiveArgs {
    /// Spool directory shared by sender and receiver
    #[arg(long)]
    pub spool: PathBuf,
    /// Write received files into this directory
    #[arg(short, long)]
    pub out: Option<PathBuf>,
    /// Stop after this many messages
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config() {
        let cli = Cli::try_parse_from(["sluice", "config"]).unwrap();
        assert!(matches!(cli.command, Command::Config(ConfigArgs { toml: false })));
        assert!(cli.config.is_none());
    }

    #[test]
    fn parse_config_file_flag() {
        let cli = Cli::try_parse_from(["sluice", "config", "--toml", "-c", "sluice.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("sluice.toml")));
        if let Command::Config(args) = cli.command {
            assert!(args.toml);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_send() {
        let cli = Cli::try_parse_from(["sluice", "send", "--spool", "/tmp/s", "a.txt", "b.bin"])
            .unwrap();
        if let Command::Send(args) = cli.command {
            assert_eq!(args.spool, PathBuf::from("/tmp/s"));
            assert_eq!(args.files.len(), 2);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn send_requires_files() {
        assert!(Cli::try_parse_from(["sluice", "send", "--spool", "/tmp/s"]).is_err());
    }

    #[test]
    fn parse_receive() {
        let cli = Cli::try_parse_from([
            "sluice", "receive", "--spool", "/tmp/s", "--out", "/tmp/o", "-n", "3",
        ])
        .unwrap();
        if let Command::Receive(args) = cli.command {
            assert_eq!(args.out, Some(PathBuf::from("/tmp/o")));
            assert_eq!(args.limit, Some(3));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["sluice", "--verbose", "config"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["sluice", "--format", "json", "config"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kvlink",
    about = "Read and write a remote key-value store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store URL (defaults to $REPLIT_DB_URL)
    #[arg(short, long, global = true)]
    pub endpoint: Option<String>,

    /// TOML file with client settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Do not cache fetched values
    #[arg(long, global = true)]
    pub no_cache: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the value of a key
    Get(GetArgs),
    /// Store a value (parsed as JSON, else taken as a string)
    Set(SetArgs),
    /// Delete a key
    Delete(DeleteArgs),
    /// Check whether a key holds a truthy value
    Has(HasArgs),
    /// List all keys
    Keys,
    /// Count all keys
    Size,
    /// Print every key with its value
    Dump,
    /// Delete every key
    Clear(ClearArgs),
}

#[derive(Args)]
pub struct GetArgs {
    pub key: String,
    /// Print the stored text without decoding
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args)]
pub struct SetArgs {
    pub key: String,
    pub value: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub key: String,
}

#[derive(Args)]
pub struct HasArgs {
    pub key: String,
}

#[derive(Args)]
pub struct ClearArgs {
    /// Confirm deleting every key
    #[arg(long)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_get() {
        let cli = Cli::try_parse_from(["kvlink", "get", "greeting"]).unwrap();
        if let Command::Get(args) = cli.command {
            assert_eq!(args.key, "greeting");
            assert!(!args.raw);
        } else {
            panic!("wrong command");
        }
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn parse_get_raw_json() {
        let cli = Cli::try_parse_from(["kvlink", "get", "k", "--raw", "--format", "json"]).unwrap();
        assert!(matches!(cli.command, Command::Get(GetArgs { raw: true, .. })));
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn parse_set() {
        let cli = Cli::try_parse_from(["kvlink", "set", "n", "42"]).unwrap();
        if let Command::Set(args) = cli.command {
            assert_eq!(args.key, "n");
            assert_eq!(args.value, "42");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_options() {
        let cli = Cli::try_parse_from([
            "kvlink", "keys", "--endpoint", "http://kv", "--timeout", "3", "--no-cache", "-v",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Keys));
        assert_eq!(cli.endpoint.as_deref(), Some("http://kv"));
        assert_eq!(cli.timeout, Some(3));
        assert!(cli.no_cache);
        assert!(cli.verbose);
    }

    #[test]
    fn parse_clear_confirmation() {
        let cli = Cli::try_parse_from(["kvlink", "clear", "--yes"]).unwrap();
        assert!(matches!(cli.command, Command::Clear(ClearArgs { yes: true })));
    }

    #[test]
    fn set_requires_value() {
        assert!(Cli::try_parse_from(["kvlink", "set", "only-key"]).is_err());
    }
}

//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// u2post -- unified2 alert spool inspection tool.
///
/// Use `u2post <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "u2post", version, about, long_about = None)]
pub struct Cli {
    /// Path to the u2post.toml configuration file.
    #[arg(short, long, global = true, default_value = "/etc/u2post/u2post.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode and print every record in a unified2 file.
    Dump(DumpArgs),

    /// Write one alert unit (event plus its packets and extra data) as raw unified2.
    Extract(ExtractArgs),

    /// Inspect the signature rule index.
    Rules(RulesArgs),

    /// Inspect the spool checkpoint.
    Registry(RegistryArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- dump ----

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// unified2 file to decode.
    pub file: PathBuf,

    /// Start reading at this byte offset (must be a record boundary).
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Stop after this many records.
    #[arg(long)]
    pub limit: Option<usize>,
}

// ---- extract ----

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// unified2 file to search.
    pub file: PathBuf,

    /// Event id of the alert unit to extract.
    #[arg(long)]
    pub event_id: u32,

    /// Event second, to disambiguate event ids reused across sensor restarts.
    #[arg(long)]
    pub event_second: Option<u32>,

    /// Destination file for the extracted records.
    #[arg(short = 'O', long = "out")]
    pub out: PathBuf,
}

// ---- rules ----

#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// Load the configured gen-msg map and rule paths and print a summary.
    Check,
    /// Look up one rule by `gid:sid` (or bare `sid`, meaning gid 1).
    Lookup {
        /// Rule key.
        key: String,
    },
}

// ---- registry ----

#[derive(Args, Debug)]
pub struct RegistryArgs {
    #[command(subcommand)]
    pub action: RegistryAction,
}

#[derive(Subcommand, Debug)]
pub enum RegistryAction {
    /// Show the persisted spool position and how far behind it is.
    Show,
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only one section (general, spool, rules, registry, spooler, output, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_dump() {
        let cli = Cli::try_parse_from(["u2post", "dump", "snort.log.1", "--limit", "5"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Dump(args) => {
                assert_eq!(args.file, PathBuf::from("snort.log.1"));
                assert_eq!(args.offset, 0);
                assert_eq!(args.limit, Some(5));
            }
            _ => panic!("expected Dump command"),
        }
        assert_eq!(cli.output, OutputFormat::Text);
    }

    #[test]
    fn test_cli_parse_extract() {
        let cli = Cli::try_parse_from([
            "u2post",
            "extract",
            "snort.log.1",
            "--event-id",
            "42",
            "--event-second",
            "1700000000",
            "-O",
            "out.u2",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Extract(args) => {
                assert_eq!(args.event_id, 42);
                assert_eq!(args.event_second, Some(1_700_000_000));
                assert_eq!(args.out, PathBuf::from("out.u2"));
            }
            _ => panic!("expected Extract command"),
        }
    }

    #[test]
    fn test_cli_extract_requires_event_id_and_output() {
        assert!(Cli::try_parse_from(["u2post", "extract", "f", "-O", "o"]).is_err());
        assert!(Cli::try_parse_from(["u2post", "extract", "f", "--event-id", "1"]).is_err());
    }

    #[test]
    fn test_cli_parse_rules_lookup() {
        let cli = Cli::try_parse_from(["u2post", "rules", "lookup", "1:2100498"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Rules(RulesArgs {
                action: RulesAction::Lookup { key },
            }) => assert_eq!(key, "1:2100498"),
            _ => panic!("expected rules lookup"),
        }
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "u2post",
            "registry",
            "show",
            "--output",
            "json",
            "--config",
            "/tmp/u2post.toml",
        ])
        .expect("parse succeeded");
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.config, PathBuf::from("/tmp/u2post.toml"));
        assert!(matches!(cli.command, Commands::Registry(_)));
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["u2post", "config", "show", "--section", "spool"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show { section },
            }) => assert_eq!(section.as_deref(), Some("spool")),
            _ => panic!("expected config show"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_output_format() {
        assert!(Cli::try_parse_from(["u2post", "--output", "yaml", "config", "validate"]).is_err());
    }
}

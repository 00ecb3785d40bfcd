//! Clap derive structures for the `clinica` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};
use strum::IntoEnumIterator;

use clinica_api::Resource;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// clinica -- talk to the clinic operations backend from a terminal
#[derive(Debug, Parser)]
#[command(
    name = "clinica",
    version,
    about = "Query the clinic operations backend from the command line",
    long_about = "Command-line client for the clinic operations backend.\n\n\
        Gateway hiccups (502/503/504) are retried with exponential backoff on\n\
        read-only requests. An expired session is cleared automatically.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "CLINICA_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server URL (overrides profile)
    #[arg(long, short = 's', env = "CLINICA_SERVER", global = true)]
    pub server: Option<String>,

    /// Output format [default: from config, else json]
    #[arg(long, short = 'o', env = "CLINICA_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "CLINICA_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "CLINICA_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and store the session
    Login(LoginArgs),

    /// Forget the stored session
    Logout,

    /// Show the signed-in user as the backend sees it
    Whoami,

    /// Probe the backend and report reachability
    Status,

    /// GET an arbitrary API path (relative to /api)
    Get(GetArgs),

    /// List a collection
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show one record of a collection
    Show(ShowArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Username or email (prompted when omitted)
    #[arg(long, short = 'u', env = "CLINICA_USER")]
    pub user: Option<String>,

    /// Password (prompted when omitted)
    #[arg(long, env = "CLINICA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Keep the session only for this command instead of saving it.
    /// Replaces any saved session for the profile.
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Path below the API root, e.g. /pacientes/123
    pub path: String,

    /// Query parameter (repeatable)
    #[arg(long = "query", short = 'Q', value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Collection to list
    #[arg(value_parser = parse_resource)]
    pub resource: Resource,

    /// Filter (repeatable), e.g. -Q estado=pendiente
    #[arg(long = "query", short = 'Q', value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Collection the record belongs to
    #[arg(value_parser = parse_resource)]
    pub resource: Resource,

    /// Record identifier
    pub id: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup wizard
    Init,

    /// Display the current configuration
    Show,

    /// Print the config file location
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

// ── Value parsers ────────────────────────────────────────────────────

fn parse_resource(s: &str) -> Result<Resource, String> {
    s.parse().map_err(|_| {
        let known: Vec<String> = Resource::iter().map(|r| r.to_string()).collect();
        format!("unknown collection '{s}' (expected one of: {})", known.join(", "))
    })
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_resources_by_kebab_name() {
        assert_eq!(parse_resource("patients").unwrap(), Resource::Patients);
        assert_eq!(parse_resource("equipment").unwrap(), Resource::Equipment);
        let err = parse_resource("pacientes").unwrap_err();
        assert!(err.contains("patients"), "{err}");
    }

    #[test]
    fn parses_query_pairs() {
        assert_eq!(
            parse_key_value("fecha=2024-01-02").unwrap(),
            ("fecha".to_owned(), "2024-01-02".to_owned())
        );
        assert_eq!(
            parse_key_value("q=a=b").unwrap(),
            ("q".to_owned(), "a=b".to_owned())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

//! Profile resolution: config file + global flags -> `ClientConfig`.
//!
//! This is the single place where CLI flags override what the shared
//! config crate loaded.

use std::time::Duration;

use clap::ValueEnum;

use clinica_api::{ClientConfig, TlsMode};
use clinica_config::{Config, config_path};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Output format: flag > config default > JSON.
pub fn output_format(global: &GlobalOpts, config: &Config) -> OutputFormat {
    global.output.unwrap_or_else(|| {
        OutputFormat::from_str(&config.defaults.output, true).unwrap_or_else(|_| {
            tracing::warn!(output = %config.defaults.output, "unknown default output, using json");
            OutputFormat::Json
        })
    })
}

/// Build the client configuration for `profile_name`, applying flag overrides.
///
/// A missing profile is only fatal when `--server` is absent too.
pub fn resolve_client_config(
    global: &GlobalOpts,
    config: &Config,
    profile_name: &str,
) -> Result<ClientConfig, CliError> {
    let mut client = match config.profiles.get(profile_name) {
        Some(profile) => config.client_config(profile)?,
        None => {
            let Some(server) = global.server.as_deref() else {
                return Err(missing_profile(config, profile_name));
            };
            let url = parse_server(server)?;
            let mut client = ClientConfig::new(url);
            client.retry = config.retry.to_policy();
            client.transport.timeout = Duration::from_secs(config.defaults.timeout);
            if config.defaults.insecure {
                client.transport.tls = TlsMode::DangerAcceptInvalid;
            }
            client
        }
    };

    if let Some(server) = global.server.as_deref() {
        client.base_url = parse_server(server)?;
    }
    if global.insecure {
        client.transport.tls = TlsMode::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        client.transport.timeout = Duration::from_secs(secs);
    }

    Ok(client)
}

fn parse_server(server: &str) -> Result<url::Url, CliError> {
    server.parse().map_err(|_| CliError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {server}"),
    })
}

fn missing_profile(config: &Config, name: &str) -> CliError {
    if config.profiles.is_empty() {
        return CliError::NoConfig {
            path: config_path().display().to_string(),
        };
    }
    let mut available: Vec<_> = config.profiles.keys().cloned().collect();
    available.sort();
    CliError::ProfileNotFound {
        name: name.into(),
        available: available.join(", "),
    }
}

//! Config subcommand handlers.

use dialoguer::{Confirm, Input};

use clinica_config::{Config, Profile, config_path, load_config_or_default, save_config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::output_format;
use crate::error::CliError;
use crate::output;

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let cfg = load_config_or_default();
            let rendered = output::render(output_format(global, &cfg), &cfg)?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config_path().display().to_string(), global.quiet);
            Ok(())
        }
    }
}

fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let path = config_path();
    eprintln!("clinica configuration wizard");
    eprintln!("   Config path: {}\n", path.display());

    let mut cfg: Config = load_config_or_default();

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default(global.profile.clone().unwrap_or_else(|| "default".into()))
        .interact_text()
        .map_err(prompt_err)?;

    let server: String = Input::new()
        .with_prompt("Server URL (without /api)")
        .with_initial_text(global.server.clone().unwrap_or_default())
        .validate_with(|s: &String| {
            url::Url::parse(s)
                .map(|_| ())
                .map_err(|e| format!("invalid URL: {e}"))
        })
        .interact_text()
        .map_err(prompt_err)?;

    let insecure = Confirm::new()
        .with_prompt("Accept self-signed certificates?")
        .default(global.insecure)
        .interact()
        .map_err(prompt_err)?;

    cfg.profiles.insert(
        profile_name.clone(),
        Profile {
            server,
            ca_cert: None,
            insecure: insecure.then_some(true),
            timeout: None,
        },
    );
    if cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }

    save_config(&cfg)?;
    eprintln!("\n   Saved profile '{profile_name}' to {}", path.display());
    eprintln!("   Next: clinica login --profile {profile_name}");
    Ok(())
}

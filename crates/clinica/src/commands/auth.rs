//! login / logout / whoami.

use dialoguer::Input;
use secrecy::SecretString;
use serde_json::json;

use clinica_api::Durability;

use crate::cli::LoginArgs;
use crate::commands::Context;
use crate::error::CliError;

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Fill in whatever the flags left out.
fn credentials(args: LoginArgs) -> Result<(String, SecretString), CliError> {
    let user = match args.user {
        Some(user) => user,
        None => Input::new()
            .with_prompt("Username or email")
            .interact_text()
            .map_err(prompt_err)?,
    };
    let password = match args.password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ").map_err(prompt_err)?,
    };

    if user.trim().is_empty() || password.is_empty() {
        return Err(CliError::Validation {
            field: "credentials".into(),
            reason: "username and password cannot be empty".into(),
        });
    }
    Ok((user.trim().to_owned(), SecretString::from(password)))
}

pub async fn login(ctx: &Context, args: LoginArgs) -> Result<(), CliError> {
    let durability = if args.once {
        Durability::Ephemeral
    } else {
        Durability::Persistent
    };
    let (user, password) = credentials(args)?;

    let outcome = ctx.client.login(&user, &password, durability).await?;

    let principal = outcome.principal.as_ref();
    ctx.emit(&json!({
        "profile": ctx.profile,
        "saved": durability == Durability::Persistent,
        "user": principal.and_then(|p| p.display_name()),
        "sucursal": principal.and_then(|p| p.branch_id()),
    }))
}

pub fn logout(ctx: &Context) -> Result<(), CliError> {
    ctx.client.logout()?;
    if !ctx.quiet {
        eprintln!("Signed out of profile '{}'", ctx.profile);
    }
    Ok(())
}

/// Ask the backend who the stored token belongs to.
pub async fn whoami(ctx: &Context) -> Result<(), CliError> {
    ctx.require_session()?;
    let me = ctx.client.me().await?;
    ctx.emit(me.as_value())
}

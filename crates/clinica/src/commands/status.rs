//! Backend reachability probe.

use serde::Serialize;
use serde_json::Value;

use crate::commands::Context;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct StatusReport {
    profile: String,
    reachable: bool,
    signed_in: bool,
    user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    health: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Always prints a report. Exits non-zero only when the backend is unreachable.
pub async fn handle(ctx: &Context) -> Result<(), CliError> {
    let session = ctx.client.session();
    let outcome = ctx.client.health().await;

    let (health, error) = match &outcome {
        Ok(value) => (Some(value.clone()), None),
        Err(e) => (None, Some(e.to_string())),
    };
    let report = StatusReport {
        profile: ctx.profile.clone(),
        reachable: ctx.client.is_connected(),
        signed_in: session.is_authenticated(),
        user: session
            .principal()
            .and_then(|p| p.display_name().map(str::to_owned)),
        health,
        error,
    };
    ctx.emit(&report)?;

    match outcome {
        Err(e) if e.is_retryable() => Err(e.into()),
        _ => Ok(()),
    }
}

//! Command dispatch: bridges CLI args -> `ApiClient` calls -> output formatting.

pub mod auth;
pub mod completions;
pub mod config_cmd;
pub mod request;
pub mod status;

use std::sync::Arc;

use clinica_api::ApiClient;
use clinica_config::Config;

use crate::cli::{Command, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;

/// Everything a backend-bound command needs.
pub struct Context {
    pub client: ApiClient,
    pub profile: String,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl Context {
    /// Resolve the profile and build a client whose durable session scope
    /// is that profile's session file.
    pub fn connect(global: &GlobalOpts, cfg: &Config) -> Result<Self, CliError> {
        let profile = config::active_profile_name(global, cfg);
        let client_config = config::resolve_client_config(global, cfg, &profile)?;
        let session = Arc::new(clinica_config::session_store(&profile));
        let client = ApiClient::new(&client_config)?.with_session(session);

        tracing::debug!(%profile, server = %client_config.base_url, "client ready");
        Ok(Self {
            client,
            profile,
            output: config::output_format(global, cfg),
            quiet: global.quiet,
        })
    }

    /// Render `data` in the selected format and print it.
    pub fn emit<T: serde::Serialize + ?Sized>(&self, data: &T) -> Result<(), CliError> {
        let rendered = crate::output::render(self.output, data)?;
        crate::output::print_output(&rendered, self.quiet);
        Ok(())
    }

    pub fn require_session(&self) -> Result<(), CliError> {
        if self.client.session().is_authenticated() {
            Ok(())
        } else {
            Err(CliError::NotSignedIn {
                profile: self.profile.clone(),
            })
        }
    }
}

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => auth::login(ctx, args).await,
        Command::Logout => auth::logout(ctx),
        Command::Whoami => auth::whoami(ctx).await,
        Command::Status => status::handle(ctx).await,
        Command::Get(args) => request::get(ctx, args).await,
        Command::List(args) => request::list(ctx, args).await,
        Command::Show(args) => request::show(ctx, args).await,
        // Config and Completions never reach the backend
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "handled before connecting".into(),
        }),
    }
}

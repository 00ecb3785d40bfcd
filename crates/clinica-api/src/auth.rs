// Login sub-protocol and session endpoints
//
// Login bypasses the retry loop: it is a POST, it must not carry a stale
// bearer token, and its failures are reported separately from the regular
// error taxonomy.

use std::fmt;

use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::client::{ApiClient, error_message, read_json};
use crate::error::{Error, status_message};
use crate::request::Request;
use crate::session::{Durability, Principal, is_usable};

const LOGIN_PATH: &str = "/auth/login";
const ME_PATH: &str = "/auth/me";
const HEALTH_PATH: &str = "/health";

/// Where successive backend generations put the token.
const TOKEN_LOCATIONS: &[&[&str]] = &[
    &["token"],
    &["access_token"],
    &["data", "token"],
    &["data", "access_token"],
];

/// Where successive backend generations put the user record.
const PRINCIPAL_LOCATIONS: &[&[&str]] = &[
    &["usuario"],
    &["user"],
    &["data", "usuario"],
    &["data", "user"],
];

/// Result of a successful login. The session is already stored.
#[derive(Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub principal: Option<Principal>,
}

impl fmt::Debug for LoginOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginOutcome")
            .field("token", &"****")
            .field("principal", &self.principal)
            .finish()
    }
}

impl ApiClient {
    /// Authenticate with identifier (username or email) and password.
    ///
    /// On success the token and principal are written to the scope chosen
    /// by `durability`, clearing the other scope.
    pub async fn login(
        &self,
        identifier: &str,
        password: &SecretString,
        durability: Durability,
    ) -> Result<LoginOutcome, Error> {
        let url = self.url(LOGIN_PATH)?;
        debug!("logging in at {}", url);

        let body = json!({
            "username": identifier,
            "email": identifier,
            "password": password.expose_secret(),
        });

        let resp = self
            .http()
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.network_failure(e))?;

        let status = resp.status().as_u16();
        if let Some(err) = self.gateway_failure(status) {
            return Err(err);
        }
        self.monitor().mark_reachable();

        let success = resp.status().is_success();
        let data = read_json(resp).await.unwrap_or(Value::Null);

        if !success {
            return Err(Error::LoginRejected {
                status,
                message: error_message(&data).unwrap_or_else(|| status_message(status)),
            });
        }

        let token = extract_token(&data).ok_or(Error::MissingToken)?;
        let principal = extract_principal(&data);

        self.session().set_session(
            principal.as_ref().unwrap_or(&Principal::new(Value::Null)),
            &token,
            durability,
        )?;

        info!(
            user = principal.as_ref().and_then(Principal::display_name).unwrap_or("?"),
            ?durability,
            "login successful"
        );
        Ok(LoginOutcome { token, principal })
    }

    /// Drop the local session. The backend keeps no server-side state to end.
    pub fn logout(&self) -> Result<(), Error> {
        debug!("logging out");
        self.session().clear_session()
    }

    /// The principal the backend associates with the current token.
    pub async fn me(&self) -> Result<Principal, Error> {
        let value = self.execute(&Request::get(ME_PATH)).await?;
        Ok(Principal::new(value))
    }

    /// Liveness probe. Also refreshes the connection monitor.
    pub async fn health(&self) -> Result<Value, Error> {
        self.execute(&Request::get(HEALTH_PATH)).await
    }
}

fn lookup<'a>(data: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(data, |node, key| node.get(*key))
}

fn extract_token(data: &Value) -> Option<String> {
    TOKEN_LOCATIONS.iter().find_map(|path| {
        lookup(data, path)
            .and_then(Value::as_str)
            .filter(|t| is_usable(t))
            .map(str::to_owned)
    })
}

fn extract_principal(data: &Value) -> Option<Principal> {
    PRINCIPAL_LOCATIONS.iter().find_map(|path| {
        lookup(data, path)
            .filter(|v| !v.is_null())
            .cloned()
            .map(Principal::new)
    })
}

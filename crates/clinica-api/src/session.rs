// Credential session persistence
//
// Two mutually-exclusive durability scopes: `Persistent` survives restarts
// ("remember me"), `Ephemeral` lives as long as the process. Writing one
// scope wipes the other. Reads prefer the durable scope.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::Error;
use crate::store::{KeyValueStore, MemoryStore};

const TOKEN_KEY: &str = "token";
const PRINCIPAL_KEY: &str = "user";

/// Field on the principal record carrying its branch association.
const BRANCH_FIELD: &str = "sucursal";

const INVALIDATION_CHANNEL_SIZE: usize = 16;

/// Which scope a session is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Survives process restarts.
    Persistent,
    /// Scoped to the current process.
    Ephemeral,
}

/// The authenticated user record, kept opaque.
///
/// The backend owns the shape; the client only ever looks at the branch
/// association to derive the tenant header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(Value);

impl Principal {
    pub fn new(record: Value) -> Self {
        Self(record)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Branch identifier suitable for the `x-sucursal-id` header.
    ///
    /// Older backends store the branch as a bare id, newer ones populate it
    /// into an object; both are accepted.
    pub fn branch_id(&self) -> Option<String> {
        match self.0.get(BRANCH_FIELD)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            Value::Object(obj) => obj
                .get("_id")
                .or_else(|| obj.get("id"))
                .and_then(|id| match id {
                    Value::String(s) if !s.is_empty() => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                }),
            _ => None,
        }
    }

    /// Best-effort display name for logs and the CLI.
    pub fn display_name(&self) -> Option<&str> {
        ["nombre", "name", "username", "email"]
            .iter()
            .find_map(|field| self.0.get(*field).and_then(Value::as_str))
    }
}

impl From<Value> for Principal {
    fn from(record: Value) -> Self {
        Self(record)
    }
}

/// Broadcast when the backend rejects the current token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInvalidated {
    pub reason: String,
}

/// Owner of the stored credentials.
///
/// Cheap to share behind an `Arc`; every operation goes straight to the
/// injected stores so concurrent requests always see the latest state.
pub struct SessionStore {
    durable: Arc<dyn KeyValueStore>,
    ephemeral: Arc<dyn KeyValueStore>,
    invalidated: broadcast::Sender<SessionInvalidated>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SessionStore {
    pub fn new(durable: Arc<dyn KeyValueStore>, ephemeral: Arc<dyn KeyValueStore>) -> Self {
        let (invalidated, _) = broadcast::channel(INVALIDATION_CHANNEL_SIZE);
        Self {
            durable,
            ephemeral,
            invalidated,
        }
    }

    /// Both scopes in memory. Nothing survives the process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    fn scope(&self, durability: Durability) -> &dyn KeyValueStore {
        match durability {
            Durability::Persistent => self.durable.as_ref(),
            Durability::Ephemeral => self.ephemeral.as_ref(),
        }
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Store `principal` + `token` in one scope and wipe the other.
    pub fn set_session(
        &self,
        principal: &Principal,
        token: &str,
        durability: Durability,
    ) -> Result<(), Error> {
        debug!(?durability, token_len = token.len(), "storing session");

        let target = self.scope(durability);
        target.set(TOKEN_KEY, token)?;
        if principal.0.is_null() {
            target.remove(PRINCIPAL_KEY)?;
        } else {
            target.set(PRINCIPAL_KEY, &principal.0.to_string())?;
        }

        let other = match durability {
            Durability::Persistent => Durability::Ephemeral,
            Durability::Ephemeral => Durability::Persistent,
        };
        Self::wipe(self.scope(other))?;
        Ok(())
    }

    /// Remove token and principal from both scopes. Safe to call repeatedly.
    pub fn clear_session(&self) -> Result<(), Error> {
        debug!("clearing session");
        // Attempt both scopes even if the first fails.
        let durable = Self::wipe(self.durable.as_ref());
        let ephemeral = Self::wipe(self.ephemeral.as_ref());
        durable?;
        ephemeral?;
        Ok(())
    }

    fn wipe(store: &dyn KeyValueStore) -> Result<(), Error> {
        store.remove(TOKEN_KEY)?;
        store.remove(PRINCIPAL_KEY)?;
        Ok(())
    }

    /// Tear down the session and tell every subscriber why.
    ///
    /// Concurrent 401s each call this; subscribers may see the same
    /// expiry more than once.
    pub fn invalidate(&self, reason: &str) {
        if let Err(e) = self.clear_session() {
            warn!(error = %e, "failed to clear session during invalidation");
        }
        // No receivers is fine: nobody is listening.
        let _ = self.invalidated.send(SessionInvalidated {
            reason: reason.to_owned(),
        });
    }

    /// Subscribe to session-invalidated notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionInvalidated> {
        self.invalidated.subscribe()
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// First usable value for `key`, durable scope before ephemeral.
    fn read(&self, key: &str) -> Option<String> {
        [&self.durable, &self.ephemeral].into_iter().find_map(|store| {
            match store.get(key) {
                Ok(value) => value.filter(|v| is_usable(v)),
                Err(e) => {
                    warn!(key, error = %e, "session storage read failed");
                    None
                }
            }
        })
    }

    pub fn token(&self) -> Option<String> {
        self.read(TOKEN_KEY)
    }

    /// The stored principal, or `None`.
    ///
    /// A stored record that fails to deserialize wipes the whole session.
    pub fn principal(&self) -> Option<Principal> {
        let raw = self.read(PRINCIPAL_KEY)?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Some(Principal(value)),
            Err(e) => {
                warn!(error = %e, "stored principal is corrupt, clearing session");
                if let Err(e) = self.clear_session() {
                    warn!(error = %e, "failed to clear corrupt session");
                }
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}

/// Empty strings and the stringified `undefined`/`null` left behind by
/// older front ends all mean "nothing stored".
pub(crate) fn is_usable(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed != "undefined" && trimmed != "null"
}

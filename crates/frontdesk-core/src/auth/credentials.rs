use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::storage::{KeyValueStore, Result};

use super::Session;

/// Storage key for the bearer token
pub const TOKEN_KEY: &str = "token";

/// Storage key for the serialized user record
pub const USER_KEY: &str = "user";

/// Persists the session's token and user as a pair.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read the persisted session. Absent keys yield an empty token and no user.
    pub fn load(&self) -> Result<Session> {
        let token = self.store.get(TOKEN_KEY)?.unwrap_or_default();
        let user = match self.store.get(USER_KEY)? {
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Null) => None,
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Ignoring unparseable stored user");
                    None
                }
            },
            None => None,
        };
        Ok(Session { token, user })
    }

    /// Persist token and user together. If the user cannot be written the
    /// previously stored token is put back.
    pub fn save(&self, session: &Session) -> Result<()> {
        let user = serde_json::to_string(&session.user)?;
        let prior_token = self.store.get(TOKEN_KEY)?;

        self.store.set(TOKEN_KEY, &session.token)?;
        if let Err(e) = self.store.set(USER_KEY, &user) {
            let rollback = match prior_token {
                Some(ref token) => self.store.set(TOKEN_KEY, token),
                None => self.store.remove(TOKEN_KEY),
            };
            if let Err(rollback) = rollback {
                warn!(error = %rollback, "Failed to roll back token after user write failed");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Remove both keys. Both removals are attempted even if the first fails.
    pub fn clear(&self) -> Result<()> {
        let token = self.store.remove(TOKEN_KEY);
        let user = self.store.remove(USER_KEY);
        token.and(user)
    }

    /// Check if a token is currently persisted
    pub fn has_token(&self) -> bool {
        matches!(self.store.get(TOKEN_KEY), Ok(Some(ref t)) if !t.is_empty())
    }
}

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{CredentialStore, LoginResult};
use crate::api::ApiClient;
use crate::storage::StorageError;

/// Capacity of the session event channel
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// The in-memory session: an opaque token plus whatever user record the
/// server returned at login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: Option<Value>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }

    /// Value for the `Authorization` header, if a token is present
    pub fn bearer(&self) -> Option<String> {
        self.is_authenticated().then(|| format!("Bearer {}", self.token))
    }
}

/// Body returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthPayload {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub user: Option<Value>,
    /// Any other fields the server sent along
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Session lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    LoggedOut,
    Refreshed,
    /// Token refresh failed and the session was cleared
    Expired,
}

struct Inner {
    state: RwLock<Session>,
    credentials: CredentialStore,
    events: broadcast::Sender<SessionEvent>,
}

impl Inner {
    fn read(&self) -> Session {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, session: Session) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Read-only view of the session, handed to the router and renderers.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Inner>,
}

impl SessionHandle {
    /// Current token, `None` when unauthenticated
    pub fn token(&self) -> Option<String> {
        let state = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        state.is_authenticated().then(|| state.token.clone())
    }

    pub fn user(&self) -> Option<Value> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user
            .clone()
    }

    pub fn snapshot(&self) -> Session {
        self.inner.read()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_authenticated()
    }

    pub fn bearer(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bearer()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }
}

/// Owner of the session. The only component that writes session state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(credentials: CredentialStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(Session::default()),
                credentials,
                events,
            }),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            inner: self.inner.clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.handle().is_authenticated()
    }

    pub fn token(&self) -> Option<String> {
        self.handle().token()
    }

    pub fn user(&self) -> Option<Value> {
        self.handle().user()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Load the persisted session into memory. Makes no network call and can
    /// be called any number of times. Returns whether a token was found.
    pub fn hydrate(&self) -> bool {
        match self.inner.credentials.load() {
            Ok(session) if session.is_authenticated() => {
                self.inner.replace(session);
                debug!("Session hydrated from storage");
                true
            }
            Ok(_) => {
                debug!("No stored session");
                false
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                false
            }
        }
    }

    /// Authenticate against the login endpoint and, on success, persist and
    /// adopt the returned session. On failure nothing changes.
    pub async fn login(&self, api: &ApiClient, identifier: &str, secret: &str) -> LoginResult {
        match api.authenticate(identifier, secret).await {
            Ok(payload) => {
                self.establish(&payload)?;
                info!("Login successful");
                Ok(payload)
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                Err(e)
            }
        }
    }

    /// Persist, then swap the in-memory session, both under the write lock.
    fn establish(&self, payload: &AuthPayload) -> Result<(), StorageError> {
        let session = Session {
            token: payload.token.clone(),
            user: payload.user.clone(),
        };
        {
            let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
            self.inner.credentials.save(&session)?;
            *state = session;
        }
        self.inner.emit(SessionEvent::LoggedIn);
        Ok(())
    }

    /// Forget the session in memory and in storage. Always succeeds.
    pub fn logout(&self) {
        self.clear();
        info!("Logged out");
        self.inner.emit(SessionEvent::LoggedOut);
    }

    /// Like `logout`, but signals that the session ended because it could not
    /// be refreshed.
    pub fn expire(&self) {
        self.clear();
        warn!("Session expired");
        self.inner.emit(SessionEvent::Expired);
    }

    fn clear(&self) {
        let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = Session::default();
        if let Err(e) = self.inner.credentials.clear() {
            warn!(error = %e, "Failed to clear stored credentials");
        }
    }

    /// Adopt a refreshed token, keeping the current user, but only if the
    /// session still holds `failed_token`. A session that was logged out or
    /// replaced while the refresh was in flight is left alone and `false` is
    /// returned. The pair is persisted together; if that fails the in-memory
    /// token is still replaced.
    pub fn update_token(&self, failed_token: &str, token: &str) -> bool {
        {
            let mut state = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
            if !state.is_authenticated() || state.token != failed_token {
                debug!("Discarding refreshed token for a session that changed");
                return false;
            }
            let refreshed = Session {
                token: token.to_string(),
                user: state.user.clone(),
            };
            if let Err(e) = self.inner.credentials.save(&refreshed) {
                warn!(error = %e, "Failed to persist refreshed token");
            }
            *state = refreshed;
        }
        info!("Session token refreshed");
        self.inner.emit(SessionEvent::Refreshed);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::{TOKEN_KEY, USER_KEY};
    use crate::storage::{KeyValueStore, MemoryStore};
    use serde_json::json;

    fn manager_with(store: Arc<MemoryStore>) -> SessionManager {
        SessionManager::new(CredentialStore::new(store))
    }

    #[test]
    fn test_session_authenticated_iff_token_non_empty() {
        assert!(!Session::default().is_authenticated());
        assert!(Session {
            token: "T".to_string(),
            user: None
        }
        .is_authenticated());
        assert!(!Session {
            token: String::new(),
            user: Some(json!({"id": 1}))
        }
        .is_authenticated());
    }

    #[test]
    fn test_session_bearer() {
        let session = Session {
            token: "T1".to_string(),
            user: None,
        };
        assert_eq!(session.bearer().as_deref(), Some("Bearer T1"));
        assert_eq!(Session::default().bearer(), None);
    }

    #[test]
    fn test_auth_payload_keeps_extra_fields() {
        let payload: AuthPayload =
            serde_json::from_value(json!({"token": "T1", "user": {"id": 1}, "expires_in": 3600}))
                .unwrap();
        assert_eq!(payload.token, "T1");
        assert_eq!(payload.user, Some(json!({"id": 1})));
        assert_eq!(payload.extra.get("expires_in"), Some(&json!(3600)));
    }

    #[test]
    fn test_hydrate_with_stored_session() {
        let store = Arc::new(MemoryStore::new());
        store.set(TOKEN_KEY, "T1").unwrap();
        store.set(USER_KEY, r#"{"id":1}"#).unwrap();
        let manager = manager_with(store);

        assert!(!manager.is_authenticated());
        assert!(manager.hydrate());
        assert!(manager.is_authenticated());
        assert_eq!(manager.token().as_deref(), Some("T1"));
        assert_eq!(manager.user(), Some(json!({"id": 1})));
        assert_eq!(manager.handle().bearer().as_deref(), Some("Bearer T1"));

        // Idempotent
        assert!(manager.hydrate());
        assert_eq!(manager.token().as_deref(), Some("T1"));
    }

    #[test]
    fn test_hydrate_with_empty_store() {
        let manager = manager_with(Arc::new(MemoryStore::new()));
        assert!(!manager.hydrate());
        assert!(!manager.is_authenticated());
        assert_eq!(manager.handle().bearer(), None);
    }

    #[test]
    fn test_establish_persists_pair() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(store.clone());
        let mut events = manager.subscribe();

        let payload = AuthPayload {
            token: "T1".to_string(),
            user: Some(json!({"id": 1})),
            extra: Map::new(),
        };
        manager.establish(&payload).unwrap();

        assert!(manager.is_authenticated());
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("T1"));
        assert_eq!(store.get(USER_KEY).unwrap().as_deref(), Some(r#"{"id":1}"#));
        assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedIn);
    }

    #[test]
    fn test_logout_clears_everything_and_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        store.set(TOKEN_KEY, "T1").unwrap();
        store.set(USER_KEY, r#"{"id":1}"#).unwrap();
        let manager = manager_with(store.clone());
        manager.hydrate();
        let mut events = manager.subscribe();

        manager.logout();
        let after_first = (manager.handle().snapshot(), store.len());
        manager.logout();
        let after_second = (manager.handle().snapshot(), store.len());

        assert_eq!(after_first, (Session::default(), 0));
        assert_eq!(after_first, after_second);
        assert!(!manager.is_authenticated());
        assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedOut);
    }

    #[test]
    fn test_expire_emits_expired() {
        let store = Arc::new(MemoryStore::new());
        store.set(TOKEN_KEY, "T1").unwrap();
        let manager = manager_with(store.clone());
        manager.hydrate();
        let mut events = manager.subscribe();

        manager.expire();

        assert!(!manager.is_authenticated());
        assert!(store.is_empty());
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
    }

    #[test]
    fn test_update_token_keeps_user() {
        let store = Arc::new(MemoryStore::new());
        store.set(TOKEN_KEY, "T1").unwrap();
        store.set(USER_KEY, r#"{"id":1}"#).unwrap();
        let manager = manager_with(store.clone());
        manager.hydrate();
        let handle = manager.handle();

        assert!(manager.update_token("T1", "T2"));

        assert_eq!(handle.token().as_deref(), Some("T2"));
        assert_eq!(manager.user(), Some(json!({"id": 1})));
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("T2"));
        assert_eq!(store.get(USER_KEY).unwrap().as_deref(), Some(r#"{"id":1}"#));
    }

    #[test]
    fn test_update_token_after_logout_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        store.set(TOKEN_KEY, "T1").unwrap();
        store.set(USER_KEY, r#"{"id":1}"#).unwrap();
        let manager = manager_with(store.clone());
        manager.hydrate();

        manager.logout();
        assert!(!manager.update_token("T1", "T2"));

        assert!(!manager.is_authenticated());
        assert_eq!(manager.user(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_token_for_replaced_session_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        store.set(TOKEN_KEY, "T3").unwrap();
        let manager = manager_with(store.clone());
        manager.hydrate();

        assert!(!manager.update_token("T1", "T2"));
        assert_eq!(manager.token().as_deref(), Some("T3"));
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("T3"));
    }

    #[test]
    fn test_update_token_never_logs_in() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(store.clone());

        assert!(!manager.update_token("", "T9"));
        assert!(!manager.is_authenticated());
        assert!(store.is_empty());
    }

    #[test]
    fn test_handle_sees_manager_writes() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(store.clone());
        let handle = manager.handle();
        assert!(!handle.is_authenticated());

        store.set(TOKEN_KEY, "T9").unwrap();
        manager.hydrate();
        assert!(handle.is_authenticated());
        assert_eq!(handle.token().as_deref(), Some("T9"));

        manager.logout();
        assert!(!handle.is_authenticated());
    }
}

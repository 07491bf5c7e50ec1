//! Application wiring.
//!
//! `App` builds the components in startup order: storage, session (hydrated
//! from storage), API client, router and toasts.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, HttpError};
use crate::auth::{CredentialStore, LoginResult, SessionEvent, SessionManager};
use crate::config::{Config, ConfigError, StorageKind};
use crate::notify::ToastService;
use crate::router::{Navigated, RouteTable, Router, LOGIN_PATH};
use crate::storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Http(#[from] HttpError),
}

pub struct App {
    pub config: Config,
    pub session: SessionManager,
    pub api: ApiClient,
    pub router: Router,
    pub toasts: ToastService,
    events: broadcast::Receiver<SessionEvent>,
}

impl App {
    /// Build the application over the store selected in `config`
    pub fn new(config: Config) -> Result<Self, AppError> {
        let store: Arc<dyn KeyValueStore> = match config.storage {
            StorageKind::File => Arc::new(FileStore::new(config.data_dir()?)),
            StorageKind::Keyring => Arc::new(KeyringStore::default()),
            StorageKind::Memory => Arc::new(MemoryStore::new()),
        };
        Self::with_store(config, store)
    }

    /// Build the application over an in-memory store
    pub fn ephemeral(api_url: &str) -> Result<Self, AppError> {
        let config = Config {
            api_url: api_url.to_string(),
            storage: StorageKind::Memory,
            ..Config::default()
        };
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(config: Config, store: Arc<dyn KeyValueStore>) -> Result<Self, AppError> {
        debug!(api_url = %config.api_url, storage = ?config.storage, "Building app");

        let session = SessionManager::new(CredentialStore::new(store));
        let restored = session.hydrate();
        debug!(restored, "Session hydration finished");

        let api = ApiClient::new(&config, session.clone())?;
        let router = Router::new(RouteTable::default(), session.handle());
        let events = session.subscribe();

        Ok(Self {
            config,
            session,
            api,
            router,
            toasts: ToastService::new(),
            events,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Log in and report the outcome as a toast
    pub async fn login(&mut self, identifier: &str, secret: &str) -> LoginResult {
        let result = self.session.login(&self.api, identifier, secret).await;
        match result {
            Ok(_) => {
                self.toasts.success("Logged in.");
            }
            Err(ref e) => {
                self.toasts.error(e.to_string(), None);
            }
        }
        self.pump_session_events();
        result
    }

    pub fn logout(&mut self) {
        self.session.logout();
        self.pump_session_events();
    }

    /// Navigate, landing on the login page if the guard loops
    pub fn navigate(&mut self, path: &str) -> Navigated {
        match self.router.push(path) {
            Ok(nav) => nav,
            Err(e) => {
                warn!(error = %e, "Navigation aborted");
                self.toasts.error(e.to_string(), None);
                Navigated {
                    requested: path.to_string(),
                    location: self.router.current().unwrap_or(LOGIN_PATH).to_string(),
                    name: None,
                }
            }
        }
    }

    /// Show a failed request as an error toast. An expired session is left
    /// to `pump_session_events`, which already reports it.
    pub fn report_http_error(&mut self, error: &HttpError) {
        match error {
            HttpError::AuthExpired { .. } => {
                debug!("Request failed on an expired session");
            }
            _ => {
                self.toasts.error(error.friendly_message(), None);
            }
        }
    }

    /// Apply pending session events to the router. An expired session also
    /// gets a toast. Returns how many events were handled.
    pub fn pump_session_events(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    handled += 1;
                    if event == SessionEvent::Expired {
                        self.toasts
                            .error("Session expired. Please log in again.", None);
                    }
                    match self.router.on_session_event(event) {
                        Ok(Some(nav)) => info!(location = %nav.location, ?event, "Navigated after session change"),
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "Navigation after session change failed"),
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed session events");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        handled
    }
}

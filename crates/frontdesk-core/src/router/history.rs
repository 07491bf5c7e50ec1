use thiserror::Error;
use tracing::debug;

use super::routes::normalize;
use super::{guard, Navigation, RouteTable, LOGIN_PATH};
use crate::auth::{SessionEvent, SessionHandle};

/// Redirects followed for one navigation before giving up
const MAX_REDIRECTS: usize = 8;

#[derive(Error, Debug, PartialEq)]
pub enum RouterError {
    #[error("Too many redirects navigating to {0}")]
    RedirectLoop(String),
}

/// A completed navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigated {
    pub requested: String,
    pub location: String,
    pub name: Option<String>,
}

impl Navigated {
    pub fn redirected(&self) -> bool {
        self.requested != self.location
    }
}

/// Route table plus a browser-style history. Every move, back and forward
/// included, is checked against the live session.
pub struct Router {
    table: RouteTable,
    session: SessionHandle,
    entries: Vec<String>,
    cursor: usize,
}

impl Router {
    pub fn new(table: RouteTable, session: SessionHandle) -> Self {
        Self {
            table,
            session,
            entries: Vec::new(),
            cursor: 0,
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Current location, `None` before the first navigation
    pub fn current(&self) -> Option<&str> {
        self.entries.get(self.cursor).map(String::as_str)
    }

    pub fn history(&self) -> &[String] {
        &self.entries
    }

    /// Run the guard for `path`, following redirects to the final location.
    pub fn resolve(&self, path: &str) -> Result<Navigated, RouterError> {
        let requested = normalize(path);
        let authenticated = self.session.is_authenticated();
        let mut location = requested.clone();

        for _ in 0..=MAX_REDIRECTS {
            match guard(self.table.meta_for(&location), authenticated) {
                Navigation::Proceed => {
                    let name = self.table.resolve(&location).and_then(|m| m.name);
                    return Ok(Navigated {
                        requested,
                        location,
                        name,
                    });
                }
                Navigation::Redirect(to) => {
                    debug!(from = %location, to = %to, "Navigation redirected");
                    location = normalize(&to);
                }
            }
        }
        Err(RouterError::RedirectLoop(requested))
    }

    /// Navigate to `path`, adding a history entry
    pub fn push(&mut self, path: &str) -> Result<Navigated, RouterError> {
        let nav = self.resolve(path)?;
        if self.current() != Some(nav.location.as_str()) {
            if !self.entries.is_empty() {
                self.entries.truncate(self.cursor + 1);
            }
            self.entries.push(nav.location.clone());
            self.cursor = self.entries.len() - 1;
        }
        Ok(nav)
    }

    /// Navigate to `path`, replacing the current history entry
    pub fn replace(&mut self, path: &str) -> Result<Navigated, RouterError> {
        let nav = self.resolve(path)?;
        match self.entries.get_mut(self.cursor) {
            Some(entry) => *entry = nav.location.clone(),
            None => {
                self.entries.push(nav.location.clone());
                self.cursor = 0;
            }
        }
        Ok(nav)
    }

    /// Step back one entry. `Ok(None)` when there is nothing behind.
    pub fn back(&mut self) -> Result<Option<Navigated>, RouterError> {
        if self.cursor == 0 || self.entries.is_empty() {
            return Ok(None);
        }
        self.step_to(self.cursor - 1).map(Some)
    }

    /// Step forward one entry. `Ok(None)` when there is nothing ahead.
    pub fn forward(&mut self) -> Result<Option<Navigated>, RouterError> {
        if self.cursor + 1 >= self.entries.len() {
            return Ok(None);
        }
        self.step_to(self.cursor + 1).map(Some)
    }

    fn step_to(&mut self, index: usize) -> Result<Navigated, RouterError> {
        let nav = self.resolve(&self.entries[index])?;
        self.cursor = index;
        self.entries[index] = nav.location.clone();
        Ok(nav)
    }

    /// Re-check the current location, e.g. after the session changed
    pub fn revalidate(&mut self) -> Result<Option<Navigated>, RouterError> {
        match self.current().map(str::to_string) {
            Some(current) => self.replace(&current).map(Some),
            None => Ok(None),
        }
    }

    /// React to a session change. An expired session is sent to the login
    /// page; logging in or out re-checks the current page.
    pub fn on_session_event(
        &mut self,
        event: SessionEvent,
    ) -> Result<Option<Navigated>, RouterError> {
        match event {
            SessionEvent::Expired => self.push(LOGIN_PATH).map(Some),
            SessionEvent::LoggedIn | SessionEvent::LoggedOut => self.revalidate(),
            SessionEvent::Refreshed => Ok(None),
        }
    }
}

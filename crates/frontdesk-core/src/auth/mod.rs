//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionManager`: owns the token/user pair and the login, logout and
//!   hydrate operations
//! - `SessionHandle`: read-only view of the session for other components
//! - `CredentialStore`: persists the token and user into a `KeyValueStore`
//!
//! The session is authenticated exactly when its token is non-empty.

pub mod credentials;
pub mod error;
pub mod session;

pub use credentials::CredentialStore;
pub use error::{LoginError, LoginResult};
pub use session::{AuthPayload, Session, SessionEvent, SessionHandle, SessionManager};

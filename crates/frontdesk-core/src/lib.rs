//! frontdesk core library.
//!
//! Client-side session handling for a single-page application front end:
//! the persisted token/user pair, an API client that attaches the bearer
//! token and refreshes it on a 401, a route guard and toast notifications.
//! Rendering is left to whoever consumes these types.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod notify;
pub mod router;
pub mod storage;

pub use api::{ApiClient, ApiResponse, HttpError, PendingRequest};
pub use app::{App, AppError};
pub use auth::{AuthPayload, LoginError, LoginResult, Session, SessionEvent, SessionHandle, SessionManager};
pub use config::{Config, StorageKind};
pub use notify::{Severity, Toast, ToastService};
pub use router::{guard, Navigation, RouteMeta, Router};

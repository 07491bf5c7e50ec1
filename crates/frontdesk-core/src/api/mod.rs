//! REST API client module.
//!
//! This module provides the `ApiClient` for talking to the application's
//! backend. Every request carries the current session's bearer token; a 401
//! triggers one token refresh and one retry of the original request.

pub mod client;
pub mod error;
pub mod request;

pub use client::ApiClient;
pub use error::{friendly_message, HttpError};
pub use request::{ApiResponse, PendingRequest};

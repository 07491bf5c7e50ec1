//! Navigation guarding.
//!
//! This module provides:
//! - `guard`: the pure predicate deciding whether a navigation may proceed
//! - `RouteTable`: the application's routes and their auth requirements
//! - `Router`: a history stack that runs the guard on every move, including
//!   back and forward

pub mod guard;
pub mod history;
pub mod routes;

pub use guard::{guard, Navigation, RouteMeta, HOME_PATH, LOGIN_PATH};
pub use history::{Navigated, Router, RouterError};
pub use routes::{RouteMatch, RouteRecord, RouteTable};

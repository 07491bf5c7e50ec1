use serde::{Deserialize, Serialize};

/// Where unauthenticated users are sent
pub const LOGIN_PATH: &str = "/login";

/// Where authenticated users are sent away from guest-only pages
pub const HOME_PATH: &str = "/";

/// Auth requirements declared by a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(default, rename_all = "camelCase")]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_guest: bool,
}

impl RouteMeta {
    pub const fn auth() -> Self {
        Self {
            requires_auth: true,
            requires_guest: false,
        }
    }

    pub const fn guest() -> Self {
        Self {
            requires_auth: false,
            requires_guest: true,
        }
    }

    /// Combine with a parent's requirements; a flag set anywhere applies
    pub fn merge(self, other: RouteMeta) -> Self {
        Self {
            requires_auth: self.requires_auth || other.requires_auth,
            requires_guest: self.requires_guest || other.requires_guest,
        }
    }
}

/// Guard decision for one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "kind", content = "to", rename_all = "camelCase")]
pub enum Navigation {
    Proceed,
    Redirect(String),
}

/// Decide whether a navigation to a route with `meta` may proceed.
pub fn guard(meta: RouteMeta, authenticated: bool) -> Navigation {
    if meta.requires_auth && !authenticated {
        return Navigation::Redirect(LOGIN_PATH.to_string());
    }
    if meta.requires_guest && authenticated {
        return Navigation::Redirect(HOME_PATH.to_string());
    }
    Navigation::Proceed
}

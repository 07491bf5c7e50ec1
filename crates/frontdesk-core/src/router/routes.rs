use super::RouteMeta;

/// One declared route. Children inherit their ancestors' requirements.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRecord {
    pub path: String,
    pub name: Option<String>,
    pub meta: RouteMeta,
    pub children: Vec<RouteRecord>,
}

impl RouteRecord {
    pub fn new(path: impl Into<String>, meta: RouteMeta) -> Self {
        Self {
            path: path.into(),
            name: None,
            meta,
            children: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn child(mut self, child: RouteRecord) -> Self {
        self.children.push(child);
        self
    }
}

/// Result of resolving a path against the table.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub path: String,
    pub name: Option<String>,
    /// Requirements merged along the matched chain
    pub meta: RouteMeta,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteTable {
    routes: Vec<RouteRecord>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteRecord>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[RouteRecord] {
        &self.routes
    }

    /// Find the deepest route matching `path`
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        let path = normalize(path);
        self.routes
            .iter()
            .find_map(|route| resolve_in(route, "", RouteMeta::default(), &path))
    }

    /// Requirements for `path`; unknown paths have none
    pub fn meta_for(&self, path: &str) -> RouteMeta {
        self.resolve(path).map(|m| m.meta).unwrap_or_default()
    }
}

impl Default for RouteTable {
    /// The application's routes: guest-only login and registration pages,
    /// and an authenticated layout holding the dashboard.
    fn default() -> Self {
        Self::new(vec![
            RouteRecord::new("/login", RouteMeta::guest()).named("Login"),
            RouteRecord::new("/register", RouteMeta::guest()).named("Register"),
            RouteRecord::new("/", RouteMeta::auth())
                .child(RouteRecord::new("", RouteMeta::default()).named("Dashboard")),
        ])
    }
}

fn resolve_in(
    route: &RouteRecord,
    parent: &str,
    inherited: RouteMeta,
    path: &str,
) -> Option<RouteMatch> {
    let full = join(parent, &route.path);
    let meta = inherited.merge(route.meta);

    if let Some(found) = route
        .children
        .iter()
        .find_map(|child| resolve_in(child, &full, meta, path))
    {
        return Some(found);
    }

    (full == path).then(|| RouteMatch {
        path: full,
        name: route.name.clone(),
        meta,
    })
}

fn join(parent: &str, child: &str) -> String {
    if child.starts_with('/') {
        return normalize(child);
    }
    if child.is_empty() {
        return normalize(parent);
    }
    normalize(&format!("{}/{}", parent.trim_end_matches('/'), child))
}

/// Strip query and fragment, ensure a leading slash and drop trailing ones.
pub(crate) fn normalize(path: &str) -> String {
    let path = path
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    let trimmed = path.trim_matches('/');
    format!("/{}", trimmed)
}

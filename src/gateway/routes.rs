//! Route table of the gateway: public prefix, upstream, rewritten prefix and
//! the kind of credential a request needs.

use axum::http::Method;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Upstream {
    Tasks,
    Projects,
    Errors,
}

impl Upstream {
    /// Name used in client-facing proxy errors.
    pub fn display_name(&self) -> &'static str {
        match self {
            Upstream::Tasks => "Tasks Service",
            Upstream::Projects => "Projects Service",
            Upstream::Errors => "Error Service",
        }
    }
}

/// Credential required by a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any valid user token
    User,
    /// Service token carrying the `service-role` realm role
    Service,
    /// User token carrying the `admin` realm role
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    pub prefix: &'static str,
    pub rewrite_to: &'static str,
    pub upstream: Upstream,
}

impl Route {
    const fn new(
        name: &'static str,
        prefix: &'static str,
        rewrite_to: &'static str,
        upstream: Upstream,
    ) -> Self {
        Self {
            name,
            prefix,
            rewrite_to,
            upstream,
        }
    }

    pub fn access(&self, method: &Method) -> Access {
        match self.upstream {
            Upstream::Errors if method == Method::POST => Access::Service,
            Upstream::Errors => Access::Admin,
            _ => Access::User,
        }
    }
}

/// A matched request: the route and the upstream path (query excluded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched<'a> {
    pub route: &'a Route,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Every route the gateway knows about.
    pub fn standard() -> Self {
        Self::new(vec![
            Route::new("tasks", "/gw/tasks", "/tasks", Upstream::Tasks),
            Route::new("categories", "/gw/categories", "/categories", Upstream::Tasks),
            Route::new("import", "/gw/import", "/import", Upstream::Tasks),
            Route::new("export", "/gw/export", "/export", Upstream::Tasks),
            Route::new("reports", "/gw/reports", "/reports", Upstream::Tasks),
            Route::new("projects", "/gw/projects", "/api/v1/projects", Upstream::Projects),
            Route::new("errors", "/gw/errors", "/api/errors", Upstream::Errors),
        ])
    }

    /// Drop the routes of upstreams that are not configured.
    pub fn retain_upstreams(mut self, enabled: impl Fn(Upstream) -> bool) -> Self {
        self.routes.retain(|r| enabled(r.upstream));
        self
    }

    /// Match `path` against the prefixes on segment boundaries and rewrite it.
    pub fn resolve(&self, path: &str) -> Option<Matched<'_>> {
        self.routes.iter().find_map(|route| {
            let rest = path.strip_prefix(route.prefix)?;
            if !(rest.is_empty() || rest.starts_with('/')) {
                return None;
            }
            Some(Matched {
                route,
                path: format!("{}{}", route.rewrite_to, rest),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_rewritten() {
        let table = RouteTable::standard();
        let m = table.resolve("/gw/tasks/42/status").unwrap();
        assert_eq!(m.route.name, "tasks");
        assert_eq!(m.path, "/tasks/42/status");

        let m = table.resolve("/gw/projects").unwrap();
        assert_eq!(m.route.upstream, Upstream::Projects);
        assert_eq!(m.path, "/api/v1/projects");

        let m = table.resolve("/gw/export/download/abc").unwrap();
        assert_eq!(m.path, "/export/download/abc");
    }

    #[test]
    fn prefixes_match_whole_segments_only() {
        let table = RouteTable::standard();
        assert!(table.resolve("/gw/tasksX").is_none());
        assert!(table.resolve("/gw/task").is_none());
        assert!(table.resolve("/gw").is_none());
        assert!(table.resolve("/tasks").is_none());
    }

    #[test]
    fn errors_route_access_depends_on_method() {
        let table = RouteTable::standard();
        let route = table.resolve("/gw/errors").unwrap().route;
        assert_eq!(route.access(&Method::POST), Access::Service);
        assert_eq!(route.access(&Method::GET), Access::Admin);
        assert_eq!(route.access(&Method::DELETE), Access::Admin);

        let tasks = table.resolve("/gw/tasks").unwrap().route;
        assert_eq!(tasks.access(&Method::POST), Access::User);
    }

    #[test]
    fn disabled_upstreams_have_no_routes() {
        let table = RouteTable::standard().retain_upstreams(|u| u != Upstream::Errors);
        assert!(table.resolve("/gw/errors").is_none());
        assert!(table.resolve("/gw/categories").is_some());
    }
}

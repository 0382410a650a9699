//! Routing: pattern registration and best-match lookup.
//!
//! Routes are matched against the request path with [`PathPattern`]. When several
//! patterns match, the one with the most leading literal segments wins and ties
//! keep registration order. A path that matches only routes bound to other methods
//! yields the allowed method list, so the dispatcher can answer `405`.

pub mod filter;
mod pattern;

pub use pattern::PathPattern;

use crate::PathParams;
use crate::RequestContext;
use crate::error::RouterBuildError;
use crate::handler::RequestHandler;
use filter::{AllFilter, Filter};
use http::Method;
use std::fmt;
use tracing::debug;

/// Main router structure that handles request routing
pub struct Router {
    items: Vec<RouterItem>,
}

/// A registered route: pattern, method constraint, extra filters and handler
pub struct RouterItem {
    pattern: PathPattern,
    method: Option<Method>,
    filter: AllFilter,
    handler: Box<dyn RequestHandler>,
}

/// Result of matching a route
#[derive(Debug)]
pub struct RouteResult<'router> {
    matched: Option<&'router RouterItem>,
    params: PathParams,
    allowed_methods: Vec<Method>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Finds the handler for `method` and `path`.
    ///
    /// Routes whose pattern matches but whose method differs are collected into
    /// [`RouteResult::allowed_methods`].
    pub fn at(&self, path: &str, method: &Method) -> RouteResult<'_> {
        let mut best: Option<(&RouterItem, PathParams)> = None;
        let mut allowed_methods = Vec::new();

        for item in &self.items {
            let Some(params) = item.pattern.matches(path) else {
                continue;
            };

            match &item.method {
                Some(m) if m != method => {
                    if !allowed_methods.contains(m) {
                        allowed_methods.push(m.clone());
                    }
                }
                _ => {
                    let better = best
                        .as_ref()
                        .is_none_or(|(current, _)| item.pattern.literal_prefix() > current.pattern.literal_prefix());
                    if better {
                        best = Some((item, params));
                    }
                }
            }
        }

        match best {
            Some((item, params)) => {
                debug!(pattern = %item.pattern, path, "route matched");
                RouteResult { matched: Some(item), params, allowed_methods: Vec::new() }
            }
            None => RouteResult { matched: None, params: PathParams::empty(), allowed_methods },
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("items", &self.items).finish()
    }
}

impl RouterItem {
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// The method constraint, `None` when the route accepts any method
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// Additional filters attached with [`RouterItemBuilder::with`]
    pub fn filter(&self) -> &dyn Filter {
        &self.filter
    }

    /// Whether the extra filters accept the request
    pub fn accepts(&self, req: &RequestContext) -> bool {
        self.filter.matches(req)
    }

    pub fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for RouterItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterItem")
            .field("pattern", &self.pattern)
            .field("method", &self.method)
            .field("signature", self.handler.signature())
            .finish_non_exhaustive()
    }
}

impl<'router> RouteResult<'router> {
    #[inline]
    pub fn is_matched(&self) -> bool {
        self.matched.is_some()
    }

    pub fn router_item(&self) -> Option<&'router RouterItem> {
        self.matched
    }

    /// Gets the path parameters from the matched route
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn into_params(self) -> PathParams {
        self.params
    }

    pub fn pattern(&self) -> Option<&'router PathPattern> {
        self.matched.map(RouterItem::pattern)
    }

    /// Methods of routes whose pattern matched the path, only filled when no route
    /// accepted the request method.
    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed_methods
    }
}

#[derive(Debug)]
pub struct RouterBuilder {
    routes: Vec<(String, RouterItemBuilder)>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self { routes: vec![] }
    }

    pub fn route(mut self, route: impl Into<String>, item_builder: RouterItemBuilder) -> Self {
        self.routes.push((route.into(), item_builder));
        self
    }

    /// Builds the router, validating every pattern and handler signature.
    pub fn build(self) -> Result<Router, RouterBuildError> {
        let items = self
            .routes
            .into_iter()
            .map(|(route, item_builder)| item_builder.build(&route))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Router { items })
    }
}

macro_rules! method_router {
    ($method:ident, $upper_case_method:ident) => {
        #[doc = concat!("Registers a handler for ", stringify!($upper_case_method), " requests.")]
        pub fn $method<H: RequestHandler + 'static>(handler: H) -> RouterItemBuilder {
            RouterItemBuilder::new(Some(Method::$upper_case_method), handler)
        }
    };
}

method_router!(get, GET);
method_router!(post, POST);
method_router!(put, PUT);
method_router!(delete, DELETE);
method_router!(head, HEAD);
method_router!(options, OPTIONS);
method_router!(connect, CONNECT);
method_router!(patch, PATCH);
method_router!(trace, TRACE);

/// Registers a handler for every method.
pub fn any<H: RequestHandler + 'static>(handler: H) -> RouterItemBuilder {
    RouterItemBuilder::new(None, handler)
}

pub struct RouterItemBuilder {
    method: Option<Method>,
    filter: AllFilter,
    handler: Box<dyn RequestHandler>,
}

impl RouterItemBuilder {
    fn new<H: RequestHandler + 'static>(method: Option<Method>, handler: H) -> Self {
        Self { method, filter: filter::all_filter(), handler: Box::new(handler) }
    }

    /// Attaches an extra filter; a request the filters reject is answered with `404`.
    #[must_use]
    pub fn with<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filter.and(filter);
        self
    }

    fn build(self, route: &str) -> Result<RouterItem, RouterBuildError> {
        let pattern = PathPattern::parse(route)?;
        self.handler
            .signature()
            .validate()
            .map_err(|reason| RouterBuildError::InvalidSignature { pattern: route.to_owned(), reason })?;
        Ok(RouterItem { pattern, method: self.method, filter: self.filter, handler: self.handler })
    }
}

impl fmt::Debug for RouterItemBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterItemBuilder").field("method", &self.method).finish_non_exhaustive()
    }
}

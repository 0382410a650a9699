//! Composable request filters.
//!
//! Filters decide whether a route or an interceptor applies to a request. They can
//! test the method, a header, or the request path against a [`PathPattern`], and
//! combine with AND/OR/NOT logic.
//!
//! # Examples
//!
//! ```
//! use micro_dispatch::router::filter::{all_filter, get_method, not, path};
//!
//! let mut filter = all_filter();
//! filter.and(get_method()).and(not(path("/private/**").unwrap()));
//! ```

use crate::RequestContext;
use crate::error::PatternError;
use crate::router::PathPattern;
use http::{HeaderName, HeaderValue, Method};
use std::fmt;

/// Core trait for request filtering.
///
/// The trait requires `Send + Sync` so filters can be shared by concurrent dispatches.
pub trait Filter: Send + Sync {
    /// Returns `true` if the request matches this filter's criteria.
    fn matches(&self, req: &RequestContext) -> bool;
}

struct FnFilter<F: Fn(&RequestContext) -> bool>(F);

impl<F: Fn(&RequestContext) -> bool + Send + Sync> Filter for FnFilter<F> {
    fn matches(&self, req: &RequestContext) -> bool {
        (self.0)(req)
    }
}

/// Creates a new filter from a closure.
///
/// ```
/// use micro_dispatch::router::filter::fn_filter;
///
/// let api_filter = fn_filter(|req| req.path().starts_with("/api"));
/// ```
pub fn fn_filter<F>(f: F) -> impl Filter
where
    F: Fn(&RequestContext) -> bool + Send + Sync,
{
    FnFilter(f)
}

/// Creates a new OR-composed filter chain.
pub fn any_filter() -> AnyFilter {
    AnyFilter::new()
}

/// Compose filters with OR logic.
///
/// An empty chain returns true.
pub struct AnyFilter {
    filters: Vec<Box<dyn Filter>>,
}

impl AnyFilter {
    fn new() -> Self {
        Self { filters: vec![] }
    }

    /// Add a new filter to the OR chain.
    pub fn or<F: Filter + 'static>(&mut self, filter: F) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Filter for AnyFilter {
    fn matches(&self, req: &RequestContext) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|filter| filter.matches(req))
    }
}

impl fmt::Debug for AnyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyFilter").field("filters", &self.filters.len()).finish()
    }
}

/// Creates a new AND-composed filter chain.
pub fn all_filter() -> AllFilter {
    AllFilter::new()
}

/// Compose filters with AND logic.
///
/// An empty chain returns true.
pub struct AllFilter {
    filters: Vec<Box<dyn Filter>>,
}

impl AllFilter {
    fn new() -> Self {
        Self { filters: vec![] }
    }

    /// Add a new filter to the AND chain.
    pub fn and<F: Filter + 'static>(&mut self, filter: F) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl Filter for AllFilter {
    fn matches(&self, req: &RequestContext) -> bool {
        self.filters.iter().all(|filter| filter.matches(req))
    }
}

impl fmt::Debug for AllFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllFilter").field("filters", &self.filters.len()).finish()
    }
}

/// Inverts the inner filter.
pub fn not<F: Filter + 'static>(filter: F) -> NotFilter {
    NotFilter(Box::new(filter))
}

pub struct NotFilter(Box<dyn Filter>);

impl Filter for NotFilter {
    fn matches(&self, req: &RequestContext) -> bool {
        !self.0.matches(req)
    }
}

impl fmt::Debug for NotFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NotFilter")
    }
}

/// A filter that matches HTTP methods.
#[derive(Debug, Clone)]
pub struct MethodFilter(Method);

impl Filter for MethodFilter {
    fn matches(&self, req: &RequestContext) -> bool {
        self.0.eq(req.method())
    }
}

macro_rules! method_filter {
    ($method:ident, $upper_case_method:ident) => {
        #[doc = concat!("Creates a filter that matches HTTP ", stringify!($upper_case_method), " requests.")]
        #[inline]
        pub fn $method() -> MethodFilter {
            MethodFilter(Method::$upper_case_method)
        }
    };
}

method_filter!(get_method, GET);
method_filter!(post_method, POST);
method_filter!(put_method, PUT);
method_filter!(delete_method, DELETE);
method_filter!(head_method, HEAD);
method_filter!(options_method, OPTIONS);
method_filter!(connect_method, CONNECT);
method_filter!(patch_method, PATCH);
method_filter!(trace_method, TRACE);

/// Creates a filter that matches a specific header name and value.
pub fn header<K, V>(header_name: K, header_value: V) -> Result<HeaderFilter, http::Error>
where
    HeaderName: TryFrom<K>,
    <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
    HeaderValue: TryFrom<V>,
    <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
{
    let name = <HeaderName as TryFrom<K>>::try_from(header_name).map_err(Into::into)?;
    let value = <HeaderValue as TryFrom<V>>::try_from(header_value).map_err(Into::into)?;
    Ok(HeaderFilter(name, value))
}

/// A filter that matches HTTP headers.
#[derive(Debug, Clone)]
pub struct HeaderFilter(HeaderName, HeaderValue);

impl Filter for HeaderFilter {
    fn matches(&self, req: &RequestContext) -> bool {
        req.headers().get(&self.0).is_some_and(|value| self.1.eq(value))
    }
}

/// Creates a filter that matches the request path against a pattern.
pub fn path(pattern: &str) -> Result<PathFilter, PatternError> {
    PathPattern::parse(pattern).map(PathFilter)
}

/// A filter that matches the request path against a [`PathPattern`].
#[derive(Debug, Clone)]
pub struct PathFilter(PathPattern);

impl PathFilter {
    pub fn new(pattern: PathPattern) -> Self {
        Self(pattern)
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.0
    }
}

impl Filter for PathFilter {
    fn matches(&self, req: &RequestContext) -> bool {
        self.0.matches(req.path()).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PathParams;
    use http::Request;

    fn request(method: Method, uri: &str) -> RequestContext {
        let (parts, ()) = Request::builder()
            .method(method)
            .uri(uri)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(())
            .unwrap()
            .into_parts();
        RequestContext::new(parts, PathParams::empty())
    }

    #[test]
    fn test_empty_chains_match() {
        let req = request(Method::GET, "/");
        assert!(any_filter().matches(&req));
        assert!(all_filter().matches(&req));
    }

    #[test]
    fn test_compose() {
        let mut filter = all_filter();
        filter.and(get_method()).and(not(path("/private/**").unwrap()));

        assert!(filter.matches(&request(Method::GET, "/hello")));
        assert!(!filter.matches(&request(Method::POST, "/hello")));
        assert!(!filter.matches(&request(Method::GET, "/private/data")));

        let mut any = any_filter();
        any.or(path("/user/{id}").unwrap()).or(path("/upload").unwrap());
        assert!(any.matches(&request(Method::DELETE, "/user/1")));
        assert!(any.matches(&request(Method::POST, "/upload")));
        assert!(!any.matches(&request(Method::POST, "/user")));
    }

    #[test]
    fn test_header_filter() {
        let json = header(http::header::CONTENT_TYPE, "application/json").unwrap();
        let form = header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded").unwrap();
        let req = request(Method::POST, "/postTest4");

        assert!(json.matches(&req));
        assert!(!form.matches(&req));
        assert!(header("bad header", "x").is_err());
    }

    #[test]
    fn test_fn_filter() {
        let filter = fn_filter(|req| req.query().is_some());
        assert!(filter.matches(&request(Method::GET, "/hello?nickname=a")));
        assert!(!filter.matches(&request(Method::GET, "/hello")));
    }
}

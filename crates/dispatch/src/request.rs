//! Request handling module that provides access to HTTP request information and path parameters.
//!
//! This module contains the core types for working with HTTP requests in the dispatcher:
//! - `RequestContext`: Provides access to request headers and path parameters
//! - `PathParams`: Holds the variables captured while matching a route pattern

use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Uri, Version};
use std::sync::Arc;

/// Represents the context of an HTTP request, providing access to both the request head
/// and any path parameters captured from the URL.
///
/// The context is cheap to clone: the request head is shared, so a handler can take an
/// owned copy while interceptors keep reading the dispatcher's instance.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_header: Arc<Parts>,
    path_params: PathParams,
}

impl RequestContext {
    /// Creates a new RequestContext with the given request head and path parameters
    pub fn new(request_header: Parts, path_params: PathParams) -> Self {
        Self { request_header: Arc::new(request_header), path_params }
    }

    /// Returns a reference to the underlying request head
    pub fn request_header(&self) -> &Parts {
        &self.request_header
    }

    /// Returns the HTTP method of the request
    pub fn method(&self) -> &Method {
        &self.request_header.method
    }

    /// Returns the URI of the request
    pub fn uri(&self) -> &Uri {
        &self.request_header.uri
    }

    /// Returns the path component of the request URI
    pub fn path(&self) -> &str {
        self.request_header.uri.path()
    }

    /// Returns the raw query string, if any
    pub fn query(&self) -> Option<&str> {
        self.request_header.uri.query()
    }

    /// Returns the HTTP version of the request
    pub fn version(&self) -> Version {
        self.request_header.version
    }

    /// Returns the HTTP headers of the request
    pub fn headers(&self) -> &HeaderMap {
        &self.request_header.headers
    }

    /// Returns the extensions attached to the request by the HTTP layer
    pub fn extensions(&self) -> &Extensions {
        &self.request_header.extensions
    }

    /// Returns a reference to the path parameters extracted from the request URL
    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }
}

/// Path variables captured from the request path, in pattern order.
///
/// For example, matching "/users/{id}" against "/users/42" captures `id = "42"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    /// Creates an empty PathParams instance with no parameters
    #[inline]
    pub fn empty() -> Self {
        Self { params: Vec::new() }
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.push((name.into(), value.into()));
    }

    /// Returns true if there are no path parameters
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns the number of path parameters
    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Gets the value of a path parameter by its name
    /// Returns None if the parameter doesn't exist
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.params.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { params: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    #[test]
    fn test_path_params() {
        let params: PathParams = [("id", "42"), ("name", "luren")].into_iter().collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("name"), Some("luren"));
        assert_eq!(params.get("age"), None);
        assert!(PathParams::empty().is_empty());
    }

    #[test]
    fn test_request_context() {
        let (parts, ()) = Request::builder().method(Method::PUT).uri("/user/7?x=1").body(()).unwrap().into_parts();
        let params: PathParams = [("id", "7")].into_iter().collect();
        let req = RequestContext::new(parts, params);

        assert_eq!(req.method(), Method::PUT);
        assert_eq!(req.path(), "/user/7");
        assert_eq!(req.query(), Some("x=1"));
        assert_eq!(req.path_params().get("id"), Some("7"));

        let cloned = req.clone();
        assert_eq!(cloned.path(), req.path());
    }
}

//! Response handling module that converts handler results into HTTP responses.
//!
//! This module provides the [`Responder`] trait which defines how different types
//! can be converted into HTTP responses. It includes implementations for common types
//! like Result, Option, String, etc, plus [`Json`] and [`Redirect`].
//!
//! The [`Responder`] trait is a key part of the response pipeline, allowing handler
//! return values and dispatch errors to be converted into proper HTTP responses.

use crate::RequestContext;
use crate::body::ResponseBody;
use crate::error::DispatchError;
use http::header::{ALLOW, CONTENT_TYPE, LOCATION};
use http::{HeaderValue, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use tracing::error;

fn text_plain_utf_8() -> HeaderValue {
    HeaderValue::from_static("text/plain; charset=utf-8")
}

fn application_json() -> HeaderValue {
    HeaderValue::from_static("application/json")
}

/// A trait for types that can be converted into HTTP responses.
///
/// Types implementing this trait can be returned directly from request handlers
/// and will be automatically converted into HTTP responses.
pub trait Responder {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody>;
}

fn with_content_type(body: ResponseBody, content_type: HeaderValue) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    response
}

/// Implementation for Result allows handlers to return Result types directly.
/// The Ok and Err variants must both implement Responder.
impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        match self {
            Ok(t) => t.response_to(req),
            Err(e) => e.response_to(req),
        }
    }
}

/// Implementation for Option allows handlers to return Option types.
/// None case returns an empty response.
impl<T: Responder> Responder for Option<T> {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        match self {
            Some(t) => t.response_to(req),
            None => Response::new(ResponseBody::empty()),
        }
    }
}

/// Implementation for Response allows passing through pre-built responses.
/// The response body is converted to the internal ResponseBody type.
impl<B> Responder for Response<B>
where
    B: Into<ResponseBody>,
{
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        self.map(Into::into)
    }
}

/// Implementation for (StatusCode, T) tuple allows setting a status code
/// along with the response content.
impl<T: Responder> Responder for (StatusCode, T) {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        let (status, responder) = self;
        let mut response = responder.response_to(req);
        *response.status_mut() = status;
        response
    }
}

/// Implementation for (T, StatusCode) tuple - same as above but with reversed order.
impl<T: Responder> Responder for (T, StatusCode) {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        let (responder, status) = self;
        (status, responder).response_to(req)
    }
}

/// Implementation for Box<T> allows boxing responders.
impl<T: Responder> Responder for Box<T> {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        (*self).response_to(req)
    }
}

/// Implementation for unit type () returns an empty response.
impl Responder for () {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        Response::new(ResponseBody::empty())
    }
}

/// Implementation for static strings returns them as plain text responses.
impl Responder for &'static str {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        with_content_type(ResponseBody::from(self), text_plain_utf_8())
    }
}

/// Implementation for String returns it as a plain text response.
impl Responder for String {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        with_content_type(ResponseBody::from(self), text_plain_utf_8())
    }
}

impl Responder for Infallible {
    fn response_to(self, _req: &RequestContext) -> Response<ResponseBody> {
        match self {}
    }
}

/// Serializes the wrapped value as an `application/json` response.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> Responder for Json<T> {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        match serde_json::to_vec(&self.0) {
            Ok(bytes) => with_content_type(ResponseBody::from(bytes), application_json()),
            Err(e) => {
                error!(path = req.path(), cause = %e, "failed to serialize json response");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").response_to(req)
            }
        }
    }
}

/// A redirect to another location, `302 Found` unless stated otherwise.
#[derive(Debug, Clone)]
pub struct Redirect {
    status: StatusCode,
    location: String,
}

impl Redirect {
    pub fn found(location: impl Into<String>) -> Self {
        Self { status: StatusCode::FOUND, location: location.into() }
    }

    pub fn see_other(location: impl Into<String>) -> Self {
        Self { status: StatusCode::SEE_OTHER, location: location.into() }
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl Responder for Redirect {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        match HeaderValue::try_from(self.location.as_str()) {
            Ok(location) => {
                let mut response = Response::new(ResponseBody::empty());
                *response.status_mut() = self.status;
                response.headers_mut().insert(LOCATION, location);
                response
            }
            Err(e) => {
                error!(location = %self.location, cause = %e, "invalid redirect location");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").response_to(req)
            }
        }
    }
}

impl DispatchError {
    /// Builds the error response without consuming the error, so it can still be handed
    /// to `after_completion`.
    pub fn to_response(&self, req: &RequestContext) -> Response<ResponseBody> {
        let status = self.status();
        let reason = status.canonical_reason().unwrap_or("Error");
        let message = if self.is_client_error() { format!("{reason}: {self}") } else { reason.to_string() };

        let mut response = (status, message).response_to(req);
        if let DispatchError::MethodNotAllowed { allowed, .. } = self {
            let allow = allowed.iter().map(http::Method::as_str).collect::<Vec<_>>().join(", ");
            if let Ok(value) = HeaderValue::try_from(allow) {
                response.headers_mut().insert(ALLOW, value);
            }
        }
        response
    }
}

impl Responder for DispatchError {
    fn response_to(self, req: &RequestContext) -> Response<ResponseBody> {
        self.to_response(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BindingError;
    use crate::request::PathParams;
    use http::{Method, Request};
    use http_body_util::BodyExt;

    fn request() -> RequestContext {
        let (parts, ()) = Request::builder().uri("/hello").body(()).unwrap().into_parts();
        RequestContext::new(parts, PathParams::empty())
    }

    async fn body_string(response: Response<ResponseBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_string_responder() {
        let response = String::from("Hello, luren!").response_to(&request());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(body_string(response).await, "Hello, luren!");
    }

    #[tokio::test]
    async fn test_status_tuple_and_json() {
        let response = (StatusCode::CREATED, Json(serde_json::json!({"id": 1}))).response_to(&request());
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_string(response).await, r#"{"id":1}"#);
    }

    #[test]
    fn test_redirect() {
        let response = Redirect::found("/hello").response_to(&request());
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/hello");

        let invalid = Redirect::found("/bad\nlocation").response_to(&request());
        assert_eq!(invalid.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_dispatch_error_response() {
        let error = DispatchError::from(BindingError::missing("age"));
        let response = error.to_response(&request());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "Bad Request: binding error: missing required parameter `age`");

        let hidden = DispatchError::handler("db password leaked").response_to(&request());
        assert_eq!(hidden.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(hidden).await, "Internal Server Error");

        let not_allowed = DispatchError::MethodNotAllowed {
            method: Method::POST,
            path: "/hello".into(),
            allowed: vec![Method::GET, Method::HEAD],
        };
        let response = not_allowed.to_response(&request());
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, HEAD");
    }
}

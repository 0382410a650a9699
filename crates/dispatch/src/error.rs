//! Error types raised while building routes and dispatching requests.
//!
//! [`DispatchError`] is the top level taxonomy seen by interceptors in
//! `after_completion` and converted into a response at the dispatcher
//! boundary. The narrower errors ([`BindingError`], [`UploadError`]) convert
//! into it with `?`.

use crate::interceptor::Phase;
use http::{Method, StatusCode};
use std::error::Error;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Raised when a route or interceptor path pattern is malformed.
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("pattern `{pattern}` must start with '/'")]
    MissingLeadingSlash { pattern: String },

    #[error("pattern `{pattern}` contains an empty segment")]
    EmptySegment { pattern: String },

    #[error("pattern `{pattern}`: '**' is only allowed as the last segment")]
    MisplacedMultiWildcard { pattern: String },

    #[error("pattern `{pattern}`: invalid variable segment `{segment}`")]
    InvalidVariable { pattern: String, segment: String },

    #[error("pattern `{pattern}`: duplicate variable `{name}`")]
    DuplicateVariable { pattern: String, name: String },
}

#[derive(Error, Debug)]
pub enum RouterBuildError {
    #[error("invalid route: {source}")]
    Pattern {
        #[from]
        source: PatternError,
    },

    #[error("route `{pattern}` has an invalid signature: {reason}")]
    InvalidSignature { pattern: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DispatcherBuildError {
    #[error("a dispatcher needs a router")]
    MissingRouter,
}

#[derive(Error, Debug)]
pub enum BindingError {
    #[error("missing required parameter `{name}`")]
    Missing { name: String },

    #[error("parameter `{name}`: cannot convert `{value}` to {expected}")]
    InvalidValue { name: String, value: String, expected: &'static str },

    #[error("invalid query string: {reason}")]
    InvalidQuery { reason: String },

    #[error("invalid request body: {reason}")]
    InvalidBody { reason: String },

    #[error("parameter `{name}`: {reason}")]
    Deserialize { name: String, reason: String },
}

impl BindingError {
    pub fn missing(name: impl Into<String>) -> Self {
        Self::Missing { name: name.into() }
    }

    pub fn invalid_value(name: impl Into<String>, value: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidValue { name: name.into(), value: value.into(), expected }
    }

    pub fn invalid_body(reason: impl ToString) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("invalid upload file name `{name}`")]
    InvalidFileName { name: String },

    #[error("cannot create upload directory {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to write upload: {source}")]
    Write {
        #[from]
        source: io::Error,
    },

    #[error("upload size mismatch, declared {declared} bytes but received {written}")]
    SizeMismatch { declared: u64, written: u64 },

    #[error("request is not multipart/form-data")]
    NotMultipart,

    #[error("request body has been consumed")]
    BodyConsumed,

    #[error("multipart field `{name}` not found")]
    MissingField { name: String },

    #[error("invalid multipart body: {source}")]
    Multipart {
        #[from]
        source: multer::Error,
    },
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::CreateDir { .. } | UploadError::Write { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::InvalidFileName { .. }
            | UploadError::SizeMismatch { .. }
            | UploadError::NotMultipart
            | UploadError::BodyConsumed
            | UploadError::MissingField { .. }
            | UploadError::Multipart { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("no route for {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("method {method} is not allowed for {path}")]
    MethodNotAllowed { method: Method, path: String, allowed: Vec<Method> },

    #[error("request blocked by interceptor `{interceptor}`")]
    Blocked { interceptor: String },

    #[error("binding error: {source}")]
    Binding {
        #[from]
        source: BindingError,
    },

    #[error("upload error: {source}")]
    Upload {
        #[from]
        source: UploadError,
    },

    #[error("handler error: {source}")]
    Handler { source: BoxError },

    #[error("interceptor `{name}` failed in {phase}: {source}")]
    Interceptor { name: String, phase: Phase, source: BoxError },
}

impl DispatchError {
    /// Wraps a business logic failure raised by a handler.
    pub fn handler(source: impl Into<BoxError>) -> Self {
        Self::Handler { source: source.into() }
    }

    pub fn interceptor(name: impl Into<String>, phase: Phase, source: BoxError) -> Self {
        Self::Interceptor { name: name.into(), phase, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            DispatchError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::Blocked { .. } => StatusCode::FORBIDDEN,
            DispatchError::Binding { .. } => StatusCode::BAD_REQUEST,
            DispatchError::Upload { source } => source.status(),
            DispatchError::Handler { .. } | DispatchError::Interceptor { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the message may be shown to the caller; server side failures only
    /// expose the status reason.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = DispatchError::RouteNotFound { method: Method::GET, path: "/a".into() };
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let binding: DispatchError = BindingError::missing("age").into();
        assert_eq!(binding.status(), StatusCode::BAD_REQUEST);
        assert_eq!(binding.to_string(), "binding error: missing required parameter `age`");

        let traversal: DispatchError = UploadError::InvalidFileName { name: "../x".into() }.into();
        assert_eq!(traversal.status(), StatusCode::BAD_REQUEST);

        let io: DispatchError = UploadError::from(io::Error::other("disk full")).into();
        assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!io.is_client_error());

        let handler = DispatchError::handler("boom");
        assert_eq!(handler.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(handler.to_string(), "handler error: boom");
    }
}

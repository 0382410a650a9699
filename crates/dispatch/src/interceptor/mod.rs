//! Interceptor chain.
//!
//! Interceptors run around a handler in registration order. Each one may stop the
//! chain in [`Interceptor::pre_handle`]. The interceptors that ran then see
//! [`Interceptor::post_handle`] (only when the handler was invoked) and
//! [`Interceptor::after_completion`] (always), both in reverse order.
//!
//! ```
//! use micro_dispatch::interceptor::{Interceptor, InterceptorRegistration, Interceptors};
//!
//! struct Audit;
//! impl Interceptor for Audit {}
//!
//! let interceptors = Interceptors::builder()
//!     .register(InterceptorRegistration::new(Audit).include_path("/user/**").exclude_path("/user/public"))
//!     .build()
//!     .unwrap();
//! assert_eq!(interceptors.len(), 1);
//! ```

pub mod session_gate;

use crate::body::ResponseBody;
use crate::error::{BoxError, DispatchError, PatternError};
use crate::router::PathPattern;
use crate::router::filter::{self, AllFilter, Filter, PathFilter};
use crate::RequestContext;
use async_trait::async_trait;
use futures::FutureExt;
use http::Response;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tracing::{error, warn};

pub use session_gate::SessionGate;

/// The chain phase an interceptor failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PreHandle,
    PostHandle,
    AfterCompletion,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::PreHandle => "pre_handle",
            Phase::PostHandle => "post_handle",
            Phase::AfterCompletion => "after_completion",
        })
    }
}

/// The decision of a [`Interceptor::pre_handle`] call.
#[derive(Debug)]
pub enum PreHandle {
    Proceed,
    /// Stop the chain and answer with this response; the handler is not invoked.
    Block(Response<ResponseBody>),
}

#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Name used in logs and error reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn pre_handle(&self, _req: &RequestContext) -> Result<PreHandle, BoxError> {
        Ok(PreHandle::Proceed)
    }

    async fn post_handle(&self, _req: &RequestContext, _response: &mut Response<ResponseBody>) -> Result<(), BoxError> {
        Ok(())
    }

    async fn after_completion(&self, _req: &RequestContext, _failure: Option<&DispatchError>) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A registered interceptor and the paths it applies to.
pub struct InterceptorEntry {
    interceptor: Box<dyn Interceptor>,
    include: Vec<PathPattern>,
    exclude: Vec<PathPattern>,
    filter: AllFilter,
}

impl InterceptorEntry {
    pub fn name(&self) -> &str {
        self.interceptor.name()
    }

    pub fn include_patterns(&self) -> &[PathPattern] {
        &self.include
    }

    pub fn exclude_patterns(&self) -> &[PathPattern] {
        &self.exclude
    }

    pub fn applies_to(&self, req: &RequestContext) -> bool {
        self.filter.matches(req)
    }
}

impl fmt::Debug for InterceptorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorEntry")
            .field("name", &self.name())
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .finish_non_exhaustive()
    }
}

/// Describes where an interceptor applies.
///
/// With no include pattern the interceptor applies to every path. A path matching
/// any exclude pattern is skipped, so an exclude that covers the include disables
/// the interceptor.
pub struct InterceptorRegistration {
    interceptor: Box<dyn Interceptor>,
    include: Vec<String>,
    exclude: Vec<String>,
    filter: AllFilter,
}

impl InterceptorRegistration {
    pub fn new<I: Interceptor + 'static>(interceptor: I) -> Self {
        Self::from_boxed(Box::new(interceptor))
    }

    pub fn from_boxed(interceptor: Box<dyn Interceptor>) -> Self {
        Self { interceptor, include: vec![], exclude: vec![], filter: filter::all_filter() }
    }

    #[must_use]
    pub fn include_path(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    #[must_use]
    pub fn exclude_path(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Adds a request filter on top of the path patterns.
    #[must_use]
    pub fn with<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filter.and(filter);
        self
    }

    fn build(self) -> Result<InterceptorEntry, PatternError> {
        let include = parse_all(&self.include)?;
        let exclude = parse_all(&self.exclude)?;

        let mut filter = self.filter;
        if !include.is_empty() {
            let mut any = filter::any_filter();
            for pattern in &include {
                any.or(PathFilter::new(pattern.clone()));
            }
            filter.and(any);
        }
        if !exclude.is_empty() {
            let mut any = filter::any_filter();
            for pattern in &exclude {
                any.or(PathFilter::new(pattern.clone()));
            }
            filter.and(filter::not(any));
        }

        Ok(InterceptorEntry { interceptor: self.interceptor, include, exclude, filter })
    }
}

impl fmt::Debug for InterceptorRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorRegistration")
            .field("name", &self.interceptor.name())
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .finish_non_exhaustive()
    }
}

fn parse_all(patterns: &[String]) -> Result<Vec<PathPattern>, PatternError> {
    patterns.iter().map(|p| PathPattern::parse(p)).collect()
}

/// The ordered interceptor chain.
#[derive(Debug, Default)]
pub struct Interceptors {
    entries: Vec<InterceptorEntry>,
}

impl Interceptors {
    pub fn builder() -> InterceptorsBuilder {
        InterceptorsBuilder::new()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[InterceptorEntry] {
        &self.entries
    }

    /// Runs `pre_handle` for every applicable entry until one blocks or fails. A panic
    /// counts as a failure.
    pub async fn run_pre<'a>(&'a self, req: &RequestContext) -> PreHandleOutcome<'a> {
        let mut execution = ChainExecution { ran: Vec::new() };

        for entry in self.entries.iter().filter(|entry| entry.applies_to(req)) {
            execution.ran.push(entry);
            let decision =
                catch_panic(entry.interceptor.pre_handle(req)).await.unwrap_or_else(|panic| Err(panic.into()));
            match decision {
                Ok(PreHandle::Proceed) => {}
                Ok(PreHandle::Block(response)) => {
                    warn!(interceptor = entry.name(), path = %req.path(), status = %response.status(), "request blocked");
                    let status = PreStatus::Blocked { interceptor: entry.name().to_owned(), response };
                    return PreHandleOutcome { execution, status };
                }
                Err(e) => {
                    error!(interceptor = entry.name(), path = %req.path(), cause = %e, "pre_handle failed");
                    let status = PreStatus::Failed(DispatchError::interceptor(entry.name(), Phase::PreHandle, e));
                    return PreHandleOutcome { execution, status };
                }
            }
        }

        PreHandleOutcome { execution, status: PreStatus::Proceed }
    }
}

#[derive(Debug)]
pub struct InterceptorsBuilder {
    registrations: Vec<InterceptorRegistration>,
}

impl InterceptorsBuilder {
    fn new() -> Self {
        Self { registrations: vec![] }
    }

    /// Appends an interceptor applying to every path.
    pub fn add_last<I: Interceptor + 'static>(self, interceptor: I) -> Self {
        self.register(InterceptorRegistration::new(interceptor))
    }

    /// Prepends an interceptor applying to every path.
    pub fn add_first<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.registrations.insert(0, InterceptorRegistration::new(interceptor));
        self
    }

    pub fn register(mut self, registration: InterceptorRegistration) -> Self {
        self.registrations.push(registration);
        self
    }

    pub fn build(self) -> Result<Interceptors, PatternError> {
        let entries = self.registrations.into_iter().map(InterceptorRegistration::build).collect::<Result<Vec<_>, _>>()?;
        Ok(Interceptors { entries })
    }
}

/// What `run_pre` decided.
#[derive(Debug)]
pub enum PreStatus {
    Proceed,
    Blocked { interceptor: String, response: Response<ResponseBody> },
    Failed(DispatchError),
}

#[derive(Debug)]
pub struct PreHandleOutcome<'a> {
    pub execution: ChainExecution<'a>,
    pub status: PreStatus,
}

impl PreHandleOutcome<'_> {
    pub fn should_proceed(&self) -> bool {
        matches!(self.status, PreStatus::Proceed)
    }
}

/// The entries whose `pre_handle` ran for one request, in run order.
#[derive(Debug)]
pub struct ChainExecution<'a> {
    ran: Vec<&'a InterceptorEntry>,
}

impl ChainExecution<'_> {
    pub fn ran(&self) -> impl Iterator<Item = &str> {
        self.ran.iter().map(|entry| entry.name())
    }

    pub fn is_empty(&self) -> bool {
        self.ran.is_empty()
    }

    /// Runs `post_handle` in reverse order, stopping at the first failure.
    pub async fn apply_post_handle(
        &self,
        req: &RequestContext,
        response: &mut Response<ResponseBody>,
    ) -> Result<(), DispatchError> {
        for entry in self.ran.iter().rev() {
            let result =
                catch_panic(entry.interceptor.post_handle(req, response)).await.unwrap_or_else(|panic| Err(panic.into()));
            if let Err(e) = result {
                error!(interceptor = entry.name(), path = %req.path(), cause = %e, "post_handle failed");
                return Err(DispatchError::interceptor(entry.name(), Phase::PostHandle, e));
            }
        }
        Ok(())
    }

    /// Runs `after_completion` in reverse order. A failing or panicking call does not
    /// stop the remaining ones; the failures are returned.
    pub async fn trigger_after_completion(
        &self,
        req: &RequestContext,
        failure: Option<&DispatchError>,
    ) -> Vec<CompletionFailure> {
        let mut failures = Vec::new();

        for entry in self.ran.iter().rev() {
            let message = match catch_panic(entry.interceptor.after_completion(req, failure)).await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic,
            };

            error!(interceptor = entry.name(), path = %req.path(), cause = %message, "after_completion failed");
            failures.push(CompletionFailure { interceptor: entry.name().to_owned(), message });
        }

        failures
    }
}

/// Polls `future` to completion, turning a panic into its message.
pub(crate) async fn catch_panic<F: Future>(future: F) -> Result<F::Output, String> {
    AssertUnwindSafe(future).catch_unwind().await.map_err(|panic| panic_message(panic.as_ref()))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_owned()
    }
}

/// A failed `after_completion` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionFailure {
    pub interceptor: String,
    pub message: String,
}

/// Response extension listing the `after_completion` failures of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionFailures(pub Vec<CompletionFailure>);

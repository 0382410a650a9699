//! The request pipeline.
//!
//! [`Dispatcher::dispatch`] resolves the route, runs the interceptor chain, binds the
//! handler's parameters, invokes it and always finishes with `after_completion` for
//! the interceptors that ran. Every failure, a panicking handler included, is turned
//! into a response here.

use crate::binder::bind_request;
use crate::body::{OptionReqBody, ResponseBody};
use crate::error::{BoxError, DispatchError, DispatcherBuildError};
use crate::interceptor::{ChainExecution, CompletionFailures, Interceptors, PreStatus, catch_panic};
use crate::router::{RouterItem, Router};
use crate::{PathParams, RequestContext};
use bytes::Bytes;
use http::{Request, Response};
use http_body::Body as HttpBody;
use tracing::{debug, error, warn};

#[derive(Debug)]
pub struct Dispatcher {
    router: Router,
    interceptors: Interceptors,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn interceptors(&self) -> &Interceptors {
        &self.interceptors
    }

    pub async fn dispatch<B>(&self, request: Request<B>) -> Response<ResponseBody>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        let body = OptionReqBody::new(body);

        let route_result = self.router.at(parts.uri.path(), &parts.method);
        let Some(item) = route_result.router_item() else {
            let allowed = route_result.allowed_methods().to_vec();
            let req = RequestContext::new(parts, PathParams::empty());
            return route_error(&req, allowed).to_response(&req);
        };

        let req = RequestContext::new(parts, route_result.into_params());
        if !item.accepts(&req) {
            return route_error(&req, Vec::new()).to_response(&req);
        }

        let outcome = self.interceptors.run_pre(&req).await;
        let execution = outcome.execution;
        let (mut response, failure) = match outcome.status {
            PreStatus::Proceed => handle(item, &req, body, &execution).await,
            PreStatus::Blocked { response, .. } => (response, None),
            PreStatus::Failed(failure) => (failure.to_response(&req), Some(failure)),
        };

        let failures = execution.trigger_after_completion(&req, failure.as_ref()).await;
        if !failures.is_empty() {
            response.extensions_mut().insert(CompletionFailures(failures));
        }
        response
    }
}

fn route_error(req: &RequestContext, allowed: Vec<http::Method>) -> DispatchError {
    let method = req.method().clone();
    let path = req.path().to_owned();
    if allowed.is_empty() {
        debug!(%method, %path, "no route found");
        DispatchError::RouteNotFound { method, path }
    } else {
        debug!(%method, %path, ?allowed, "method not allowed");
        DispatchError::MethodNotAllowed { method, path, allowed }
    }
}

/// Binds, invokes and post-handles; returns the response and the request failure, if any.
async fn handle(
    item: &RouterItem,
    req: &RequestContext,
    body: OptionReqBody,
    execution: &ChainExecution<'_>,
) -> (Response<ResponseBody>, Option<DispatchError>) {
    let handler = item.handler();

    let params = match bind_request(handler.signature(), req, &body).await {
        Ok(params) => params,
        Err(e) => {
            warn!(path = %req.path(), cause = %e, "parameter binding failed");
            let failure = DispatchError::from(e);
            return (failure.to_response(req), Some(failure));
        }
    };

    let invoked = catch_panic(handler.invoke(req.clone(), params, body))
        .await
        .unwrap_or_else(|panic| Err(DispatchError::handler(panic)));
    let (mut response, mut failure) = match invoked {
        Ok(response) => (response, None),
        Err(e) => {
            if e.is_client_error() {
                warn!(path = %req.path(), cause = %e, "request rejected by handler");
            } else {
                error!(path = %req.path(), cause = %e, "handler failed");
            }
            (e.to_response(req), Some(e))
        }
    };

    if let Err(e) = execution.apply_post_handle(req, &mut response).await
        && failure.is_none()
    {
        response = e.to_response(req);
        failure = Some(e);
    }

    (response, failure)
}

#[derive(Debug)]
pub struct DispatcherBuilder {
    router: Option<Router>,
    interceptors: Interceptors,
}

impl DispatcherBuilder {
    fn new() -> Self {
        Self { router: None, interceptors: Interceptors::empty() }
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    pub fn interceptors(mut self, interceptors: Interceptors) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn build(self) -> Result<Dispatcher, DispatcherBuildError> {
        let router = self.router.ok_or(DispatcherBuildError::MissingRouter)?;
        Ok(Dispatcher { router, interceptors: self.interceptors })
    }
}

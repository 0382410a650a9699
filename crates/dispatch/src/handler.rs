use crate::binder::{BoundParameters, HandlerSignature};
use crate::body::{OptionReqBody, ResponseBody};
use crate::error::DispatchError;
use crate::responder::Responder;
use crate::RequestContext;
use async_trait::async_trait;
use http::Response;
use std::fmt;

#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// The parameters the dispatcher binds before calling [`invoke`](Self::invoke).
    fn signature(&self) -> &HandlerSignature;

    async fn invoke(
        &self,
        req: RequestContext,
        params: BoundParameters,
        req_body: OptionReqBody,
    ) -> Result<Response<ResponseBody>, DispatchError>;
}

/// Everything a handler function receives.
#[derive(Debug)]
pub struct HandlerArgs {
    pub req: RequestContext,
    pub params: BoundParameters,
    pub body: OptionReqBody,
}

/// an async `Fn` holder which represents a handler with a declared signature
pub struct FnHandler<F> {
    signature: HandlerSignature,
    f: F,
}

impl<F> FnHandler<F> {
    fn new(signature: HandlerSignature, f: F) -> Self {
        Self { signature, f }
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("signature", &self.signature).finish_non_exhaustive()
    }
}

/// Turns an async function over [`HandlerArgs`] into a [`RequestHandler`].
///
/// # Example
/// ```
/// use micro_dispatch::binder::{HandlerSignature, ParamSpec};
/// use micro_dispatch::{handler_fn, DispatchError, HandlerArgs};
///
/// let hello = handler_fn(
///     HandlerSignature::new().param(ParamSpec::string("nickname").default_value("luren")),
///     |HandlerArgs { params, .. }| async move {
///         let nickname: String = params.get("nickname")?;
///         Ok::<_, DispatchError>(format!("Hello, {nickname}!"))
///     },
/// );
/// # let _ = hello;
/// ```
pub fn handler_fn<F, Fut, R>(signature: HandlerSignature, f: F) -> FnHandler<F>
where
    F: Fn(HandlerArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, DispatchError>> + Send,
    R: Responder,
{
    FnHandler::new(signature, f)
}

#[async_trait]
impl<F, Fut, R> RequestHandler for FnHandler<F>
where
    F: Fn(HandlerArgs) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, DispatchError>> + Send,
    R: Responder,
{
    fn signature(&self) -> &HandlerSignature {
        &self.signature
    }

    async fn invoke(
        &self,
        req: RequestContext,
        params: BoundParameters,
        req_body: OptionReqBody,
    ) -> Result<Response<ResponseBody>, DispatchError> {
        let responder = (self.f)(HandlerArgs { req: req.clone(), params, body: req_body }).await?;
        Ok(responder.response_to(&req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::ParamSpec;
    use crate::request::PathParams;
    use http::{Request, StatusCode};
    use http_body_util::BodyExt;

    fn assert_is_handler<T: RequestHandler>(_handler: &T) {
        // no op
    }

    fn request() -> RequestContext {
        let (parts, ()) = Request::builder().uri("/user/42").body(()).unwrap().into_parts();
        RequestContext::new(parts, [("id", "42")].into_iter().collect::<PathParams>())
    }

    #[test]
    fn assert_fn_is_handler() {
        let handler = handler_fn(HandlerSignature::new(), |_args| async { Ok::<_, DispatchError>("Get Test1") });
        assert_is_handler(&handler);
        assert!(handler.signature().is_empty());
    }

    #[tokio::test]
    async fn test_invoke() {
        let handler = handler_fn(HandlerSignature::new().param(ParamSpec::string("id")), |args: HandlerArgs| async move {
            let id = args.req.path_params().get("id").unwrap_or_default().to_owned();
            Ok::<_, DispatchError>(format!("User ID: {id}"))
        });

        let response = handler.invoke(request(), BoundParameters::new(), OptionReqBody::empty()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"User ID: 42");
    }

    #[tokio::test]
    async fn test_invoke_propagates_error() {
        let handler = handler_fn(HandlerSignature::new().param(ParamSpec::int("age")), |args: HandlerArgs| async move {
            let age: i64 = args.params.get("age")?;
            Ok::<_, DispatchError>(age.to_string())
        });

        let error = handler.invoke(request(), BoundParameters::new(), OptionReqBody::empty()).await.unwrap_err();
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }
}

//! Request dispatch core: route matching, interceptor chains, parameter binding and
//! file uploads over `http` request and response types.
//!
//! ```
//! use micro_dispatch::binder::{HandlerSignature, ParamSpec};
//! use micro_dispatch::router::{get, Router};
//! use micro_dispatch::{handler_fn, DispatchError, Dispatcher, HandlerArgs};
//!
//! # async fn run() {
//! let router = Router::builder()
//!     .route(
//!         "/user/{id}",
//!         get(handler_fn(HandlerSignature::new().param(ParamSpec::int("id")), |args: HandlerArgs| async move {
//!             let id: i64 = args.params.get("id")?;
//!             Ok::<_, DispatchError>(format!("User ID: {id}"))
//!         })),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let dispatcher = Dispatcher::builder().router(router).build().unwrap();
//! let request = http::Request::get("/user/42").body(http_body_util::Empty::<bytes::Bytes>::new()).unwrap();
//! let response = dispatcher.dispatch(request).await;
//! assert_eq!(response.status(), http::StatusCode::OK);
//! # }
//! ```

mod body;
mod dispatcher;
mod handler;
mod request;
mod responder;

pub mod binder;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod router;
pub mod session;
pub mod upload;

pub use body::OptionReqBody;
pub use body::ReqBody;
pub use body::ResponseBody;
pub use dispatcher::Dispatcher;
pub use dispatcher::DispatcherBuilder;
pub use error::BoxError;
pub use error::DispatchError;
pub use handler::FnHandler;
pub use handler::HandlerArgs;
pub use handler::RequestHandler;
pub use handler::handler_fn;
pub use request::PathParams;
pub use request::RequestContext;
pub use responder::Json;
pub use responder::Redirect;
pub use responder::Responder;
pub use router::Router;

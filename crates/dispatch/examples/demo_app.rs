//! Builds the demo application and drives a scripted set of requests through it.
//!
//! Run with `cargo run --example demo_app`.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use http::{Method, Request, Response};
use http_body_util::{BodyExt, Full};
use micro_dispatch::binder::{HandlerSignature, ParamSpec};
use micro_dispatch::config::WebConfig;
use micro_dispatch::interceptor::{Interceptors, SessionGate};
use micro_dispatch::router::{any, delete, get, post, put};
use micro_dispatch::session::{MemorySessionStore, SessionId, SessionStore};
use micro_dispatch::upload::{UploadHandler, multipart_upload};
use micro_dispatch::{DispatchError, Dispatcher, HandlerArgs, ResponseBody, Router, handler_fn};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Deserialize, Debug)]
struct User {
    username: String,
    password: Option<String>,
}

fn router(config: &WebConfig, store: Arc<MemorySessionStore>) -> Router {
    let uploads = UploadHandler::from_config(&config.upload);
    let cookie_name = config.session.cookie_name.clone();
    let attribute = config.session.attribute.clone();

    Router::builder()
        .route(
            "/hello",
            get(handler_fn(
                HandlerSignature::new().param(ParamSpec::string("nickname").default_value("luren")),
                |args: HandlerArgs| async move {
                    let nickname: String = args.params.get("nickname")?;
                    Ok::<_, DispatchError>(format!("Hello, {nickname}!"))
                },
            )),
        )
        .route("/getTest1", get(handler_fn(HandlerSignature::new(), |_| async { Ok::<_, DispatchError>("Get Test1") })))
        .route(
            "/getTest2",
            get(handler_fn(
                HandlerSignature::new().param(ParamSpec::string("name")).param(ParamSpec::int("age")),
                |args: HandlerArgs| async move {
                    let name: String = args.params.get("name")?;
                    let age: i64 = args.params.get("age")?;
                    Ok::<_, DispatchError>(format!("Get Test2, name: {name}, age: {age}"))
                },
            )),
        )
        .route(
            "/getTest3",
            get(handler_fn(
                HandlerSignature::new().param(ParamSpec::string("name").default_value("luren")),
                |args: HandlerArgs| async move {
                    let name: String = args.params.get("name")?;
                    Ok::<_, DispatchError>(format!("Get Test3, name: {name}"))
                },
            )),
        )
        .route("/postTest1", post(handler_fn(HandlerSignature::new(), |_| async { Ok::<_, DispatchError>("Post Test1") })))
        .route(
            "/postTest2",
            post(handler_fn(
                HandlerSignature::new()
                    .param(ParamSpec::string("username").optional())
                    .param(ParamSpec::string("password").optional()),
                |args: HandlerArgs| async move {
                    let username: Option<String> = args.params.get_opt("username")?;
                    let password: Option<String> = args.params.get_opt("password")?;
                    Ok::<_, DispatchError>(format!("Post Test2, username: {username:?}, password: {password:?}"))
                },
            )),
        )
        .route(
            "/postTest3",
            post(handler_fn(HandlerSignature::new().param(ParamSpec::object_of::<User>("user")), |args: HandlerArgs| async move {
                let user: User = args.params.get("user")?;
                let password = user.password.as_deref().unwrap_or("-");
                Ok::<_, DispatchError>(format!("Post Test3, user: {} / {password}", user.username))
            })),
        )
        .route(
            "/postTest4",
            post(handler_fn(HandlerSignature::new().param(ParamSpec::object_of::<User>("user")), |args: HandlerArgs| async move {
                let user: User = args.params.get("user")?;
                Ok::<_, DispatchError>(format!("Post Test4, user: {user:?}"))
            })),
        )
        .route("/test/**", any(handler_fn(HandlerSignature::new(), |_| async { Ok::<_, DispatchError>("test") })))
        .route(
            "/user/{id}",
            get(handler_fn(HandlerSignature::new().param(ParamSpec::string("id")), |args: HandlerArgs| async move {
                let id: String = args.params.get("id")?;
                Ok::<_, DispatchError>(format!("User ID: {id}"))
            })),
        )
        .route(
            "/user",
            post(handler_fn(HandlerSignature::new().param(ParamSpec::object_of::<User>("user")), |args: HandlerArgs| async move {
                let user: User = args.params.get("user")?;
                info!(?user, "creating user");
                Ok::<_, DispatchError>("User created")
            })),
        )
        .route(
            "/user/{id}",
            put(handler_fn(
                HandlerSignature::new().param(ParamSpec::string("id")).param(ParamSpec::object_of::<User>("user")),
                |args: HandlerArgs| async move {
                    let id: String = args.params.get("id")?;
                    let user: User = args.params.get("user")?;
                    Ok::<_, DispatchError>(format!("User updated from {} to {id}", user.username))
                },
            )),
        )
        .route(
            "/user/{id}",
            delete(handler_fn(HandlerSignature::new().param(ParamSpec::string("id")), |args: HandlerArgs| async move {
                let id: String = args.params.get("id")?;
                info!(%id, "deleting user");
                Ok::<_, DispatchError>("User deleted")
            })),
        )
        .route(
            "/upload",
            post(handler_fn(HandlerSignature::new(), move |args: HandlerArgs| {
                let uploads = uploads.clone();
                async move {
                    let request = multipart_upload(&args.req, &args.body, "file").await?;
                    let saved = uploads.save(request).await?;
                    Ok::<_, DispatchError>(format!("uploaded {} bytes to {}", saved.bytes_written, saved.path.display()))
                }
            })),
        )
        .route(
            "/login",
            get(handler_fn(HandlerSignature::new().param(ParamSpec::string("user")), move |args: HandlerArgs| {
                let store = Arc::clone(&store);
                let cookie_name = cookie_name.clone();
                let attribute = attribute.clone();
                async move {
                    let user: String = args.params.get("user")?;
                    let id = SessionId::generate();
                    store.set_attribute(&id, &attribute, serde_json::Value::String(user.clone()));
                    Response::builder()
                        .header(SET_COOKIE, id.set_cookie_value(&cookie_name))
                        .body(ResponseBody::from(format!("logged in as {user}")))
                        .map_err(DispatchError::handler)
                }
            })),
        )
        .route(
            "/private/**",
            any(handler_fn(HandlerSignature::new(), |args: HandlerArgs| async move {
                Ok::<_, DispatchError>(format!("private content at {}", args.req.path()))
            })),
        )
        .build()
        .expect("demo routes are valid")
}

async fn send(dispatcher: &Dispatcher, request: Request<Full<Bytes>>) -> Response<ResponseBody> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let (parts, body) = dispatcher.dispatch(request).await.into_parts();
    let bytes = body.collect().await.map(http_body_util::Collected::to_bytes).unwrap_or_default();
    info!(%method, %uri, status = %parts.status, body = %String::from_utf8_lossy(&bytes), "response");
    Response::from_parts(parts, ResponseBody::from(bytes))
}

fn request(method: Method, uri: &str) -> Request<Full<Bytes>> {
    Request::builder().method(method).uri(uri).body(Full::new(Bytes::new())).expect("valid request")
}

fn request_with_body(method: Method, uri: &str, content_type: &str, body: &'static str) -> Request<Full<Bytes>> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, content_type)
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .expect("valid request")
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut config = WebConfig::default();
    config.upload.root = std::env::temp_dir().join("micro-dispatch-demo");

    let store = Arc::new(MemorySessionStore::new());
    let gate_store: Arc<dyn SessionStore> = Arc::<MemorySessionStore>::clone(&store);
    let interceptors = Interceptors::builder()
        .register(SessionGate::registration(gate_store, &config.session))
        .build()
        .expect("session gate patterns are valid");

    let dispatcher = Dispatcher::builder().router(router(&config, store)).interceptors(interceptors).build().expect("router is set");

    send(&dispatcher, request(Method::GET, "/hello")).await;
    send(&dispatcher, request(Method::GET, "/hello?nickname=rust")).await;
    send(&dispatcher, request(Method::GET, "/getTest1")).await;
    send(&dispatcher, request(Method::GET, "/getTest2?name=luren&age=18")).await;
    send(&dispatcher, request(Method::GET, "/getTest2?name=luren")).await;
    send(&dispatcher, request(Method::GET, "/getTest3")).await;
    send(&dispatcher, request(Method::POST, "/postTest1")).await;
    send(&dispatcher, request_with_body(Method::POST, "/postTest2", "application/x-www-form-urlencoded", "username=luren&password=123")).await;
    send(&dispatcher, request(Method::POST, "/postTest3?username=luren&password=123")).await;
    send(&dispatcher, request_with_body(Method::POST, "/postTest4", "application/json", r#"{"username":"luren","password":"123"}"#)).await;
    send(&dispatcher, request(Method::GET, "/test/123/456")).await;
    send(&dispatcher, request(Method::GET, "/user/42")).await;
    send(&dispatcher, request_with_body(Method::POST, "/user", "application/json", r#"{"username":"luren"}"#)).await;
    send(&dispatcher, request_with_body(Method::PUT, "/user/42", "application/json", r#"{"username":"luren"}"#)).await;
    send(&dispatcher, request(Method::DELETE, "/user/42")).await;
    send(&dispatcher, request(Method::PATCH, "/user/42")).await;
    send(&dispatcher, request(Method::GET, "/missing")).await;

    let multipart = "--demo\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"hello.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        hello from the demo\r\n\
        --demo--\r\n";
    send(&dispatcher, request_with_body(Method::POST, "/upload", "multipart/form-data; boundary=demo", multipart)).await;

    send(&dispatcher, request(Method::GET, "/private/resource")).await;
    let login = send(&dispatcher, request(Method::GET, "/login?user=luren")).await;
    let cookie = login
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .unwrap_or_default()
        .to_owned();

    let mut private = request(Method::GET, "/private/resource");
    private.headers_mut().insert(COOKIE, cookie.parse().expect("cookie is a valid header value"));
    send(&dispatcher, private).await;
}

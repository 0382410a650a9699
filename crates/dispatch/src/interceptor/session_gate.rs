use crate::config::SessionConfig;
use crate::error::BoxError;
use crate::interceptor::{Interceptor, InterceptorRegistration, PreHandle};
use crate::responder::{Redirect, Responder};
use crate::session::{SessionId, SessionStore};
use crate::RequestContext;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lets a request through only when its session carries the configured attribute,
/// otherwise redirects it with `302 Found`.
pub struct SessionGate {
    store: Arc<dyn SessionStore>,
    cookie_name: String,
    attribute: String,
    redirect_to: String,
}

impl SessionGate {
    pub fn new(store: Arc<dyn SessionStore>, config: &SessionConfig) -> Self {
        Self {
            store,
            cookie_name: config.cookie_name.clone(),
            attribute: config.attribute.clone(),
            redirect_to: config.redirect_to.clone(),
        }
    }

    /// A registration covering `config.protected` minus `config.public`.
    pub fn registration(store: Arc<dyn SessionStore>, config: &SessionConfig) -> InterceptorRegistration {
        let registration = InterceptorRegistration::new(Self::new(store, config));
        let registration = config.protected.iter().fold(registration, |r, p| r.include_path(p.as_str()));
        config.public.iter().fold(registration, |r, p| r.exclude_path(p.as_str()))
    }

    fn is_logged_in(&self, req: &RequestContext) -> bool {
        let Some(id) = SessionId::from_headers(req.headers(), &self.cookie_name) else {
            return false;
        };
        self.store.attribute(&id, &self.attribute).is_some_and(|value| !value.is_null())
    }
}

impl fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGate")
            .field("cookie_name", &self.cookie_name)
            .field("attribute", &self.attribute)
            .field("redirect_to", &self.redirect_to)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Interceptor for SessionGate {
    fn name(&self) -> &str {
        "session_gate"
    }

    async fn pre_handle(&self, req: &RequestContext) -> Result<PreHandle, BoxError> {
        if self.is_logged_in(req) {
            debug!(path = %req.path(), "session accepted");
            return Ok(PreHandle::Proceed);
        }

        warn!(path = %req.path(), redirect_to = %self.redirect_to, "no session attribute `{}`, redirecting", self.attribute);
        Ok(PreHandle::Block(Redirect::found(self.redirect_to.as_str()).response_to(req)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PathParams;
    use crate::interceptor::Interceptors;
    use crate::session::MockSessionStore;
    use http::header::{COOKIE, LOCATION};
    use http::{Request, StatusCode};
    use mockall::predicate::{always, eq};
    use serde_json::{Value, json};

    fn request(uri: &str, cookie: Option<&str>) -> RequestContext {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        RequestContext::new(parts, PathParams::empty())
    }

    fn gate(store: MockSessionStore) -> SessionGate {
        SessionGate::new(Arc::new(store), &SessionConfig::default())
    }

    #[tokio::test]
    async fn test_without_cookie_redirects() {
        let mut store = MockSessionStore::new();
        store.expect_attribute().never();

        let decision = gate(store).pre_handle(&request("/private/resource", None)).await.unwrap();
        let PreHandle::Block(response) = decision else {
            panic!("expected a redirect");
        };
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/hello");
    }

    #[tokio::test]
    async fn test_missing_attribute_redirects() {
        let mut store = MockSessionStore::new();
        store
            .expect_attribute()
            .with(eq(SessionId::new("abc")), eq("user"))
            .times(1)
            .returning(|_, _| None);

        let decision = gate(store).pre_handle(&request("/private/resource", Some("SESSIONID=abc"))).await.unwrap();
        assert!(matches!(decision, PreHandle::Block(_)));
    }

    #[tokio::test]
    async fn test_null_attribute_redirects() {
        let mut store = MockSessionStore::new();
        store.expect_attribute().with(always(), always()).returning(|_, _| Some(Value::Null));

        let decision = gate(store).pre_handle(&request("/private/resource", Some("SESSIONID=abc"))).await.unwrap();
        assert!(matches!(decision, PreHandle::Block(_)));
    }

    #[tokio::test]
    async fn test_logged_in_proceeds() {
        let mut store = MockSessionStore::new();
        store.expect_attribute().times(1).returning(|_, _| Some(json!("luren")));

        let decision = gate(store).pre_handle(&request("/private/resource", Some("SESSIONID=abc"))).await.unwrap();
        assert!(matches!(decision, PreHandle::Proceed));
    }

    #[tokio::test]
    async fn test_registration_scopes_gate() {
        let config = SessionConfig { public: vec!["/private/about".into()], ..SessionConfig::default() };
        let mut store = MockSessionStore::new();
        store.expect_attribute().returning(|_, _| None);

        let interceptors = Interceptors::builder().register(SessionGate::registration(Arc::new(store), &config)).build().unwrap();

        let outcome = interceptors.run_pre(&request("/private/resource", None)).await;
        assert!(!outcome.should_proceed());

        for uri in ["/hello", "/private/about", "/privateer"] {
            let outcome = interceptors.run_pre(&request(uri, None)).await;
            assert!(outcome.should_proceed(), "{uri}");
            assert!(outcome.execution.is_empty(), "{uri}");
        }
    }
}

//! Per-client session state.
//!
//! A session is identified by a random id carried in a cookie and holds a map of
//! named JSON attributes. Sessions are created lazily on the first write and live
//! until [`SessionStore::invalidate`].

use arc_swap::ArcSwap;
use http::HeaderMap;
use http::header::COOKIE;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a fresh random session id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads the id from the `Cookie` headers of a request.
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<Self> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == cookie_name && !value.is_empty())
            .map(|(_, value)| Self(value.to_owned()))
    }

    /// The `Set-Cookie` value binding this id to a client.
    pub fn set_cookie_value(&self, cookie_name: &str) -> String {
        format!("{cookie_name}={}; Path=/; HttpOnly", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared per-client attribute storage.
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    fn attribute(&self, id: &SessionId, name: &str) -> Option<Value>;

    /// Sets an attribute, creating the session when it does not exist yet.
    fn set_attribute(&self, id: &SessionId, name: &str, value: Value);

    fn remove_attribute(&self, id: &SessionId, name: &str) -> Option<Value>;

    /// Drops the session and all of its attributes, returns whether it existed.
    fn invalidate(&self, id: &SessionId) -> bool;
}

struct SessionEntry {
    writer: Mutex<()>,
    attributes: ArcSwap<HashMap<String, Value>>,
}

impl SessionEntry {
    fn new() -> Self {
        Self { writer: Mutex::new(()), attributes: ArcSwap::from_pointee(HashMap::new()) }
    }

    fn update<R>(&self, f: impl FnOnce(&mut HashMap<String, Value>) -> R) -> R {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut attributes = HashMap::clone(&self.attributes.load());
        let result = f(&mut attributes);
        self.attributes.store(Arc::new(attributes));
        result
    }
}

/// An in-process [`SessionStore`].
///
/// The session index is guarded by a `RwLock`. Inside a session, writers are
/// serialized and readers load an immutable snapshot without locking.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<SessionEntry>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, id: &SessionId) -> Option<Arc<SessionEntry>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).get(id).cloned()
    }

    fn get_or_create(&self, id: &SessionId) -> Arc<SessionEntry> {
        if let Some(entry) = self.get(id) {
            return entry;
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let entry = sessions.entry(id.clone()).or_insert_with(|| {
            debug!(session = %id, "session created");
            Arc::new(SessionEntry::new())
        });
        Arc::clone(entry)
    }
}

impl SessionStore for MemorySessionStore {
    fn attribute(&self, id: &SessionId, name: &str) -> Option<Value> {
        self.get(id)?.attributes.load().get(name).cloned()
    }

    fn set_attribute(&self, id: &SessionId, name: &str, value: Value) {
        self.get_or_create(id).update(|attributes| attributes.insert(name.to_owned(), value));
    }

    fn remove_attribute(&self, id: &SessionId, name: &str) -> Option<Value> {
        self.get(id)?.update(|attributes| attributes.remove(name))
    }

    fn invalidate(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().unwrap_or_else(PoisonError::into_inner).remove(id).is_some();
        if removed {
            debug!(session = %id, "session invalidated");
        }
        removed
    }
}

impl fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySessionStore").field("sessions", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;
    use std::thread;

    #[test]
    fn test_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; SESSIONID=abc123"));
        headers.append(COOKIE, HeaderValue::from_static("other=1"));

        assert_eq!(SessionId::from_headers(&headers, "SESSIONID"), Some(SessionId::new("abc123")));
        assert_eq!(SessionId::from_headers(&headers, "other"), Some(SessionId::new("1")));
        assert_eq!(SessionId::from_headers(&headers, "missing"), None);

        let mut empty = HeaderMap::new();
        empty.insert(COOKIE, HeaderValue::from_static("SESSIONID="));
        assert_eq!(SessionId::from_headers(&empty, "SESSIONID"), None);
    }

    #[test]
    fn test_set_cookie_value() {
        let id = SessionId::new("abc");
        assert_eq!(id.set_cookie_value("SESSIONID"), "SESSIONID=abc; Path=/; HttpOnly");
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn test_attribute_lifecycle() {
        let store = MemorySessionStore::new();
        let id = SessionId::generate();

        assert_eq!(store.attribute(&id, "user"), None);
        assert!(store.is_empty());

        store.set_attribute(&id, "user", json!("luren"));
        assert_eq!(store.attribute(&id, "user"), Some(json!("luren")));
        assert_eq!(store.len(), 1);

        assert_eq!(store.remove_attribute(&id, "user"), Some(json!("luren")));
        assert_eq!(store.attribute(&id, "user"), None);

        store.set_attribute(&id, "user", json!({"name": "luren"}));
        assert!(store.invalidate(&id));
        assert!(!store.invalidate(&id));
        assert_eq!(store.attribute(&id, "user"), None);
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(MemorySessionStore::new());
        let id = SessionId::new("shared");

        let handles = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let id = id.clone();
                thread::spawn(move || store.set_attribute(&id, &format!("k{i}"), json!(i)))
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1);
        for i in 0..8 {
            assert_eq!(store.attribute(&id, &format!("k{i}")), Some(json!(i)));
        }
    }
}

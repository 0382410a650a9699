use crate::error::BindingError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// A converted parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Object(ObjectValue),
}

/// A structured value kept in its source encoding until the handler asks for a type.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectValue {
    Json(Value),
    /// raw `application/x-www-form-urlencoded` body
    Form(String),
    /// raw query string
    Query(String),
}

impl BoundValue {
    pub(crate) fn deserialize<T: DeserializeOwned>(&self, name: &str) -> Result<T, BindingError> {
        let deserialize_error = |reason: String| BindingError::Deserialize { name: name.to_owned(), reason };

        match self {
            BoundValue::Str(s) => serde_json::from_value(Value::String(s.clone())),
            BoundValue::Int(i) => serde_json::from_value(Value::from(*i)),
            BoundValue::Float(f) => serde_json::from_value(Value::from(*f)),
            BoundValue::Bool(b) => serde_json::from_value(Value::Bool(*b)),
            BoundValue::Object(ObjectValue::Json(value)) => T::deserialize(value),
            BoundValue::Object(ObjectValue::Form(raw)) => {
                return serde_urlencoded::from_str(raw).map_err(|e| deserialize_error(e.to_string()));
            }
            BoundValue::Object(ObjectValue::Query(raw)) => {
                return serde_qs::from_str(raw).map_err(|e| deserialize_error(e.to_string()));
            }
        }
        .map_err(|e| deserialize_error(e.to_string()))
    }
}

/// The converted arguments of one handler invocation, keyed by declared name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundParameters {
    values: HashMap<String, BoundValue>,
}

impl BoundParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: BoundValue) {
        self.values.insert(name.into(), value);
    }

    pub fn value(&self, name: &str) -> Option<&BoundValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the parameter converted to `T`; an absent optional parameter is a
    /// [`BindingError::Missing`].
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, BindingError> {
        self.get_opt(name)?.ok_or_else(|| BindingError::missing(name))
    }

    pub fn get_opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, BindingError> {
        self.values.get(name).map(|value| value.deserialize(name)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct User {
        username: String,
        age: u32,
    }

    #[test]
    fn test_scalar_access() {
        let mut params = BoundParameters::new();
        params.insert("name", BoundValue::Str("luren".into()));
        params.insert("age", BoundValue::Int(30));
        params.insert("admin", BoundValue::Bool(false));

        assert_eq!(params.get::<String>("name").unwrap(), "luren");
        assert_eq!(params.get::<u8>("age").unwrap(), 30);
        assert_eq!(params.get::<i64>("age").unwrap(), 30);
        assert!(!params.get::<bool>("admin").unwrap());
        assert!(matches!(params.get::<String>("age"), Err(BindingError::Deserialize { .. })));

        assert!(params.get_opt::<String>("missing").unwrap().is_none());
        assert!(matches!(params.get::<String>("missing"), Err(BindingError::Missing { .. })));
    }

    #[test]
    fn test_object_sources() {
        let expected = User { username: "luren".into(), age: 18 };
        let sources = [
            ObjectValue::Json(serde_json::json!({"username": "luren", "age": 18})),
            ObjectValue::Form("username=luren&age=18".into()),
            ObjectValue::Query("username=luren&age=18".into()),
        ];

        for source in sources {
            let mut params = BoundParameters::new();
            params.insert("user", BoundValue::Object(source));
            assert_eq!(params.get::<User>("user").unwrap(), expected);
        }
    }

    #[test]
    fn test_object_mismatch() {
        let mut params = BoundParameters::new();
        params.insert("user", BoundValue::Object(ObjectValue::Json(serde_json::json!({"username": "luren"}))));
        let err = params.get::<User>("user").unwrap_err();
        assert!(err.to_string().contains("missing field `age`"), "{err}");
    }
}

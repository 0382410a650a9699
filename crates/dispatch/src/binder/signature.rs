use crate::binder::BoundValue;
use crate::error::BindingError;
use serde::de::DeserializeOwned;
use std::any;
use std::collections::HashSet;
use std::fmt;

/// The target type a parameter is converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Str,
    Int,
    Float,
    Bool,
    /// A structured value bound wholesale from the body (or the query string when
    /// there is no body), read through [`BoundParameters::get`]. Declared with
    /// [`ParamSpec::object_of`] it is checked against its type while binding.
    ///
    /// [`BoundParameters::get`]: crate::binder::BoundParameters::get
    Object,
}

impl ParamType {
    pub(crate) fn expected(self) -> &'static str {
        match self {
            ParamType::Str => "string",
            ParamType::Int => "integer",
            ParamType::Float => "float",
            ParamType::Bool => "boolean",
            ParamType::Object => "object",
        }
    }
}

/// The type an object parameter must deserialize into.
#[derive(Clone, Copy)]
pub struct ObjectShape {
    type_name: &'static str,
    check: fn(&BoundValue, &str) -> Result<(), BindingError>,
}

impl ObjectShape {
    pub fn of<T: DeserializeOwned>() -> Self {
        Self { type_name: any::type_name::<T>(), check: conforms::<T> }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn check(&self, value: &BoundValue, name: &str) -> Result<(), BindingError> {
        (self.check)(value, name)
    }
}

fn conforms<T: DeserializeOwned>(value: &BoundValue, name: &str) -> Result<(), BindingError> {
    value.deserialize::<T>(name).map(drop)
}

impl PartialEq for ObjectShape {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
    }
}

impl Eq for ObjectShape {}

impl fmt::Debug for ObjectShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectShape").field(&self.type_name).finish()
    }
}

/// A declared handler parameter.
///
/// Parameters are required unless marked [`optional`](Self::optional) or given a
/// [`default_value`](Self::default_value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    name: String,
    ty: ParamType,
    required: bool,
    default: Option<String>,
    shape: Option<ObjectShape>,
}

macro_rules! param_constructor {
    ($fn_name:ident, $ty:ident) => {
        #[doc = concat!("Declares a required `", stringify!($ty), "` parameter.")]
        pub fn $fn_name(name: impl Into<String>) -> Self {
            Self::new(name, ParamType::$ty)
        }
    };
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self { name: name.into(), ty, required: true, default: None, shape: None }
    }

    param_constructor!(string, Str);
    param_constructor!(int, Int);
    param_constructor!(float, Float);
    param_constructor!(bool, Bool);
    param_constructor!(object, Object);

    /// Declares a required object parameter that must deserialize into `T`; a body that
    /// does not is rejected before the handler runs.
    pub fn object_of<T: DeserializeOwned>(name: impl Into<String>) -> Self {
        Self { shape: Some(ObjectShape::of::<T>()), ..Self::object(name) }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Sets the text used when no source supplies a value; converted like query text.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self.required = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> ParamType {
        self.ty
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_text(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn shape(&self) -> Option<&ObjectShape> {
        self.shape.as_ref()
    }
}

/// The ordered parameter list of a handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerSignature {
    params: Vec<ParamSpec>,
}

impl HandlerSignature {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub(crate) fn has_object(&self) -> bool {
        self.params.iter().any(|p| p.ty == ParamType::Object)
    }

    /// Checks that parameter names are unique and at most one parameter is an object.
    pub fn validate(&self) -> Result<(), String> {
        let mut names = HashSet::new();
        for param in &self.params {
            if !names.insert(param.name.as_str()) {
                return Err(format!("duplicate parameter `{}`", param.name));
            }
        }

        let objects = self.params.iter().filter(|p| p.ty == ParamType::Object).count();
        if objects > 1 {
            return Err(format!("at most one object parameter is allowed, found {objects}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_makes_optional() {
        let spec = ParamSpec::string("nickname").default_value("luren");
        assert!(!spec.is_required());
        assert_eq!(spec.default_text(), Some("luren"));
        assert!(ParamSpec::int("age").is_required());
    }

    #[test]
    fn test_object_of_records_shape() {
        let spec = ParamSpec::object_of::<Vec<String>>("tags");
        assert_eq!(spec.ty(), ParamType::Object);
        assert!(spec.is_required());
        assert_eq!(spec.shape(), Some(&ObjectShape::of::<Vec<String>>()));
        assert_ne!(spec.shape(), Some(&ObjectShape::of::<String>()));
        assert!(ParamSpec::object("tags").shape().is_none());
    }

    #[test]
    fn test_validate() {
        let ok = HandlerSignature::new().param(ParamSpec::string("id")).param(ParamSpec::object("user"));
        assert_eq!(ok.validate(), Ok(()));

        let two_objects = ok.clone().param(ParamSpec::object("other"));
        assert!(two_objects.validate().unwrap_err().contains("at most one object"));

        let duplicate = HandlerSignature::new().param(ParamSpec::string("id")).param(ParamSpec::int("id"));
        assert!(duplicate.validate().unwrap_err().contains("duplicate parameter `id`"));
    }
}

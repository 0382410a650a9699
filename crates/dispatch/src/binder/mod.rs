//! Parameter binding.
//!
//! Converts raw request data into the typed arguments declared by a handler's
//! [`HandlerSignature`]. Every declared parameter is resolved from, in order:
//!
//! 1. the path variable with the same name,
//! 2. the query parameter with the same name,
//! 3. the request body: a field of a JSON object or form body, or the whole body for an
//!    [`ParamType::Object`] parameter,
//! 4. the declared default value, which also replaces an empty text value.
//!
//! A required parameter left unresolved is a [`BindingError::Missing`], never a silent
//! zero value.

mod signature;
mod value;

pub use signature::{HandlerSignature, ObjectShape, ParamSpec, ParamType};
pub use value::{BoundParameters, BoundValue, ObjectValue};

use crate::body::OptionReqBody;
use crate::error::BindingError;
use crate::{PathParams, RequestContext};
use http::header::CONTENT_TYPE;
use mime::Mime;
use serde_json::Value;
use tracing::debug;

/// A request body already decoded into something fields can be looked up in.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Form { raw: String, fields: Vec<(String, String)> },
}

impl Payload {
    pub fn from_json(bytes: &[u8]) -> Result<Self, BindingError> {
        serde_json::from_slice(bytes).map(Payload::Json).map_err(BindingError::invalid_body)
    }

    pub fn from_form(bytes: &[u8]) -> Result<Self, BindingError> {
        let raw = String::from_utf8(bytes.to_vec()).map_err(BindingError::invalid_body)?;
        let fields = serde_urlencoded::from_str(&raw).map_err(BindingError::invalid_body)?;
        Ok(Payload::Form { raw, fields })
    }

    fn field(&self, name: &str) -> Option<RawValue<'_>> {
        match self {
            Payload::Json(Value::Object(map)) => map.get(name).filter(|v| !v.is_null()).map(RawValue::Json),
            Payload::Json(_) => None,
            Payload::Form { fields, .. } => lookup(fields, name).map(RawValue::Text),
        }
    }

    fn to_object(&self) -> ObjectValue {
        match self {
            Payload::Json(value) => ObjectValue::Json(value.clone()),
            Payload::Form { raw, .. } => ObjectValue::Form(raw.clone()),
        }
    }
}

enum RawValue<'a> {
    Text(&'a str),
    Json(&'a Value),
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
}

/// Binds the declared parameters from already extracted request parts.
pub fn bind(
    signature: &HandlerSignature,
    path_params: &PathParams,
    query: Option<&str>,
    body: Option<&Payload>,
) -> Result<BoundParameters, BindingError> {
    let query_pairs: Vec<(String, String)> = match query {
        Some(query) => {
            serde_urlencoded::from_str(query).map_err(|e| BindingError::InvalidQuery { reason: e.to_string() })?
        }
        None => Vec::new(),
    };

    let mut bound = BoundParameters::new();
    for param in signature.params() {
        let name = param.name();

        if param.ty() == ParamType::Object {
            let object = match (body, query) {
                (Some(payload), _) => Some(payload.to_object()),
                (None, Some(query)) => Some(ObjectValue::Query(query.to_owned())),
                (None, None) => None,
            };
            match object {
                Some(object) => {
                    let value = BoundValue::Object(object);
                    if let Some(shape) = param.shape() {
                        shape.check(&value, name)?;
                    }
                    bound.insert(name, value);
                }
                None if param.is_required() => return Err(BindingError::missing(name)),
                None => {}
            }
            continue;
        }

        let raw = path_params
            .get(name)
            .or_else(|| lookup(&query_pairs, name))
            .map(RawValue::Text)
            .or_else(|| body.and_then(|payload| payload.field(name)))
            .filter(|raw| !matches!(raw, RawValue::Text("")) || param.default_text().is_none())
            .or_else(|| param.default_text().map(RawValue::Text));

        match raw {
            Some(RawValue::Text(text)) => bound.insert(name, convert_text(param, text)?),
            Some(RawValue::Json(value)) => bound.insert(name, convert_json(param, value)?),
            None if param.is_required() => return Err(BindingError::missing(name)),
            None => {}
        }
    }

    Ok(bound)
}

/// Binds the declared parameters of `signature` for a request, reading the body only
/// when a parameter still needs it and the body is JSON or a urlencoded form.
pub async fn bind_request(
    signature: &HandlerSignature,
    req: &RequestContext,
    body: &OptionReqBody,
) -> Result<BoundParameters, BindingError> {
    let payload = if needs_body(signature, req) { read_payload(req, body).await? } else { None };
    bind(signature, req.path_params(), req.query(), payload.as_ref())
}

fn needs_body(signature: &HandlerSignature, req: &RequestContext) -> bool {
    if signature.has_object() {
        return true;
    }

    let query_pairs: Vec<(String, String)> = req.query().and_then(|q| serde_urlencoded::from_str(q).ok()).unwrap_or_default();
    signature
        .params()
        .iter()
        .any(|param| req.path_params().get(param.name()).is_none() && lookup(&query_pairs, param.name()).is_none())
}

async fn read_payload(req: &RequestContext, body: &OptionReqBody) -> Result<Option<Payload>, BindingError> {
    let Some(mime) = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Mime>().ok())
    else {
        return Ok(None);
    };

    let is_json = mime.essence_str() == mime::APPLICATION_JSON.essence_str();
    let is_form = mime.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str();
    if !is_json && !is_form {
        debug!(content_type = %mime, "body is left for the handler");
        return Ok(None);
    }

    let bytes = match body.to_bytes().await.map_err(BindingError::invalid_body)? {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return Ok(None),
    };

    let payload = if is_json { Payload::from_json(&bytes)? } else { Payload::from_form(&bytes)? };
    Ok(Some(payload))
}

fn convert_text(param: &ParamSpec, text: &str) -> Result<BoundValue, BindingError> {
    let invalid = || BindingError::invalid_value(param.name(), text, param.ty().expected());

    match param.ty() {
        ParamType::Str => Ok(BoundValue::Str(text.to_owned())),
        ParamType::Int => text.trim().parse().ok().map(BoundValue::Int).ok_or_else(invalid),
        ParamType::Float => text.trim().parse().ok().map(BoundValue::Float).ok_or_else(invalid),
        ParamType::Bool => parse_bool(text).map(BoundValue::Bool).ok_or_else(invalid),
        ParamType::Object => Ok(BoundValue::Object(ObjectValue::Json(Value::String(text.to_owned())))),
    }
}

fn convert_json(param: &ParamSpec, value: &Value) -> Result<BoundValue, BindingError> {
    let invalid = || BindingError::invalid_value(param.name(), value.to_string(), param.ty().expected());

    match (param.ty(), value) {
        (_, Value::String(text)) => convert_text(param, text),
        (ParamType::Str, Value::Number(n)) => Ok(BoundValue::Str(n.to_string())),
        (ParamType::Str, Value::Bool(b)) => Ok(BoundValue::Str(b.to_string())),
        (ParamType::Int, Value::Number(n)) => n.as_i64().map(BoundValue::Int).ok_or_else(invalid),
        (ParamType::Float, Value::Number(n)) => n.as_f64().map(BoundValue::Float).ok_or_else(invalid),
        (ParamType::Bool, Value::Bool(b)) => Ok(BoundValue::Bool(*b)),
        (ParamType::Object, value) => Ok(BoundValue::Object(ObjectValue::Json(value.clone()))),
        _ => Err(invalid()),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

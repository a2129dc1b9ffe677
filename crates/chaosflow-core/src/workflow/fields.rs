//! Path-aware reading of untyped document values.
//!
//! Both decoders walk `serde_json::Value` trees through [`ObjectReader`] so
//! every missing field, wrong primitive type, or out-of-set value is reported
//! against its exact [`FieldPath`].

use std::str::FromStr;

use chaosflow_types::error::{FieldError, FieldPath};
use serde_json::{Map, Value};

/// JSON type name of a value, for `invalid type` messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// A JSON object paired with the path it was found at.
#[derive(Debug, Clone)]
pub(crate) struct ObjectReader<'a> {
    map: &'a Map<String, Value>,
    path: FieldPath,
}

impl<'a> ObjectReader<'a> {
    pub fn new(value: &'a Value, path: FieldPath) -> Result<Self, FieldError> {
        match value {
            Value::Object(map) => Ok(Self { map, path }),
            other => Err(FieldError::invalid_type(path, "object", type_name(other))),
        }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn map(&self) -> &'a Map<String, Value> {
        self.map
    }

    /// Path of a field of this object.
    pub fn field(&self, key: &str) -> FieldPath {
        self.path.child(key)
    }

    /// Present and not `null`.
    pub fn contains(&self, key: &str) -> bool {
        !matches!(self.map.get(key), None | Some(Value::Null))
    }

    pub fn required_str(&self, key: &str) -> Result<&'a str, FieldError> {
        match self.map.get(key) {
            None => Err(FieldError::required(self.field(key))),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(FieldError::invalid_type(
                self.field(key),
                "string",
                type_name(other),
            )),
        }
    }

    /// A required string that must not be blank after trimming.
    pub fn required_text(&self, key: &str) -> Result<&'a str, FieldError> {
        let s = self.required_str(key)?;
        if is_blank(s) {
            return Err(FieldError::required(self.field(key)));
        }
        Ok(s)
    }

    /// An optional string; `null` counts as absent.
    pub fn optional_str(&self, key: &str) -> Result<Option<&'a str>, FieldError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(FieldError::invalid_type(
                self.field(key),
                "string",
                type_name(other),
            )),
        }
    }

    /// An optional string that, when present, must not be blank.
    pub fn optional_text(&self, key: &str) -> Result<Option<&'a str>, FieldError> {
        match self.optional_str(key)? {
            Some(s) if is_blank(s) => Err(FieldError::invalid(
                self.field(key),
                s,
                "must not be blank",
            )),
            other => Ok(other),
        }
    }

    /// An optional non-negative integer; `null` counts as absent.
    pub fn optional_u64(&self, key: &str) -> Result<Option<u64>, FieldError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
                FieldError::invalid(
                    self.field(key),
                    &n.to_string(),
                    "must be a non-negative integer",
                )
            }),
            Some(other) => Err(FieldError::invalid_type(
                self.field(key),
                "number",
                type_name(other),
            )),
        }
    }

    /// An optional string restricted to `allowed`, parsed into `T`.
    pub fn optional_enum<T: FromStr>(
        &self,
        key: &str,
        allowed: &[&str],
    ) -> Result<Option<T>, FieldError> {
        self.optional_str(key)?
            .map(|s| {
                s.parse()
                    .map_err(|_| FieldError::not_supported(self.field(key), s, allowed))
            })
            .transpose()
    }

    /// A required string restricted to `allowed`, parsed into `T`.
    pub fn required_enum<T: FromStr>(&self, key: &str, allowed: &[&str]) -> Result<T, FieldError> {
        let s = self.required_str(key)?;
        s.parse()
            .map_err(|_| FieldError::not_supported(self.field(key), s, allowed))
    }

    pub fn required_array(&self, key: &str) -> Result<&'a [Value], FieldError> {
        match self.map.get(key) {
            None => Err(FieldError::required(self.field(key))),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(FieldError::invalid_type(
                self.field(key),
                "array",
                type_name(other),
            )),
        }
    }

    /// A required array with at least one element.
    pub fn non_empty_array(&self, key: &str, what: &str) -> Result<&'a [Value], FieldError> {
        let items = self.required_array(key)?;
        if items.is_empty() {
            return Err(FieldError::invalid(
                self.field(key),
                "[]",
                format!("at least one {what} is required"),
            ));
        }
        Ok(items)
    }

    /// An optional array; absent or `null` reads as empty.
    pub fn optional_array(&self, key: &str) -> Result<&'a [Value], FieldError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(&[]),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(FieldError::invalid_type(
                self.field(key),
                "array",
                type_name(other),
            )),
        }
    }

    /// An optional array whose elements must all be strings.
    pub fn string_array(&self, key: &str) -> Result<Vec<String>, FieldError> {
        let path = self.field(key);
        self.optional_array(key)?
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(FieldError::invalid_type(
                    path.index(i),
                    "string",
                    type_name(other),
                )),
            })
            .collect()
    }

    pub fn required_object(&self, key: &str) -> Result<ObjectReader<'a>, FieldError> {
        match self.map.get(key) {
            None => Err(FieldError::required(self.field(key))),
            Some(value) => ObjectReader::new(value, self.field(key)),
        }
    }

    /// An optional object; `null` counts as absent.
    pub fn optional_object(&self, key: &str) -> Result<Option<ObjectReader<'a>>, FieldError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => ObjectReader::new(value, self.field(key)).map(Some),
        }
    }

    /// Reject a field that is illegal in this context.
    pub fn forbid(&self, key: &str, owner: &str) -> Result<(), FieldError> {
        if self.contains(key) {
            return Err(FieldError::forbidden(
                self.field(key),
                format!("{owner} template should not contain {key}"),
            ));
        }
        Ok(())
    }

    /// Every field except the listed ones, cloned.
    pub fn remainder(&self, except: &[&str]) -> Map<String, Value> {
        self.map
            .iter()
            .filter(|(k, _)| !except.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

//! Field-scoped validation errors.
//!
//! Every structural problem found while validating a template or decoding a
//! document is reported against a [`FieldPath`] in the Kubernetes style
//! (`spec.templates[0].children[1]`, `custom.conditionalBranches[0].target`).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Location of a field inside a document or template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(String);

impl FieldPath {
    /// The empty path (the document root).
    pub fn root() -> Self {
        Self(String::new())
    }

    /// A path starting at the named top-level field.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Descend into a named field.
    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{name}", self.0))
        }
    }

    /// Descend into an array element.
    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{index}]", self.0))
    }

    /// Descend into a keyed entry (e.g. `nodes[<id>]`).
    pub fn key(&self, key: &str) -> Self {
        Self(format!("{}[{key}]", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// What is wrong with a field.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FieldErrorKind {
    #[error("required value")]
    Required,

    #[error("invalid type: expected {expected}, found {found}")]
    InvalidType { expected: String, found: String },

    #[error("unsupported value \"{value}\": supported values: {}", .supported.join(", "))]
    NotSupported { value: String, supported: Vec<String> },

    #[error("invalid value \"{value}\": {detail}")]
    Invalid { value: String, detail: String },

    #[error("duplicate value \"{value}\"")]
    Duplicate { value: String },

    #[error("forbidden: {detail}")]
    Forbidden { detail: String },
}

/// A single field-scoped validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{path}: {kind}")]
pub struct FieldError {
    pub path: FieldPath,
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub fn required(path: FieldPath) -> Self {
        Self {
            path,
            kind: FieldErrorKind::Required,
        }
    }

    pub fn invalid_type(path: FieldPath, expected: &str, found: &str) -> Self {
        Self {
            path,
            kind: FieldErrorKind::InvalidType {
                expected: expected.to_string(),
                found: found.to_string(),
            },
        }
    }

    pub fn not_supported<S: AsRef<str>>(path: FieldPath, value: &str, supported: &[S]) -> Self {
        Self {
            path,
            kind: FieldErrorKind::NotSupported {
                value: value.to_string(),
                supported: supported.iter().map(|s| s.as_ref().to_string()).collect(),
            },
        }
    }

    pub fn invalid(path: FieldPath, value: &str, detail: impl Into<String>) -> Self {
        Self {
            path,
            kind: FieldErrorKind::Invalid {
                value: value.to_string(),
                detail: detail.into(),
            },
        }
    }

    pub fn duplicate(path: FieldPath, value: &str) -> Self {
        Self {
            path,
            kind: FieldErrorKind::Duplicate {
                value: value.to_string(),
            },
        }
    }

    pub fn forbidden(path: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            path,
            kind: FieldErrorKind::Forbidden {
                detail: detail.into(),
            },
        }
    }
}

/// An ordered collection of field errors, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: FieldErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// Whether any error is reported at exactly `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.0.iter().any(|e| e.path.as_str() == path)
    }

    /// `Ok(())` when no errors were collected.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.0.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

impl From<FieldError> for FieldErrors {
    fn from(error: FieldError) -> Self {
        Self(vec![error])
    }
}

impl IntoIterator for FieldErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

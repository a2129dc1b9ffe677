//! Workflow document parsing and filesystem operations.
//!
//! Parses YAML/JSON text into an untyped document value, detects which
//! document form it is (backend manifest or nested authoring document),
//! dispatches to the matching decoder, and provides loading and discovery of
//! workflow files on disk.

use std::path::{Path, PathBuf};

use chaosflow_types::error::{FieldError, FieldErrors, FieldPath};
use chaosflow_types::workflow::{NodeId, TemplateType};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::codec::{self, DecodedWorkflow};
use super::document;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// YAML/JSON parse failure.
    #[error("parse error: {0}")]
    ParseError(String),

    /// The document's top level is not an object.
    #[error("document must be an object, found {0}")]
    NotAnObject(String),

    /// One or more field-scoped validation failures.
    #[error("validation error: {0}")]
    Validation(FieldErrors),

    /// An experiment kind or template type outside the fixed table.
    #[error("unrecognized kind \"{kind}\" at {path}; supported: {}", .supported.join(", "))]
    UnknownKind {
        path: FieldPath,
        kind: String,
        supported: Vec<String>,
    },

    /// A reference to a node that does not exist.
    #[error("dangling reference at {path}: node '{target}' does not exist")]
    DanglingReference { path: FieldPath, target: NodeId },

    /// The reference graph contains a cycle.
    #[error("cycle detected: {0}")]
    CycleDetected(String),

    /// Every node is referenced by some other node.
    #[error("workflow has no root node")]
    NoRoot,

    /// More than one node is unreferenced.
    #[error("workflow has multiple root nodes: {}", join_ids(.0))]
    MultipleRoots(Vec<NodeId>),

    /// The requested node is not in the store.
    #[error("node '{0}' not found")]
    NodeNotFound(NodeId),

    /// A node with attached references cannot change type.
    #[error("node '{id}' has children attached; its type cannot change from {from} to {to}")]
    TypeLocked {
        id: NodeId,
        from: TemplateType,
        to: TemplateType,
    },

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
}

impl From<FieldError> for WorkflowError {
    fn from(error: FieldError) -> Self {
        WorkflowError::Validation(error.into())
    }
}

impl From<FieldErrors> for WorkflowError {
    fn from(errors: FieldErrors) -> Self {
        WorkflowError::Validation(errors)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Which document shape a value carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentForm {
    /// Backend `Workflow` resource with a flat, name-keyed template list.
    Manifest,
    /// Nested authoring document with inline children.
    Nested,
}

/// Parse YAML or JSON text into an untyped document value.
///
/// YAML is a superset of JSON, so one parser handles both.
pub fn parse_document(text: &str) -> Result<Value, WorkflowError> {
    serde_yaml_ng::from_str(text).map_err(|e| WorkflowError::ParseError(e.to_string()))
}

/// Detect the document form. Anything carrying `spec` or `kind: Workflow`
/// is a manifest; everything else is treated as a nested document.
pub fn detect_form(value: &Value) -> DocumentForm {
    match value {
        Value::Object(map)
            if map.contains_key("spec")
                || map.get("kind").and_then(Value::as_str) == Some(codec::WORKFLOW_KIND) =>
        {
            DocumentForm::Manifest
        }
        _ => DocumentForm::Nested,
    }
}

/// Decode a document value of either form.
pub fn decode_document(value: &Value) -> Result<DecodedWorkflow, WorkflowError> {
    match detect_form(value) {
        DocumentForm::Manifest => codec::decode_manifest(value),
        DocumentForm::Nested => document::decode_nested(value),
    }
}

/// Parse and decode YAML/JSON text of either form.
pub fn parse_workflow(text: &str) -> Result<DecodedWorkflow, WorkflowError> {
    decode_document(&parse_document(text)?)
}

/// Serialize any document to YAML.
pub fn serialize_yaml<T: Serialize + ?Sized>(value: &T) -> Result<String, WorkflowError> {
    serde_yaml_ng::to_string(value).map_err(|e| WorkflowError::ParseError(e.to_string()))
}

/// Serialize any document to pretty-printed JSON.
pub fn serialize_json<T: Serialize + ?Sized>(value: &T) -> Result<String, WorkflowError> {
    serde_json::to_string_pretty(value).map_err(|e| WorkflowError::ParseError(e.to_string()))
}

// ---------------------------------------------------------------------------
// Filesystem operations
// ---------------------------------------------------------------------------

/// Load and decode a workflow file (YAML or JSON, either form).
pub fn load_workflow_file(path: &Path) -> Result<DecodedWorkflow, WorkflowError> {
    let content = std::fs::read_to_string(path)?;
    parse_workflow(&content)
}

/// A decoded workflow together with the file it came from.
pub type DecodedWorkflowFile = (PathBuf, DecodedWorkflow);

/// Discover workflow files in a directory (recursive).
///
/// Looks for `.yaml`, `.yml` and `.json` files. Files that fail to decode are
/// skipped with a warning.
pub fn discover_workflows(base_dir: &Path) -> Result<Vec<DecodedWorkflowFile>, WorkflowError> {
    let mut results = Vec::new();
    if !base_dir.exists() {
        return Ok(results);
    }
    discover_recursive(base_dir, &mut results)?;
    results.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(results)
}

fn discover_recursive(
    dir: &Path,
    results: &mut Vec<DecodedWorkflowFile>,
) -> Result<(), WorkflowError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            discover_recursive(&path, results)?;
        } else if is_workflow_path(&path) {
            match load_workflow_file(&path) {
                Ok(workflow) => results.push((path, workflow)),
                Err(err) => {
                    tracing::warn!(?path, %err, "skipping undecodable workflow file");
                }
            }
        }
    }
    Ok(())
}

fn is_workflow_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml" || ext == "json")
}

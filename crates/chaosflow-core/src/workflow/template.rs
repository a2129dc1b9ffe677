//! Field-scoped validation of a single node.
//!
//! Validation never aborts on the first problem: every rule is checked and
//! all failures are returned together, each with the path of the offending
//! field, so a form can highlight them all at once.

use chaosflow_types::error::{FieldError, FieldErrors, FieldPath};
use chaosflow_types::workflow::{CustomTask, ExperimentSpec, Node, ScheduleSpec, Template};
use serde_json::{Map, Value};

use super::fields::is_blank;

/// Validate a node with paths relative to the node itself.
pub fn validate_node(node: &Node) -> Result<(), FieldErrors> {
    validate_node_at(node, &FieldPath::root())
}

/// Validate a node with paths rooted at `base` (e.g. `nodes[<id>]`).
///
/// Rules:
/// - `name` is non-blank after trimming
/// - `deadline`, when present, is non-blank; `Suspend` requires one
/// - `Serial`/`Parallel` have at least one child
/// - `Custom` has at least one branch, a container name and image, and a
///   non-blank target and expression on every branch
/// - `Single` has a non-blank `action` when one is given, a non-blank cron
///   expression when scheduled, and no `duration` or reserved key among its
///   opaque fields
pub fn validate_node_at(node: &Node, base: &FieldPath) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if is_blank(&node.name) {
        errors.push(FieldError::required(base.child("name")));
    }

    match node.deadline.as_deref() {
        Some(deadline) if is_blank(deadline) => {
            errors.push(FieldError::invalid(
                base.child("deadline"),
                deadline,
                "must not be blank",
            ));
        }
        None if matches!(node.template, Template::Suspend) => {
            errors.push(FieldError::required(base.child("deadline")));
        }
        _ => {}
    }

    match &node.template {
        Template::Single { experiment } => validate_experiment(experiment, base, &mut errors),
        Template::Serial { children } | Template::Parallel { children } => {
            if children.is_empty() {
                errors.push(FieldError::invalid(
                    base.child("children"),
                    "[]",
                    "at least one child is required",
                ));
            }
        }
        Template::Suspend => {}
        Template::Custom(task) => validate_custom(task, base, &mut errors),
    }

    errors.into_result()
}

fn validate_experiment(experiment: &ExperimentSpec, base: &FieldPath, errors: &mut FieldErrors) {
    let path = base.child("experimentSpec");
    if let Some(action) = experiment.action.as_deref() {
        if is_blank(action) {
            errors.push(FieldError::invalid(
                path.child("action"),
                action,
                "must not be blank",
            ));
        }
    }
    if let Some(schedule) = &experiment.schedule {
        validate_schedule(schedule, &path.child("schedule"), errors);
    }
    for error in experiment_field_errors(&experiment.fields, &path) {
        errors.push(error);
    }
}

fn validate_schedule(schedule: &ScheduleSpec, path: &FieldPath, errors: &mut FieldErrors) {
    if is_blank(&schedule.schedule) {
        errors.push(FieldError::required(path.child("schedule")));
    }
}

/// Keys that must not appear among an experiment's opaque `fields`, with
/// paths under `path`. A key holding `null` still counts as present.
///
/// Both decoders run this on what they keep as `fields`, so a decoded
/// experiment always passes [`validate_node`] and re-encodes unchanged.
pub(crate) fn experiment_field_errors(
    fields: &Map<String, Value>,
    path: &FieldPath,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for key in ExperimentSpec::RESERVED_KEYS {
        if fields.contains_key(key) {
            errors.push(FieldError::forbidden(
                path.child(key),
                format!("{key} is a reserved experiment key"),
            ));
        }
    }
    if fields.contains_key("duration") {
        errors.push(FieldError::forbidden(
            path.child("duration"),
            "experiments inside a workflow are bounded by the deadline, not duration",
        ));
    }
    errors
}

fn validate_custom(task: &CustomTask, base: &FieldPath, errors: &mut FieldErrors) {
    let path = base.child("custom");
    let container = path.child("container");
    if is_blank(&task.container.name) {
        errors.push(FieldError::required(container.child("name")));
    }
    if is_blank(&task.container.image) {
        errors.push(FieldError::required(container.child("image")));
    }

    let branches = path.child("conditionalBranches");
    if task.conditional_branches.is_empty() {
        errors.push(FieldError::invalid(
            branches.clone(),
            "[]",
            "at least one conditional branch is required",
        ));
    }
    for (i, branch) in task.conditional_branches.iter().enumerate() {
        if is_blank(branch.target.as_str()) {
            errors.push(FieldError::required(branches.index(i).child("target")));
        }
        if is_blank(&branch.expression) {
            errors.push(FieldError::required(branches.index(i).child("expression")));
        }
    }
}

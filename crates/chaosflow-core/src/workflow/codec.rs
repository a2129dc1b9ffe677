//! Backend manifest codec.
//!
//! The backend stores a workflow as a `Workflow` resource whose `spec` holds a
//! flat list of templates keyed by name, with an `entry` naming the root:
//!
//! ```yaml
//! apiVersion: chaos-mesh.org/v1alpha1
//! kind: Workflow
//! metadata: { name: demo, namespace: chaos-testing }
//! spec:
//!   entry: entry
//!   templates:
//!     - { name: entry, templateType: Serial, children: [kill] }
//!     - name: kill
//!       templateType: PodChaos
//!       deadline: 30s
//!       podChaos: { action: pod-kill, mode: one }
//! ```
//!
//! `Single` nodes appear with their experiment kind as `templateType` and the
//! experiment spec under the kind's field name; `Custom` nodes appear as
//! `Task` templates with a `task.container` and `conditionalBranches`.
//! A scheduled `Single` node is a `Schedule` template instead:
//!
//! ```yaml
//! - name: s1
//!   templateType: Schedule
//!   deadline: 1m
//!   schedule:
//!     schedule: '@every 2h'
//!     concurrencyPolicy: Forbid
//!     type: PodChaos
//!     podChaos: { action: pod-failure, mode: all }
//! ```
//!
//! Decoding is fail-fast: the first problem rejects the whole document.
//! Encoding checks every invariant first and emits the root followed by a
//! pre-order walk, so its output always decodes.

use std::collections::{HashMap, HashSet};

use chaosflow_types::config::{ChaosflowConfig, DEFAULT_API_VERSION};
use chaosflow_types::error::{FieldError, FieldErrors, FieldPath};
use chaosflow_types::workflow::{
    ConcurrencyPolicy, ConditionStatus, ConditionalBranch, ContainerSpec, CustomTask,
    ExperimentKind, ExperimentSpec, Node, NodeId, ScheduleSpec, Template, WorkflowCondition,
    WorkflowConditionType, WorkflowMeta, WorkflowStatus,
};
use serde::Serialize;
use serde_json::{Map, Value};

use super::definition::WorkflowError;
use super::fields::{ObjectReader, type_name};
use super::template::{experiment_field_errors, validate_node_at};
use super::tree::{self, NodeMap};

/// `kind` of every workflow manifest.
pub const WORKFLOW_KIND: &str = "Workflow";

/// Manifest `templateType` of a `Custom` node.
pub const TASK_TEMPLATE_TYPE: &str = "Task";

const SERIAL: &str = "Serial";
const PARALLEL: &str = "Parallel";
const SUSPEND: &str = "Suspend";

/// Manifest `templateType` of a scheduled `Single` node.
pub const SCHEDULE_TEMPLATE_TYPE: &str = "Schedule";

/// Every `templateType` the decoder accepts.
pub fn supported_template_types() -> Vec<String> {
    [SERIAL, PARALLEL, SUSPEND, TASK_TEMPLATE_TYPE, SCHEDULE_TEMPLATE_TYPE]
        .into_iter()
        .chain(ExperimentKind::ALL.iter().map(|k| k.as_str()))
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Decoded result
// ---------------------------------------------------------------------------

/// A fully decoded workflow, ready to import into a store.
#[derive(Debug, Clone)]
pub struct DecodedWorkflow {
    pub meta: WorkflowMeta,
    pub root: NodeId,
    pub nodes: Vec<Node>,
    /// Server-reported status, when the document carried one.
    pub status: Option<WorkflowStatus>,
}

impl DecodedWorkflow {
    pub fn root_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == self.root)
    }

    pub fn node_map(&self) -> NodeMap {
        self.nodes.iter().map(|n| (n.id.clone(), n.clone())).collect()
    }
}

// ---------------------------------------------------------------------------
// Manifest shape (encode side)
// ---------------------------------------------------------------------------

/// Settings applied when encoding a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    pub api_version: String,
    /// Used when the workflow's own metadata has no namespace.
    pub namespace: Option<String>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            namespace: None,
        }
    }
}

impl From<&ChaosflowConfig> for EncodeOptions {
    fn from(config: &ChaosflowConfig) -> Self {
        Self {
            api_version: config.api_version.clone(),
            namespace: config.namespace.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub api_version: String,
    pub kind: String,
    pub metadata: WorkflowMeta,
    pub spec: ManifestSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestSpec {
    pub entry: String,
    pub templates: Vec<ManifestTemplate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestTemplate {
    pub name: String,
    pub template_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<ManifestTask>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditional_branches: Vec<ManifestBranch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ManifestSchedule>,
    /// `{ <kind field name>: { action, ... } }` for experiment templates.
    #[serde(flatten)]
    pub experiment: Map<String, Value>,
}

/// Body of a `Schedule` template: the cron settings, the experiment kind as
/// `type`, and the experiment spec under the kind's field name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestSchedule {
    #[serde(flatten)]
    pub settings: ScheduleSpec,
    #[serde(rename = "type")]
    pub kind: ExperimentKind,
    #[serde(flatten)]
    pub experiment: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestTask {
    pub container: ContainerSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestBranch {
    pub target: String,
    pub expression: String,
}

impl Manifest {
    pub fn to_value(&self) -> Result<Value, WorkflowError> {
        serde_json::to_value(self).map_err(|e| WorkflowError::ParseError(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encode the tree as a backend manifest.
///
/// Fails unless the tree has no dangling references, no cycles, exactly one
/// root, every node passes template validation, and node names are unique
/// (the manifest keys templates by name).
pub fn encode_manifest(
    nodes: &NodeMap,
    meta: &WorkflowMeta,
    options: &EncodeOptions,
) -> Result<Manifest, WorkflowError> {
    let root = tree::check_invariants(nodes)?;
    let order = tree::preorder(nodes, &root);

    let mut errors = FieldErrors::new();
    let mut names: HashSet<&str> = HashSet::new();
    for node in order.iter().filter_map(|id| nodes.get(id)) {
        let base = tree::node_path(&node.id);
        if let Err(e) = validate_node_at(node, &base) {
            errors.extend(e);
        }
        if !names.insert(node.name.as_str()) {
            errors.push(FieldError::duplicate(base.child("name"), &node.name));
        }
    }
    errors.into_result()?;

    let name_of = |id: &NodeId| nodes.get(id).map(|n| n.name.clone());
    let templates: Vec<ManifestTemplate> = order
        .iter()
        .filter_map(|id| nodes.get(id))
        .map(|node| encode_template(node, &name_of))
        .collect();

    let entry = name_of(&root).ok_or_else(|| WorkflowError::NodeNotFound(root.clone()))?;
    tracing::debug!(entry = %entry, templates = templates.len(), "encoded manifest");

    Ok(Manifest {
        api_version: options.api_version.clone(),
        kind: WORKFLOW_KIND.to_string(),
        metadata: WorkflowMeta {
            name: meta.name.clone(),
            namespace: meta.namespace.clone().or_else(|| options.namespace.clone()),
        },
        spec: ManifestSpec { entry, templates },
    })
}

fn encode_template(node: &Node, name_of: &impl Fn(&NodeId) -> Option<String>) -> ManifestTemplate {
    let mut template = ManifestTemplate {
        name: node.name.clone(),
        template_type: String::new(),
        deadline: node.deadline.clone(),
        children: Vec::new(),
        task: None,
        conditional_branches: Vec::new(),
        schedule: None,
        experiment: Map::new(),
    };

    match &node.template {
        Template::Single { experiment } => {
            let mut spec = experiment.fields.clone();
            if let Some(action) = &experiment.action {
                spec.insert("action".to_string(), Value::String(action.clone()));
            }
            let mut body = Map::new();
            body.insert(experiment.kind.field_name().to_string(), Value::Object(spec));
            match &experiment.schedule {
                None => {
                    template.template_type = experiment.kind.as_str().to_string();
                    template.experiment = body;
                }
                Some(settings) => {
                    template.template_type = SCHEDULE_TEMPLATE_TYPE.to_string();
                    template.schedule = Some(ManifestSchedule {
                        settings: settings.clone(),
                        kind: experiment.kind,
                        experiment: body,
                    });
                }
            }
        }
        Template::Serial { children } => {
            template.template_type = SERIAL.to_string();
            template.children = children.iter().filter_map(name_of).collect();
        }
        Template::Parallel { children } => {
            template.template_type = PARALLEL.to_string();
            template.children = children.iter().filter_map(name_of).collect();
        }
        Template::Suspend => {
            template.template_type = SUSPEND.to_string();
        }
        Template::Custom(task) => {
            template.template_type = TASK_TEMPLATE_TYPE.to_string();
            template.task = Some(ManifestTask {
                container: task.container.clone(),
            });
            template.conditional_branches = task
                .conditional_branches
                .iter()
                .filter_map(|b| {
                    name_of(&b.target).map(|target| ManifestBranch {
                        target,
                        expression: b.expression.clone(),
                    })
                })
                .collect();
        }
    }
    template
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decode a backend manifest.
///
/// Checks, in order: top-level shape, `kind`, metadata, `spec.entry`, a
/// non-empty `spec.templates` with unique names, the entry's existence, each
/// template's fields for its `templateType`, every reference, the optional
/// `status`, then acyclicity and reachability of every template from the
/// entry.
pub fn decode_manifest(value: &Value) -> Result<DecodedWorkflow, WorkflowError> {
    let Value::Object(_) = value else {
        return Err(WorkflowError::NotAnObject(type_name(value).to_string()));
    };
    let doc = ObjectReader::new(value, FieldPath::root())?;

    let kind = doc.required_str("kind")?;
    if kind != WORKFLOW_KIND {
        return Err(FieldError::not_supported(doc.field("kind"), kind, &[WORKFLOW_KIND]).into());
    }
    doc.optional_str("apiVersion")?;

    let (meta_name, namespace) = match doc.optional_object("metadata")? {
        Some(metadata) => (
            metadata.optional_text("name")?,
            metadata.optional_text("namespace")?,
        ),
        None => (None, None),
    };

    let spec = doc.required_object("spec")?;
    let entry = spec.required_text("entry")?;
    let templates_path = spec.field("templates");
    let templates = spec.required_array("templates")?;
    if templates.is_empty() {
        return Err(FieldError::invalid(
            templates_path,
            "[]",
            "templates in a workflow must not be empty",
        )
        .into());
    }

    // Pass 1: names and identifiers.
    let mut ids: HashMap<&str, NodeId> = HashMap::new();
    let mut readers: Vec<(NodeId, &str, ObjectReader<'_>)> = Vec::with_capacity(templates.len());
    for (i, raw) in templates.iter().enumerate() {
        let reader = ObjectReader::new(raw, templates_path.index(i))?;
        let name = reader.required_text("name")?;
        if ids.contains_key(name) {
            return Err(FieldError::duplicate(reader.field("name"), name).into());
        }
        let id = NodeId::new();
        ids.insert(name, id.clone());
        readers.push((id, name, reader));
    }

    let root = ids
        .get(entry)
        .cloned()
        .ok_or_else(|| WorkflowError::DanglingReference {
            path: spec.field("entry"),
            target: NodeId::from(entry),
        })?;

    // Pass 2: template bodies.
    let mut nodes = Vec::with_capacity(readers.len());
    for (id, name, reader) in &readers {
        let deadline = reader.optional_text("deadline")?;
        let template = decode_template(reader, &ids)?;
        if matches!(template, Template::Suspend) && deadline.is_none() {
            return Err(FieldError::required(reader.field("deadline")).into());
        }
        nodes.push(Node {
            id: id.clone(),
            name: name.to_string(),
            deadline: deadline.map(str::to_string),
            template,
        });
    }

    let status = doc
        .optional_object("status")?
        .map(|status| decode_status(&status))
        .transpose()?;

    let map: NodeMap = nodes.iter().map(|n| (n.id.clone(), n.clone())).collect();
    if let Some(cyclic) = tree::find_cycle(&map) {
        let name = map.get(&cyclic).map(|n| n.name.as_str()).unwrap_or_default();
        return Err(WorkflowError::CycleDetected(format!(
            "template '{name}' is its own descendant"
        )));
    }
    let reachable: HashSet<NodeId> = tree::preorder(&map, &root).into_iter().collect();
    if let Some((_, name, reader)) = readers.iter().find(|(id, _, _)| !reachable.contains(id)) {
        return Err(FieldError::invalid(
            reader.field("name"),
            name,
            format!("template is not reachable from entry '{entry}'"),
        )
        .into());
    }

    tracing::debug!(entry, templates = nodes.len(), "decoded manifest");
    Ok(DecodedWorkflow {
        meta: WorkflowMeta {
            name: meta_name.unwrap_or(entry).to_string(),
            namespace: namespace.map(str::to_string),
        },
        root,
        nodes,
        status,
    })
}

fn decode_template(
    reader: &ObjectReader<'_>,
    ids: &HashMap<&str, NodeId>,
) -> Result<Template, WorkflowError> {
    let template_type = reader.required_str("templateType")?;
    match template_type {
        SERIAL | PARALLEL => {
            forbid_all(
                reader,
                template_type,
                &["task", "conditionalBranches", "schedule"],
                None,
            )?;
            let children_path = reader.field("children");
            let children = reader
                .non_empty_array("children", "child")?
                .iter()
                .enumerate()
                .map(|(j, child)| {
                    let path = children_path.index(j);
                    match child {
                        Value::String(name) => resolve(ids, name, path),
                        other => {
                            Err(FieldError::invalid_type(path, "string", type_name(other)).into())
                        }
                    }
                })
                .collect::<Result<Vec<_>, WorkflowError>>()?;
            if template_type == SERIAL {
                Ok(Template::Serial { children })
            } else {
                Ok(Template::Parallel { children })
            }
        }
        SUSPEND => {
            forbid_all(
                reader,
                template_type,
                &["children", "task", "conditionalBranches", "schedule"],
                None,
            )?;
            Ok(Template::Suspend)
        }
        TASK_TEMPLATE_TYPE => {
            forbid_all(reader, template_type, &["children", "schedule"], None)?;
            let task = reader.required_object("task")?;
            let container = task.required_object("container")?;
            let container = ContainerSpec {
                name: container.required_text("name")?.to_string(),
                image: container.required_text("image")?.to_string(),
                command: container.string_array("command")?,
            };
            let branches_path = reader.field("conditionalBranches");
            let conditional_branches = reader
                .non_empty_array("conditionalBranches", "conditional branch")?
                .iter()
                .enumerate()
                .map(|(j, raw)| {
                    let branch = ObjectReader::new(raw, branches_path.index(j))?;
                    let target = branch.required_text("target")?;
                    Ok(ConditionalBranch {
                        target: resolve(ids, target, branch.field("target"))?,
                        expression: branch.required_text("expression")?.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, WorkflowError>>()?;
            Ok(Template::Custom(CustomTask {
                container,
                conditional_branches,
            }))
        }
        SCHEDULE_TEMPLATE_TYPE => decode_scheduled(reader),
        other => {
            let kind: ExperimentKind = other.parse().map_err(|_| WorkflowError::UnknownKind {
                path: reader.field("templateType"),
                kind: other.to_string(),
                supported: supported_template_types(),
            })?;
            forbid_all(
                reader,
                other,
                &["children", "task", "conditionalBranches", "schedule"],
                Some(kind),
            )?;
            let spec = reader.required_object(kind.field_name())?;
            let experiment = decode_experiment(kind, &spec)?;
            Ok(Template::Single { experiment })
        }
    }
}

fn decode_scheduled(reader: &ObjectReader<'_>) -> Result<Template, WorkflowError> {
    forbid_all(
        reader,
        SCHEDULE_TEMPLATE_TYPE,
        &["children", "task", "conditionalBranches"],
        None,
    )?;
    let schedule = reader.required_object("schedule")?;
    let kind = schedule.required_str("type")?;
    let kind: ExperimentKind = kind.parse().map_err(|_| WorkflowError::UnknownKind {
        path: schedule.field("type"),
        kind: kind.to_string(),
        supported: ExperimentKind::names().into_iter().map(str::to_string).collect(),
    })?;
    forbid_all(&schedule, SCHEDULE_TEMPLATE_TYPE, &[], Some(kind))?;
    let spec = schedule.required_object(kind.field_name())?;
    let experiment = decode_experiment(kind, &spec)?.with_schedule(decode_schedule(&schedule)?);
    Ok(Template::Single { experiment })
}

/// An experiment spec object: `action` plus opaque fields.
fn decode_experiment(
    kind: ExperimentKind,
    spec: &ObjectReader<'_>,
) -> Result<ExperimentSpec, WorkflowError> {
    let mut experiment = ExperimentSpec::new(kind);
    experiment.action = spec.optional_text("action")?.map(str::to_string);
    experiment.fields = spec.remainder(&["action"]);
    if let Some(error) = experiment_field_errors(&experiment.fields, spec.path())
        .into_iter()
        .next()
    {
        return Err(error.into());
    }
    Ok(experiment)
}

/// Cron settings, shared by `Schedule` templates and nested
/// `experimentSpec.schedule` objects.
pub(crate) fn decode_schedule(schedule: &ObjectReader<'_>) -> Result<ScheduleSpec, FieldError> {
    Ok(ScheduleSpec {
        schedule: schedule.required_text("schedule")?.to_string(),
        history_limit: schedule.optional_u64("historyLimit")?,
        concurrency_policy: schedule
            .optional_enum("concurrencyPolicy", &ConcurrencyPolicy::NAMES)?,
        starting_deadline_seconds: schedule.optional_u64("startingDeadlineSeconds")?,
    })
}

/// Reject the listed fields and every experiment field except `keep`'s.
fn forbid_all(
    reader: &ObjectReader<'_>,
    owner: &str,
    keys: &[&str],
    keep: Option<ExperimentKind>,
) -> Result<(), FieldError> {
    for key in keys {
        reader.forbid(key, owner)?;
    }
    for kind in ExperimentKind::ALL {
        if Some(kind) != keep {
            reader.forbid(kind.field_name(), owner)?;
        }
    }
    Ok(())
}

fn resolve(
    ids: &HashMap<&str, NodeId>,
    name: &str,
    path: FieldPath,
) -> Result<NodeId, WorkflowError> {
    ids.get(name)
        .cloned()
        .ok_or_else(|| WorkflowError::DanglingReference {
            path,
            target: NodeId::from(name),
        })
}

fn decode_status(status: &ObjectReader<'_>) -> Result<WorkflowStatus, FieldError> {
    let conditions_path = status.field("conditions");
    let conditions = status
        .optional_array("conditions")?
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let condition = ObjectReader::new(raw, conditions_path.index(i))?;
            Ok(WorkflowCondition {
                condition_type: condition
                    .required_enum::<WorkflowConditionType>("type", &WorkflowConditionType::NAMES)?,
                status: condition.required_enum::<ConditionStatus>("status", &ConditionStatus::NAMES)?,
                reason: condition.optional_str("reason")?.map(str::to_string),
            })
        })
        .collect::<Result<Vec<_>, FieldError>>()?;
    Ok(WorkflowStatus {
        entry_node: status.optional_str("entryNode")?.map(str::to_string),
        conditions,
    })
}

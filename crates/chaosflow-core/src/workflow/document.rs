//! Nested authoring document codec.
//!
//! The nested form is what the wizard uploads and downloads: one node object
//! per node, with children and branch targets either inlined or referenced by
//! string.
//!
//! ```yaml
//! name: demo
//! children:
//!   - name: kill
//!     type: Single
//!     deadline: 30s
//!     experimentSpec: { kind: PodChaos, action: pod-kill, mode: one }
//!   - id: wait-1
//!     name: wait
//!     type: Suspend
//!     deadline: 1m
//!   - wait-1
//! ```
//!
//! A string reference names another node's `id`, or failing that its name if
//! the name is unique in the document. The top-level `type` defaults to
//! `Serial`; nested nodes must carry one. Explicit ids are kept verbatim and
//! survive a round trip. A scheduled experiment carries its cron settings as
//! `experimentSpec.schedule`, e.g. `{ schedule: '@every 2h', historyLimit: 2 }`.

use std::collections::{HashMap, HashSet};

use chaosflow_types::error::{FieldError, FieldErrors, FieldPath};
use chaosflow_types::workflow::{
    ConditionalBranch, ContainerSpec, CustomTask, ExperimentKind, ExperimentSpec, Node, NodeId,
    Template, TemplateType, WorkflowMeta,
};
use serde_json::{Map, Value, json};

use super::codec::{DecodedWorkflow, decode_schedule};
use super::definition::WorkflowError;
use super::fields::{ObjectReader, type_name};
use super::template::{experiment_field_errors, validate_node_at};
use super::tree::{self, NodeMap};

const EXPERIMENT_SPEC: &str = "experimentSpec";
const CUSTOM: &str = "custom";
const CHILDREN: &str = "children";

/// Decode a nested authoring document.
pub fn decode_nested(value: &Value) -> Result<DecodedWorkflow, WorkflowError> {
    let Value::Object(_) = value else {
        return Err(WorkflowError::NotAnObject(type_name(value).to_string()));
    };

    let mut decoder = NestedDecoder::default();
    let root = decoder.node(value, FieldPath::root(), true)?;
    let rename = decoder.resolve_references()?;

    let mut nodes = decoder.nodes;
    for node in &mut nodes {
        retarget(&mut node.template, &rename);
    }

    let map: NodeMap = nodes.iter().map(|n| (n.id.clone(), n.clone())).collect();
    let found = tree::check_invariants(&map)?;
    if found != root {
        return Err(WorkflowError::CycleDetected(format!(
            "top-level node '{root}' is referenced by another node"
        )));
    }

    let name = map
        .get(&root)
        .map(|n| n.name.clone())
        .ok_or_else(|| WorkflowError::NodeNotFound(root.clone()))?;
    tracing::debug!(%root, nodes = nodes.len(), "decoded nested document");

    Ok(DecodedWorkflow {
        meta: WorkflowMeta::new(name),
        root,
        nodes,
        status: None,
    })
}

/// A string reference seen during the walk, resolved once every node is known.
#[derive(Debug)]
struct PendingRef {
    path: FieldPath,
    raw: String,
}

#[derive(Debug, Default)]
struct NestedDecoder {
    /// Pre-order.
    nodes: Vec<Node>,
    ids: HashSet<NodeId>,
    pending: Vec<PendingRef>,
}

impl NestedDecoder {
    fn node(&mut self, value: &Value, path: FieldPath, top: bool) -> Result<NodeId, WorkflowError> {
        let reader = ObjectReader::new(value, path)?;

        let id = match reader.optional_text("id")? {
            Some(raw) => {
                let id = NodeId::from(raw);
                if self.ids.contains(&id) {
                    return Err(FieldError::duplicate(reader.field("id"), raw).into());
                }
                id
            }
            None => NodeId::new(),
        };
        self.ids.insert(id.clone());

        let name = reader.required_text("name")?.to_string();
        let deadline = reader.optional_text("deadline")?.map(str::to_string);

        let names = TemplateType::ALL.map(|t| t.as_str());
        let template_type = if top && !reader.contains("type") {
            TemplateType::Serial
        } else {
            reader.required_enum::<TemplateType>("type", &names)?
        };

        let slot = self.nodes.len();
        let template = match template_type {
            TemplateType::Single => {
                forbid(&reader, template_type, &[CHILDREN, CUSTOM])?;
                Template::Single {
                    experiment: decode_experiment(&reader)?,
                }
            }
            TemplateType::Serial | TemplateType::Parallel => {
                forbid(&reader, template_type, &[EXPERIMENT_SPEC, CUSTOM])?;
                let children = self.children(&reader)?;
                if template_type == TemplateType::Serial {
                    Template::Serial { children }
                } else {
                    Template::Parallel { children }
                }
            }
            TemplateType::Suspend => {
                forbid(&reader, template_type, &[CHILDREN, EXPERIMENT_SPEC, CUSTOM])?;
                if deadline.is_none() {
                    return Err(FieldError::required(reader.field("deadline")).into());
                }
                Template::Suspend
            }
            TemplateType::Custom => {
                forbid(&reader, template_type, &[CHILDREN, EXPERIMENT_SPEC])?;
                Template::Custom(self.custom(&reader)?)
            }
        };

        // Children were pushed while decoding the template; keep the parent first.
        self.nodes.insert(
            slot,
            Node {
                id: id.clone(),
                name,
                deadline,
                template,
            },
        );
        Ok(id)
    }

    fn children(&mut self, reader: &ObjectReader<'_>) -> Result<Vec<NodeId>, WorkflowError> {
        let path = reader.field(CHILDREN);
        reader
            .non_empty_array(CHILDREN, "child")?
            .iter()
            .enumerate()
            .map(|(i, child)| self.reference(child, path.index(i)))
            .collect()
    }

    fn custom(&mut self, reader: &ObjectReader<'_>) -> Result<CustomTask, WorkflowError> {
        let custom = reader.required_object(CUSTOM)?;
        let container = custom.required_object("container")?;
        let container = ContainerSpec {
            name: container.required_text("name")?.to_string(),
            image: container.required_text("image")?.to_string(),
            command: container.string_array("command")?,
        };

        let path = custom.field("conditionalBranches");
        let mut conditional_branches = Vec::new();
        for (i, raw) in custom
            .non_empty_array("conditionalBranches", "conditional branch")?
            .iter()
            .enumerate()
        {
            let branch = ObjectReader::new(raw, path.index(i))?;
            let target = match branch.map().get("target") {
                None => return Err(FieldError::required(branch.field("target")).into()),
                Some(value) => self.reference(value, branch.field("target"))?,
            };
            conditional_branches.push(ConditionalBranch {
                target,
                expression: branch.required_text("expression")?.to_string(),
            });
        }

        Ok(CustomTask {
            container,
            conditional_branches,
        })
    }

    /// An inline node or a string reference.
    fn reference(&mut self, value: &Value, path: FieldPath) -> Result<NodeId, WorkflowError> {
        match value {
            Value::Object(_) => self.node(value, path, false),
            Value::String(raw) if raw.trim().is_empty() => Err(FieldError::required(path).into()),
            Value::String(raw) => {
                self.pending.push(PendingRef {
                    path,
                    raw: raw.clone(),
                });
                Ok(NodeId::from(raw.as_str()))
            }
            other => {
                Err(FieldError::invalid_type(path, "object or string", type_name(other)).into())
            }
        }
    }

    /// Map every string reference that names a node (rather than its id) to
    /// that node's id.
    fn resolve_references(&self) -> Result<HashMap<String, NodeId>, WorkflowError> {
        let mut by_name: HashMap<&str, Vec<&NodeId>> = HashMap::new();
        for node in &self.nodes {
            by_name.entry(node.name.as_str()).or_default().push(&node.id);
        }

        let mut rename = HashMap::new();
        for pending in &self.pending {
            if self.ids.contains(&NodeId::from(pending.raw.as_str())) {
                continue;
            }
            match by_name.get(pending.raw.as_str()).map(Vec::as_slice) {
                Some([id]) => {
                    rename.insert(pending.raw.clone(), (*id).clone());
                }
                Some(_) => {
                    return Err(FieldError::invalid(
                        pending.path.clone(),
                        &pending.raw,
                        "name is shared by several nodes; reference the node by id",
                    )
                    .into());
                }
                None => {
                    return Err(WorkflowError::DanglingReference {
                        path: pending.path.clone(),
                        target: NodeId::from(pending.raw.as_str()),
                    });
                }
            }
        }
        Ok(rename)
    }
}

fn decode_experiment(reader: &ObjectReader<'_>) -> Result<ExperimentSpec, WorkflowError> {
    let spec = reader.required_object(EXPERIMENT_SPEC)?;
    let kind = spec.required_str("kind")?;
    let kind: ExperimentKind = kind.parse().map_err(|_| WorkflowError::UnknownKind {
        path: spec.field("kind"),
        kind: kind.to_string(),
        supported: ExperimentKind::names().into_iter().map(str::to_string).collect(),
    })?;

    let mut experiment = ExperimentSpec::new(kind);
    experiment.action = spec.optional_text("action")?.map(str::to_string);
    experiment.schedule = spec
        .optional_object("schedule")?
        .map(|schedule| decode_schedule(&schedule))
        .transpose()?;
    experiment.fields = spec.remainder(&ExperimentSpec::RESERVED_KEYS);
    if let Some(error) = experiment_field_errors(&experiment.fields, spec.path())
        .into_iter()
        .next()
    {
        return Err(error.into());
    }
    Ok(experiment)
}

fn forbid(
    reader: &ObjectReader<'_>,
    template_type: TemplateType,
    keys: &[&str],
) -> Result<(), FieldError> {
    keys.iter()
        .try_for_each(|key| reader.forbid(key, template_type.as_str()))
}

fn retarget(template: &mut Template, rename: &HashMap<String, NodeId>) {
    let targets: Vec<&mut NodeId> = match template {
        Template::Serial { children } | Template::Parallel { children } => {
            children.iter_mut().collect()
        }
        Template::Custom(task) => task
            .conditional_branches
            .iter_mut()
            .map(|b| &mut b.target)
            .collect(),
        Template::Single { .. } | Template::Suspend => Vec::new(),
    };
    for target in targets {
        if let Some(id) = rename.get(target.as_str()) {
            *target = id.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encode the tree as a nested document rooted at its single root.
///
/// Each node is inlined (with its `id`) the first time the pre-order walk
/// reaches it and referenced by id afterwards, so shared children and
/// branch targets survive the round trip.
pub fn encode_nested(nodes: &NodeMap) -> Result<Value, WorkflowError> {
    let root = tree::check_invariants(nodes)?;

    let mut errors = FieldErrors::new();
    for node in tree::preorder(nodes, &root).iter().filter_map(|id| nodes.get(id)) {
        if let Err(e) = validate_node_at(node, &tree::node_path(&node.id)) {
            errors.extend(e);
        }
    }
    errors.into_result()?;

    let mut visited = HashSet::new();
    let document = encode_node(nodes, &root, &mut visited);
    tracing::debug!(%root, nodes = visited.len(), "encoded nested document");
    Ok(document)
}

fn encode_node<'a>(nodes: &'a NodeMap, id: &'a NodeId, visited: &mut HashSet<&'a NodeId>) -> Value {
    let Some(node) = nodes.get(id) else {
        return Value::String(id.to_string());
    };
    if !visited.insert(id) {
        return Value::String(id.to_string());
    }

    let mut object = Map::new();
    object.insert("id".to_string(), json!(node.id));
    object.insert("name".to_string(), json!(node.name));
    object.insert("type".to_string(), json!(node.template_type().as_str()));
    if let Some(deadline) = &node.deadline {
        object.insert("deadline".to_string(), json!(deadline));
    }

    match &node.template {
        Template::Single { experiment } => {
            let mut spec = experiment.fields.clone();
            spec.insert("kind".to_string(), json!(experiment.kind.as_str()));
            if let Some(action) = &experiment.action {
                spec.insert("action".to_string(), json!(action));
            }
            if let Some(schedule) = &experiment.schedule {
                spec.insert("schedule".to_string(), json!(schedule));
            }
            object.insert(EXPERIMENT_SPEC.to_string(), Value::Object(spec));
        }
        Template::Serial { children } | Template::Parallel { children } => {
            let children: Vec<Value> = children
                .iter()
                .map(|child| encode_node(nodes, child, visited))
                .collect();
            object.insert(CHILDREN.to_string(), Value::Array(children));
        }
        Template::Suspend => {}
        Template::Custom(task) => {
            let branches: Vec<Value> = task
                .conditional_branches
                .iter()
                .map(|branch| {
                    json!({
                        "target": encode_node(nodes, &branch.target, visited),
                        "expression": branch.expression,
                    })
                })
                .collect();
            object.insert(
                CUSTOM.to_string(),
                json!({
                    "container": task.container,
                    "conditionalBranches": branches,
                }),
            );
        }
    }
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::tree::tests::{custom, map_of, parallel, serial, single};
    use chaosflow_types::workflow::ScheduleSpec;

    fn names_of(decoded: &DecodedWorkflow, ids: &[NodeId]) -> Vec<String> {
        let map = decoded.node_map();
        ids.iter().map(|id| map[id].name.clone()).collect()
    }

    #[test]
    fn test_decode_minimal_document() {
        let doc = json!({
            "name": "wf",
            "children": [
                {"name": "a", "type": "Single",
                 "experimentSpec": {"kind": "PodChaos", "action": "pod-kill"}}
            ]
        });
        let wf = decode_nested(&doc).unwrap();
        assert_eq!(wf.nodes.len(), 2);
        assert_eq!(wf.meta.name, "wf");

        let root = wf.root_node().unwrap();
        assert_eq!(root.template_type(), TemplateType::Serial);
        assert_eq!(names_of(&wf, root.template.children()), vec!["a"]);

        let child = &wf.nodes[1];
        let experiment = child.template.experiment().unwrap();
        assert_eq!(experiment.kind, ExperimentKind::PodChaos);
        assert_eq!(experiment.action.as_deref(), Some("pod-kill"));
        assert!(experiment.fields.is_empty());
    }

    #[test]
    fn test_decode_unknown_kind_lists_permitted() {
        let doc = json!({
            "name": "wf",
            "children": [
                {"name": "a", "type": "Single", "experimentSpec": {"kind": "HelloWorldChaos"}}
            ]
        });
        let err = decode_nested(&doc).unwrap_err();
        match &err {
            WorkflowError::UnknownKind { path, kind, supported } => {
                assert_eq!(path.as_str(), "children[0].experimentSpec.kind");
                assert_eq!(kind, "HelloWorldChaos");
                assert_eq!(supported.len(), ExperimentKind::ALL.len());
            }
            other => panic!("unexpected error: {other}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("PodChaos"), "got: {msg}");
        assert!(msg.contains("PhysicalMachineChaos"), "got: {msg}");
    }

    #[test]
    fn test_decode_string_references() {
        let doc = json!({
            "name": "wf",
            "type": "Parallel",
            "children": [
                {"id": "probe", "name": "check", "type": "Custom",
                 "custom": {
                     "container": {"name": "probe", "image": "busybox"},
                     "conditionalBranches": [
                         {"target": "kill", "expression": "exitCode == 0"},
                         {"target": {"name": "fallback", "type": "Suspend", "deadline": "10s"},
                          "expression": "exitCode != 0"}
                     ]
                 }},
                {"id": "k1", "name": "kill", "type": "Single",
                 "experimentSpec": {"kind": "PodChaos", "action": "pod-kill", "mode": "one"}},
                "fallback"
            ]
        });
        let wf = decode_nested(&doc).unwrap();
        assert_eq!(wf.nodes.len(), 4);

        let root = wf.root_node().unwrap();
        assert_eq!(root.template_type(), TemplateType::Parallel);
        assert_eq!(
            names_of(&wf, root.template.children()),
            vec!["check", "kill", "fallback"]
        );

        let map = wf.node_map();
        let probe = &map[&NodeId::from("probe")];
        let targets: Vec<NodeId> = probe
            .template
            .branches()
            .iter()
            .map(|b| b.target.clone())
            .collect();
        assert_eq!(targets[0], NodeId::from("k1"));
        assert_eq!(targets[1], root.template.children()[2]);
        assert_eq!(map[&NodeId::from("k1")].template.experiment().unwrap().fields["mode"], "one");
    }

    #[test]
    fn test_decode_rejects_ambiguous_and_dangling_names() {
        let doc = json!({
            "name": "wf",
            "children": [
                {"name": "dup", "type": "Suspend", "deadline": "1s"},
                {"name": "dup", "type": "Suspend", "deadline": "2s"},
                "dup"
            ]
        });
        let err = decode_nested(&doc).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("children[2]"), "got: {msg}");
        assert!(msg.contains("shared by several nodes"), "got: {msg}");

        let doc = json!({"name": "wf", "children": ["ghost"]});
        let err = decode_nested(&doc).unwrap_err();
        assert!(
            matches!(err, WorkflowError::DanglingReference { ref target, .. } if target.as_str() == "ghost")
        );
    }

    #[test]
    fn test_decode_rejects_duplicate_ids() {
        let doc = json!({
            "id": "x",
            "name": "wf",
            "children": [{"id": "x", "name": "a", "type": "Suspend", "deadline": "1s"}]
        });
        let err = decode_nested(&doc).unwrap_err();
        assert!(err.to_string().contains("children[0].id"), "got: {err}");
    }

    #[test]
    fn test_decode_rejects_cycle_through_reference() {
        let doc = json!({
            "id": "top",
            "name": "wf",
            "children": [{"name": "inner", "type": "Serial", "children": ["top"]}]
        });
        assert!(decode_nested(&doc).is_err());
    }

    #[test]
    fn test_decode_field_checks() {
        let doc = json!({"name": "wf", "children": [{"name": "a"}]});
        let err = decode_nested(&doc).unwrap_err();
        assert!(err.to_string().contains("children[0].type: required value"), "got: {err}");

        let doc = json!({"name": "wf", "children": [{"name": "a", "type": "Loop"}]});
        let err = decode_nested(&doc).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Single, Serial, Parallel, Suspend, Custom"), "got: {msg}");

        let doc = json!({"name": null, "children": []});
        let err = decode_nested(&doc).unwrap_err();
        assert!(err.to_string().contains("name: invalid type"), "got: {err}");

        let doc = json!({"name": "wf", "type": "Suspend", "deadline": "1s", "children": ["x"]});
        let err = decode_nested(&doc).unwrap_err();
        assert!(err.to_string().contains("should not contain children"), "got: {err}");

        let doc = json!({"name": "wf", "children": [3]});
        let err = decode_nested(&doc).unwrap_err();
        assert!(err.to_string().contains("expected object or string"), "got: {err}");

        let err = decode_nested(&json!("text")).unwrap_err();
        assert!(matches!(err, WorkflowError::NotAnObject(ref t) if t == "string"));
    }

    // -----------------------------------------------------------------------
    // Encode
    // -----------------------------------------------------------------------

    fn shared_tree() -> NodeMap {
        map_of(vec![
            serial("r", &["p", "c"]),
            parallel("p", &["a", "b"]),
            single("a"),
            single("b"),
            custom("c", &[("a", "exitCode == 0"), ("b", "exitCode != 0")]),
        ])
    }

    #[test]
    fn test_encode_inlines_once_then_references() {
        let doc = encode_nested(&shared_tree()).unwrap();
        assert_eq!(doc["id"], "r");
        assert_eq!(doc["type"], "Serial");
        assert_eq!(doc["children"][0]["children"][0]["id"], "a");
        assert_eq!(doc["children"][0]["children"][0]["experimentSpec"]["kind"], "PodChaos");
        assert_eq!(
            doc["children"][1]["custom"]["conditionalBranches"][0]["target"],
            "a"
        );
        assert_eq!(
            doc["children"][1]["custom"]["conditionalBranches"][1]["expression"],
            "exitCode != 0"
        );
    }

    #[test]
    fn test_encode_rejects_invalid_tree() {
        let nodes = map_of(vec![serial("r", &["missing-id"])]);
        assert!(matches!(
            encode_nested(&nodes),
            Err(WorkflowError::DanglingReference { .. })
        ));

        let nodes = map_of(vec![
            serial("r", &["s"]),
            Node::with_id("s", "wait", Template::Suspend),
        ]);
        let err = encode_nested(&nodes).unwrap_err();
        assert!(err.to_string().contains("nodes[s].deadline"), "got: {err}");
    }

    #[test]
    fn test_round_trip_keeps_ids() {
        let nodes = shared_tree();
        let decoded = decode_nested(&encode_nested(&nodes).unwrap()).unwrap();
        assert_eq!(decoded.root, NodeId::from("r"));
        assert_eq!(decoded.node_map(), nodes);
    }

    #[test]
    fn test_decode_rejects_duration_and_reserved_fields() {
        let with_spec = |spec: Value| {
            json!({"name": "wf", "children": [{"name": "a", "type": "Single", "experimentSpec": spec}]})
        };

        let err = decode_nested(&with_spec(json!({"kind": "PodChaos", "duration": null})))
            .unwrap_err();
        assert!(err.to_string().contains("children[0].experimentSpec.duration"), "got: {err}");

        let err = decode_nested(&with_spec(json!({"kind": "PodChaos", "schedule": "@every 1m"})))
            .unwrap_err();
        assert!(err.to_string().contains("children[0].experimentSpec.schedule"), "got: {err}");
        assert!(err.to_string().contains("expected object, found string"), "got: {err}");
    }

    #[test]
    fn test_decode_scheduled_experiment() {
        let doc = json!({
            "name": "wf",
            "children": [
                {"name": "s1", "type": "Single", "deadline": "1m",
                 "experimentSpec": {
                     "kind": "PodChaos", "action": "pod-failure", "mode": "all",
                     "schedule": {"schedule": "@every 2h", "historyLimit": 2, "concurrencyPolicy": "Forbid"}
                 }}
            ]
        });
        let wf = decode_nested(&doc).unwrap();
        let experiment = wf.nodes[1].template.experiment().unwrap();
        let schedule = experiment.schedule.as_ref().unwrap();
        assert_eq!(schedule.schedule, "@every 2h");
        assert_eq!(schedule.history_limit, Some(2));
        assert_eq!(experiment.fields.len(), 1);
        assert_eq!(experiment.fields["mode"], "all");
    }

    #[test]
    fn test_encode_rejects_reserved_keys_in_fields() {
        let mut kill = single("a");
        if let Template::Single { experiment } = &mut kill.template {
            experiment
                .fields
                .insert("kind".to_string(), json!("NetworkChaos"));
        }
        let err = encode_nested(&map_of(vec![serial("r", &["a"]), kill])).unwrap_err();
        let WorkflowError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.has_path("nodes[a].experimentSpec.kind"), "got: {errors}");
    }

    #[test]
    fn test_round_trip_keeps_opaque_and_schedule_fields() {
        let mut nodes = shared_tree();
        let a = nodes.get_mut(&NodeId::from("a")).unwrap();
        if let Template::Single { experiment } = &mut a.template {
            experiment.fields.insert(
                "selector".to_string(),
                json!({"labelSelectors": {"app": "web"}, "namespaces": ["default"]}),
            );
            experiment.fields.insert("value".to_string(), json!("50"));
        }
        let b = nodes.get_mut(&NodeId::from("b")).unwrap();
        if let Template::Single { experiment } = &mut b.template {
            let mut schedule = ScheduleSpec::new("@every 2h");
            schedule.starting_deadline_seconds = Some(60);
            experiment.schedule = Some(schedule);
        }

        let doc = encode_nested(&nodes).unwrap();
        assert_eq!(
            doc["children"][0]["children"][1]["experimentSpec"]["schedule"]["startingDeadlineSeconds"],
            60
        );
        let decoded = decode_nested(&doc).unwrap();
        assert_eq!(decoded.node_map(), nodes);
    }

    #[test]
    fn test_round_trip_through_yaml_text() {
        let nodes = shared_tree();
        let yaml = crate::workflow::definition::serialize_yaml(&encode_nested(&nodes).unwrap()).unwrap();
        let decoded = crate::workflow::definition::parse_workflow(&yaml).unwrap();
        assert_eq!(decoded.node_map(), nodes);
    }
}

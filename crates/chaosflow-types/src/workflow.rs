//! Workflow node and template types.
//!
//! A workflow is a flat mapping of [`NodeId`] to [`Node`]. Structure is
//! expressed by identifier references (`children`, branch `target`s), never by
//! nested ownership, so a node may be shared by several parents and the whole
//! tree can be cloned, diffed and snapshotted cheaply.
//!
//! The variant-specific payload of a node lives in [`Template`], a closed
//! five-variant sum type: fields that are illegal for a variant cannot be
//! represented at all.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FieldPath;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Unique identifier of a node within one workflow.
///
/// Fresh identifiers are UUID v7 strings (time-sortable). Identifiers coming
/// from a nested document are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Template type discriminant
// ---------------------------------------------------------------------------

/// Discriminant of [`Template`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateType {
    Single,
    Serial,
    Parallel,
    Suspend,
    Custom,
}

impl TemplateType {
    pub const ALL: [TemplateType; 5] = [
        TemplateType::Single,
        TemplateType::Serial,
        TemplateType::Parallel,
        TemplateType::Suspend,
        TemplateType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::Single => "Single",
            TemplateType::Serial => "Serial",
            TemplateType::Parallel => "Parallel",
            TemplateType::Suspend => "Suspend",
            TemplateType::Custom => "Custom",
        }
    }
}

impl fmt::Display for TemplateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TemplateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Single" => Ok(TemplateType::Single),
            "Serial" => Ok(TemplateType::Serial),
            "Parallel" => Ok(TemplateType::Parallel),
            "Suspend" => Ok(TemplateType::Suspend),
            "Custom" => Ok(TemplateType::Custom),
            other => Err(format!("invalid template type: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Experiment kinds
// ---------------------------------------------------------------------------

/// The fixed set of chaos experiment kinds a `Single` node can run.
///
/// Each kind has a wire name (`PodChaos`) and the camel-cased field name the
/// backend manifest embeds its spec under (`podChaos`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExperimentKind {
    #[serde(rename = "AWSChaos")]
    AwsChaos,
    #[serde(rename = "AzureChaos")]
    AzureChaos,
    #[serde(rename = "BlockChaos")]
    BlockChaos,
    #[serde(rename = "DNSChaos")]
    DnsChaos,
    #[serde(rename = "GCPChaos")]
    GcpChaos,
    #[serde(rename = "HTTPChaos")]
    HttpChaos,
    #[serde(rename = "IOChaos")]
    IoChaos,
    #[serde(rename = "JVMChaos")]
    JvmChaos,
    #[serde(rename = "KernelChaos")]
    KernelChaos,
    #[serde(rename = "NetworkChaos")]
    NetworkChaos,
    #[serde(rename = "PodChaos")]
    PodChaos,
    #[serde(rename = "StressChaos")]
    StressChaos,
    #[serde(rename = "TimeChaos")]
    TimeChaos,
    #[serde(rename = "PhysicalMachineChaos")]
    PhysicalMachineChaos,
}

impl ExperimentKind {
    pub const ALL: [ExperimentKind; 14] = [
        ExperimentKind::AwsChaos,
        ExperimentKind::AzureChaos,
        ExperimentKind::BlockChaos,
        ExperimentKind::DnsChaos,
        ExperimentKind::GcpChaos,
        ExperimentKind::HttpChaos,
        ExperimentKind::IoChaos,
        ExperimentKind::JvmChaos,
        ExperimentKind::KernelChaos,
        ExperimentKind::NetworkChaos,
        ExperimentKind::PodChaos,
        ExperimentKind::StressChaos,
        ExperimentKind::TimeChaos,
        ExperimentKind::PhysicalMachineChaos,
    ];

    /// Wire name, as used in `experimentSpec.kind` and manifest `templateType`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentKind::AwsChaos => "AWSChaos",
            ExperimentKind::AzureChaos => "AzureChaos",
            ExperimentKind::BlockChaos => "BlockChaos",
            ExperimentKind::DnsChaos => "DNSChaos",
            ExperimentKind::GcpChaos => "GCPChaos",
            ExperimentKind::HttpChaos => "HTTPChaos",
            ExperimentKind::IoChaos => "IOChaos",
            ExperimentKind::JvmChaos => "JVMChaos",
            ExperimentKind::KernelChaos => "KernelChaos",
            ExperimentKind::NetworkChaos => "NetworkChaos",
            ExperimentKind::PodChaos => "PodChaos",
            ExperimentKind::StressChaos => "StressChaos",
            ExperimentKind::TimeChaos => "TimeChaos",
            ExperimentKind::PhysicalMachineChaos => "PhysicalMachineChaos",
        }
    }

    /// Manifest field name holding the experiment spec.
    pub fn field_name(&self) -> &'static str {
        match self {
            ExperimentKind::AwsChaos => "awsChaos",
            ExperimentKind::AzureChaos => "azureChaos",
            ExperimentKind::BlockChaos => "blockChaos",
            ExperimentKind::DnsChaos => "dnsChaos",
            ExperimentKind::GcpChaos => "gcpChaos",
            ExperimentKind::HttpChaos => "httpChaos",
            ExperimentKind::IoChaos => "ioChaos",
            ExperimentKind::JvmChaos => "jvmChaos",
            ExperimentKind::KernelChaos => "kernelChaos",
            ExperimentKind::NetworkChaos => "networkChaos",
            ExperimentKind::PodChaos => "podChaos",
            ExperimentKind::StressChaos => "stressChaos",
            ExperimentKind::TimeChaos => "timeChaos",
            ExperimentKind::PhysicalMachineChaos => "physicalmachineChaos",
        }
    }

    /// Wire names of every kind, in table order.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|k| k.as_str()).collect()
    }
}

impl fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExperimentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("invalid experiment kind: '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Template payloads
// ---------------------------------------------------------------------------

/// The experiment a `Single` node runs.
///
/// `fields` is the opaque remainder of the experiment spec (selector, mode,
/// value, ...), passed through unchanged. Its keys never collide with the
/// keys the codecs write themselves, see [`ExperimentSpec::RESERVED_KEYS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSpec {
    pub kind: ExperimentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Run the experiment on a cron schedule instead of once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleSpec>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl ExperimentSpec {
    /// Keys owned by the typed fields above. They are illegal in `fields`.
    pub const RESERVED_KEYS: [&'static str; 3] = ["kind", "action", "schedule"];

    pub fn new(kind: ExperimentKind) -> Self {
        Self {
            kind,
            action: None,
            schedule: None,
            fields: serde_json::Map::new(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_schedule(mut self, schedule: ScheduleSpec) -> Self {
        self.schedule = Some(schedule);
        self
    }
}

/// What a scheduled experiment does when a run is due while the previous one
/// is still going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConcurrencyPolicy {
    Forbid,
    Allow,
}

impl ConcurrencyPolicy {
    pub const NAMES: [&'static str; 2] = ["Forbid", "Allow"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyPolicy::Forbid => "Forbid",
            ConcurrencyPolicy::Allow => "Allow",
        }
    }
}

impl FromStr for ConcurrencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Forbid" => Ok(ConcurrencyPolicy::Forbid),
            "Allow" => Ok(ConcurrencyPolicy::Allow),
            other => Err(format!("invalid concurrency policy: '{other}'")),
        }
    }
}

/// Cron settings of a scheduled experiment.
///
/// The manifest writes a scheduled `Single` node as a `Schedule` template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSpec {
    /// Cron expression or `@every <duration>`. Evaluated server-side.
    pub schedule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_policy: Option<ConcurrencyPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_deadline_seconds: Option<u64>,
}

impl ScheduleSpec {
    pub fn new(schedule: impl Into<String>) -> Self {
        Self {
            schedule: schedule.into(),
            history_limit: None,
            concurrency_policy: None,
            starting_deadline_seconds: None,
        }
    }
}

/// Container a `Custom` node runs to decide which branch to take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
}

/// A guarded edge from a `Custom` node to another node.
///
/// The expression is evaluated server-side; it is opaque here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalBranch {
    pub target: NodeId,
    pub expression: String,
}

/// Payload of a `Custom` node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTask {
    pub container: ContainerSpec,
    pub conditional_branches: Vec<ConditionalBranch>,
}

/// Variant-specific definition of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Template {
    /// A single chaos experiment.
    Single { experiment: ExperimentSpec },

    /// Children run one after another, in array order.
    Serial { children: Vec<NodeId> },

    /// Children run concurrently.
    Parallel { children: Vec<NodeId> },

    /// Wait for the node's deadline.
    Suspend,

    /// Run a container, then follow the branches whose expressions hold.
    Custom(CustomTask),
}

/// How a node references another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Entry of a `Serial`/`Parallel` `children` list.
    Child,
    /// Target of a `Custom` conditional branch.
    Branch,
}

/// One outgoing reference of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateRef<'a> {
    pub kind: ReferenceKind,
    /// Position within `children` or `conditionalBranches`.
    pub index: usize,
    pub target: &'a NodeId,
    /// Branch expression (only for [`ReferenceKind::Branch`]).
    pub label: Option<&'a str>,
}

impl TemplateRef<'_> {
    /// Path of the referencing field, relative to the node.
    pub fn path(&self, base: &FieldPath) -> FieldPath {
        match self.kind {
            ReferenceKind::Child => base.child("children").index(self.index),
            ReferenceKind::Branch => base
                .child("custom")
                .child("conditionalBranches")
                .index(self.index)
                .child("target"),
        }
    }
}

impl Template {
    pub fn template_type(&self) -> TemplateType {
        match self {
            Template::Single { .. } => TemplateType::Single,
            Template::Serial { .. } => TemplateType::Serial,
            Template::Parallel { .. } => TemplateType::Parallel,
            Template::Suspend => TemplateType::Suspend,
            Template::Custom(_) => TemplateType::Custom,
        }
    }

    /// Ordered children of a `Serial`/`Parallel` node, empty otherwise.
    pub fn children(&self) -> &[NodeId] {
        match self {
            Template::Serial { children } | Template::Parallel { children } => children,
            _ => &[],
        }
    }

    /// Ordered branches of a `Custom` node, empty otherwise.
    pub fn branches(&self) -> &[ConditionalBranch] {
        match self {
            Template::Custom(task) => &task.conditional_branches,
            _ => &[],
        }
    }

    pub fn experiment(&self) -> Option<&ExperimentSpec> {
        match self {
            Template::Single { experiment } => Some(experiment),
            _ => None,
        }
    }

    /// Every outgoing reference: children first, then branch targets.
    pub fn references(&self) -> impl Iterator<Item = TemplateRef<'_>> {
        let children = self.children().iter().enumerate().map(|(index, target)| TemplateRef {
            kind: ReferenceKind::Child,
            index,
            target,
            label: None,
        });
        let branches = self
            .branches()
            .iter()
            .enumerate()
            .map(|(index, branch)| TemplateRef {
                kind: ReferenceKind::Branch,
                index,
                target: &branch.target,
                label: Some(branch.expression.as_str()),
            });
        children.chain(branches)
    }

    pub fn has_references(&self) -> bool {
        !self.children().is_empty() || !self.branches().is_empty()
    }

    /// Drop every reference to `id`. Returns whether anything was removed.
    pub fn remove_references_to(&mut self, id: &NodeId) -> bool {
        match self {
            Template::Serial { children } | Template::Parallel { children } => {
                let before = children.len();
                children.retain(|child| child != id);
                children.len() != before
            }
            Template::Custom(task) => {
                let before = task.conditional_branches.len();
                task.conditional_branches.retain(|b| &b.target != id);
                task.conditional_branches.len() != before
            }
            Template::Single { .. } | Template::Suspend => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single point in the workflow tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Duration string bounding execution; required on `Suspend`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    pub template: Template,
}

impl Node {
    /// Create a node with a freshly generated identifier.
    pub fn new(name: impl Into<String>, template: Template) -> Self {
        Self::with_id(NodeId::new(), name, template)
    }

    pub fn with_id(id: impl Into<NodeId>, name: impl Into<String>, template: Template) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            deadline: None,
            template,
        }
    }

    pub fn with_deadline(mut self, deadline: impl Into<String>) -> Self {
        self.deadline = Some(deadline.into());
        self
    }

    pub fn template_type(&self) -> TemplateType {
        self.template.template_type()
    }
}

// ---------------------------------------------------------------------------
// Store snapshot
// ---------------------------------------------------------------------------

/// Immutable view of the node store at one revision.
///
/// Cloning is cheap: the mapping is shared.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub revision: u64,
    pub nodes: Arc<BTreeMap<NodeId, Node>>,
}

impl StoreSnapshot {
    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Workflow metadata and status
// ---------------------------------------------------------------------------

/// Identity of the workflow resource (manifest `metadata`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl WorkflowMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }
}

/// Condition types reported on a workflow's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowConditionType {
    Accomplished,
    Scheduled,
}

impl WorkflowConditionType {
    pub const NAMES: [&'static str; 2] = ["Accomplished", "Scheduled"];
}

impl FromStr for WorkflowConditionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Accomplished" => Ok(WorkflowConditionType::Accomplished),
            "Scheduled" => Ok(WorkflowConditionType::Scheduled),
            other => Err(format!("invalid condition type: '{other}'")),
        }
    }
}

/// Truth value of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub const NAMES: [&'static str; 3] = ["True", "False", "Unknown"];
}

impl FromStr for ConditionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "True" => Ok(ConditionStatus::True),
            "False" => Ok(ConditionStatus::False),
            "Unknown" => Ok(ConditionStatus::Unknown),
            other => Err(format!("invalid condition status: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowCondition {
    #[serde(rename = "type")]
    pub condition_type: WorkflowConditionType,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Server-reported status of a workflow. Decoded, never encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_node: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<WorkflowCondition>,
}

impl WorkflowStatus {
    /// Whether the `Accomplished` condition is `True`.
    pub fn is_accomplished(&self) -> bool {
        self.conditions.iter().any(|c| {
            c.condition_type == WorkflowConditionType::Accomplished
                && c.status == ConditionStatus::True
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serial(ids: &[&str]) -> Template {
        Template::Serial {
            children: ids.iter().map(|s| NodeId::from(*s)).collect(),
        }
    }

    fn custom(targets: &[(&str, &str)]) -> Template {
        Template::Custom(CustomTask {
            container: ContainerSpec {
                name: "check".to_string(),
                image: "busybox".to_string(),
                command: vec!["sh".to_string(), "-c".to_string(), "echo ok".to_string()],
            },
            conditional_branches: targets
                .iter()
                .map(|(t, e)| ConditionalBranch {
                    target: NodeId::from(*t),
                    expression: e.to_string(),
                })
                .collect(),
        })
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    #[test]
    fn test_node_id_new_is_unique() {
        let a = NodeId::new();
        let b = NodeId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_node_id_serializes_transparently() {
        let id = NodeId::from("root");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"root\"");
        let back: NodeId = serde_json::from_str("\"root\"").unwrap();
        assert_eq!(back, id);
    }

    // -----------------------------------------------------------------------
    // Template type
    // -----------------------------------------------------------------------

    #[test]
    fn test_template_type_display_and_from_str() {
        for t in TemplateType::ALL {
            let parsed: TemplateType = t.to_string().parse().unwrap();
            assert_eq!(parsed, t);
        }
        assert!("Schedule".parse::<TemplateType>().is_err());
    }

    // -----------------------------------------------------------------------
    // Experiment kinds
    // -----------------------------------------------------------------------

    #[test]
    fn test_experiment_kind_field_names() {
        assert_eq!(ExperimentKind::PodChaos.field_name(), "podChaos");
        assert_eq!(ExperimentKind::AwsChaos.field_name(), "awsChaos");
        assert_eq!(ExperimentKind::DnsChaos.field_name(), "dnsChaos");
        assert_eq!(
            ExperimentKind::PhysicalMachineChaos.field_name(),
            "physicalmachineChaos"
        );
    }

    #[test]
    fn test_experiment_kind_from_str_matches_wire_name() {
        assert_eq!(
            "IOChaos".parse::<ExperimentKind>().unwrap(),
            ExperimentKind::IoChaos
        );
        let err = "HelloWorldChaos".parse::<ExperimentKind>().unwrap_err();
        assert!(err.contains("HelloWorldChaos"), "got: {err}");
        assert_eq!(ExperimentKind::names().len(), 14);
    }

    #[test]
    fn test_experiment_kind_serde_uses_wire_name() {
        let json = serde_json::to_string(&ExperimentKind::HttpChaos).unwrap();
        assert_eq!(json, "\"HTTPChaos\"");
        for kind in ExperimentKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_schedule_spec_serializes_camel_case() {
        let mut schedule = ScheduleSpec::new("@every 2h");
        schedule.history_limit = Some(2);
        schedule.concurrency_policy = Some(ConcurrencyPolicy::Forbid);
        let spec = ExperimentSpec::new(ExperimentKind::PodChaos).with_schedule(schedule.clone());

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["schedule"]["schedule"], "@every 2h");
        assert_eq!(value["schedule"]["historyLimit"], 2);
        assert_eq!(value["schedule"]["concurrencyPolicy"], "Forbid");
        assert!(value["schedule"].get("startingDeadlineSeconds").is_none());

        let back: ExperimentSpec = serde_json::from_value(value).unwrap();
        assert_eq!(back.schedule, Some(schedule));
    }

    #[test]
    fn test_concurrency_policy_from_str() {
        for name in ConcurrencyPolicy::NAMES {
            let policy: ConcurrencyPolicy = name.parse().unwrap();
            assert_eq!(policy.as_str(), name);
        }
        assert!("Replace".parse::<ConcurrencyPolicy>().is_err());
    }

    // -----------------------------------------------------------------------
    // References
    // -----------------------------------------------------------------------

    #[test]
    fn test_references_children_then_branches() {
        let t = serial(&["a", "b"]);
        let refs: Vec<_> = t.references().collect();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].target.as_str(), "a");
        assert_eq!(refs[1].index, 1);
        assert!(refs.iter().all(|r| r.kind == ReferenceKind::Child));

        let c = custom(&[("x", "exit == 0"), ("y", "exit != 0")]);
        let refs: Vec<_> = c.references().collect();
        assert_eq!(refs[1].target.as_str(), "y");
        assert_eq!(refs[1].label, Some("exit != 0"));
        assert_eq!(refs[1].kind, ReferenceKind::Branch);
    }

    #[test]
    fn test_reference_paths() {
        let base = FieldPath::new("nodes").key("n1");
        let c = custom(&[("x", "true")]);
        let r = c.references().next().unwrap();
        assert_eq!(
            r.path(&base).as_str(),
            "nodes[n1].custom.conditionalBranches[0].target"
        );

        let s = serial(&["a", "b"]);
        let r = s.references().nth(1).unwrap();
        assert_eq!(r.path(&FieldPath::root()).as_str(), "children[1]");
    }

    #[test]
    fn test_remove_references_to() {
        let mut t = serial(&["a", "b", "a"]);
        assert!(t.remove_references_to(&NodeId::from("a")));
        assert_eq!(t.children(), &[NodeId::from("b")]);
        assert!(!t.remove_references_to(&NodeId::from("zzz")));

        let mut c = custom(&[("x", "1"), ("y", "2")]);
        assert!(c.remove_references_to(&NodeId::from("x")));
        assert_eq!(c.branches().len(), 1);
        assert_eq!(c.branches()[0].target.as_str(), "y");

        let mut s = Template::Suspend;
        assert!(!s.remove_references_to(&NodeId::from("x")));
        assert!(!s.has_references());
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    #[test]
    fn test_node_serialization_tagged_template() {
        let node = Node::with_id(
            "a",
            "kill-pod",
            Template::Single {
                experiment: ExperimentSpec::new(ExperimentKind::PodChaos).with_action("pod-kill"),
            },
        )
        .with_deadline("30s");

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["id"], "a");
        assert_eq!(json["deadline"], "30s");
        assert_eq!(json["template"]["type"], "Single");
        assert_eq!(json["template"]["experiment"]["kind"], "PodChaos");
        assert_eq!(json["template"]["experiment"]["action"], "pod-kill");

        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_suspend_node_omits_empty_fields() {
        let node = Node::with_id("s", "wait", Template::Suspend);
        let json = serde_json::to_value(&node).unwrap();
        assert!(json.get("deadline").is_none());
        assert_eq!(json["template"]["type"], "Suspend");
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    #[test]
    fn test_workflow_status_accomplished() {
        let status = WorkflowStatus {
            entry_node: Some("entry-abc".to_string()),
            conditions: vec![
                WorkflowCondition {
                    condition_type: WorkflowConditionType::Scheduled,
                    status: ConditionStatus::True,
                    reason: None,
                },
                WorkflowCondition {
                    condition_type: WorkflowConditionType::Accomplished,
                    status: ConditionStatus::True,
                    reason: Some("done".to_string()),
                },
            ],
        };
        assert!(status.is_accomplished());
        assert!(!WorkflowStatus::default().is_accomplished());
        assert_eq!(
            "Unknown".parse::<ConditionStatus>().unwrap(),
            ConditionStatus::Unknown
        );
        assert!("Maybe".parse::<ConditionStatus>().is_err());
    }
}

//! Span field names for workflow operations.
//!
//! Usable as field names in `tracing::info_span!` so exported spans carry
//! consistent attributes.

/// The operation being performed (one of the `OP_*` values).
pub const WORKFLOW_OPERATION: &str = "chaosflow.operation";

/// Path of the workflow file being processed.
pub const WORKFLOW_FILE: &str = "chaosflow.workflow.file";

/// Workflow name from metadata or the root node.
pub const WORKFLOW_NAME: &str = "chaosflow.workflow.name";

/// Number of nodes in the decoded workflow.
pub const WORKFLOW_NODE_COUNT: &str = "chaosflow.workflow.node_count";

/// Output format of a conversion.
pub const OUTPUT_FORMAT: &str = "chaosflow.output.format";

// --- Operation name values ---

pub const OP_VALIDATE: &str = "validate";
pub const OP_CONVERT: &str = "convert";
pub const OP_TOPOLOGY: &str = "topology";
pub const OP_STEPS: &str = "steps";
pub const OP_LIST: &str = "list";

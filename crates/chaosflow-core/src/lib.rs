//! Workflow authoring logic for chaosflow.
//!
//! Holds the node store, template validation, the document codecs, the
//! topology builder, and the wizard stepper. It depends only on
//! `chaosflow-types`, never on `chaosflow-infra` or any CLI crate.

pub mod event;
pub mod workflow;

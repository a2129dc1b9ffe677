//! Workflow authoring core.
//!
//! Submodules:
//! - `definition`: Error type, text parsing, document form detection, file I/O
//! - `fields`: Path-aware reader over untyped document values
//! - `template`: Field-scoped validation of a single node
//! - `tree`: Roots, dangling references, cycles, pre-order walks, equality
//! - `store`: The node store with snapshot publishing
//! - `codec`: Backend manifest encode/decode
//! - `document`: Nested authoring document encode/decode
//! - `topology`: Directed graph derivation for rendering
//! - `stepper`: Wizard step navigation
//! - `editor`: Wizard-level facade enforcing per-mutation rules

pub mod codec;
pub mod definition;
pub mod document;
pub mod editor;
pub(crate) mod fields;
pub mod stepper;
pub mod store;
pub mod template;
pub mod topology;
pub mod tree;

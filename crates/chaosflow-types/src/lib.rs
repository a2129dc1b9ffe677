//! Shared domain types for chaosflow.
//!
//! This crate contains the workflow node/template model, the experiment kind
//! table, field-scoped validation errors, topology output shapes, store
//! events, and configuration types.
//!
//! No infrastructure dependencies: serde, serde_json, uuid, chrono and thiserror only.

pub mod config;
pub mod error;
pub mod event;
pub mod topology;
pub mod workflow;

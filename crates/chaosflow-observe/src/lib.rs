//! Observability for chaosflow: tracing subscriber setup and span attribute
//! names shared by the CLI.

pub mod attrs;
pub mod tracing_setup;

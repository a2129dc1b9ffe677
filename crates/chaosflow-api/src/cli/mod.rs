//! CLI command definitions for the `chaosflow` binary.
//!
//! Uses clap derive macros for argument parsing. Every command takes a
//! workflow file in either document form (backend manifest or nested
//! authoring document, YAML or JSON).

pub mod kinds;
pub mod workflow;

use std::path::PathBuf;

use chaosflow_types::config::OutputFormat;
use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Author, validate and convert chaos workflows.
#[derive(Parser)]
#[command(name = "chaosflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors and requested documents.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode a workflow file and check every invariant.
    #[command(alias = "check")]
    Validate {
        /// Workflow file (looked up in the workflows directory if not found).
        file: PathBuf,
    },

    /// Convert a workflow file to a manifest or nested document.
    Convert {
        /// Workflow file (looked up in the workflows directory if not found).
        file: PathBuf,

        /// Output format: yaml, json (manifest) or nested. Defaults to config.
        #[arg(long, short)]
        format: Option<OutputFormat>,

        /// Write to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Namespace for the manifest when the workflow has none.
        #[arg(long, short)]
        namespace: Option<String>,
    },

    /// Show the node graph of a workflow.
    #[command(alias = "graph")]
    Topology {
        /// Workflow file (looked up in the workflows directory if not found).
        file: PathBuf,
    },

    /// Walk the wizard steps of a workflow in order.
    Steps {
        /// Workflow file (looked up in the workflows directory if not found).
        file: PathBuf,
    },

    /// List workflows in the workflows directory.
    #[command(alias = "ls")]
    List,

    /// List template types and experiment kinds.
    Kinds,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

//! CLI workflow subcommands.
//!
//! Provides validate, convert, topology, steps and list operations over
//! workflow files in either document form.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use tracing::Instrument;

use chaosflow_core::workflow::codec::{DecodedWorkflow, EncodeOptions};
use chaosflow_core::workflow::definition::{
    DocumentForm, WorkflowError, decode_document, detect_form, parse_document, serialize_json,
    serialize_yaml,
};
use chaosflow_core::workflow::editor::WorkflowEditor;
use chaosflow_core::workflow::stepper::{Stepper, step_sequence};
use chaosflow_core::workflow::store::TemplateStore;
use chaosflow_observe::attrs;
use chaosflow_types::config::OutputFormat;
use chaosflow_types::topology::{Topology, VertexState};
use chaosflow_types::workflow::NodeId;

use crate::state::AppState;

/// A decoded workflow file.
struct Loaded {
    path: PathBuf,
    form: DocumentForm,
    workflow: DecodedWorkflow,
}

impl Loaded {
    fn editor(&self) -> WorkflowEditor {
        editor_for(&self.workflow)
    }
}

fn editor_for(workflow: &DecodedWorkflow) -> WorkflowEditor {
    let mut store = TemplateStore::new();
    store.import_nodes(workflow.nodes.iter().cloned());
    WorkflowEditor::with_store(store)
}

async fn load(state: &AppState, file: &Path) -> Result<Loaded> {
    let path = state.fs.resolve(file).await;
    let text = state
        .fs
        .read_file(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = parse_document(&text).map_err(|e| describe(&path, e))?;
    let form = detect_form(&value);
    let workflow = decode_document(&value).map_err(|e| describe(&path, e))?;
    tracing::debug!(path = %path.display(), nodes = workflow.nodes.len(), "loaded workflow");
    Ok(Loaded {
        path,
        form,
        workflow,
    })
}

/// Turn a workflow error into a message listing every field problem.
fn describe(path: &Path, err: WorkflowError) -> anyhow::Error {
    match err {
        WorkflowError::Validation(errors) => {
            let lines: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
            anyhow::anyhow!("{} is invalid:\n{}", path.display(), lines.join("\n"))
        }
        other => anyhow::anyhow!("{} is invalid: {other}", path.display()),
    }
}

fn form_name(form: DocumentForm) -> &'static str {
    match form {
        DocumentForm::Manifest => "manifest",
        DocumentForm::Nested => "nested",
    }
}

fn name_lookup(workflow: &DecodedWorkflow) -> HashMap<&NodeId, &str> {
    workflow
        .nodes
        .iter()
        .map(|n| (&n.id, n.name.as_str()))
        .collect()
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

pub async fn handle_validate(state: &AppState, file: &Path, json: bool) -> Result<()> {
    let span = tracing::info_span!(
        "validate",
        { attrs::WORKFLOW_OPERATION } = attrs::OP_VALIDATE,
        { attrs::WORKFLOW_FILE } = %file.display(),
    );
    let loaded = load(state, file).await?;

    // Encoding enforces the whole-tree invariants and per-node validation.
    let options = EncodeOptions::from(&state.config);
    span.in_scope(|| {
        loaded
            .editor()
            .submit(&loaded.workflow.meta, &options)
            .map_err(|e| describe(&loaded.path, e))
    })?;

    let workflow = &loaded.workflow;
    let names = name_lookup(workflow);
    let root_name = names.get(&workflow.root).copied().unwrap_or_default();

    if json {
        let out = serde_json::json!({
            "file": loaded.path.display().to_string(),
            "valid": true,
            "form": form_name(loaded.form),
            "name": workflow.meta.name,
            "root": root_name,
            "nodes": workflow.nodes.len(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} '{}' is valid",
        style("✓").green().bold(),
        style(&workflow.meta.name).cyan()
    );
    println!("  File:  {}", loaded.path.display());
    println!("  Form:  {}", form_name(loaded.form));
    println!("  Root:  {root_name}");
    println!("  Nodes: {}", workflow.nodes.len());
    if let Some(status) = &workflow.status {
        let state = if status.is_accomplished() {
            style("accomplished").green()
        } else {
            style("in progress").yellow()
        };
        println!("  Status: {state}");
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Convert
// ---------------------------------------------------------------------------

/// Options of `chaosflow convert`.
pub struct ConvertArgs {
    pub format: Option<OutputFormat>,
    pub output: Option<PathBuf>,
    pub namespace: Option<String>,
    pub quiet: bool,
}

/// Render a workflow in the requested format.
fn render(workflow: &DecodedWorkflow, format: OutputFormat, options: &EncodeOptions) -> Result<String> {
    let editor = editor_for(workflow);
    let text = match format {
        OutputFormat::Yaml => serialize_yaml(&editor.submit(&workflow.meta, options)?)?,
        OutputFormat::Json => serialize_json(&editor.submit(&workflow.meta, options)?)?,
        OutputFormat::Nested => serialize_json(&editor.export_nested()?)?,
    };
    Ok(text)
}

pub async fn handle_convert(
    state: &AppState,
    file: &Path,
    args: ConvertArgs,
    json: bool,
) -> Result<()> {
    let loaded = load(state, file).await?;
    let format = args.format.unwrap_or(state.config.output);

    let mut options = EncodeOptions::from(&state.config);
    if args.namespace.is_some() {
        options.namespace = args.namespace;
    }

    let span = tracing::info_span!(
        "convert",
        { attrs::WORKFLOW_OPERATION } = attrs::OP_CONVERT,
        { attrs::WORKFLOW_NAME } = %loaded.workflow.meta.name,
        { attrs::OUTPUT_FORMAT } = %format,
    );
    let text = span
        .in_scope(|| render(&loaded.workflow, format, &options))
        .with_context(|| format!("Failed to convert {}", loaded.path.display()))?;

    let Some(output) = args.output else {
        if text.ends_with('\n') {
            print!("{text}");
        } else {
            println!("{text}");
        }
        return Ok(());
    };

    state
        .fs
        .write_file(&output, &text)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if json {
        let out = serde_json::json!({
            "file": loaded.path.display().to_string(),
            "output": output.display().to_string(),
            "format": format.to_string(),
            "nodes": loaded.workflow.nodes.len(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if !args.quiet {
        println!();
        println!(
            "  {} Wrote {} '{}' to {}",
            style("*").green().bold(),
            format,
            style(&loaded.workflow.meta.name).cyan(),
            output.display()
        );
        println!();
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

pub async fn handle_topology(state: &AppState, file: &Path, json: bool) -> Result<()> {
    let loaded = load(state, file).await?;
    let span = tracing::info_span!(
        "topology",
        { attrs::WORKFLOW_OPERATION } = attrs::OP_TOPOLOGY,
        { attrs::WORKFLOW_NODE_COUNT } = loaded.workflow.nodes.len(),
    );
    let topology = span.in_scope(|| loaded.editor().topology());

    if json {
        println!("{}", serde_json::to_string_pretty(&topology)?);
        return Ok(());
    }

    print_topology(&topology);
    Ok(())
}

fn print_topology(topology: &Topology) {
    let names: HashMap<&NodeId, &str> = topology
        .vertices
        .iter()
        .map(|v| (&v.id, v.label.as_str()))
        .collect();
    let name_of = |id: &NodeId| names.get(id).copied().unwrap_or(id.as_str()).to_string();

    let mut vertices: Vec<_> = topology.vertices.iter().collect();
    vertices.sort_by_key(|v| (v.depth.unwrap_or(usize::MAX), v.label.clone()));

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Depth"),
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Type"),
            Cell::new("State"),
            Cell::new("ID"),
        ]);
    for v in vertices {
        let state = match v.state {
            VertexState::Reachable => Cell::new("reachable").fg(Color::Green),
            VertexState::Unreachable => Cell::new("unreachable").fg(Color::Yellow),
            VertexState::Cyclic => Cell::new("cyclic").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(v.depth.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())),
            Cell::new(&v.label),
            Cell::new(v.template_type),
            state,
            Cell::new(&v.id),
        ]);
    }

    println!();
    println!("{table}");

    if !topology.edges.is_empty() {
        let mut edges = Table::new();
        edges
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("From").fg(Color::Cyan),
                Cell::new("To").fg(Color::Cyan),
                Cell::new("Condition"),
            ]);
        for e in &topology.edges {
            edges.add_row(vec![
                Cell::new(name_of(&e.from)),
                Cell::new(name_of(&e.to)),
                Cell::new(e.label.as_deref().unwrap_or("")),
            ]);
        }
        println!();
        println!("{edges}");
    }

    for warning in &topology.warnings {
        println!("  {} {warning}", style("!").yellow().bold());
    }
    println!();
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// One wizard step, in walk order.
#[derive(Debug)]
struct StepRow {
    step: usize,
    id: NodeId,
    name: String,
    template_type: String,
    deadline: Option<String>,
}

/// Walk the wizard from the first step to the last.
fn walk_steps(workflow: &DecodedWorkflow) -> Vec<StepRow> {
    let nodes = workflow.node_map();
    let sequence = step_sequence(&nodes, &workflow.root);
    let mut stepper = Stepper::new(sequence.len());

    let mut rows = Vec::with_capacity(sequence.len());
    loop {
        if let Some(node) = sequence.get(stepper.current()).and_then(|id| nodes.get(id)) {
            rows.push(StepRow {
                step: stepper.current() + 1,
                id: node.id.clone(),
                name: node.name.clone(),
                template_type: node.template_type().to_string(),
                deadline: node.deadline.clone(),
            });
        }
        if !stepper.next() {
            break;
        }
    }
    rows
}

pub async fn handle_steps(state: &AppState, file: &Path, json: bool) -> Result<()> {
    let loaded = load(state, file).await?;
    let span = tracing::info_span!(
        "steps",
        { attrs::WORKFLOW_OPERATION } = attrs::OP_STEPS,
        { attrs::WORKFLOW_NAME } = %loaded.workflow.meta.name,
    );
    let rows = span.in_scope(|| walk_steps(&loaded.workflow));

    if json {
        let out: Vec<_> = rows
            .iter()
            .map(|r| {
                serde_json::json!({
                    "step": r.step,
                    "id": r.id,
                    "name": r.name,
                    "type": r.template_type,
                    "deadline": r.deadline,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let total = rows.len();
    println!();
    for r in &rows {
        let deadline = r
            .deadline
            .as_deref()
            .map(|d| format!(" {}", style(format!("({d})")).dim()))
            .unwrap_or_default();
        println!(
            "  {} {} {}{deadline}",
            style(format!("[{}/{total}]", r.step)).bold(),
            style(&r.name).cyan(),
            r.template_type
        );
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

pub async fn handle_list(state: &AppState, json: bool) -> Result<()> {
    let span = tracing::info_span!("list", { attrs::WORKFLOW_OPERATION } = attrs::OP_LIST);
    let dir = state.fs.workflows_dir();
    let found = state
        .fs
        .discover()
        .instrument(span)
        .await
        .with_context(|| format!("Failed to scan {}", dir.display()))?;

    if json {
        let out: Vec<_> = found
            .iter()
            .map(|(path, wf)| {
                serde_json::json!({
                    "file": path.display().to_string(),
                    "name": wf.meta.name,
                    "namespace": wf.meta.namespace,
                    "nodes": wf.nodes.len(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if found.is_empty() {
        println!();
        println!("  No workflows found in {}.", dir.display());
        println!(
            "  Convert one into it with: {}",
            style(format!("chaosflow convert <file> -o {}/<name>.yaml", dir.display())).dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("Namespace"),
            Cell::new("Nodes"),
            Cell::new("File"),
        ]);
    for (path, wf) in &found {
        let relative = path.strip_prefix(dir).unwrap_or(path);
        table.add_row(vec![
            Cell::new(&wf.meta.name),
            Cell::new(wf.meta.namespace.as_deref().unwrap_or("-")),
            Cell::new(wf.nodes.len()),
            Cell::new(relative.display()),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

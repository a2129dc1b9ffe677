//! `chaosflow kinds`: the template types and experiment kinds a workflow may
//! use, with the manifest field each experiment kind is stored under.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use chaosflow_core::workflow::codec::{SCHEDULE_TEMPLATE_TYPE, TASK_TEMPLATE_TYPE};
use chaosflow_types::workflow::{ExperimentKind, TemplateType};

/// Manifest `templateType` written for a template type.
fn manifest_type(template_type: TemplateType) -> &'static str {
    match template_type {
        TemplateType::Single => "<experiment kind> | Schedule",
        TemplateType::Custom => TASK_TEMPLATE_TYPE,
        other => other.as_str(),
    }
}

fn kinds_json() -> serde_json::Value {
    let template_types: Vec<_> = TemplateType::ALL
        .iter()
        .map(|t| {
            serde_json::json!({
                "type": t.as_str(),
                "manifest_type": manifest_type(*t),
            })
        })
        .collect();
    let experiment_kinds: Vec<_> = ExperimentKind::ALL
        .iter()
        .map(|k| {
            serde_json::json!({
                "kind": k.as_str(),
                "field": k.field_name(),
            })
        })
        .collect();
    serde_json::json!({
        "template_types": template_types,
        "experiment_kinds": experiment_kinds,
    })
}

pub fn handle_kinds(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&kinds_json())?);
        return Ok(());
    }

    let mut types = Table::new();
    types
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Template type").fg(Color::Cyan),
            Cell::new("Manifest templateType"),
        ]);
    for t in TemplateType::ALL {
        types.add_row(vec![Cell::new(t.as_str()), Cell::new(manifest_type(t))]);
    }

    let mut kinds = Table::new();
    kinds
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Experiment kind").fg(Color::Cyan),
            Cell::new("Manifest field"),
        ]);
    for k in ExperimentKind::ALL {
        kinds.add_row(vec![Cell::new(k.as_str()), Cell::new(k.field_name())]);
    }

    println!();
    println!("{types}");
    println!();
    println!("{kinds}");
    println!();
    println!(
        "  {}",
        style("Single templates are written with their experiment kind as templateType.").dim()
    );
    println!(
        "  {}",
        style(format!(
            "Scheduled Single templates are written as {SCHEDULE_TEMPLATE_TYPE}, with the kind as schedule.type."
        ))
        .dim()
    );
    println!();
    Ok(())
}

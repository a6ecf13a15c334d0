//! Mermaid flowchart rendering for plans.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use crate::executor::TaskResult;
use crate::toolchain::{InputSpec, OutputSpec, TaskKey};

use super::types::{Plan, PlanTask};

const MAX_COMPACT_ITEMS: usize = 3;
const MAX_PATH_LEN: usize = 20;

#[derive(Debug, Clone, Copy, Default)]
pub struct MermaidOptions<'a> {
    pub show_inputs: bool,
    pub show_outputs: bool,
    /// Colours nodes by outcome. Plan tasks missing from the map are drawn as
    /// skipped.
    pub task_results: Option<&'a BTreeMap<TaskKey, TaskResult>>,
}

pub fn plan_to_mermaid(plan: &Plan) -> String {
    plan_to_mermaid_with_options(plan, MermaidOptions::default())
}

pub fn plan_to_mermaid_with_options(plan: &Plan, opts: MermaidOptions<'_>) -> String {
    let mut out = String::from("flowchart TD\n");
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();

    for (index, stage) in plan.stages.iter().enumerate() {
        let mut label = format!("Stage: {}", stage.name);
        if stage.parallel {
            label.push_str(" (parallel)");
        }
        let _ = writeln!(out, "    subgraph stage_{index}[\"{}\"]", escape_label(&label));

        for task in stage.tasks.iter().filter_map(|k| plan.tasks.get(k)) {
            let id = node_id(&task.key);
            let _ = writeln!(out, "        {id}[\"{}\"]", escape_label(&node_label(task, &opts)));

            if let Some(result) = opts.task_results.and_then(|r| r.get(&task.key)) {
                if result.is_success() {
                    succeeded.push(id);
                } else {
                    failed.push(id);
                }
            }
        }
        out.push_str("    end\n");
    }

    let skipped: Vec<String> = match opts.task_results {
        Some(results) => plan
            .tasks
            .keys()
            .filter(|k| !results.contains_key(*k))
            .map(node_id)
            .collect(),
        None => Vec::new(),
    };

    let mut seen = BTreeSet::new();
    for task in plan.tasks.values() {
        let to = node_id(&task.key);
        for dep in &task.depends_on {
            let from = node_id(dep);
            if seen.insert((from.clone(), to.clone())) {
                let _ = writeln!(out, "    {from} --> {to}");
            }
        }
    }

    if !(succeeded.is_empty() && failed.is_empty() && skipped.is_empty()) {
        out.push('\n');
        if !succeeded.is_empty() {
            out.push_str("    classDef success fill:#d4edda,stroke:#28a745\n");
            let _ = writeln!(out, "    class {} success", succeeded.join(","));
        }
        if !failed.is_empty() {
            out.push_str("    classDef failed fill:#f8d7da,stroke:#dc3545\n");
            let _ = writeln!(out, "    class {} failed", failed.join(","));
        }
        if !skipped.is_empty() {
            out.push_str(
                "    classDef skipped fill:#e2e3e5,stroke:#6c757d,stroke-dasharray: 5 5\n",
            );
            let _ = writeln!(out, "    class {} skipped", skipped.join(","));
        }
    }

    out
}

/// `tc_task[_variant]` with anything outside `[A-Za-z0-9_]` replaced.
pub fn node_id(key: &TaskKey) -> String {
    let mut id = format!("{}_{}", key.toolchain, key.task);
    if key.has_variant() {
        id.push('_');
        id.push_str(&key.variant);
    }
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn node_label(task: &PlanTask, opts: &MermaidOptions<'_>) -> String {
    let mut parts = vec![format!("{}/{}", task.toolchain(), task.task())];
    if !task.variant().is_empty() {
        parts[0].push_str(&format!(" ({})", task.variant()));
    }
    if opts.show_inputs && !task.inputs.is_empty() {
        let inputs = compact_inputs(&task.inputs);
        if !inputs.is_empty() {
            parts.push(format!("in: {inputs}"));
        }
    }
    if opts.show_outputs && !task.outputs.is_empty() {
        parts.push(format!("out: {}", compact_outputs(&task.outputs)));
    }
    parts.join("\\n")
}

fn compact_inputs(inputs: &InputSpec) -> String {
    let items: Vec<String> = inputs
        .files
        .iter()
        .map(|f| abbreviate_path(f))
        .chain(inputs.artifacts.keys().map(|name| format!("@{name}")))
        .collect();
    compact(&items)
}

fn compact_outputs(outputs: &BTreeMap<String, OutputSpec>) -> String {
    let names: Vec<String> = outputs.keys().cloned().collect();
    compact(&names)
}

fn compact(items: &[String]) -> String {
    if items.len() > MAX_COMPACT_ITEMS {
        format!("{}... (+{})", items[..2].join(", "), items.len() - 2)
    } else {
        items.join(", ")
    }
}

fn abbreviate_path(path: &str) -> String {
    if path.chars().count() <= MAX_PATH_LEN {
        return path.to_string();
    }
    match path.rsplit_once('/') {
        Some((_, last)) => format!(".../{last}"),
        None => {
            let head: String = path.chars().take(MAX_PATH_LEN - 3).collect();
            format!("{head}...")
        }
    }
}

fn escape_label(label: &str) -> String {
    label
        .replace('"', "#quot;")
        .replace('<', "#lt;")
        .replace('>', "#gt;")
}

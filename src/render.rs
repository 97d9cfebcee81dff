//! Plan, report, state and catalog rendering

use crate::state::StateFile;
use crate::ui;
use colored::Colorize;
use stackgraph::{
    Action, AttributeChange, AttributeValue, DeployedState, ExecuteSummary, ExecutionReport,
    KindSchema, Plan, PlanStep, StepStatus, attribute_changes,
};
use std::fmt::Write as _;

/// Render a plan as it would change `previous`
pub fn plan_text(plan: &Plan, previous: &DeployedState) -> String {
    let mut out = String::new();

    if plan.is_noop() {
        let _ = writeln!(out, "  {} No changes needed", "✓".green());
        return out;
    }

    let mut steps = plan.steps.iter().peekable();
    while let Some(step) = steps.next() {
        // a delete directly followed by a create of the same node is one replacement
        let replaced = step.action == Action::Delete
            && steps
                .peek()
                .is_some_and(|next| next.node_id == step.node_id && next.action == Action::Create);

        if replaced {
            let Some(create) = steps.next() else { break };
            let _ = writeln!(
                out,
                "  {} {:<18} {} {}",
                ui::replace_symbol(),
                create.kind.to_string(),
                create.node_id.bold(),
                "(replace)".dimmed()
            );
            write_changes(&mut out, &step.attributes, &create.attributes);
            continue;
        }

        let _ = writeln!(
            out,
            "  {} {:<18} {}",
            ui::action_symbol(step.action),
            step.kind.to_string(),
            step_label(step)
        );
        if step.action == Action::Update {
            let before = previous
                .get(&step.node_id)
                .map(|r| r.attributes.clone())
                .unwrap_or_default();
            if !write_changes(&mut out, &before, &step.attributes) {
                let _ = writeln!(out, "      {}", "(a referenced resource will be replaced)".dimmed());
            }
        }
    }

    let summary = plan.summary();
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  Plan: {} to create, {} to update, {} to delete, {} unchanged",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.delete.to_string().red(),
        summary.noop
    );
    out
}

fn step_label(step: &PlanStep) -> String {
    match step.action {
        Action::NoOp => step.node_id.dimmed().to_string(),
        _ => step.node_id.bold().to_string(),
    }
}

/// Write attribute differences, returning whether there were any
fn write_changes(out: &mut String, before: &stackgraph::Attributes, after: &stackgraph::Attributes) -> bool {
    let changes = attribute_changes(before, after);
    for change in &changes {
        write_change(out, change);
    }
    !changes.is_empty()
}

fn write_change(out: &mut String, change: &AttributeChange) {
    let multiline = |v: &Option<AttributeValue>| {
        v.as_ref()
            .and_then(AttributeValue::as_str)
            .is_some_and(|s| s.contains('\n'))
    };

    if multiline(&change.before) || multiline(&change.after) {
        let before = change.before.as_ref().and_then(AttributeValue::as_str).unwrap_or("");
        let after = change.after.as_ref().and_then(AttributeValue::as_str).unwrap_or("");
        let _ = writeln!(out, "      ~ {}:", change.name);
        let diff = similar::TextDiff::from_lines(before, after);
        for line in diff.iter_all_changes() {
            let text = line.to_string_lossy();
            let text = text.trim_end_matches('\n');
            match line.tag() {
                similar::ChangeTag::Delete => {
                    let _ = writeln!(out, "          {}", format!("- {text}").red());
                }
                similar::ChangeTag::Insert => {
                    let _ = writeln!(out, "          {}", format!("+ {text}").green());
                }
                similar::ChangeTag::Equal => {}
            }
        }
        return;
    }

    let show = |v: &Option<AttributeValue>| v.as_ref().map_or_else(|| "(none)".to_string(), ToString::to_string);
    let symbol = if change.is_addition() {
        "+".green()
    } else if change.is_removal() {
        "-".red()
    } else {
        "~".yellow()
    };
    let _ = writeln!(
        out,
        "      {} {}: {} → {}",
        symbol,
        change.name,
        show(&change.before).dimmed(),
        show(&change.after)
    );
}

/// Print a plan
pub fn display_plan(plan: &Plan, previous: &DeployedState) {
    println!();
    print!("{}", plan_text(plan, previous));
}

/// Render the outcome of every step that did not simply succeed
pub fn report_text(report: &ExecutionReport) -> String {
    let mut out = String::new();
    for step in &report.steps {
        let line = match &step.status {
            StepStatus::Failed(failure) => format!("{} {failure}", "✗".red()),
            StepStatus::Blocked { by } => format!(
                "{} {} {} '{}' not attempted: '{by}' failed",
                "⊘".yellow(),
                step.action,
                step.kind,
                step.node_id
            ),
            _ => continue,
        };
        let _ = writeln!(out, "    {line}");
    }
    out
}

/// Print final summary
pub fn print_summary(report: &ExecutionReport, verb: &str) {
    let summary: &ExecuteSummary = &report.summary;
    println!();
    if summary.skipped == summary.total() && summary.total() > 0 {
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return;
    }
    if summary.is_success() {
        println!("  {} Stack {verb} successfully!", "✓".green().bold());
    } else {
        println!("  {} Stack {verb} with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.blocked > 0 {
        println!("    • {} resources blocked", summary.blocked);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
    print!("{}", report_text(report));
}

/// Render the persisted state
pub fn state_text(state: &StateFile) -> String {
    let mut out = String::new();
    let applied = state
        .last_applied
        .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    let _ = writeln!(out, "  {}: {}", "last applied".dimmed(), applied);
    let _ = writeln!(out, "  {}: {}", "resources".dimmed(), state.deployed.len());

    for (id, record) in &state.deployed.resources {
        let _ = writeln!(out);
        let _ = writeln!(out, "  {} {}", id.bold(), format!("({})", record.kind).dimmed());
        if !record.depends_on.is_empty() {
            let deps: Vec<&str> = record.depends_on.iter().map(String::as_str).collect();
            let _ = writeln!(out, "    {}: {}", "after".dimmed(), deps.join(", "));
        }
        for (name, value) in &record.outputs {
            let _ = writeln!(out, "    {}: {}", name.dimmed(), value);
        }
    }
    out
}

/// Render one kind's schema
pub fn schema_text(schema: &KindSchema) -> String {
    let mut out = String::new();
    let update = if schema.updatable { "in place" } else { "replace" };
    let _ = writeln!(out, "{} {}", schema.kind.to_string().cyan().bold(), format!("(updates: {update})").dimmed());

    for name in &schema.required {
        let _ = writeln!(out, "  {} {}{}", "*".red(), name, reference_hint(schema, name));
    }
    for name in &schema.optional {
        let _ = writeln!(out, "    {}{}", name, reference_hint(schema, name));
    }
    let _ = writeln!(out, "  {}: {}", "outputs".dimmed(), schema.outputs.join(", "));
    out
}

fn reference_hint(schema: &KindSchema, name: &str) -> String {
    let Some(rule) = schema.reference_rule(name) else {
        return String::new();
    };
    let kinds: Vec<String> = rule.allowed.iter().map(ToString::to_string).collect();
    let mode = if rule.is_structural() { "→" } else { "⇢" };
    format!(" {} {}", mode, kinds.join(" | ")).dimmed().to_string()
}

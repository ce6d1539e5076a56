use crate::ops::check::{CheckError, CheckResult, CheckWarning};
use crate::ops::cycle::{CycleReport, Plan, PlannedMutation};

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// One-line summary of a finished cycle
pub fn format_report(report: &CycleReport) -> String {
    let mut line = format!(
        "{} projects, {} tasks, {} label changes",
        report.projects, report.tasks_seen, report.label_changes
    );
    if report.rollovers > 0 || report.revived > 0 {
        line.push_str(&format!(
            ", {} rollovers, {} revived",
            report.rollovers, report.revived
        ));
    }
    line
}

/// Format a planned mutation as `kind id: field=value ...`
pub fn format_mutation(m: &PlannedMutation) -> String {
    let u = &m.update;
    let mut fields = Vec::new();
    if let Some(ref labels) = u.labels {
        fields.push(format!("labels=[{}]", labels.join(", ")));
    }
    if let Some(checked) = u.checked {
        fields.push(format!("checked={}", checked));
    }
    if let Some(in_history) = u.in_history {
        fields.push(format!("in_history={}", in_history));
    }
    if let Some(date) = u.due_date {
        fields.push(format!("due={}", date));
    }
    if let Some(date) = u.last_due_date {
        fields.push(format!("last_due={}", date));
    }
    if let Some(mode) = u.mode {
        fields.push(format!("mode={}", mode));
    }
    if let Some(tag) = u.recurrence_tag {
        fields.push(format!("recurrence_tag={}", tag));
    }
    format!("{} {}: {}", m.key.kind.as_str(), m.key.id, fields.join(" "))
}

pub fn format_plan(plan: &Plan) -> Vec<String> {
    let mut lines: Vec<String> = plan.mutations.iter().map(format_mutation).collect();
    if lines.is_empty() {
        lines.push("nothing to change".to_string());
    }
    lines.push(format_report(&plan.report));
    lines
}

pub fn format_check_error(err: &CheckError) -> String {
    match err {
        CheckError::DuplicateId { kind, id } => format!("duplicate {} id {}", kind.as_str(), id),
        CheckError::UnknownProject {
            task_id,
            project_id,
        } => format!("{} belongs to unknown project {}", task_id, project_id),
        CheckError::MissingLabel { label } => {
            format!("label '{}' is not defined in the store", label)
        }
    }
}

pub fn format_check_warning(warn: &CheckWarning) -> String {
    match warn {
        CheckWarning::DanglingParent { task_id, parent_id } => {
            format!("{} has missing parent {}", task_id, parent_id)
        }
        CheckWarning::UnknownSection {
            task_id,
            section_id,
        } => format!("{} is in unknown section {}", task_id, section_id),
        CheckWarning::CrossGroupParent { task_id, parent_id } => format!(
            "{} has parent {} in another project or section",
            task_id, parent_id
        ),
        CheckWarning::ParentCycle { task_id } => {
            format!("{} is its own ancestor", task_id)
        }
    }
}

pub fn format_check(result: &CheckResult) -> Vec<String> {
    let mut lines = Vec::new();
    if !result.errors.is_empty() {
        lines.push("Errors:".to_string());
        lines.extend(
            result
                .errors
                .iter()
                .map(|e| format!("  {}", format_check_error(e))),
        );
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            lines.push(String::new());
        }
        lines.push("Warnings:".to_string());
        lines.extend(
            result
                .warnings
                .iter()
                .map(|w| format!("  {}", format_check_warning(w))),
        );
    }
    if result.valid {
        lines.push("✓ store is valid".to_string());
    } else {
        lines.push("✗ store has errors".to_string());
    }
    lines
}

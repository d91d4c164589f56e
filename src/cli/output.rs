//! Table and status rendering for CLI output.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::style;

use crate::domain::models::{ExecutionReport, ExecutionStatus, Plan, TaskStatus};
use crate::services::Wave;

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn status_cell(status: TaskStatus) -> Cell {
    let color = match status {
        TaskStatus::Passed => Color::Green,
        TaskStatus::Failed => Color::Red,
        TaskStatus::Blocked => Color::Yellow,
        TaskStatus::Pending | TaskStatus::Running => Color::Grey,
    };
    Cell::new(status.as_str()).fg(color)
}

/// Render the per-task results table for a finished run.
pub fn render_report(report: &ExecutionReport) -> String {
    let mut table = base_table();
    table.set_header(vec![
        Cell::new("ID").add_attribute(Attribute::Bold),
        Cell::new("Task").add_attribute(Attribute::Bold),
        Cell::new("Status").add_attribute(Attribute::Bold),
        Cell::new("Attempts").add_attribute(Attribute::Bold),
        Cell::new("Detail").add_attribute(Attribute::Bold),
    ]);

    for result in &report.task_results {
        let detail = result.blocked_reason.clone().unwrap_or_else(|| {
            result
                .attempts
                .last()
                .map(|a| truncate(&a.reviewer_feedback, 60))
                .unwrap_or_default()
        });
        table.add_row(vec![
            Cell::new(result.task_id),
            Cell::new(&result.name),
            status_cell(result.status),
            Cell::new(result.attempts.len()),
            Cell::new(detail),
        ]);
    }

    table.to_string()
}

/// One-line run summary, colored by outcome.
#[allow(clippy::cast_precision_loss)]
pub fn render_summary(report: &ExecutionReport) -> String {
    let line = format!(
        "{} passed, {} failed, {} blocked, {} pending ({} total) in {:.1}s",
        report.passed_tasks,
        report.failed_tasks,
        report.blocked_tasks,
        report.pending_tasks,
        report.total_tasks,
        report.total_duration_ms as f64 / 1000.0
    );
    match report.status() {
        ExecutionStatus::Completed => style(line).green().to_string(),
        ExecutionStatus::PartialSuccess => style(line).yellow().to_string(),
        ExecutionStatus::Failed | ExecutionStatus::Canceled => style(line).red().to_string(),
    }
}

/// Render the wave schedule for a plan.
pub fn render_waves(plan: &Plan, waves: &[Wave]) -> String {
    let mut table = base_table();
    table.set_header(vec![
        Cell::new("Wave").add_attribute(Attribute::Bold),
        Cell::new("Tasks").add_attribute(Attribute::Bold),
    ]);

    for (index, wave) in waves.iter().enumerate() {
        let tasks = wave
            .iter()
            .map(|id| {
                plan.task(*id)
                    .map_or_else(|| id.to_string(), |t| format!("{id}: {}", t.name))
            })
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![Cell::new(index + 1), Cell::new(tasks)]);
    }

    table.to_string()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Task, TaskRunResult};

    #[test]
    fn test_render_waves_names_tasks() {
        let plan = Plan::new(
            "alpha",
            vec![Task::new(1, "schema", "p"), Task::new(2, "api", "p")],
        );
        let waves = vec![vec![1], vec![2]];

        let rendered = render_waves(&plan, &waves);
        assert!(rendered.contains("1: schema"));
        assert!(rendered.contains("2: api"));
    }

    #[test]
    fn test_render_report_includes_blocked_reason() {
        let report = ExecutionReport {
            total_tasks: 1,
            blocked_tasks: 1,
            task_results: vec![TaskRunResult {
                task_id: 3,
                name: "deploy".to_string(),
                status: TaskStatus::Blocked,
                blocked_reason: Some("dependency 2 did not pass".to_string()),
                attempts: vec![],
            }],
            ..ExecutionReport::default()
        };

        let rendered = render_report(&report);
        assert!(rendered.contains("deploy"));
        assert!(rendered.contains("dependency 2 did not pass"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("0123456789abc", 10), "0123456789...");
    }
}

//! `foreman validate` - check a plan without executing it.

use anyhow::Result;

use crate::infrastructure::plan::load_plan;
use crate::services::{graph, scheduler};

pub async fn execute(plan_path: &str, json_mode: bool) -> Result<()> {
    let plan = load_plan(plan_path).await?;
    let dep_graph = graph::build(&plan.tasks)?;
    let waves = scheduler::schedule(&dep_graph);

    if json_mode {
        let payload = serde_json::json!({
            "valid": true,
            "tasks": plan.tasks.len(),
            "waves": waves.len(),
        });
        println!("{payload}");
    } else {
        println!(
            "Plan is valid: {} tasks across {} waves",
            plan.tasks.len(),
            waves.len()
        );
    }
    Ok(())
}

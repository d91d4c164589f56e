//! `foreman waves` - show the wave schedule for a plan.

use anyhow::Result;

use crate::cli::output;
use crate::infrastructure::plan::load_plan;
use crate::services::{graph, scheduler};

pub async fn execute(plan_path: &str, json_mode: bool) -> Result<()> {
    let plan = load_plan(plan_path).await?;
    let dep_graph = graph::build(&plan.tasks)?;
    let waves = scheduler::schedule(&dep_graph);

    if json_mode {
        println!("{}", serde_json::to_string(&waves)?);
    } else {
        println!("{}", output::render_waves(&plan, &waves));
    }
    Ok(())
}

//! Command-line interface.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "foreman")]
#[command(about = "Foreman - plan-driven task orchestration engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Path to the plan file
    #[arg(short, long, global = true, default_value = "plan.yaml")]
    pub plan: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute the plan
    Run(commands::run::RunArgs),

    /// Validate the plan without executing anything
    Validate,

    /// Show the wave schedule the plan would execute in
    Waves,
}

/// Print an error in the selected output mode and exit non-zero.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) {
    if json_mode {
        let payload = serde_json::json!({ "error": format!("{err:#}") });
        println!("{payload}");
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}

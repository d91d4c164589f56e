//! CLI command implementations.

pub mod run;
pub mod validate;
pub mod waves;

//! Worker adapters: discovery, process invocation, and test doubles.

pub mod mock;
pub mod process;
pub mod registry;

pub use process::ProcessWorkerInvoker;
pub use registry::DirWorkerRegistry;

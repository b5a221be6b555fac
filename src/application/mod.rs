//! Application layer - batch orchestration and job control
//!
//! Coordinates the domain model and the infrastructure adapters: the session
//! registry, the navigation policy, the analysis adapter, the batch state
//! machine, and the job manager that fronts it all.

pub mod analysis;
pub mod jobs;
pub mod navigator;
pub mod orchestrator;
pub mod session_registry;

#[cfg(test)]
mod batch_integration_test;

// Re-export commonly used items
pub use analysis::AnalysisAdapter;
pub use jobs::{JobEvent, JobManager, JobOptions, JobStatus};
pub use navigator::NavigationPolicy;
pub use orchestrator::{BatchOptions, BatchOrchestrator, BatchOutcome, BatchState};
pub use session_registry::{Session, SessionRegistry};

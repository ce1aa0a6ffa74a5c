//! Orchestration core: budget governance, vendor admission control,
//! the durable job queue, and the cycle orchestrator.

pub mod budget;
pub mod orchestrator;
pub mod pool;
pub mod queue;

pub use budget::{BudgetError, BudgetGovernor, CostEntry};
pub use orchestrator::{CycleOrchestrator, GenClients, PipelineError, Stage};
pub use pool::{Vendor, VendorCapacities, VendorPool, VendorStats};
pub use queue::{JobQueue, JobStatus, QueueEntry, QueueError, QueueStatus};

pub mod cycle;
pub mod scheduler;

pub use cycle::{CycleReport, RouteOutcome, ScrapeOrchestrator};
pub use scheduler::Scheduler;

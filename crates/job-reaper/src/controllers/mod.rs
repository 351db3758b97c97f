pub mod cleanup;
pub mod policy;

pub use cleanup::{CleanupController, IterationSummary};
pub use policy::{CleanupDecision, CleanupReason, Thresholds};

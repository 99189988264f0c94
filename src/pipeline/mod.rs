pub mod extraction;
pub mod structuring;
pub mod archive;
pub mod processor; // Receipt pipeline orchestrator
pub mod batch; // Per-message fan-out and summary

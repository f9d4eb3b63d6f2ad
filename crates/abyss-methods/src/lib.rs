//! Abyss Methods - discovery, execution, and liveness of method scripts
//!
//! The controller only ever talks to the three traits below. The concrete
//! implementations are the filesystem repository, the child-process executor,
//! and the OS process table oracle.

pub mod executor;
pub mod liveness;
pub mod repository;

pub use executor::ScriptExecutor;
pub use liveness::ProcessTable;
pub use repository::{parse_method_name, MethodRepository};

use abyss_core::{ExecutionOutcome, LayerPlan, MethodDescriptor, Result};

/// Source of layer plans.
#[async_trait::async_trait]
pub trait MethodSource: Send + Sync {
    /// Ordered methods for one layer. An error means the layer could not be
    /// listed at all; callers treat it as an empty layer.
    async fn discover(&self, layer: u32) -> Result<LayerPlan>;
}

/// Runs one method against a target. Never fails: every problem is folded
/// into the returned outcome.
#[async_trait::async_trait]
pub trait MethodRunner: Send + Sync {
    async fn execute(&self, method: &MethodDescriptor, target: u32) -> ExecutionOutcome;
}

/// Sole authority on whether the target still exists.
#[async_trait::async_trait]
pub trait LivenessOracle: Send + Sync {
    async fn is_alive(&self, pid: u32) -> bool;
}

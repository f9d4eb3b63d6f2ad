//! abyss: layered process-termination orchestrator
//!
//! Runs externally supplied method scripts against a target process, layer
//! by layer, until the process is gone or every method has been tried.

pub mod cli;
pub mod controller;

pub use controller::{AbyssController, FeedbackPlayer, MethodAttempt, RunMode, RunReport, SoundCue};

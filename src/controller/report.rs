//! Run report: what ran, what the target looked like after each method, and
//! how the run ended. Rendered as JSON with `abyss --json`.

use abyss_core::{ExecutionOutcome, MethodDescriptor, RunResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Live,
    Simulation,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Simulation => write!(f, "simulation"),
        }
    }
}

/// One executed method and what the target looked like afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct MethodAttempt {
    pub layer: u32,
    pub method: u32,
    pub file: String,
    pub outcome: ExecutionOutcome,
    /// Liveness right after the method. Not checked in simulation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_alive: Option<bool>,
}

impl MethodAttempt {
    pub fn new(method: &MethodDescriptor, outcome: ExecutionOutcome, target_alive: Option<bool>) -> Self {
        Self {
            layer: method.layer,
            method: method.method,
            file: method.file_name(),
            outcome,
            target_alive,
        }
    }

    /// The method exited 0 but the target survived it.
    pub fn hollow_success(&self) -> bool {
        self.outcome.success && self.target_alive == Some(true)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: RunMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub result: RunResult,
    pub attempts: Vec<MethodAttempt>,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub(crate) fn start(mode: RunMode, target: Option<u32>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            mode,
            target,
            started_at: now,
            finished_at: now,
            result: RunResult::MethodsExhausted,
            attempts: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn finish(mut self, result: RunResult) -> Self {
        self.result = result;
        self.finished_at = Utc::now();
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.result.exit_code()
    }

    /// `(layer, method)` pairs in the order they ran.
    pub fn call_order(&self) -> Vec<(u32, u32)> {
        self.attempts.iter().map(|a| (a.layer, a.method)).collect()
    }

    pub fn failed_attempts(&self) -> usize {
        self.attempts.iter().filter(|a| !a.outcome.success).count()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

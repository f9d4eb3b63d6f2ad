//! Data model shared by discovery, execution, and the controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Process exit codes the CLI reports for each terminal outcome.
pub mod exit {
    pub const TARGET_TERMINATED: i32 = 0;
    pub const METHODS_EXHAUSTED: i32 = 1;
    pub const INVALID_INPUT: i32 = 2;
    pub const TARGET_NEVER_EXISTED: i32 = 3;
    /// Configuration or I/O failure before a run could start.
    pub const FAILURE: i32 = 4;
}

// ===========================================================================
// Methods and layers
// ===========================================================================

/// One executable method, identified by its `layer<L>_method<M>` file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub path: PathBuf,
    pub layer: u32,
    pub method: u32,
}

impl MethodDescriptor {
    pub fn new(path: impl Into<PathBuf>, layer: u32, method: u32) -> Self {
        Self {
            path: path.into(),
            layer,
            method,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer {} method {} ({})", self.layer, self.method, self.file_name())
    }
}

/// The ordered methods of one layer, ascending by method number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerPlan {
    pub layer: u32,
    methods: Vec<MethodDescriptor>,
}

impl LayerPlan {
    /// Build a plan, sorting by method number. Entries for other layers are dropped.
    pub fn new(layer: u32, mut methods: Vec<MethodDescriptor>) -> Self {
        methods.retain(|m| m.layer == layer);
        methods.sort_by_key(|m| m.method);
        Self { layer, methods }
    }

    pub fn empty(layer: u32) -> Self {
        Self {
            layer,
            methods: Vec::new(),
        }
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.iter()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn method_numbers(&self) -> Vec<u32> {
        self.methods.iter().map(|m| m.method).collect()
    }
}

impl<'a> IntoIterator for &'a LayerPlan {
    type Item = &'a MethodDescriptor;
    type IntoIter = std::slice::Iter<'a, MethodDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.methods.iter()
    }
}

// ===========================================================================
// Execution
// ===========================================================================

/// Why a method invocation failed before producing an exit code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionFailure {
    /// The executable could not be started (missing, not executable, OS error).
    Launch { reason: String },
    /// The method exceeded its time budget and was killed.
    TimedOut { timeout_ms: u64 },
    /// The child started but waiting on it failed.
    Wait { reason: String },
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launch { reason } => write!(f, "failed to launch: {reason}"),
            Self::TimedOut { timeout_ms } => write!(f, "timed out after {timeout_ms}ms"),
            Self::Wait { reason } => write!(f, "failed to wait: {reason}"),
        }
    }
}

/// Result of running one method once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Exit code was zero. Always false when `failure` is set.
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExecutionFailure>,
    pub elapsed_ms: u64,
}

impl ExecutionOutcome {
    /// The child ran to completion. `exit_code` is `None` when it died from a signal.
    pub fn completed(
        exit_code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            success: exit_code == Some(0),
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            failure: None,
            elapsed_ms,
        }
    }

    pub fn failed(failure: ExecutionFailure, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            failure: Some(failure),
            elapsed_ms,
        }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.failure, Some(ExecutionFailure::TimedOut { .. }))
    }

    /// One-line description for logs.
    pub fn summary(&self) -> String {
        match (&self.failure, self.exit_code) {
            (Some(failure), _) => failure.to_string(),
            (None, Some(code)) => format!("exit code {code}"),
            (None, None) => "terminated by signal".to_string(),
        }
    }
}

// ===========================================================================
// Runs
// ===========================================================================

/// Terminal outcome of one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunResult {
    TargetTerminated { layer: u32, method: u32 },
    MethodsExhausted,
    TargetNeverExisted,
}

impl RunResult {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::TargetTerminated { .. } => exit::TARGET_TERMINATED,
            Self::MethodsExhausted => exit::METHODS_EXHAUSTED,
            Self::TargetNeverExisted => exit::TARGET_NEVER_EXISTED,
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::TargetTerminated { .. })
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetTerminated { layer, method } => {
                write!(f, "target terminated at layer {layer} method {method}")
            }
            Self::MethodsExhausted => write!(f, "methods exhausted"),
            Self::TargetNeverExisted => write!(f, "target never existed"),
        }
    }
}

/// What the operator asked the orchestrator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSpec {
    Pid(u32),
    Simulation,
}

/// Keyword that selects a simulation run instead of a live target.
pub const SIMULATION_KEYWORD: &str = "DEBUG";

/// Parse operator input into a target. Accepts a positive decimal pid or
/// `DEBUG` (any case). Surrounding whitespace is ignored.
pub fn parse_target(input: &str) -> Result<TargetSpec> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case(SIMULATION_KEYWORD) {
        return Ok(TargetSpec::Simulation);
    }
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid_target(format!("{trimmed:?} is not numeric")));
    }
    match trimmed.parse::<u32>() {
        Ok(0) => Err(Error::invalid_target("pid must be positive")),
        Ok(pid) => Ok(TargetSpec::Pid(pid)),
        Err(_) => Err(Error::invalid_target(format!("{trimmed} is out of range"))),
    }
}


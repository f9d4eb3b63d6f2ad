//! Abyss Controller: descends through the layers until the target is gone.
//!
//! Layers run in ascending order, methods within a layer in ascending method
//! number, strictly one at a time. After every method the liveness oracle is
//! asked again; its answer, not the method's exit code, ends the run.

use std::sync::Arc;
use std::time::Duration;

use abyss_core::{AbyssConfig, LayerPlan, RunResult, TargetSpec};
use abyss_methods::{
    LivenessOracle, MethodRepository, MethodRunner, MethodSource, ProcessTable, ScriptExecutor,
};
use tracing::{debug, info, warn};

use super::feedback::{FeedbackPlayer, SoundCue, FINALE_TIMEOUT};
use super::report::{MethodAttempt, RunMode, RunReport};

/// Target id handed to methods in simulation mode.
pub const SIMULATION_TARGET: u32 = 0;

pub struct AbyssController {
    config: AbyssConfig,
    source: Arc<dyn MethodSource>,
    runner: Arc<dyn MethodRunner>,
    oracle: Arc<dyn LivenessOracle>,
    feedback: Option<FeedbackPlayer>,
}

impl AbyssController {
    /// Controller wired to the filesystem repository, the script executor and
    /// the OS process table, all configured from `config`.
    pub fn new(config: AbyssConfig) -> Self {
        let source = MethodRepository::new(&config.methods.dir, config.methods.extension.clone());
        let runner = ScriptExecutor::from_config(&config);
        let feedback = FeedbackPlayer::from_config(&config.feedback);
        Self {
            source: Arc::new(source),
            runner: Arc::new(runner),
            oracle: Arc::new(ProcessTable::new()),
            feedback,
            config,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn MethodSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn MethodRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn LivenessOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_feedback(mut self, feedback: Option<FeedbackPlayer>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn config(&self) -> &AbyssConfig {
        &self.config
    }

    pub async fn dispatch(&self, target: TargetSpec) -> RunReport {
        match target {
            TargetSpec::Pid(pid) => self.run(pid).await,
            TargetSpec::Simulation => self.simulate().await,
        }
    }

    /// Live run against `pid`.
    pub async fn run(&self, pid: u32) -> RunReport {
        let report = RunReport::start(RunMode::Live, Some(pid));

        if !self.oracle.is_alive(pid).await {
            warn!("Process with PID {} does not exist", pid);
            return report.finish(RunResult::TargetNeverExisted);
        }

        info!("Target PID: {}", pid);
        info!("Descending through {} layers", self.config.layers.count);
        self.descend(report, RunMode::Live, pid).await
    }

    /// Dry run: same discovery and execution, target `0`, no liveness checks.
    pub async fn simulate(&self) -> RunReport {
        let report = RunReport::start(RunMode::Simulation, None);
        info!("Simulating {} layers", self.config.layers.count);
        self.descend(report, RunMode::Simulation, SIMULATION_TARGET).await
    }

    async fn descend(&self, mut report: RunReport, mode: RunMode, target: u32) -> RunReport {
        let ambient = self.feedback.as_ref().map(|f| f.start_ambient());

        for layer in self.config.layer_range() {
            info!("=== Entering layer {} ===", layer);
            let plan = self.layer_plan(layer, &mut report).await;

            for method in &plan {
                info!("Descending into {}", method.file_name());
                self.cue(&[SoundCue::Descend, SoundCue::Attack]);

                let outcome = self.runner.execute(method, target).await;
                log_streams(&method.file_name(), &outcome.stdout, &outcome.stderr);

                if mode == RunMode::Simulation {
                    if outcome.success {
                        info!("{}: executed", method.file_name());
                    } else {
                        info!("{}: failed ({})", method.file_name(), outcome.summary());
                    }
                    report.attempts.push(MethodAttempt::new(method, outcome, None));
                    pause(self.config.simulation_pause()).await;
                    continue;
                }

                let alive = self.oracle.is_alive(target).await;
                let attempt = MethodAttempt::new(method, outcome, Some(alive));

                if !alive {
                    info!(
                        "Process {} terminated by layer {} method {}",
                        target, method.layer, method.method
                    );
                    report.attempts.push(attempt);
                    let report = report.finish(RunResult::TargetTerminated {
                        layer: method.layer,
                        method: method.method,
                    });
                    drop(ambient);
                    self.finale().await;
                    return report;
                }

                if attempt.hollow_success() {
                    info!(
                        "Method {} reported success, but process {} is still alive. Continuing",
                        method.method, target
                    );
                } else {
                    warn!(
                        "Method {} failed ({})",
                        method.method,
                        attempt.outcome.summary()
                    );
                }
                report.attempts.push(attempt);
                pause(self.config.method_pause()).await;
            }
        }

        match mode {
            RunMode::Live => warn!("Failed to terminate process {}; all methods exhausted", target),
            RunMode::Simulation => info!("Simulation complete"),
        }
        report.finish(RunResult::MethodsExhausted)
    }

    /// Discovery for one layer. Errors and empty layers become warnings.
    async fn layer_plan(&self, layer: u32, report: &mut RunReport) -> LayerPlan {
        let plan = match self.source.discover(layer).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Layer {}: {}", layer, e);
                report.warnings.push(format!("layer {layer}: {e}"));
                return LayerPlan::empty(layer);
            }
        };
        if plan.is_empty() {
            warn!("No methods found for layer {}", layer);
            report.warnings.push(format!("layer {layer}: no methods found"));
        }
        plan
    }

    fn cue(&self, cues: &[SoundCue]) {
        if let Some(feedback) = &self.feedback {
            drop(feedback.cue(cues));
        }
    }

    /// Closing cues after a kill. The result is already final; playback only
    /// delays the return, by at most [`FINALE_TIMEOUT`].
    async fn finale(&self) {
        let Some(feedback) = &self.feedback else {
            return;
        };
        let playback = feedback.cue(&[SoundCue::End, SoundCue::Kill]);
        if tokio::time::timeout(FINALE_TIMEOUT, playback).await.is_err() {
            debug!("feedback: closing cues still playing after {:?}", FINALE_TIMEOUT);
        }
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

fn log_streams(name: &str, stdout: &str, stderr: &str) {
    let stdout = stdout.trim();
    let stderr = stderr.trim();
    if !stdout.is_empty() {
        debug!("{} stdout:\n{}", name, stdout);
    }
    if !stderr.is_empty() {
        debug!("{} stderr:\n{}", name, stderr);
    }
}

//! Sequential pipeline runner.
//!
//! Steps run in declared order. The first failure stops the run and every
//! later step is reported as skipped.

use serde::Serialize;
use std::time::Instant;

use crate::config::{Environment, StepKind};
use crate::deploy::{Provider, SUPPORTED_TARGET_FIELDS};
use crate::error::{Hint, Result};
use crate::project::Project;
use crate::utils::command::CommandRunner;

pub trait PipelineStepExecutor: Send + Sync {
    /// Reason to skip `step` without running it, if any.
    fn skip_reason(&self, _step: StepKind) -> Option<String> {
        None
    }

    fn execute_step(&self, step: StepKind) -> Result<PipelineStepResult>;
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStepResult {
    #[serde(rename = "type")]
    pub step_type: StepKind,
    pub status: PipelineRunStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub duration_ms: u64,
}

impl PipelineStepResult {
    pub fn success(step_type: StepKind, data: Option<serde_json::Value>) -> Self {
        Self {
            step_type,
            status: PipelineRunStatus::Success,
            warnings: Vec::new(),
            hints: Vec::new(),
            data,
            error: None,
            error_code: None,
            duration_ms: 0,
        }
    }

    pub fn skipped(step_type: StepKind, warning: String) -> Self {
        Self {
            step_type,
            status: PipelineRunStatus::Skipped,
            warnings: vec![warning],
            hints: Vec::new(),
            data: None,
            error: None,
            error_code: None,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRunResult {
    pub run_id: String,
    pub started_at: String,
    pub environment: Environment,
    pub steps: Vec<PipelineStepResult>,
    pub status: PipelineRunStatus,
    pub summary: PipelineRunSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRunSummary {
    pub total_steps: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineRunStatus {
    Success,
    Failed,
    Skipped,
}

pub fn run(
    steps: &[StepKind],
    environment: Environment,
    executor: &dyn PipelineStepExecutor,
) -> PipelineRunResult {
    let run_id = uuid::Uuid::new_v4().to_string();
    let started_at = chrono::Local::now().to_rfc3339();
    log_status!("pipeline", "Run {} started ({} steps, {})", run_id, steps.len(), environment);

    let mut results = Vec::with_capacity(steps.len());
    let mut failed_step: Option<StepKind> = None;

    for &step in steps {
        if let Some(failed) = failed_step {
            results.push(PipelineStepResult::skipped(
                step,
                format!("Skipped because '{}' did not succeed", failed),
            ));
            continue;
        }

        if let Some(reason) = executor.skip_reason(step) {
            log_status!("pipeline", "Skipping {}: {}", step, reason);
            results.push(PipelineStepResult::skipped(step, reason));
            continue;
        }

        let result = execute_single_step(step, executor);
        if result.status == PipelineRunStatus::Failed {
            failed_step = Some(step);
        }
        results.push(result);
    }

    let status = derive_overall_status(&results);
    let summary = build_summary(&results, status);
    log_status!(
        "pipeline",
        "Run {} finished: {} succeeded, {} failed, {} skipped",
        run_id,
        summary.succeeded,
        summary.failed,
        summary.skipped
    );

    PipelineRunResult {
        run_id,
        started_at,
        environment,
        steps: results,
        status,
        summary,
    }
}

fn execute_single_step(step: StepKind, executor: &dyn PipelineStepExecutor) -> PipelineStepResult {
    log_status!("pipeline", "Running {}", step);
    let started = Instant::now();

    let mut result = match executor.execute_step(step) {
        Ok(result) => result,
        Err(err) => {
            log_status!("pipeline", "{} failed: {}", step, err.message);
            PipelineStepResult {
                step_type: step,
                status: PipelineRunStatus::Failed,
                warnings: Vec::new(),
                hints: err.hints.clone(),
                data: Some(err.details.clone()),
                error: Some(err.message.clone()),
                error_code: Some(err.code.as_str().to_string()),
                duration_ms: 0,
            }
        }
    };
    result.duration_ms = started.elapsed().as_millis() as u64;
    result
}

fn derive_overall_status(results: &[PipelineStepResult]) -> PipelineRunStatus {
    if results
        .iter()
        .any(|result| result.status == PipelineRunStatus::Failed)
    {
        return PipelineRunStatus::Failed;
    }
    if !results.is_empty()
        && results
            .iter()
            .all(|result| result.status == PipelineRunStatus::Skipped)
    {
        return PipelineRunStatus::Skipped;
    }
    PipelineRunStatus::Success
}

fn build_summary(results: &[PipelineStepResult], status: PipelineRunStatus) -> PipelineRunSummary {
    let count = |wanted: PipelineRunStatus| results.iter().filter(|r| r.status == wanted).count();

    let next_actions = match status {
        PipelineRunStatus::Failed => vec![
            "Fix the failing step and re-run; completed steps run again from the start".to_string(),
        ],
        _ => Vec::new(),
    };

    PipelineRunSummary {
        total_steps: results.len(),
        succeeded: count(PipelineRunStatus::Success),
        failed: count(PipelineRunStatus::Failed),
        skipped: count(PipelineRunStatus::Skipped),
        next_actions,
    }
}

/// Runs project commands locally and hands the deploy step to the provider.
pub struct ProjectStepExecutor {
    project: Project,
    provider: Provider,
    environment: Environment,
    runner: CommandRunner,
    cwd: Option<String>,
}

impl ProjectStepExecutor {
    pub fn new(project: Project, provider: Provider, environment: Environment) -> Self {
        Self {
            project,
            provider,
            environment,
            runner: CommandRunner::new(),
            cwd: None,
        }
    }

    pub fn with_runner(mut self, runner: CommandRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_cwd(mut self, cwd: Option<String>) -> Self {
        self.cwd = cwd;
        self
    }
}

impl PipelineStepExecutor for ProjectStepExecutor {
    fn skip_reason(&self, step: StepKind) -> Option<String> {
        if step == StepKind::Deploy && !self.provider.is_deployment_required() {
            return Some(format!(
                "No deployment target configured (supported: {})",
                SUPPORTED_TARGET_FIELDS.join(", ")
            ));
        }
        None
    }

    fn execute_step(&self, step: StepKind) -> Result<PipelineStepResult> {
        match self.project.command_for(step) {
            Some(command) => {
                self.runner.run(&command, self.cwd.as_deref())?;
                Ok(PipelineStepResult::success(
                    step,
                    Some(serde_json::json!({ "command": command })),
                ))
            }
            None => {
                let outcome = self.provider.deploy(self.environment, Some(&self.project))?;
                let data = serde_json::to_value(&outcome)
                    .map_err(|e| crate::error::Error::internal_json(e.to_string(), None))?;
                Ok(PipelineStepResult::success(step, Some(data)))
            }
        }
    }
}

//! Audited task administration against one host.
//!
//! Every operation builds one validated PowerShell command, runs it, and
//! appends an audit entry if and only if the remote side reported success.
//! Remote failure messages pass through to the caller verbatim; a failed
//! mutation leaves no audit trail.

use taskfleet_core::{ActionType, AuditEntry, AuditSink, TaskSpec};
use taskfleet_winrm::PsExecutor;

use crate::error::{Error, Result};
use crate::scripts;

/// Value-level result of one mutation. Remote and validation failures are
/// not errors; only a broken audit store escalates to `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub success: bool,
    pub message: String,
}

impl MutationOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

pub struct TaskAdmin<'a> {
    executor: &'a dyn PsExecutor,
    audit: &'a dyn AuditSink,
    actor: &'a str,
}

impl<'a> TaskAdmin<'a> {
    pub fn new(executor: &'a dyn PsExecutor, audit: &'a dyn AuditSink, actor: &'a str) -> Self {
        Self { executor, audit, actor }
    }

    pub async fn create(&self, spec: &TaskSpec) -> Result<MutationOutcome> {
        let script = match scripts::create_task(spec) {
            Ok(script) => script,
            Err(rejection) => return Ok(MutationOutcome::failed(rejection)),
        };
        let details = serde_json::to_string(spec).unwrap_or_else(|_| spec.task_name.clone());
        self.run_audited(&script, ActionType::CreateTask, &spec.task_name, details)
            .await
    }

    pub async fn delete(&self, task_name: &str) -> Result<MutationOutcome> {
        let script = match scripts::delete_task(task_name) {
            Ok(script) => script,
            Err(rejection) => return Ok(MutationOutcome::failed(rejection)),
        };
        self.run_audited(&script, ActionType::DeleteTask, task_name, "Task deleted".to_string())
            .await
    }

    pub async fn set_enabled(&self, task_name: &str, enabled: bool) -> Result<MutationOutcome> {
        let script = match scripts::set_enabled(task_name, enabled) {
            Ok(script) => script,
            Err(rejection) => return Ok(MutationOutcome::failed(rejection)),
        };
        let details = if enabled { "Task enabled" } else { "Task disabled" };
        self.run_audited(&script, ActionType::UpdateTaskState, task_name, details.to_string())
            .await
    }

    pub async fn set_description(&self, task_name: &str, description: &str) -> Result<MutationOutcome> {
        let script = match scripts::set_description(task_name, description) {
            Ok(script) => script,
            Err(rejection) => return Ok(MutationOutcome::failed(rejection)),
        };
        self.run_audited(
            &script,
            ActionType::UpdateTaskDescription,
            task_name,
            format!("Description set to: {}", description),
        )
        .await
    }

    pub async fn run_now(&self, task_name: &str) -> Result<MutationOutcome> {
        let script = match scripts::run_task(task_name) {
            Ok(script) => script,
            Err(rejection) => return Ok(MutationOutcome::failed(rejection)),
        };
        self.run_audited(&script, ActionType::RunTask, task_name, "Task executed manually".to_string())
            .await
    }

    async fn run_audited(
        &self,
        script: &str,
        action_type: ActionType,
        target_task: &str,
        details: String,
    ) -> Result<MutationOutcome> {
        let outcome = self.executor.run_ps(script).await;
        if !outcome.success {
            tracing::warn!(
                host = self.executor.host_label(),
                task = target_task,
                action = %action_type,
                "Mutation failed: {}",
                outcome.output.trim()
            );
            return Ok(MutationOutcome::failed(outcome.output));
        }

        self.audit
            .append(AuditEntry {
                user_identifier: self.actor.to_string(),
                action_type,
                target_pc: self.executor.host_label().to_string(),
                target_task: target_task.to_string(),
                details,
            })
            .await
            .map_err(Error::Audit)?;

        tracing::info!(
            host = self.executor.host_label(),
            task = target_task,
            action = %action_type,
            "Mutation applied"
        );
        Ok(MutationOutcome::ok(outcome.output))
    }
}

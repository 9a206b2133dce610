//! Audit log collaborator interface. Mutations append entries through this
//! trait; the storage crate provides the durable implementation. The core
//! never reads audit entries back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateTask,
    DeleteTask,
    RunTask,
    UpdateTaskState,
    UpdateTaskDescription,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateTask => "CREATE_TASK",
            ActionType::DeleteTask => "DELETE_TASK",
            ActionType::RunTask => "RUN_TASK",
            ActionType::UpdateTaskState => "UPDATE_TASK_STATE",
            ActionType::UpdateTaskDescription => "UPDATE_TASK_DESCRIPTION",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One administrative action against one task on one host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_identifier: String,
    pub action_type: ActionType,
    pub target_pc: String,
    pub target_task: String,
    pub details: String,
}

/// Append-only audit store.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> anyhow::Result<()>;
}

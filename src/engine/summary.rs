// src/engine/summary.rs

//! End-of-run report.

use serde::Serialize;
use serde_json::Value;

use crate::dag::{Task, TaskGraph, TaskId};
use crate::errors::Result;
use crate::ledger::LedgerSummary;
use crate::types::{GraphStatus, TaskStatus};

/// Per-task line of the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: TaskId,
    pub agent: String,
    pub kind: String,
    pub status: TaskStatus,
    pub actual_cost: u64,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            agent: task.agent.clone(),
            kind: task.kind.clone(),
            status: task.status,
            actual_cost: task.actual_cost,
            retry_count: task.retry_count,
            result: task.result.clone(),
            error_message: task.error_message.clone(),
        }
    }
}

/// Everything a caller needs to know about a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub session_id: String,
    pub goal: String,
    pub status: GraphStatus,
    pub total_cost: u64,
    pub budget_credits: u64,
    pub subtasks: Vec<TaskSummary>,
    /// Ready tasks left pending because the balance could not cover them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stalled: Vec<TaskId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub ledger_summary: Option<LedgerSummary>,
}

impl RunSummary {
    pub fn collect(
        graph: &TaskGraph,
        session_id: &str,
        ledger_summary: Option<LedgerSummary>,
        stalled: Vec<TaskId>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            goal: graph.goal.clone(),
            status: graph.status,
            total_cost: graph.total_cost,
            budget_credits: graph.budget_credits,
            subtasks: graph.tasks().iter().map(TaskSummary::from).collect(),
            stalled,
            warnings,
            ledger_summary,
        }
    }

    pub fn task(&self, id: &str) -> Option<&TaskSummary> {
        self.subtasks.iter().find(|t| t.id == id)
    }

    /// Number of subtasks in `status`.
    pub fn count(&self, status: TaskStatus) -> usize {
        self.subtasks.iter().filter(|t| t.status == status).count()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::watch;
use weft_core::{Result, WeftError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Submitted,
    Working,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

/// Lifecycle record of one inbound work unit.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    #[serde(rename = "taskId")]
    pub task_id: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub status: TaskStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "inboundMessage")]
    pub inbound_message: String,
    #[serde(rename = "outboundReply", skip_serializing_if = "Option::is_none")]
    pub outbound_reply: Option<String>,
    #[serde(rename = "errorKind", skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyTerminal,
}

struct TaskEntry {
    task: Task,
    cancel: watch::Sender<bool>,
}

/// Owns every task's lifecycle so A2A callers can query or cancel later.
/// All transitions happen under one write lock, making them linearizable
/// per task id.
pub struct TaskManager {
    tasks: RwLock<HashMap<String, TaskEntry>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self { tasks: RwLock::new(HashMap::new()) }
    }

    /// Create a task in `submitted` and hand back the cancel signal the
    /// running turn should watch. Callers may bring their own task id (the
    /// legacy `send-task` shape does); otherwise one is generated.
    pub fn create(
        &self,
        session_id: &str,
        inbound_message: &str,
        task_id: Option<String>,
    ) -> (Task, watch::Receiver<bool>) {
        let now = Utc::now();
        let task = Task {
            task_id: task_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            session_id: session_id.to_string(),
            status: TaskStatus::Submitted,
            created_at: now,
            updated_at: now,
            inbound_message: inbound_message.to_string(),
            outbound_reply: None,
            error_kind: None,
        };
        let (cancel, cancel_rx) = watch::channel(false);
        self.tasks
            .write()
            .unwrap()
            .insert(task.task_id.clone(), TaskEntry { task: task.clone(), cancel });
        (task, cancel_rx)
    }

    /// `submitted -> working`, before the turn executor runs.
    pub fn start(&self, task_id: &str) -> Result<()> {
        self.transition(task_id, TaskStatus::Working, |_| {}).map(|_| ())
    }

    /// `working -> completed`. Returns false when the task raced into a
    /// terminal state first (a cancel won); the reply is then discarded.
    pub fn complete(&self, task_id: &str, reply: &str) -> Result<bool> {
        let reply = reply.to_string();
        self.transition(task_id, TaskStatus::Completed, move |task| {
            task.outbound_reply = Some(reply);
        })
    }

    /// `working -> failed`, recording the error kind and a terse message.
    pub fn fail(&self, task_id: &str, error_kind: &str, message: &str) -> Result<bool> {
        let (error_kind, message) = (error_kind.to_string(), message.to_string());
        self.transition(task_id, TaskStatus::Failed, move |task| {
            task.error_kind = Some(error_kind);
            task.outbound_reply = Some(message);
        })
    }

    pub fn get(&self, task_id: &str) -> Result<Task> {
        self.tasks
            .read()
            .unwrap()
            .get(task_id)
            .map(|entry| entry.task.clone())
            .ok_or_else(|| WeftError::NotFound(format!("task {}", task_id)))
    }

    /// Cancel a non-terminal task and signal its running turn. Cancelling a
    /// terminal task is a no-op with a distinguished result.
    pub fn cancel(&self, task_id: &str) -> Result<CancelOutcome> {
        let mut tasks = self.tasks.write().unwrap();
        let entry = tasks
            .get_mut(task_id)
            .ok_or_else(|| WeftError::NotFound(format!("task {}", task_id)))?;

        if entry.task.status.is_terminal() {
            return Ok(CancelOutcome::AlreadyTerminal);
        }

        entry.task.status = TaskStatus::Cancelled;
        entry.task.updated_at = Utc::now();
        entry.task.error_kind = Some("cancelled".to_string());
        let _ = entry.cancel.send(true);
        Ok(CancelOutcome::Cancelled)
    }

    fn transition(
        &self,
        task_id: &str,
        new_status: TaskStatus,
        apply: impl FnOnce(&mut Task),
    ) -> Result<bool> {
        let mut tasks = self.tasks.write().unwrap();
        let entry = tasks
            .get_mut(task_id)
            .ok_or_else(|| WeftError::NotFound(format!("task {}", task_id)))?;

        let current = entry.task.status;
        let legal = matches!(
            (current, new_status),
            (TaskStatus::Submitted, TaskStatus::Working)
                | (TaskStatus::Working, TaskStatus::Completed)
                | (TaskStatus::Working, TaskStatus::Failed)
        );

        if !legal {
            // a terminal state stays terminal; a turn racing a cancel lands here
            if current.is_terminal() {
                return Ok(false);
            }
            debug_assert!(false, "illegal task transition {:?} -> {:?}", current, new_status);
            return Err(WeftError::Protocol(format!(
                "illegal task transition {:?} -> {:?}",
                current, new_status
            )));
        }

        entry.task.status = new_status;
        entry.task.updated_at = Utc::now();
        apply(&mut entry.task);
        Ok(true)
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

//! Run state: the record of one execution in progress.
//!
//! Only the coordinator mutates these values; observers get shared
//! references or clones.

use crate::workflow::NodeId;
use crate::{PortValues, WorkflowError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

pub type ExecutionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Error,
    Skipped,
}

impl NodeStatus {
    /// Completed, error and skipped are terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRunState {
    pub status: NodeStatus,
    pub input: PortValues,
    pub output: Option<PortValues>,
    /// Present only when `status == Error`
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl NodeRunState {
    pub fn pending() -> Self {
        Self {
            status: NodeStatus::Pending,
            input: PortValues::new(),
            output: None,
            error: None,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn start(&mut self, input: PortValues) {
        self.status = NodeStatus::Running;
        self.input = input;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self, output: PortValues) {
        self.status = NodeStatus::Completed;
        self.output = Some(output);
        self.ended_at = Some(Utc::now());
    }

    pub fn fail(&mut self, message: String) {
        self.status = NodeStatus::Error;
        self.error = Some(message);
        self.ended_at = Some(Utc::now());
    }

    pub fn skip(&mut self) {
        self.status = NodeStatus::Skipped;
        self.ended_at = Some(Utc::now());
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Error,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRunState {
    pub execution_id: ExecutionId,
    pub status: WorkflowStatus,
    pub node_states: BTreeMap<NodeId, NodeRunState>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Outputs of completed terminal nodes, keyed by node id
    pub final_output: Option<BTreeMap<NodeId, PortValues>>,
    /// Graph-level failure that prevented any node from running
    pub error: Option<WorkflowError>,
}

impl WorkflowRunState {
    pub fn new(execution_id: ExecutionId) -> Self {
        Self {
            execution_id,
            status: WorkflowStatus::Running,
            node_states: BTreeMap::new(),
            started_at: Utc::now(),
            ended_at: None,
            final_output: None,
            error: None,
        }
    }

    pub fn node(&self, id: &str) -> Option<&NodeRunState> {
        self.node_states.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut NodeRunState> {
        self.node_states.get_mut(id)
    }

    /// Ids of nodes currently in `status`, ascending
    pub fn nodes_with_status(&self, status: NodeStatus) -> Vec<&str> {
        self.node_states
            .iter()
            .filter(|(_, state)| state.status == status)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Failed node ids with their messages
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.node_states
            .iter()
            .filter_map(|(id, state)| state.error.as_deref().map(|msg| (id.as_str(), msg)))
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }
}

//! Event Broadcaster - unified event stream for the goal execution UI
//!
//! Broadcasts run progress to every subscribed surface (execution modal, activity
//! feed, agent network view). Sends without subscribers are dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use ts_rs::TS;
use uuid::Uuid;

use crate::{runner::RunState, step::Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    Coordination,
    Data,
    Completion,
}

/// Simulated inter-agent communication shown in the network view
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMessage {
    pub from: String,
    pub to: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl NetworkMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        message: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            message: message.into(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Events emitted during a goal run
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        goal_id: String,
        goal_title: String,
        total_steps: u32,
        timestamp: DateTime<Utc>,
    },
    StepStarted {
        run_id: Uuid,
        step_index: u32,
        phase: Phase,
        agent: String,
        timestamp: DateTime<Utc>,
    },
    StepCompleted {
        run_id: Uuid,
        step_index: u32,
        phase: Phase,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    StepFailed {
        run_id: Uuid,
        step_index: u32,
        phase: Phase,
        error: String,
        timestamp: DateTime<Utc>,
    },
    Progress {
        run_id: Uuid,
        percent: u8,
    },
    Log {
        run_id: Uuid,
        line: String,
    },
    Thought {
        run_id: Uuid,
        text: String,
    },
    Network {
        run_id: Uuid,
        message: NetworkMessage,
    },
    StateChanged {
        run_id: Uuid,
        state: RunState,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        run_id: Uuid,
        goal_id: String,
        duration_ms: u64,
        real_mode: bool,
        timestamp: DateTime<Utc>,
    },
    RunFailed {
        run_id: Uuid,
        goal_id: String,
        failed_step: u32,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcasts events to all subscribers
#[derive(Debug)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self { sender }
    }

    pub fn broadcast(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn run_started(&self, run_id: Uuid, goal_id: &str, goal_title: &str, total_steps: u32) {
        self.broadcast(ExecutionEvent::RunStarted {
            run_id,
            goal_id: goal_id.to_string(),
            goal_title: goal_title.to_string(),
            total_steps,
            timestamp: Utc::now(),
        });
    }

    pub fn step_started(&self, run_id: Uuid, step_index: u32, phase: Phase, agent: &str) {
        self.broadcast(ExecutionEvent::StepStarted {
            run_id,
            step_index,
            phase,
            agent: agent.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn step_completed(&self, run_id: Uuid, step_index: u32, phase: Phase, duration_ms: u64) {
        self.broadcast(ExecutionEvent::StepCompleted {
            run_id,
            step_index,
            phase,
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    pub fn step_failed(&self, run_id: Uuid, step_index: u32, phase: Phase, error: &str) {
        self.broadcast(ExecutionEvent::StepFailed {
            run_id,
            step_index,
            phase,
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn state_changed(&self, run_id: Uuid, state: RunState) {
        self.broadcast(ExecutionEvent::StateChanged {
            run_id,
            state,
            timestamp: Utc::now(),
        });
    }

    pub fn run_completed(&self, run_id: Uuid, goal_id: &str, duration_ms: u64, real_mode: bool) {
        self.broadcast(ExecutionEvent::RunCompleted {
            run_id,
            goal_id: goal_id.to_string(),
            duration_ms,
            real_mode,
            timestamp: Utc::now(),
        });
    }

    pub fn run_failed(&self, run_id: Uuid, goal_id: &str, failed_step: u32, error: &str) {
        self.broadcast(ExecutionEvent::RunFailed {
            run_id,
            goal_id: goal_id.to_string(),
            failed_step,
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

//! # Autopilot - Goal Execution Orchestrator
//!
//! Orchestration core behind the CRM dashboard's goal runner. A goal is turned into a
//! fixed four-phase plan, phases run strictly in order, and the execution phase fans out
//! to LLM providers (with demo fallback) and third-party tool actions.

pub mod agents;
pub mod catalog;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod events;
pub mod fallback;
pub mod gateway;
pub mod goal;
pub mod plan;
pub mod registry;
pub mod runner;
pub mod session;
pub mod step;

#[cfg(test)]
mod session_tests;
#[cfg(test)]
mod test_support;

pub use agents::{Agent, AgentStatus};
pub use catalog::GoalCatalog;
pub use config::{AutopilotConfig, ExecutionMode};
pub use control::RunControl;
pub use dispatch::{CrmContext, DispatchSummary, ToolActionDispatcher, ToolActionResult, ToolKind};
pub use events::{EventBroadcaster, ExecutionEvent, MessageKind, NetworkMessage};
pub use fallback::{AgentOutcome, AgentType, FallbackExecutor, ProviderStrategy};
pub use gateway::{GatewayResponse, HttpGateway, LlmProvider, ProviderError, ProviderGateway};
pub use goal::{Complexity, Goal, GoalCategory, GoalInput, GoalPriority};
pub use plan::{ExecutionPlan, ExecutionPlanBuilder};
pub use registry::{ConnectionStatus, ToolConnection, ToolConnectionRegistry};
pub use runner::{PhaseContext, PhaseHandler, PhaseRunner, RunOutcome, RunSnapshot, RunState};
pub use session::{CompletionReport, ExecutionSummary, GoalExecutionSession, GoalPhaseHandler};
pub use step::{ExecutionStep, Phase, StepStatus};

/// Main error types for Autopilot operations
#[derive(Debug, thiserror::Error)]
pub enum AutopilotError {
    #[error("Invalid goal: {0}")]
    InvalidGoal(String),

    #[error("Invalid run transition: cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: RunState },

    #[error("Invalid step transition for '{step}': {from} -> {to}")]
    InvalidStepTransition {
        step: String,
        from: StepStatus,
        to: StepStatus,
    },

    #[error("A goal is already executing: {0}")]
    AlreadyRunning(String),

    #[error("No execution has been started")]
    NotStarted,

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool action failed ({app}): {message}")]
    ToolActionFailed { app: String, message: String },

    #[error("Phase error: {0}")]
    Phase(String),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Execution task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, AutopilotError>;

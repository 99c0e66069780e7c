//! Goal Execution Session - the API the dashboard drives
//!
//! Wraps plan building, the phase runner and run control behind
//! start/pause/resume/stop, and ships the default phase behaviour.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{broadcast, Mutex, RwLock},
    task::JoinHandle,
};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    config::AutopilotConfig,
    control::RunControl,
    dispatch::{CrmContext, DispatchSummary, ToolActionDispatcher, ToolActionResult},
    events::{EventBroadcaster, ExecutionEvent, MessageKind},
    fallback::{AgentOutcome, AgentType, FallbackExecutor},
    gateway::ProviderGateway,
    goal::Goal,
    plan::{select_execution_agent, ExecutionPlanBuilder, PLANNING_AGENT, VALIDATION_AGENT},
    registry::ToolConnectionRegistry,
    runner::{PhaseContext, PhaseHandler, PhaseRunner, RunOutcome, RunSnapshot, RunState},
    step::Phase,
    AutopilotError, Result,
};

/// Delivered once per run that reaches `completed` or `failed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    pub goal_id: String,
    pub success: bool,
    pub execution_time_ms: u64,
    pub real_mode: bool,
}

pub type CompletionCallback = Arc<dyn Fn(CompletionReport) + Send + Sync>;

/// Final result shown in the modal after validation
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub goal_id: String,
    pub agent_type: AgentType,
    pub confidence: f32,
    pub summary: String,
    pub business_impact: String,
    pub next_actions: Vec<String>,
    pub tools_used: Vec<String>,
    pub tool_results: Vec<ToolActionResult>,
    pub real_mode: bool,
}

/// Payload of the execution phase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionOutput {
    agent: AgentOutcome,
    dispatch: DispatchSummary,
}

/// Default behaviour of the four phases
pub struct GoalPhaseHandler {
    config: Arc<AutopilotConfig>,
    registry: Arc<ToolConnectionRegistry>,
    executor: FallbackExecutor,
    dispatcher: ToolActionDispatcher,
    crm: Option<CrmContext>,
}

impl GoalPhaseHandler {
    pub fn new(config: Arc<AutopilotConfig>, gateway: Arc<dyn ProviderGateway>) -> Self {
        Self::with_registry(config, gateway, Arc::new(ToolConnectionRegistry::new()))
    }

    pub fn with_registry(
        config: Arc<AutopilotConfig>,
        gateway: Arc<dyn ProviderGateway>,
        registry: Arc<ToolConnectionRegistry>,
    ) -> Self {
        let executor = FallbackExecutor::from_config(&config, gateway.clone());
        let dispatcher = ToolActionDispatcher::new(
            registry.clone(),
            gateway,
            config.execution.entity_id.clone(),
        );
        Self {
            config,
            registry,
            executor,
            dispatcher,
            crm: None,
        }
    }

    pub fn with_crm_context(mut self, crm: CrmContext) -> Self {
        self.crm = Some(crm);
        self
    }

    pub fn registry(&self) -> Arc<ToolConnectionRegistry> {
        self.registry.clone()
    }

    async fn plan(&self, ctx: &PhaseContext<'_>) -> Result<serde_json::Value> {
        let goal = ctx.goal;
        let execution_agent = select_execution_agent(goal);

        ctx.thought(format!(
            "Analyzing \"{}\": {:?} priority, {:?} complexity, about {}",
            goal.title, goal.priority, goal.complexity, goal.estimated_time
        ))
        .await;
        if goal.success_metrics.is_empty() {
            ctx.thought("No explicit success metrics; every tool action must complete")
                .await;
        } else {
            ctx.thought(format!("Success metrics: {}", goal.success_metrics.join("; ")))
                .await;
        }
        ctx.thought(format!("Assigning execution to {}", execution_agent))
            .await;

        ctx.message(
            ctx.agent,
            execution_agent,
            format!("Plan ready for \"{}\"", goal.title),
            MessageKind::Coordination,
        )
        .await;

        Ok(serde_json::json!({
            "goalId": goal.id,
            "category": goal.category,
            "tools": goal.tools_needed,
            "successMetrics": goal.success_metrics,
            "estimatedTime": goal.estimated_time,
            "executionAgent": execution_agent,
        }))
    }

    async fn gather_resources(&self, ctx: &PhaseContext<'_>) -> Result<serde_json::Value> {
        let goal = ctx.goal;
        let entity_id = &self.config.execution.entity_id;
        let mut connections = Vec::with_capacity(goal.tools_needed.len());

        for tool in &goal.tools_needed {
            ctx.control.checkpoint().await?;
            let connection = self.registry.authenticate(tool, entity_id).await;
            ctx.log(format!("Connected {} ({})", connection.app, connection.auth_type))
                .await;
            connections.push(connection);
        }

        if connections.is_empty() {
            ctx.log("No external tools required").await;
        }

        ctx.message(
            ctx.agent,
            select_execution_agent(goal),
            format!("{} connection(s) ready", connections.len()),
            MessageKind::Data,
        )
        .await;

        Ok(serde_json::json!({ "connections": connections }))
    }

    async fn execute(&self, ctx: &PhaseContext<'_>) -> Result<serde_json::Value> {
        let goal = ctx.goal;

        ctx.thought(format!("Consulting providers for \"{}\"", goal.title))
            .await;
        let agent = self.executor.execute_agent(goal, ctx.control).await?;
        ctx.log(format!(
            "{:?} agent responded ({:.0}% confidence)",
            agent.agent_type,
            agent.confidence * 100.0
        ))
        .await;
        ctx.thought(agent.summary.clone()).await;

        let dispatch = self
            .dispatcher
            .dispatch(goal, self.crm.as_ref(), ctx.control)
            .await?;
        for result in &dispatch.results {
            ctx.log(format!("{}: {} ({})", result.tool, result.description, result.detail))
                .await;
        }

        ctx.message(
            ctx.agent,
            VALIDATION_AGENT,
            format!(
                "{}/{} tool actions completed",
                dispatch.succeeded, dispatch.attempted
            ),
            MessageKind::Data,
        )
        .await;

        serde_json::to_value(ExecutionOutput { agent, dispatch })
            .map_err(|e| AutopilotError::Phase(e.to_string()))
    }

    async fn validate(&self, ctx: &PhaseContext<'_>) -> Result<serde_json::Value> {
        let goal = ctx.goal;
        let output: ExecutionOutput = ctx
            .output_of(Phase::Execution)
            .cloned()
            .ok_or_else(|| AutopilotError::Phase("execution produced no output".to_string()))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| AutopilotError::Phase(e.to_string()))
            })?;

        let ExecutionOutput { agent, dispatch } = output;
        let summary = ExecutionSummary {
            goal_id: goal.id.clone(),
            agent_type: agent.agent_type,
            confidence: agent.confidence,
            summary: agent.summary,
            business_impact: format!("{} {}", dispatch.business_impact, agent.business_impact),
            next_actions: agent.next_actions,
            tools_used: dispatch.tools_used,
            tool_results: dispatch.results,
            real_mode: self.config.mode().is_live(),
        };

        ctx.thought(format!(
            "Validated {} tool result(s) at {:.0}% confidence",
            summary.tool_results.len(),
            summary.confidence * 100.0
        ))
        .await;
        ctx.message(
            ctx.agent,
            PLANNING_AGENT,
            format!("\"{}\" validated", goal.title),
            MessageKind::Completion,
        )
        .await;

        serde_json::to_value(&summary).map_err(|e| AutopilotError::Phase(e.to_string()))
    }
}

#[async_trait]
impl PhaseHandler for GoalPhaseHandler {
    async fn run_phase(&self, ctx: &PhaseContext<'_>) -> Result<serde_json::Value> {
        match ctx.phase {
            Phase::Planning => self.plan(ctx).await,
            Phase::ResourceGathering => self.gather_resources(ctx).await,
            Phase::Execution => self.execute(ctx).await,
            Phase::Validation => self.validate(ctx).await,
        }
    }
}

struct ActiveRun {
    control: RunControl,
    task: Option<JoinHandle<RunOutcome>>,
}

pub struct GoalExecutionSession {
    config: Arc<AutopilotConfig>,
    handler: Arc<dyn PhaseHandler>,
    planner: ExecutionPlanBuilder,
    runner: PhaseRunner,
    state: Arc<RwLock<RunSnapshot>>,
    events: Arc<EventBroadcaster>,
    active: Mutex<Option<ActiveRun>>,
    on_complete: Option<CompletionCallback>,
}

impl GoalExecutionSession {
    /// Session with the default phase handler
    pub fn new(config: AutopilotConfig, gateway: Arc<dyn ProviderGateway>) -> Self {
        let config = Arc::new(config);
        let handler = GoalPhaseHandler::new(config.clone(), gateway);
        Self::with_handler(config, Arc::new(handler))
    }

    pub fn with_handler(config: Arc<AutopilotConfig>, handler: Arc<dyn PhaseHandler>) -> Self {
        let state = Arc::new(RwLock::new(RunSnapshot::idle()));
        let events = Arc::new(EventBroadcaster::new());
        let runner = PhaseRunner::new(
            state.clone(),
            events.clone(),
            std::time::Duration::from_millis(config.execution.phase_delay_ms),
        );

        Self {
            config,
            handler,
            planner: ExecutionPlanBuilder::new(),
            runner,
            state,
            events,
            active: Mutex::new(None),
            on_complete: None,
        }
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(CompletionReport) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    /// Build the plan and spawn the run. Returns the run id.
    pub async fn start_execution(&self, goal: Goal) -> Result<Uuid> {
        let mut active = self.active.lock().await;

        {
            let snapshot = self.state.read().await;
            if snapshot.state.is_active() {
                let title = snapshot
                    .goal
                    .as_ref()
                    .map(|g| g.title.clone())
                    .unwrap_or_default();
                return Err(AutopilotError::AlreadyRunning(title));
            }
        }

        let plan = self.planner.build(&goal);
        let run_id = Uuid::new_v4();
        let real_mode = self.config.mode().is_live();
        let control = RunControl::new();

        tracing::info!(
            "[SESSION] Starting goal '{}' as run {} ({} mode)",
            goal.id,
            run_id,
            if real_mode { "live" } else { "demo" }
        );
        self.runner.begin(&plan, run_id, real_mode).await;

        let runner = self.runner.clone();
        let handler = self.handler.clone();
        let run_control = control.clone();
        let callback = self.on_complete.clone();

        let task = tokio::spawn(async move {
            let outcome = runner
                .execute(run_id, &plan.goal, handler.as_ref(), &run_control)
                .await;

            if let Some(callback) = callback {
                if outcome.state != RunState::Idle {
                    callback(CompletionReport {
                        goal_id: outcome.goal_id.clone(),
                        success: outcome.is_success(),
                        execution_time_ms: outcome.duration_ms,
                        real_mode,
                    });
                }
            }
            outcome
        });

        *active = Some(ActiveRun {
            control,
            task: Some(task),
        });
        Ok(run_id)
    }

    pub async fn pause_execution(&self) -> Result<()> {
        self.transition("pause", RunState::Running, RunState::Paused, RunControl::pause)
            .await
    }

    pub async fn resume_execution(&self) -> Result<()> {
        self.transition("resume", RunState::Paused, RunState::Running, RunControl::resume)
            .await
    }

    /// Cancel the run and discard its progress. No completion callback fires.
    pub async fn stop_execution(&self) -> Result<()> {
        let active = self.active.lock().await;
        let mut snapshot = self.state.write().await;

        if !snapshot.state.is_active() {
            return Err(AutopilotError::InvalidTransition {
                action: "stop",
                state: snapshot.state,
            });
        }

        if let Some(run) = active.as_ref() {
            run.control.stop();
        }

        let run_id = snapshot.run_id;
        *snapshot = RunSnapshot::idle();
        drop(snapshot);

        if let Some(run_id) = run_id {
            tracing::info!("[SESSION] Stopped run {}", run_id);
            self.events.state_changed(run_id, RunState::Idle);
        }
        Ok(())
    }

    /// Await the most recently started run.
    pub async fn wait(&self) -> Result<RunOutcome> {
        let task = {
            let mut active = self.active.lock().await;
            active.as_mut().and_then(|run| run.task.take())
        };
        let task = task.ok_or(AutopilotError::NotStarted)?;
        Ok(task.await?)
    }

    pub async fn snapshot(&self) -> RunSnapshot {
        self.state.read().await.clone()
    }

    pub async fn state(&self) -> RunState {
        self.state.read().await.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.events.subscribe()
    }

    async fn transition(
        &self,
        action: &'static str,
        from: RunState,
        to: RunState,
        apply: fn(&RunControl),
    ) -> Result<()> {
        let active = self.active.lock().await;
        let mut snapshot = self.state.write().await;

        if snapshot.state != from {
            return Err(AutopilotError::InvalidTransition {
                action,
                state: snapshot.state,
            });
        }
        let run = active.as_ref().ok_or(AutopilotError::NotStarted)?;

        apply(&run.control);
        snapshot.state = to;
        let line = match to {
            RunState::Paused => "Execution paused",
            _ => "Execution resumed",
        };
        snapshot.logs.push(line.to_string());
        let run_id = snapshot.run_id;
        drop(snapshot);

        if let Some(run_id) = run_id {
            tracing::info!("[SESSION] Run {} is now {}", run_id, to);
            self.events.state_changed(run_id, to);
            self.events.broadcast(ExecutionEvent::Log {
                run_id,
                line: line.to_string(),
            });
        }
        Ok(())
    }
}

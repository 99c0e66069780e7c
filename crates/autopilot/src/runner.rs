//! Phase Runner - executes plan phases strictly in order
//!
//! The runner owns the state machine of a single run and mirrors every change into a
//! shared `RunSnapshot` plus the event stream. Writes are keyed by run id so a run
//! that was stopped can never touch the snapshot of the run that replaced it.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    agents::Agent,
    control::RunControl,
    events::{EventBroadcaster, ExecutionEvent, MessageKind, NetworkMessage},
    goal::Goal,
    plan::ExecutionPlan,
    session::ExecutionSummary,
    step::{ExecutionStep, Phase, StepStatus},
    AutopilotError, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_active(self) -> bool {
        matches!(self, RunState::Running | RunState::Paused)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Everything the execution modal renders
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub run_id: Option<Uuid>,
    pub state: RunState,
    pub goal: Option<Goal>,
    pub steps: Vec<ExecutionStep>,
    pub agents: Vec<Agent>,
    pub progress: u8,
    pub logs: Vec<String>,
    pub thoughts: Vec<String>,
    pub messages: Vec<NetworkMessage>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub real_mode: bool,
    pub summary: Option<ExecutionSummary>,
}

impl RunSnapshot {
    pub fn idle() -> Self {
        Self {
            run_id: None,
            state: RunState::Idle,
            goal: None,
            steps: Vec::new(),
            agents: Vec::new(),
            progress: 0,
            logs: Vec::new(),
            thoughts: Vec::new(),
            messages: Vec::new(),
            started_at: None,
            completed_at: None,
            real_mode: false,
            summary: None,
        }
    }

    pub fn step(&self, phase: Phase) -> Option<&ExecutionStep> {
        self.steps.iter().find(|s| s.phase == phase)
    }
}

impl Default for RunSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

/// Terminal result of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub goal_id: String,
    pub state: RunState,
    pub duration_ms: u64,
    pub failed_step: Option<usize>,
    pub error: Option<String>,
    pub steps: Vec<ExecutionStep>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }

    /// Result payload of a phase, if it completed
    pub fn output(&self, phase: Phase) -> Option<&serde_json::Value> {
        self.steps
            .iter()
            .find(|s| s.phase == phase)
            .and_then(|s| s.result.as_ref())
    }
}

/// Append-only display channels for one run
#[derive(Clone)]
struct Journal {
    run_id: Uuid,
    state: Arc<RwLock<RunSnapshot>>,
    events: Arc<EventBroadcaster>,
}

impl Journal {
    /// Apply a change only while the snapshot still belongs to this run
    async fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut RunSnapshot),
    {
        let mut snapshot = self.state.write().await;
        if snapshot.run_id != Some(self.run_id) {
            return false;
        }
        f(&mut snapshot);
        true
    }

    async fn log(&self, line: String) {
        if self.update(|s| s.logs.push(line.clone())).await {
            self.events.broadcast(ExecutionEvent::Log {
                run_id: self.run_id,
                line,
            });
        }
    }

    async fn thought(&self, text: String) {
        if self.update(|s| s.thoughts.push(text.clone())).await {
            self.events.broadcast(ExecutionEvent::Thought {
                run_id: self.run_id,
                text,
            });
        }
    }

    async fn message(&self, message: NetworkMessage) {
        if self.update(|s| s.messages.push(message.clone())).await {
            self.events.broadcast(ExecutionEvent::Network {
                run_id: self.run_id,
                message,
            });
        }
    }
}

/// What a phase handler can see and record
pub struct PhaseContext<'a> {
    pub run_id: Uuid,
    pub goal: &'a Goal,
    pub phase: Phase,
    pub agent: &'a str,
    pub control: &'a RunControl,
    previous: &'a [ExecutionStep],
    journal: &'a Journal,
}

impl PhaseContext<'_> {
    /// Result payload of an earlier phase in this run
    pub fn output_of(&self, phase: Phase) -> Option<&serde_json::Value> {
        self.previous
            .iter()
            .find(|s| s.phase == phase)
            .and_then(|s| s.result.as_ref())
    }

    pub async fn log(&self, line: impl Into<String>) {
        self.journal.log(line.into()).await;
    }

    pub async fn thought(&self, text: impl Into<String>) {
        self.journal.thought(text.into()).await;
    }

    pub async fn message(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        text: impl Into<String>,
        kind: MessageKind,
    ) {
        self.journal
            .message(NetworkMessage::new(from, to, text, kind))
            .await;
    }
}

/// Work performed for each phase of a run
#[async_trait]
pub trait PhaseHandler: Send + Sync {
    async fn run_phase(&self, ctx: &PhaseContext<'_>) -> Result<serde_json::Value>;
}

#[derive(Clone)]
pub struct PhaseRunner {
    state: Arc<RwLock<RunSnapshot>>,
    events: Arc<EventBroadcaster>,
    phase_delay: Duration,
}

impl PhaseRunner {
    pub fn new(
        state: Arc<RwLock<RunSnapshot>>,
        events: Arc<EventBroadcaster>,
        phase_delay: Duration,
    ) -> Self {
        Self {
            state,
            events,
            phase_delay,
        }
    }

    /// Install a fresh snapshot for the plan and mark the run `running`.
    pub async fn begin(&self, plan: &ExecutionPlan, run_id: Uuid, real_mode: bool) {
        {
            let mut snapshot = self.state.write().await;
            *snapshot = RunSnapshot {
                run_id: Some(run_id),
                state: RunState::Running,
                goal: Some(plan.goal.clone()),
                steps: plan.steps.clone(),
                agents: plan.agents.clone(),
                started_at: Some(Utc::now()),
                real_mode,
                ..RunSnapshot::idle()
            };
        }

        self.events.run_started(
            run_id,
            &plan.goal.id,
            &plan.goal.title,
            plan.steps.len() as u32,
        );
        self.events.state_changed(run_id, RunState::Running);
    }

    /// Begin and execute a plan in one call.
    pub async fn run(
        &self,
        plan: ExecutionPlan,
        handler: &dyn PhaseHandler,
        control: &RunControl,
        real_mode: bool,
    ) -> RunOutcome {
        let run_id = Uuid::new_v4();
        self.begin(&plan, run_id, real_mode).await;
        self.execute(run_id, &plan.goal, handler, control).await
    }

    /// Iterate the phases of a run previously set up with `begin`.
    pub async fn execute(
        &self,
        run_id: Uuid,
        goal: &Goal,
        handler: &dyn PhaseHandler,
        control: &RunControl,
    ) -> RunOutcome {
        let started = std::time::Instant::now();
        let journal = Journal {
            run_id,
            state: self.state.clone(),
            events: self.events.clone(),
        };

        let steps = self.state.read().await.steps.clone();
        let total = steps.len();

        tracing::info!(
            "[PHASE_RUNNER] Starting run {} for goal '{}' ({} phases)",
            run_id,
            goal.id,
            total
        );
        journal.log(format!("Starting execution of \"{}\"", goal.title)).await;

        for index in 0..total {
            if control.checkpoint().await.is_err() {
                return self.stopped(run_id, goal, started).await;
            }

            let Some((phase, agent)) = self.start_step(&journal, index).await else {
                return self.stopped(run_id, goal, started).await;
            };

            tracing::info!(
                "[PHASE_RUNNER] Phase {}/{}: {} ({})",
                index + 1,
                total,
                phase,
                agent
            );
            journal.log(format!("{} started by {}", phase, agent)).await;

            let previous: Vec<ExecutionStep> = self
                .state
                .read()
                .await
                .steps
                .get(..index)
                .map(<[ExecutionStep]>::to_vec)
                .unwrap_or_default();
            let ctx = PhaseContext {
                run_id,
                goal,
                phase,
                agent: &agent,
                control,
                previous: &previous,
                journal: &journal,
            };

            let result = handler.run_phase(&ctx).await;

            // hold the result while paused; drop it once stopped
            if control.checkpoint().await.is_err() {
                return self.stopped(run_id, goal, started).await;
            }

            match result {
                Ok(payload) => {
                    let duration_ms = self.complete_step(&journal, index, total, payload).await;
                    self.events
                        .step_completed(run_id, index as u32, phase, duration_ms);
                    journal
                        .log(format!("{} completed in {}ms", phase, duration_ms))
                        .await;
                }
                Err(AutopilotError::Cancelled) => {
                    return self.stopped(run_id, goal, started).await;
                }
                Err(err) => {
                    return self
                        .fail(&journal, control, goal, index, phase, err, started)
                        .await;
                }
            }

            if control.sleep(self.phase_delay).await.is_err() {
                return self.stopped(run_id, goal, started).await;
            }
        }

        self.finish(&journal, control, goal, started).await
    }

    async fn start_step(&self, journal: &Journal, index: usize) -> Option<(Phase, String)> {
        let mut started = None;
        let applied = journal
            .update(|s| {
                let Some(step) = s.steps.get_mut(index) else {
                    return;
                };
                if let Err(e) = step.start() {
                    tracing::error!("[PHASE_RUNNER] {}", e);
                    return;
                }
                let (phase, agent) = (step.phase, step.agent.clone());
                if let Some(a) = s.agents.iter_mut().find(|a| a.name == agent) {
                    a.start_task(phase.label());
                }
                started = Some((phase, agent));
            })
            .await;

        let (phase, agent) = started.filter(|_| applied)?;
        self.events
            .step_started(journal.run_id, index as u32, phase, &agent);
        Some((phase, agent))
    }

    async fn complete_step(
        &self,
        journal: &Journal,
        index: usize,
        total: usize,
        payload: serde_json::Value,
    ) -> u64 {
        let mut duration_ms = 0;
        let mut progress = 0;
        journal
            .update(|s| {
                if let Some(step) = s.steps.get_mut(index) {
                    let agent = step.agent.clone();
                    if step.phase == Phase::Validation {
                        s.summary = serde_json::from_value::<ExecutionSummary>(payload.clone()).ok();
                    }
                    match step.complete(payload) {
                        Ok(()) => {
                            duration_ms = step.duration_ms().unwrap_or(0);
                            if let Some(a) = s.agents.iter_mut().find(|a| a.name == agent) {
                                a.finish_task();
                            }
                        }
                        Err(e) => tracing::error!("[PHASE_RUNNER] {}", e),
                    }
                }
                let completed = s
                    .steps
                    .iter()
                    .filter(|st| st.status == StepStatus::Completed)
                    .count();
                progress = ((completed * 100) / total.max(1)) as u8;
                s.progress = progress;
            })
            .await;

        self.events.broadcast(ExecutionEvent::Progress {
            run_id: journal.run_id,
            percent: progress,
        });
        duration_ms
    }

    /// Apply a terminal transition once the run is `running`. A pause that lands
    /// first holds it until resume. Returns false once stopped.
    async fn settle<F>(&self, journal: &Journal, control: &RunControl, mut f: F) -> bool
    where
        F: FnMut(&mut RunSnapshot),
    {
        loop {
            if control.checkpoint().await.is_err() {
                return false;
            }
            let mut applied = false;
            journal
                .update(|s| {
                    if s.state == RunState::Running {
                        f(s);
                        applied = true;
                    }
                })
                .await;
            if applied {
                return true;
            }
            // paused between checkpoint and write; the gate is closed again
            tokio::task::yield_now().await;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn fail(
        &self,
        journal: &Journal,
        control: &RunControl,
        goal: &Goal,
        index: usize,
        phase: Phase,
        err: AutopilotError,
        started: std::time::Instant,
    ) -> RunOutcome {
        let message = err.to_string();
        tracing::error!("[PHASE_RUNNER] Phase '{}' failed: {}", phase, message);

        let settled = self
            .settle(journal, control, |s| {
                if let Some(step) = s.steps.get_mut(index) {
                    let agent = step.agent.clone();
                    if let Err(e) = step.fail(message.clone()) {
                        tracing::error!("[PHASE_RUNNER] {}", e);
                    }
                    if let Some(a) = s.agents.iter_mut().find(|a| a.name == agent) {
                        a.fail_task();
                    }
                }
                s.state = RunState::Failed;
                s.completed_at = Some(Utc::now());
            })
            .await;
        if !settled {
            return self.stopped(journal.run_id, goal, started).await;
        }
        journal
            .log(format!("Execution failed during {}: {}", phase, message))
            .await;

        self.events
            .step_failed(journal.run_id, index as u32, phase, &message);
        self.events.state_changed(journal.run_id, RunState::Failed);
        self.events
            .run_failed(journal.run_id, &goal.id, index as u32, &message);

        RunOutcome {
            run_id: journal.run_id,
            goal_id: goal.id.clone(),
            state: RunState::Failed,
            duration_ms: started.elapsed().as_millis() as u64,
            failed_step: Some(index),
            error: Some(message),
            steps: self.steps_of(journal.run_id).await,
        }
    }

    async fn finish(
        &self,
        journal: &Journal,
        control: &RunControl,
        goal: &Goal,
        started: std::time::Instant,
    ) -> RunOutcome {
        let mut real_mode = false;

        let settled = self
            .settle(journal, control, |s| {
                s.state = RunState::Completed;
                s.progress = 100;
                s.completed_at = Some(Utc::now());
                real_mode = s.real_mode;
            })
            .await;
        if !settled {
            return self.stopped(journal.run_id, goal, started).await;
        }
        let duration_ms = started.elapsed().as_millis() as u64;
        journal
            .log(format!("Goal \"{}\" completed in {}ms", goal.title, duration_ms))
            .await;

        tracing::info!(
            "[PHASE_RUNNER] Run {} completed in {}ms",
            journal.run_id,
            duration_ms
        );

        self.events.broadcast(ExecutionEvent::Progress {
            run_id: journal.run_id,
            percent: 100,
        });
        self.events.state_changed(journal.run_id, RunState::Completed);
        self.events
            .run_completed(journal.run_id, &goal.id, duration_ms, real_mode);

        RunOutcome {
            run_id: journal.run_id,
            goal_id: goal.id.clone(),
            state: RunState::Completed,
            duration_ms,
            failed_step: None,
            error: None,
            steps: self.steps_of(journal.run_id).await,
        }
    }

    async fn stopped(&self, run_id: Uuid, goal: &Goal, started: std::time::Instant) -> RunOutcome {
        tracing::info!("[PHASE_RUNNER] Run {} stopped", run_id);

        // discard progress unless the session already replaced the snapshot
        let reset = {
            let mut snapshot = self.state.write().await;
            if snapshot.run_id == Some(run_id) {
                *snapshot = RunSnapshot::idle();
                true
            } else {
                false
            }
        };
        if reset {
            self.events.state_changed(run_id, RunState::Idle);
        }

        RunOutcome {
            run_id,
            goal_id: goal.id.clone(),
            state: RunState::Idle,
            duration_ms: started.elapsed().as_millis() as u64,
            failed_step: None,
            error: None,
            steps: Vec::new(),
        }
    }

    async fn steps_of(&self, run_id: Uuid) -> Vec<ExecutionStep> {
        let snapshot = self.state.read().await;
        if snapshot.run_id == Some(run_id) {
            snapshot.steps.clone()
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::GoalInput;

    fn paused_run() -> (PhaseRunner, Arc<RwLock<RunSnapshot>>, Journal, RunControl) {
        let state = Arc::new(RwLock::new(RunSnapshot::idle()));
        let runner = PhaseRunner::new(state.clone(), Arc::new(EventBroadcaster::new()), Duration::ZERO);
        let run_id = Uuid::new_v4();
        let journal = Journal {
            run_id,
            state: state.clone(),
            events: runner.events.clone(),
        };
        (runner, state, journal, RunControl::new())
    }

    async fn mark_paused(state: &RwLock<RunSnapshot>, run_id: Uuid, control: &RunControl) {
        let mut snapshot = state.write().await;
        snapshot.run_id = Some(run_id);
        control.pause();
        snapshot.state = RunState::Paused;
    }

    #[tokio::test]
    async fn test_completion_waits_for_resume() {
        let (runner, state, journal, control) = paused_run();
        mark_paused(&state, journal.run_id, &control).await;
        let goal = Goal::from_input(GoalInput::new("Wrap up")).unwrap();

        let finishing = {
            let control = control.clone();
            tokio::spawn(async move {
                runner
                    .finish(&journal, &control, &goal, std::time::Instant::now())
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!finishing.is_finished());
        assert_eq!(state.read().await.state, RunState::Paused);

        {
            let mut snapshot = state.write().await;
            control.resume();
            snapshot.state = RunState::Running;
        }

        let outcome = finishing.await.unwrap();
        assert_eq!(outcome.state, RunState::Completed);
        assert_eq!(state.read().await.state, RunState::Completed);
        assert!(!control.is_paused());
    }

    #[tokio::test]
    async fn test_failure_while_paused_yields_to_stop() {
        let (runner, state, journal, control) = paused_run();
        mark_paused(&state, journal.run_id, &control).await;
        let goal = Goal::from_input(GoalInput::new("Wrap up")).unwrap();

        let failing = {
            let control = control.clone();
            tokio::spawn(async move {
                runner
                    .fail(
                        &journal,
                        &control,
                        &goal,
                        0,
                        Phase::Planning,
                        AutopilotError::Phase("boom".to_string()),
                        std::time::Instant::now(),
                    )
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state.read().await.state, RunState::Paused);
        control.stop();

        let outcome = failing.await.unwrap();
        assert_eq!(outcome.state, RunState::Idle);
        assert_eq!(state.read().await.state, RunState::Idle);
    }
}

//! Tests for the goal execution session

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use async_trait::async_trait;

    use crate::{
        config::{AutopilotConfig, GeminiConfig, OpenAIConfig},
        dispatch::{CrmContact, CrmContext},
        fallback::AgentType,
        gateway::LlmProvider,
        goal::{Goal, GoalInput},
        runner::{PhaseContext, PhaseHandler, RunState},
        session::{CompletionReport, GoalExecutionSession, GoalPhaseHandler},
        step::{Phase, StepStatus},
        test_support::ScriptedGateway,
        AutopilotError, Result,
    };

    fn follow_up_goal() -> Goal {
        Goal::from_input(
            GoalInput::new("Send Follow-up Emails")
                .with_tools(["gmail"])
                .with_complexity("Simple"),
        )
        .unwrap()
    }

    fn demo_config(phase_delay_ms: u64) -> AutopilotConfig {
        AutopilotConfig::demo().with_phase_delay_ms(phase_delay_ms)
    }

    fn live_config() -> AutopilotConfig {
        let mut config = AutopilotConfig::default().with_phase_delay_ms(0);
        config.openai = Some(OpenAIConfig::new("sk-test"));
        config.gemini = Some(GeminiConfig::new("gm-test"));
        config
    }

    fn recorder() -> (
        Arc<Mutex<Vec<CompletionReport>>>,
        impl Fn(CompletionReport) + Send + Sync + 'static,
    ) {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        (reports, move |report| sink.lock().unwrap().push(report))
    }

    #[tokio::test]
    async fn test_follow_up_emails_in_demo_mode() {
        let session =
            GoalExecutionSession::new(demo_config(0), Arc::new(ScriptedGateway::offline()));

        session.start_execution(follow_up_goal()).await.unwrap();
        let outcome = session.wait().await.unwrap();
        assert!(outcome.is_success());

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.state, RunState::Completed);
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.steps.len(), 4);
        assert!(snapshot
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Completed));
        assert_eq!(
            snapshot.step(Phase::Execution).unwrap().agent,
            "Email Automation Agent"
        );

        let summary = snapshot.summary.expect("validation stores a summary");
        assert_eq!(summary.goal_id, "send-follow-up-emails");
        assert_eq!(summary.agent_type, AgentType::Demo);
        assert!((summary.confidence - 0.8).abs() < f32::EPSILON);
        assert_eq!(summary.tools_used, vec!["gmail".to_string()]);
        assert_eq!(summary.tool_results.len(), 1);
        assert_eq!(summary.tool_results[0].tool, "gmail");
        assert_eq!(summary.next_actions.len(), 3);
        assert!(summary.business_impact.starts_with("Exceeded expectations"));
        assert!(!summary.real_mode);

        assert!(!snapshot.thoughts.is_empty());
        assert!(!snapshot.messages.is_empty());
    }

    #[tokio::test]
    async fn test_secondary_provider_used_when_primary_unavailable() {
        let gateway = Arc::new(ScriptedGateway::offline().with_llm(
            LlmProvider::Gemini,
            r#"{"summary": "Drafted 12 follow-ups", "nextActions": ["Review replies"]}"#,
        ));
        let (reports, callback) = recorder();
        let session =
            GoalExecutionSession::new(live_config(), gateway.clone()).on_complete(callback);

        session.start_execution(follow_up_goal()).await.unwrap();
        session.wait().await.unwrap();

        let summary = session.snapshot().await.summary.unwrap();
        assert_eq!(summary.agent_type, AgentType::Gemini);
        assert!((summary.confidence - 0.9).abs() < f32::EPSILON);
        assert_eq!(summary.summary, "Drafted 12 follow-ups");
        assert_eq!(summary.next_actions, vec!["Review replies".to_string()]);
        assert!(summary.real_mode);

        // OpenAI is skipped without a call
        assert_eq!(gateway.llm_calls(), vec![LlmProvider::Gemini]);

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].success);
        assert!(reports[0].real_mode);
    }

    #[tokio::test]
    async fn test_completion_callback_reports_goal() {
        let (reports, callback) = recorder();
        let session =
            GoalExecutionSession::new(demo_config(0), Arc::new(ScriptedGateway::offline()))
                .on_complete(callback);

        session.start_execution(follow_up_goal()).await.unwrap();
        let outcome = session.wait().await.unwrap();

        let reports = reports.lock().unwrap();
        assert_eq!(
            *reports,
            vec![CompletionReport {
                goal_id: "send-follow-up-emails".to_string(),
                success: true,
                execution_time_ms: outcome.duration_ms,
                real_mode: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_failed_tool_lowers_business_impact() {
        let gateway = Arc::new(
            ScriptedGateway::offline()
                .with_tools()
                .fail_tool("GMAIL_SEND_EMAIL"),
        );
        let session = GoalExecutionSession::new(demo_config(0), gateway.clone());
        let goal = Goal::from_input(
            GoalInput::new("Announce release").with_tools(["gmail", "slack"]),
        )
        .unwrap();

        session.start_execution(goal).await.unwrap();
        let outcome = session.wait().await.unwrap();
        assert!(outcome.is_success());

        let summary = session.snapshot().await.summary.unwrap();
        assert_eq!(summary.tools_used, vec!["gmail".to_string(), "slack".to_string()]);
        assert_eq!(summary.tool_results.len(), 1);
        assert_eq!(summary.tool_results[0].tool, "slack");
        assert!(summary.business_impact.starts_with("Met expectations: 1/2"));
        assert_eq!(gateway.tool_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_resources_and_crm_context() {
        let config = Arc::new(demo_config(0));
        let gateway = Arc::new(ScriptedGateway::offline());
        let handler = GoalPhaseHandler::new(config.clone(), gateway).with_crm_context(CrmContext {
            contacts: vec![
                CrmContact {
                    name: "Ada".into(),
                    email: "ada@example.com".into(),
                    company: None,
                },
                CrmContact {
                    name: "Grace".into(),
                    email: "grace@example.com".into(),
                    company: Some("Navy".into()),
                },
            ],
            deals: Vec::new(),
        });
        let registry = handler.registry();
        let session = GoalExecutionSession::with_handler(config, Arc::new(handler));

        session.start_execution(follow_up_goal()).await.unwrap();
        session.wait().await.unwrap();

        assert!(registry.is_connected("gmail").await);
        let summary = session.snapshot().await.summary.unwrap();
        assert_eq!(summary.tool_results[0].detail, "Delivered to 2 contacts");
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let session =
            GoalExecutionSession::new(demo_config(5_000), Arc::new(ScriptedGateway::offline()));

        session.start_execution(follow_up_goal()).await.unwrap();
        let err = session.start_execution(follow_up_goal()).await.unwrap_err();
        assert!(matches!(err, AutopilotError::AlreadyRunning(ref t) if t == "Send Follow-up Emails"));

        session.stop_execution().await.unwrap();
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let (reports, callback) = recorder();
        let session =
            GoalExecutionSession::new(demo_config(50), Arc::new(ScriptedGateway::offline()))
                .on_complete(callback);

        session.start_execution(follow_up_goal()).await.unwrap();
        session.pause_execution().await.unwrap();
        assert_eq!(session.state().await, RunState::Paused);

        let err = session.pause_execution().await.unwrap_err();
        assert!(matches!(
            err,
            AutopilotError::InvalidTransition {
                action: "pause",
                state: RunState::Paused
            }
        ));

        // nothing finishes while paused
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(session.state().await, RunState::Paused);
        assert!(reports.lock().unwrap().is_empty());

        session.resume_execution().await.unwrap();
        let outcome = session.wait().await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(reports.lock().unwrap().len(), 1);

        let snapshot = session.snapshot().await;
        assert!(snapshot.logs.iter().any(|l| l == "Execution paused"));
        assert!(snapshot.logs.iter().any(|l| l == "Execution resumed"));
    }

    #[tokio::test]
    async fn test_pause_holds_in_flight_provider_reply() {
        let gateway = Arc::new(
            ScriptedGateway::offline()
                .with_llm(
                    LlmProvider::OpenAI,
                    r#"{"summary": "Drafted 12 follow-ups", "nextActions": ["Review replies"]}"#,
                )
                .with_llm_delay(Duration::from_millis(100)),
        );
        let session = GoalExecutionSession::new(live_config(), gateway.clone());

        session.start_execution(follow_up_goal()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        session.pause_execution().await.unwrap();

        // the reply arrives at 100ms but must not advance the run
        tokio::time::sleep(Duration::from_millis(300)).await;
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.state, RunState::Paused);
        assert_eq!(
            snapshot.step(Phase::Execution).unwrap().status,
            StepStatus::Running
        );
        assert!(snapshot.summary.is_none());

        session.resume_execution().await.unwrap();
        let outcome = session.wait().await.unwrap();
        assert!(outcome.is_success());

        let summary = session.snapshot().await.summary.unwrap();
        assert_eq!(summary.agent_type, AgentType::OpenAI);
        assert_eq!(gateway.llm_calls(), vec![LlmProvider::OpenAI]);
    }

    #[tokio::test]
    async fn test_stop_discards_progress_without_callback() {
        let (reports, callback) = recorder();
        let session =
            GoalExecutionSession::new(demo_config(10_000), Arc::new(ScriptedGateway::offline()))
                .on_complete(callback);

        session.start_execution(follow_up_goal()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.stop_execution().await.unwrap();

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.state, RunState::Idle);
        assert!(snapshot.steps.is_empty());
        assert_eq!(snapshot.progress, 0);

        let outcome = tokio::time::timeout(Duration::from_secs(5), session.wait())
            .await
            .expect("stop interrupts the pacing delay")
            .unwrap();
        assert_eq!(outcome.state, RunState::Idle);
        assert!(reports.lock().unwrap().is_empty());

        let err = session.stop_execution().await.unwrap_err();
        assert!(matches!(
            err,
            AutopilotError::InvalidTransition {
                action: "stop",
                state: RunState::Idle
            }
        ));

        // a new run may start after a stop
        session.start_execution(follow_up_goal()).await.unwrap();
        session.stop_execution().await.unwrap();
    }

    #[tokio::test]
    async fn test_controls_without_a_run() {
        let session =
            GoalExecutionSession::new(demo_config(0), Arc::new(ScriptedGateway::offline()));

        assert!(matches!(session.wait().await, Err(AutopilotError::NotStarted)));
        assert!(matches!(
            session.resume_execution().await,
            Err(AutopilotError::InvalidTransition { action: "resume", .. })
        ));
        assert_eq!(session.state().await, RunState::Idle);
    }

    struct BrokenValidation;

    #[async_trait]
    impl PhaseHandler for BrokenValidation {
        async fn run_phase(&self, ctx: &PhaseContext<'_>) -> Result<serde_json::Value> {
            match ctx.phase {
                Phase::Validation => Err(AutopilotError::Phase("metrics not met".to_string())),
                _ => Ok(serde_json::Value::Null),
            }
        }
    }

    #[tokio::test]
    async fn test_failed_run_reports_failure() {
        let (reports, callback) = recorder();
        let session = GoalExecutionSession::with_handler(
            Arc::new(demo_config(0)),
            Arc::new(BrokenValidation),
        )
        .on_complete(callback);
        let mut events = session.subscribe();

        session.start_execution(follow_up_goal()).await.unwrap();
        let outcome = session.wait().await.unwrap();

        assert_eq!(outcome.state, RunState::Failed);
        assert_eq!(outcome.failed_step, Some(3));
        assert_eq!(session.snapshot().await.progress, 75);

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].success);

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, crate::ExecutionEvent::RunFailed { .. }) {
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }
}

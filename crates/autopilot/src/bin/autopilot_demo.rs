use std::sync::Arc;

use anyhow::{anyhow, Context};
use autopilot::{
    AutopilotConfig, ExecutionEvent, GoalCatalog, GoalExecutionSession, HttpGateway, RunState,
};
use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_GOAL: &str = "send-follow-up-emails";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,autopilot={level},autopilot_demo={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string).context("Failed to create tracing filter")?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let catalog = GoalCatalog::builtin();
    let goal_id = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_GOAL.to_string());
    let goal = catalog.get(&goal_id).cloned().ok_or_else(|| {
        let known: Vec<_> = catalog.all().iter().map(|g| g.id.as_str()).collect();
        anyhow!("unknown goal '{}', expected one of: {}", goal_id, known.join(", "))
    })?;

    let config = AutopilotConfig::from_env();
    let gateway = Arc::new(HttpGateway::new(&config));
    let session = Arc::new(GoalExecutionSession::new(config, gateway).on_complete(|report| {
        tracing::info!(
            "Goal '{}' finished: success={} in {}ms (real mode: {})",
            report.goal_id,
            report.success,
            report.execution_time_ms,
            report.real_mode
        );
    }));

    let mut events = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::Log { line, .. } => println!("  {}", line),
                ExecutionEvent::Thought { text, .. } => println!("  ~ {}", text),
                ExecutionEvent::Progress { percent, .. } => println!("  [{:>3}%]", percent),
                ExecutionEvent::RunCompleted { .. } | ExecutionEvent::RunFailed { .. } => break,
                ExecutionEvent::StateChanged {
                    state: RunState::Idle,
                    ..
                } => break,
                _ => {}
            }
        }
    });

    session.start_execution(goal).await?;

    let interrupt = {
        let session = session.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, stopping run");
                if let Err(e) = session.stop_execution().await {
                    tracing::warn!("Stop failed: {}", e);
                }
            }
        })
    };

    let outcome = session.wait().await?;
    interrupt.abort();
    printer.await.ok();

    match session.snapshot().await.summary {
        Some(summary) if outcome.is_success() => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            println!(
                "Run ended {} {}",
                outcome.state,
                outcome.error.unwrap_or_default()
            );
        }
    }

    Ok(())
}

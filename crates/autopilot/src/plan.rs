//! Execution Plan Builder
//!
//! Turns a goal into the fixed four-phase plan and picks the execution agent with an
//! ordered keyword table.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{
    agents::{capabilities_for, Agent},
    goal::Goal,
    step::{ExecutionStep, Phase},
};

pub const PLANNING_AGENT: &str = "Strategy Planner";
pub const RESOURCE_AGENT: &str = "Resource Coordinator";
pub const VALIDATION_AGENT: &str = "Quality Validator";
pub const DEFAULT_EXECUTION_AGENT: &str = "Automation Agent";

struct AgentRule {
    agent: &'static str,
    keywords: &'static [&'static str],
    tools: &'static [&'static str],
}

/// First matching row wins
const EXECUTION_AGENT_RULES: &[AgentRule] = &[
    AgentRule {
        agent: "Email Automation Agent",
        keywords: &["email", "follow-up", "follow up", "newsletter", "outreach", "inbox"],
        tools: &["gmail", "outlook", "email"],
    },
    AgentRule {
        agent: "Scheduling Agent",
        keywords: &["calendar", "meeting", "schedule", "appointment", "demo booking"],
        tools: &["calendar", "google-calendar", "outlook-calendar", "calendly"],
    },
    AgentRule {
        agent: "Social Media Agent",
        keywords: &["social", "linkedin", "twitter", "post", "campaign", "content"],
        tools: &["linkedin", "twitter", "x", "facebook", "instagram"],
    },
    AgentRule {
        agent: "Sales Intelligence Agent",
        keywords: &["lead", "sales", "deal", "pipeline", "prospect", "crm"],
        tools: &["hubspot", "salesforce", "pipedrive", "crm"],
    },
    AgentRule {
        agent: "Customer Success Agent",
        keywords: &["support", "ticket", "customer", "onboarding", "churn"],
        tools: &["zendesk", "intercom", "freshdesk"],
    },
    AgentRule {
        agent: "Analytics Agent",
        keywords: &["report", "analytics", "dashboard", "metric", "kpi", "forecast"],
        tools: &["sheets", "google-sheets", "analytics"],
    },
];

/// Ordered plan for one goal run
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub goal: Goal,
    pub steps: Vec<ExecutionStep>,
    pub agents: Vec<Agent>,
}

impl ExecutionPlan {
    pub fn step(&self, phase: Phase) -> Option<&ExecutionStep> {
        self.steps.iter().find(|s| s.phase == phase)
    }

    pub fn execution_agent(&self) -> &str {
        self.step(Phase::Execution)
            .map(|s| s.agent.as_str())
            .unwrap_or(DEFAULT_EXECUTION_AGENT)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExecutionPlanBuilder;

impl ExecutionPlanBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the four-phase plan. Never fails.
    pub fn build(&self, goal: &Goal) -> ExecutionPlan {
        let execution_agent = select_execution_agent(goal);
        let tool_count = goal.tools_needed.len();

        let steps = vec![
            ExecutionStep::new(
                Phase::Planning,
                PLANNING_AGENT,
                format!("Analyze goal \"{}\" and define success criteria", goal.title),
            ),
            ExecutionStep::new(
                Phase::ResourceGathering,
                RESOURCE_AGENT,
                match tool_count {
                    0 => "Verify workspace access".to_string(),
                    1 => "Connect 1 required tool".to_string(),
                    n => format!("Connect {} required tools", n),
                },
            ),
            ExecutionStep::new(
                Phase::Execution,
                execution_agent,
                format!("Execute \"{}\"", goal.title),
            ),
            ExecutionStep::new(
                Phase::Validation,
                VALIDATION_AGENT,
                "Validate results against success metrics",
            ),
        ];

        let mut agents: Vec<Agent> = Vec::with_capacity(steps.len());
        for step in &steps {
            if !agents.iter().any(|a| a.name == step.agent) {
                agents.push(Agent::new(step.agent.clone(), capabilities_for(&step.agent)));
            }
        }

        tracing::debug!(
            "[PLAN] Built plan for '{}' with execution agent '{}'",
            goal.title,
            execution_agent
        );

        ExecutionPlan {
            goal: goal.clone(),
            steps,
            agents,
        }
    }
}

/// Deterministic keyword lookup over title, description and tools.
pub fn select_execution_agent(goal: &Goal) -> &'static str {
    let text = goal.search_text();

    EXECUTION_AGENT_RULES
        .iter()
        .find(|rule| {
            rule.keywords.iter().any(|k| text.contains(k))
                || goal
                    .tools_needed
                    .iter()
                    .any(|tool| rule.tools.contains(&tool.as_str()))
        })
        .map(|rule| rule.agent)
        .unwrap_or(DEFAULT_EXECUTION_AGENT)
}

//! Display agents assigned to plan phases

use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum AgentStatus {
    Idle,
    Working,
    Completed,
    Error,
}

/// UI projection of the logical actor behind a phase. Not a process or thread.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub capabilities: Vec<String>,
    pub status: AgentStatus,
    pub current_task: Option<String>,
}

impl Agent {
    pub fn new(name: impl Into<String>, capabilities: &[&str]) -> Self {
        let name = name.into();
        Self {
            id: name.to_lowercase().replace(' ', "-"),
            name,
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            status: AgentStatus::Idle,
            current_task: None,
        }
    }

    pub fn start_task(&mut self, task: impl Into<String>) {
        self.status = AgentStatus::Working;
        self.current_task = Some(task.into());
    }

    pub fn finish_task(&mut self) {
        self.status = AgentStatus::Completed;
        self.current_task = None;
    }

    pub fn fail_task(&mut self) {
        self.status = AgentStatus::Error;
    }
}

/// Capabilities shown for a known agent name.
pub fn capabilities_for(name: &str) -> &'static [&'static str] {
    match name {
        "Strategy Planner" => &["goal analysis", "task decomposition", "risk assessment"],
        "Resource Coordinator" => &["tool authentication", "data gathering", "access checks"],
        "Quality Validator" => &["result validation", "metric tracking", "reporting"],
        "Email Automation Agent" => &["email drafting", "personalization", "send scheduling"],
        "Scheduling Agent" => &["calendar management", "meeting coordination", "reminders"],
        "Social Media Agent" => &["content creation", "post scheduling", "engagement tracking"],
        "Sales Intelligence Agent" => &["lead scoring", "pipeline analysis", "crm sync"],
        "Customer Success Agent" => &["ticket triage", "sentiment analysis", "customer outreach"],
        "Analytics Agent" => &["data aggregation", "kpi reporting", "trend analysis"],
        _ => &["workflow automation", "tool orchestration"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_lifecycle() {
        let mut agent = Agent::new("Scheduling Agent", capabilities_for("Scheduling Agent"));
        assert_eq!(agent.id, "scheduling-agent");
        assert_eq!(agent.status, AgentStatus::Idle);
        assert_eq!(agent.capabilities.len(), 3);

        agent.start_task("Execution");
        assert_eq!(agent.status, AgentStatus::Working);
        assert_eq!(agent.current_task.as_deref(), Some("Execution"));

        agent.finish_task();
        assert_eq!(agent.status, AgentStatus::Completed);
        assert!(agent.current_task.is_none());
    }

    #[test]
    fn test_unknown_agent_gets_generic_capabilities() {
        assert_eq!(
            capabilities_for("Someone Else"),
            &["workflow automation", "tool orchestration"]
        );
    }
}

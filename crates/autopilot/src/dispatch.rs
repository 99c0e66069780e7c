//! Tool Action Dispatcher
//!
//! Runs one stub action per tool the goal needs, sequentially and in order. A failed
//! action is logged and skipped; it never aborts the run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{
    control::RunControl,
    gateway::ProviderGateway,
    goal::Goal,
    registry::ToolConnectionRegistry,
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum ToolKind {
    Email,
    Calendar,
    Social,
    Chat,
    Crm,
    Other,
}

impl ToolKind {
    pub fn from_tool_id(tool: &str) -> Self {
        match tool.to_lowercase().as_str() {
            "gmail" | "outlook" | "email" | "mail" => ToolKind::Email,
            "calendar" | "google-calendar" | "googlecalendar" | "outlook-calendar" | "calendly" => {
                ToolKind::Calendar
            }
            "linkedin" | "twitter" | "x" | "facebook" | "instagram" | "social" => ToolKind::Social,
            "slack" | "teams" | "discord" | "chat" => ToolKind::Chat,
            "hubspot" | "salesforce" | "pipedrive" | "crm" => ToolKind::Crm,
            _ => ToolKind::Other,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CrmContact {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CrmDeal {
    pub name: String,
    pub value: f64,
    pub stage: String,
}

/// Optional CRM data the stubs use to address and size their actions
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CrmContext {
    #[serde(default)]
    pub contacts: Vec<CrmContact>,
    #[serde(default)]
    pub deals: Vec<CrmDeal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ToolActionResult {
    pub tool: String,
    pub description: String,
    pub detail: String,
    pub impact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSummary {
    pub results: Vec<ToolActionResult>,
    pub tools_used: Vec<String>,
    pub succeeded: u32,
    pub attempted: u32,
    pub business_impact: String,
}

/// A stub's planned call: app, platform action, params, and how to describe success
struct PlannedAction {
    app: String,
    action: &'static str,
    params: serde_json::Value,
    description: String,
    detail: String,
    impact: String,
}

pub struct ToolActionDispatcher {
    registry: Arc<ToolConnectionRegistry>,
    gateway: Arc<dyn ProviderGateway>,
    entity_id: String,
}

impl ToolActionDispatcher {
    pub fn new(
        registry: Arc<ToolConnectionRegistry>,
        gateway: Arc<dyn ProviderGateway>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            gateway,
            entity_id: entity_id.into(),
        }
    }

    /// Run every tool action for the goal. Only cancellation is an error.
    pub async fn dispatch(
        &self,
        goal: &Goal,
        crm: Option<&CrmContext>,
        control: &RunControl,
    ) -> Result<DispatchSummary> {
        let mut results = Vec::new();

        for tool in &goal.tools_needed {
            control.checkpoint().await?;

            match control.guard(self.run_tool(tool, goal, crm)).await? {
                Some(result) => results.push(result),
                None => tracing::warn!("[DISPATCH] Tool '{}' failed, continuing", tool),
            }
        }

        let attempted = goal.tools_needed.len() as u32;
        let succeeded = results.len() as u32;
        let business_impact = aggregate_impact(goal, &results, attempted);

        tracing::info!(
            "[DISPATCH] {}/{} tool actions succeeded for goal '{}'",
            succeeded,
            attempted,
            goal.id
        );

        Ok(DispatchSummary {
            results,
            tools_used: goal.tools_needed.clone(),
            succeeded,
            attempted,
            business_impact,
        })
    }

    async fn run_tool(
        &self,
        tool: &str,
        goal: &Goal,
        crm: Option<&CrmContext>,
    ) -> Option<ToolActionResult> {
        let kind = ToolKind::from_tool_id(tool);
        let Some(planned) = plan_action(tool, kind, goal, crm) else {
            return Some(ToolActionResult {
                tool: tool.to_string(),
                description: format!("Ran {} automation", tool),
                detail: "No dedicated integration; no platform action sent".to_string(),
                impact: goal.business_impact_hint(),
            });
        };

        match self
            .registry
            .execute_action(
                &planned.app,
                &self.entity_id,
                planned.action,
                planned.params,
                self.gateway.as_ref(),
            )
            .await
        {
            Ok(_) => Some(ToolActionResult {
                tool: tool.to_string(),
                description: planned.description,
                detail: planned.detail,
                impact: planned.impact,
            }),
            Err(e) => {
                tracing::warn!("[DISPATCH] {} action {} failed: {}", tool, planned.action, e);
                None
            }
        }
    }
}

fn plan_action(
    tool: &str,
    kind: ToolKind,
    goal: &Goal,
    crm: Option<&CrmContext>,
) -> Option<PlannedAction> {
    let contacts = crm.map(|c| c.contacts.as_slice()).unwrap_or_default();
    let deals = crm.map(|c| c.deals.as_slice()).unwrap_or_default();

    let planned = match kind {
        ToolKind::Email => {
            let recipients: Vec<&str> = contacts.iter().take(25).map(|c| c.email.as_str()).collect();
            let audience = if recipients.is_empty() {
                "your follow-up list".to_string()
            } else {
                format!("{} contact{}", recipients.len(), plural(recipients.len()))
            };
            PlannedAction {
                app: tool.to_string(),
                action: platform_action(tool, kind),
                params: serde_json::json!({
                    "recipient_email": recipients,
                    "subject": goal.title,
                    "body": email_body(goal),
                }),
                description: "Sent personalized emails".to_string(),
                detail: format!("Delivered to {}", audience),
                impact: "Faster follow-up on open conversations".to_string(),
            }
        }
        ToolKind::Calendar => PlannedAction {
            app: tool.to_string(),
            action: platform_action(tool, kind),
            params: serde_json::json!({
                "summary": goal.title,
                "description": goal.description,
                "event_duration_minutes": 30,
            }),
            description: "Created calendar event".to_string(),
            detail: format!("Scheduled \"{}\"", goal.title),
            impact: "Meetings booked without back-and-forth".to_string(),
        },
        ToolKind::Social => PlannedAction {
            app: tool.to_string(),
            action: platform_action(tool, kind),
            params: serde_json::json!({ "text": social_copy(goal) }),
            description: format!("Published {} post", tool),
            detail: "Post queued for peak engagement window".to_string(),
            impact: "Broader reach for the campaign".to_string(),
        },
        ToolKind::Chat => PlannedAction {
            app: tool.to_string(),
            action: platform_action(tool, kind),
            params: serde_json::json!({
                "channel": "#general",
                "text": format!("Autopilot finished: {}", goal.title),
            }),
            description: "Posted team update".to_string(),
            detail: format!("Notified the team on {}", tool),
            impact: "Team kept in the loop automatically".to_string(),
        },
        ToolKind::Crm => {
            let pipeline: f64 = deals.iter().map(|d| d.value).sum();
            let detail = if deals.is_empty() && contacts.is_empty() {
                "CRM records checked; nothing to update".to_string()
            } else {
                format!(
                    "Synced {} contact{} and {} deal{} (${:.0} pipeline)",
                    contacts.len(),
                    plural(contacts.len()),
                    deals.len(),
                    plural(deals.len()),
                    pipeline
                )
            };
            PlannedAction {
                app: tool.to_string(),
                action: platform_action(tool, kind),
                params: serde_json::json!({ "contacts": contacts, "deals": deals }),
                description: "Synchronized CRM records".to_string(),
                detail,
                impact: "CRM data kept current".to_string(),
            }
        }
        ToolKind::Other => return None,
    };

    Some(planned)
}

/// Platform action per app; generic ids fall back to the kind's default app
const PLATFORM_ACTIONS: &[(&str, &str)] = &[
    ("gmail", "GMAIL_SEND_EMAIL"),
    ("outlook", "OUTLOOK_OUTLOOK_SEND_EMAIL"),
    ("google-calendar", "GOOGLECALENDAR_CREATE_EVENT"),
    ("googlecalendar", "GOOGLECALENDAR_CREATE_EVENT"),
    ("outlook-calendar", "OUTLOOK_OUTLOOK_CALENDAR_CREATE_EVENT"),
    ("calendly", "CALENDLY_CREATE_SCHEDULING_LINK"),
    ("linkedin", "LINKEDIN_CREATE_LINKED_IN_POST"),
    ("twitter", "TWITTER_CREATION_OF_A_POST"),
    ("x", "TWITTER_CREATION_OF_A_POST"),
    ("facebook", "FACEBOOK_CREATE_PAGE_POST"),
    ("instagram", "INSTAGRAM_CREATE_MEDIA_CONTAINER"),
    ("slack", "SLACK_SENDS_A_MESSAGE_TO_A_SLACK_CHANNEL"),
    ("teams", "MICROSOFT_TEAMS_CHATS_POST_MESSAGE"),
    ("discord", "DISCORD_CREATE_MESSAGE"),
    ("hubspot", "HUBSPOT_CREATE_OR_UPDATE_CONTACTS"),
    ("salesforce", "SALESFORCE_CREATE_CONTACT"),
    ("pipedrive", "PIPEDRIVE_ADD_A_PERSON"),
];

fn platform_action(tool: &str, kind: ToolKind) -> &'static str {
    let lookup = |app: &str| {
        PLATFORM_ACTIONS
            .iter()
            .find(|(id, _)| *id == app)
            .map(|(_, action)| *action)
    };
    let default_app = match kind {
        ToolKind::Email => "gmail",
        ToolKind::Calendar => "google-calendar",
        ToolKind::Social => "linkedin",
        ToolKind::Chat => "slack",
        ToolKind::Crm | ToolKind::Other => "hubspot",
    };
    lookup(&tool.to_lowercase())
        .or_else(|| lookup(default_app))
        .unwrap_or("HUBSPOT_CREATE_OR_UPDATE_CONTACTS")
}

fn email_body(goal: &Goal) -> String {
    if goal.description.is_empty() {
        format!("Hi,\n\nFollowing up regarding {}.\n\nBest regards", goal.title)
    } else {
        format!("Hi,\n\n{}\n\nBest regards", goal.description)
    }
}

fn social_copy(goal: &Goal) -> String {
    if goal.description.is_empty() {
        goal.title.clone()
    } else {
        format!("{}: {}", goal.title, goal.description)
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Wording depends on the fraction of tool actions that succeeded.
pub fn aggregate_impact(goal: &Goal, results: &[ToolActionResult], attempted: u32) -> String {
    let succeeded = results.len() as u32;
    let ratio = if attempted == 0 {
        1.0
    } else {
        succeeded as f64 / attempted as f64
    };

    let headline = if ratio >= 0.8 {
        "Exceeded expectations"
    } else if ratio >= 0.5 {
        "Met expectations"
    } else {
        "Partial success"
    };

    let mut impact = format!(
        "{}: {}/{} tool actions completed for \"{}\".",
        headline, succeeded, attempted, goal.title
    );
    for result in results {
        impact.push(' ');
        impact.push_str(&result.impact);
        impact.push('.');
    }
    impact
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{goal::GoalInput, test_support::ScriptedGateway, AutopilotError};
    use std::time::Duration;

    fn goal(tools: &[&str]) -> Goal {
        Goal::from_input(GoalInput::new("Send Follow-up Emails").with_tools(tools.to_vec())).unwrap()
    }

    fn dispatcher(gateway: ScriptedGateway) -> (ToolActionDispatcher, Arc<ScriptedGateway>) {
        let gateway = Arc::new(gateway);
        (
            ToolActionDispatcher::new(
                Arc::new(ToolConnectionRegistry::new()),
                gateway.clone(),
                "acme",
            ),
            gateway,
        )
    }

    #[test]
    fn test_tool_kinds() {
        assert_eq!(ToolKind::from_tool_id("Gmail"), ToolKind::Email);
        assert_eq!(ToolKind::from_tool_id("google-calendar"), ToolKind::Calendar);
        assert_eq!(ToolKind::from_tool_id("linkedin"), ToolKind::Social);
        assert_eq!(ToolKind::from_tool_id("slack"), ToolKind::Chat);
        assert_eq!(ToolKind::from_tool_id("hubspot"), ToolKind::Crm);
        assert_eq!(ToolKind::from_tool_id("notion"), ToolKind::Other);
    }

    #[tokio::test]
    async fn test_single_gmail_simulated_success() {
        let (dispatcher, gateway) = dispatcher(ScriptedGateway::offline());

        let summary = dispatcher
            .dispatch(&goal(&["gmail"]), None, &RunControl::new())
            .await
            .unwrap();

        assert_eq!(summary.tools_used, vec!["gmail"]);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.attempted, 1);
        assert!(summary.business_impact.starts_with("Exceeded expectations"));
        assert_eq!(summary.results[0].detail, "Delivered to your follow-up list");
        assert!(gateway.tool_calls().is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_skipped_and_degrade_wording() {
        let (dispatcher, gateway) = dispatcher(
            ScriptedGateway::offline()
                .with_tools()
                .fail_tool("GMAIL_SEND_EMAIL")
                .fail_tool("SLACK_SENDS_A_MESSAGE_TO_A_SLACK_CHANNEL"),
        );

        let summary = dispatcher
            .dispatch(&goal(&["gmail", "slack", "hubspot"]), None, &RunControl::new())
            .await
            .unwrap();

        // every tool was still attempted, in order
        let actions: Vec<_> = gateway.tool_calls().into_iter().map(|c| c.action).collect();
        assert_eq!(
            actions,
            vec![
                "GMAIL_SEND_EMAIL",
                "SLACK_SENDS_A_MESSAGE_TO_A_SLACK_CHANNEL",
                "HUBSPOT_CREATE_OR_UPDATE_CONTACTS"
            ]
        );
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.tools_used, vec!["gmail", "slack", "hubspot"]);
        assert!(summary.business_impact.starts_with("Partial success"));
    }

    #[tokio::test]
    async fn test_each_app_gets_its_own_action() {
        let (dispatcher, gateway) = dispatcher(ScriptedGateway::offline().with_tools());

        let summary = dispatcher
            .dispatch(
                &goal(&["outlook", "teams", "salesforce", "outlook-calendar", "facebook", "x"]),
                None,
                &RunControl::new(),
            )
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 6);

        let actions: Vec<_> = gateway.tool_calls().into_iter().map(|c| c.action).collect();
        assert_eq!(
            actions,
            vec![
                "OUTLOOK_OUTLOOK_SEND_EMAIL",
                "MICROSOFT_TEAMS_CHATS_POST_MESSAGE",
                "SALESFORCE_CREATE_CONTACT",
                "OUTLOOK_OUTLOOK_CALENDAR_CREATE_EVENT",
                "FACEBOOK_CREATE_PAGE_POST",
                "TWITTER_CREATION_OF_A_POST"
            ]
        );
    }

    #[test]
    fn test_generic_tool_ids_use_default_app() {
        assert_eq!(platform_action("email", ToolKind::Email), "GMAIL_SEND_EMAIL");
        assert_eq!(
            platform_action("calendar", ToolKind::Calendar),
            "GOOGLECALENDAR_CREATE_EVENT"
        );
        assert_eq!(
            platform_action("chat", ToolKind::Chat),
            "SLACK_SENDS_A_MESSAGE_TO_A_SLACK_CHANNEL"
        );
        assert_eq!(
            platform_action("crm", ToolKind::Crm),
            "HUBSPOT_CREATE_OR_UPDATE_CONTACTS"
        );
    }

    #[tokio::test]
    async fn test_met_expectations_band() {
        let (dispatcher, _) = dispatcher(
            ScriptedGateway::offline()
                .with_tools()
                .fail_tool("GOOGLECALENDAR_CREATE_EVENT"),
        );

        let summary = dispatcher
            .dispatch(&goal(&["gmail", "calendar"]), None, &RunControl::new())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert!(summary.business_impact.starts_with("Met expectations"));
    }

    #[tokio::test]
    async fn test_unknown_tool_echoes_goal_impact() {
        let mut input = GoalInput::new("Update docs").with_tools(["notion"]);
        input.roi = Some("2 hours saved weekly".to_string());
        let g = Goal::from_input(input).unwrap();
        let (dispatcher, gateway) = dispatcher(ScriptedGateway::offline().with_tools());

        let summary = dispatcher.dispatch(&g, None, &RunControl::new()).await.unwrap();
        assert_eq!(summary.results[0].impact, "2 hours saved weekly");
        assert_eq!(
            summary.results[0].detail,
            "No dedicated integration; no platform action sent"
        );
        assert!(gateway.tool_calls().is_empty());
    }

    #[tokio::test]
    async fn test_crm_context_enriches_details() {
        let crm = CrmContext {
            contacts: vec![
                CrmContact {
                    name: "Ada".to_string(),
                    email: "ada@example.com".to_string(),
                    company: None,
                },
                CrmContact {
                    name: "Grace".to_string(),
                    email: "grace@example.com".to_string(),
                    company: Some("Navy".to_string()),
                },
            ],
            deals: vec![CrmDeal {
                name: "Renewal".to_string(),
                value: 12000.0,
                stage: "negotiation".to_string(),
            }],
        };
        let (dispatcher, gateway) = dispatcher(ScriptedGateway::offline().with_tools());

        let summary = dispatcher
            .dispatch(&goal(&["gmail", "hubspot"]), Some(&crm), &RunControl::new())
            .await
            .unwrap();

        assert_eq!(summary.results[0].detail, "Delivered to 2 contacts");
        assert_eq!(
            summary.results[1].detail,
            "Synced 2 contacts and 1 deal ($12000 pipeline)"
        );
        let calls = gateway.tool_calls();
        assert_eq!(calls[0].params["recipient_email"][1], "grace@example.com");
        assert_eq!(calls[0].entity_id, "acme");
    }

    #[tokio::test]
    async fn test_no_tools_counts_as_success() {
        let (dispatcher, _) = dispatcher(ScriptedGateway::offline());
        let summary = dispatcher
            .dispatch(&goal(&[]), None, &RunControl::new())
            .await
            .unwrap();
        assert_eq!(summary.attempted, 0);
        assert!(summary.business_impact.starts_with("Exceeded expectations"));
    }

    #[tokio::test]
    async fn test_stop_aborts_dispatch() {
        let (dispatcher, _) = dispatcher(
            ScriptedGateway::offline()
                .with_tools()
                .with_tool_delay(Duration::from_secs(30)),
        );
        let control = RunControl::new();
        let stopper = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stopper.stop();
        });

        let result = dispatcher.dispatch(&goal(&["gmail"]), None, &control).await;
        assert!(matches!(result, Err(AutopilotError::Cancelled)));
    }
}

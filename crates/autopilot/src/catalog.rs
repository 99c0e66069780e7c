//! Built-in goal library offered by the goal explorer

use crate::goal::{Complexity, Goal, GoalCategory, GoalInput};

struct Template {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    category: &'static str,
    priority: &'static str,
    complexity: &'static str,
    tools: &'static [&'static str],
    estimated_time: &'static str,
    roi: &'static str,
    metrics: &'static [&'static str],
}

const BUILTIN: &[Template] = &[
    Template {
        id: "send-follow-up-emails",
        title: "Send Follow-up Emails",
        description: "Send personalized follow-up emails to contacts from recent meetings",
        category: "sales",
        priority: "high",
        complexity: "simple",
        tools: &["gmail"],
        estimated_time: "5 minutes",
        roi: "Recover 2-3 hours of manual follow-up per week",
        metrics: &["Emails delivered", "Reply rate above 15%"],
    },
    Template {
        id: "schedule-discovery-meetings",
        title: "Schedule Discovery Meetings",
        description: "Book discovery calls with qualified leads and send calendar invites",
        category: "sales",
        priority: "medium",
        complexity: "moderate",
        tools: &["google-calendar", "gmail"],
        estimated_time: "15 minutes",
        roi: "Shorter time from qualification to first call",
        metrics: &["Meetings booked", "No-show rate below 10%"],
    },
    Template {
        id: "launch-social-campaign",
        title: "Launch Social Campaign",
        description: "Publish a coordinated product announcement across social channels",
        category: "marketing",
        priority: "medium",
        complexity: "moderate",
        tools: &["linkedin", "twitter", "slack"],
        estimated_time: "20 minutes",
        roi: "Consistent reach without manual cross-posting",
        metrics: &["Posts published", "Engagement rate"],
    },
    Template {
        id: "score-inbound-leads",
        title: "Score Inbound Leads",
        description: "Score new inbound leads and sync priorities back to the CRM",
        category: "sales",
        priority: "critical",
        complexity: "complex",
        tools: &["hubspot"],
        estimated_time: "45 minutes",
        roi: "Sales time focused on the highest-intent prospects",
        metrics: &["Leads scored", "Conversion rate of top tier"],
    },
    Template {
        id: "triage-support-tickets",
        title: "Triage Support Tickets",
        description: "Route open support tickets and notify the on-call channel",
        category: "customer success",
        priority: "high",
        complexity: "moderate",
        tools: &["zendesk", "slack"],
        estimated_time: "10 minutes",
        roi: "Faster first response on urgent tickets",
        metrics: &["Tickets routed", "First response under 1 hour"],
    },
    Template {
        id: "weekly-pipeline-report",
        title: "Weekly Pipeline Report",
        description: "Compile pipeline metrics into a report and share it with the team",
        category: "analytics",
        priority: "low",
        complexity: "simple",
        tools: &["hubspot", "slack"],
        estimated_time: "5 minutes",
        roi: "",
        metrics: &["Report delivered every Monday"],
    },
];

#[derive(Debug, Clone)]
pub struct GoalCatalog {
    goals: Vec<Goal>,
}

impl GoalCatalog {
    pub fn new(goals: Vec<Goal>) -> Self {
        Self { goals }
    }

    /// The goals shipped with the dashboard
    pub fn builtin() -> Self {
        let goals = BUILTIN
            .iter()
            .filter_map(|t| {
                let mut input = GoalInput::new(t.title)
                    .with_description(t.description)
                    .with_category(t.category)
                    .with_complexity(t.complexity)
                    .with_tools(t.tools.iter().copied());
                input.id = Some(t.id.to_string());
                input.priority = Some(t.priority.to_string());
                input.estimated_time = Some(t.estimated_time.to_string());
                if !t.roi.is_empty() {
                    input.roi = Some(t.roi.to_string());
                }
                input.success_metrics = t.metrics.iter().map(|m| m.to_string()).collect();

                match Goal::from_input(input) {
                    Ok(goal) => Some(goal),
                    Err(e) => {
                        tracing::error!("[CATALOG] Skipping builtin goal '{}': {}", t.id, e);
                        None
                    }
                }
            })
            .collect();
        Self { goals }
    }

    pub fn all(&self) -> &[Goal] {
        &self.goals
    }

    pub fn get(&self, id: &str) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    pub fn by_category(&self, category: GoalCategory) -> Vec<&Goal> {
        self.goals.iter().filter(|g| g.category == category).collect()
    }

    pub fn by_complexity(&self, complexity: Complexity) -> Vec<&Goal> {
        self.goals
            .iter()
            .filter(|g| g.complexity == complexity)
            .collect()
    }

    /// Case-insensitive match on title, description and tool ids
    pub fn search(&self, query: &str) -> Vec<&Goal> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.goals.iter().collect();
        }
        self.goals
            .iter()
            .filter(|g| {
                g.search_text().contains(&query) || g.tools_needed.iter().any(|t| t.contains(&query))
            })
            .collect()
    }
}

impl Default for GoalCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

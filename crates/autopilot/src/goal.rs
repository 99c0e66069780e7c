//! Goal model
//!
//! `GoalInput` is the loose shape the dashboard sends; `Goal` is the validated,
//! defaults-resolved form the orchestrator works with.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{AutopilotError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum GoalCategory {
    Sales,
    Marketing,
    CustomerSuccess,
    Operations,
    Analytics,
    General,
}

impl GoalCategory {
    pub fn parse(raw: &str) -> Self {
        match normalize(raw).as_str() {
            "sales" | "lead generation" | "leads" => GoalCategory::Sales,
            "marketing" | "social" | "content" => GoalCategory::Marketing,
            "customer success" | "customersuccess" | "support" | "customer service" => {
                GoalCategory::CustomerSuccess
            }
            "operations" | "ops" | "productivity" => GoalCategory::Operations,
            "analytics" | "reporting" => GoalCategory::Analytics,
            _ => GoalCategory::General,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GoalCategory::Sales => "Sales",
            GoalCategory::Marketing => "Marketing",
            GoalCategory::CustomerSuccess => "Customer Success",
            GoalCategory::Operations => "Operations",
            GoalCategory::Analytics => "Analytics",
            GoalCategory::General => "General",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum GoalPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl GoalPriority {
    pub fn parse(raw: &str) -> Self {
        match normalize(raw).as_str() {
            "low" => GoalPriority::Low,
            "high" => GoalPriority::High,
            "critical" | "urgent" => GoalPriority::Critical,
            _ => GoalPriority::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn parse(raw: &str) -> Self {
        match normalize(raw).as_str() {
            "simple" | "easy" | "low" => Complexity::Simple,
            "complex" | "advanced" | "hard" | "high" => Complexity::Complex,
            _ => Complexity::Moderate,
        }
    }

    pub fn default_estimated_time(self) -> &'static str {
        match self {
            Complexity::Simple => "5 minutes",
            Complexity::Moderate => "15 minutes",
            Complexity::Complex => "45 minutes",
        }
    }
}

/// Goal as delivered by dashboard data or config. Only the title is mandatory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalInput {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub complexity: Option<String>,
    #[serde(default)]
    pub tools_needed: Vec<String>,
    #[serde(default)]
    pub agents_required: Vec<String>,
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub roi: Option<String>,
    #[serde(default)]
    pub success_metrics: Vec<String>,
}

impl GoalInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools_needed = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_complexity(mut self, complexity: impl Into<String>) -> Self {
        self.complexity = Some(complexity.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A unit of automation work. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: GoalCategory,
    pub priority: GoalPriority,
    pub complexity: Complexity,
    pub tools_needed: Vec<String>,
    pub agents_required: Vec<String>,
    pub estimated_time: String,
    pub roi: String,
    pub success_metrics: Vec<String>,
}

impl Goal {
    /// Validate an input and resolve every default.
    pub fn from_input(input: GoalInput) -> Result<Self> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(AutopilotError::InvalidGoal(
                "goal title must not be empty".to_string(),
            ));
        }

        let id = input
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| slugify(&title));

        let complexity = input
            .complexity
            .as_deref()
            .map(Complexity::parse)
            .unwrap_or(Complexity::Moderate);

        let mut tools_needed: Vec<String> = Vec::new();
        for tool in input.tools_needed {
            let tool = tool.trim().to_lowercase();
            if !tool.is_empty() && !tools_needed.contains(&tool) {
                tools_needed.push(tool);
            }
        }

        Ok(Self {
            id,
            description: input
                .description
                .map(|d| d.trim().to_string())
                .unwrap_or_default(),
            category: input
                .category
                .as_deref()
                .map(GoalCategory::parse)
                .unwrap_or(GoalCategory::General),
            priority: input
                .priority
                .as_deref()
                .map(GoalPriority::parse)
                .unwrap_or(GoalPriority::Medium),
            complexity,
            tools_needed,
            agents_required: input
                .agents_required
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            estimated_time: input
                .estimated_time
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| complexity.default_estimated_time().to_string()),
            roi: input.roi.map(|r| r.trim().to_string()).unwrap_or_default(),
            success_metrics: input.success_metrics,
            title,
        })
    }

    /// ROI text if present, otherwise a sentence derived from the category.
    pub fn business_impact_hint(&self) -> String {
        if !self.roi.is_empty() {
            return self.roi.clone();
        }
        format!(
            "Streamlined {} workflow for \"{}\"",
            self.category.label().to_lowercase(),
            self.title
        )
    }

    /// Lower-cased title and description, used for keyword matching.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase().replace(['_', '-'], " ")
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "goal".to_string()
    } else {
        slug
    }
}

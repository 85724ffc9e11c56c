//! Structured plan produced by the enhancement step.
//!
//! A plan is immutable once built; the markdown rendering is a pure
//! function of its fields so the persisted document can be regenerated
//! byte-for-byte from the same data.

use serde::{Deserialize, Serialize};

/// Classification of the work described by a brief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkType {
    NewProject,
    Feature,
    Hotfix,
    Refactor,
    Enhancement,
    Documentation,
}

impl WorkType {
    /// Wire label as it appears in LLM responses and metadata sidecars.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkType::NewProject => "NEW_PROJECT",
            WorkType::Feature => "FEATURE",
            WorkType::Hotfix => "HOTFIX",
            WorkType::Refactor => "REFACTOR",
            WorkType::Enhancement => "ENHANCEMENT",
            WorkType::Documentation => "DOCUMENTATION",
        }
    }

    /// Parse a wire label, falling back to `Feature` for anything the
    /// upstream model invents outside the fixed enumeration.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "NEW_PROJECT" => WorkType::NewProject,
            "HOTFIX" => WorkType::Hotfix,
            "REFACTOR" => WorkType::Refactor,
            "ENHANCEMENT" => WorkType::Enhancement,
            "DOCUMENTATION" => WorkType::Documentation,
            _ => WorkType::Feature,
        }
    }
}

impl Default for WorkType {
    fn default() -> Self {
        WorkType::Feature
    }
}

impl std::fmt::Display for WorkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form section of a plan (title + prose content).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSection {
    pub title: String,
    pub content: String,
}

/// LLM-structured breakdown of a brief.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredPlan {
    pub work_type: WorkType,
    pub summary: String,
    pub objectives: Vec<String>,
    pub risks: Vec<String>,
    pub milestones: Vec<String>,
    pub sections: Vec<PlanSection>,
    pub acceptance_criteria: Vec<String>,
    pub suggested_story_id: Option<String>,
    /// The input text exactly as it entered the enhancement step.
    pub original_brief: String,
}

impl StructuredPlan {
    /// Render the plan to the persisted markdown document.
    ///
    /// Empty list fields are omitted entirely; ordering is fixed.
    pub fn to_markdown(&self) -> String {
        let mut lines: Vec<String> = vec![
            format!("# {} Plan", self.work_type),
            String::new(),
            format!("**Summary**: {}", self.summary),
            String::new(),
        ];
        if !self.objectives.is_empty() {
            lines.push("## Objectives".to_string());
            lines.extend(self.objectives.iter().map(|item| format!("- {}", item)));
            lines.push(String::new());
        }
        if !self.risks.is_empty() {
            lines.push("## Risks & Unknowns".to_string());
            lines.extend(self.risks.iter().map(|item| format!("- {}", item)));
            lines.push(String::new());
        }
        if !self.milestones.is_empty() {
            lines.push("## Recommended Milestones".to_string());
            for (index, milestone) in self.milestones.iter().enumerate() {
                lines.push(format!("{}. {}", index + 1, milestone));
            }
            lines.push(String::new());
        }
        for section in &self.sections {
            lines.push(format!("## {}", section.title));
            lines.push(section.content.trim().to_string());
            lines.push(String::new());
        }
        if !self.acceptance_criteria.is_empty() {
            lines.push("## Acceptance Criteria".to_string());
            lines.extend(
                self.acceptance_criteria
                    .iter()
                    .map(|item| format!("- [ ] {}", item)),
            );
            lines.push(String::new());
        }
        lines.push("## Original Brief".to_string());
        lines.push(format!("> {}", self.original_brief));
        lines.push(String::new());
        if let Some(ref suggested) = self.suggested_story_id {
            lines.push(format!("_Suggested Story ID_: {}", suggested));
            lines.push(String::new());
        }
        let mut rendered = lines.join("\n").trim().to_string();
        rendered.push('\n');
        rendered
    }
}

/// JSON metadata sidecar written next to each rendered document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub story_id: String,
    pub work_type: WorkType,
    pub summary: String,
    pub objectives: Vec<String>,
    pub risks: Vec<String>,
    pub milestones: Vec<String>,
    pub acceptance_criteria: Vec<String>,
    pub suggested_story_id: Option<String>,
}

impl PlanMetadata {
    pub fn from_plan(story_id: &str, plan: &StructuredPlan) -> Self {
        Self {
            story_id: story_id.to_string(),
            work_type: plan.work_type,
            summary: plan.summary.clone(),
            objectives: plan.objectives.clone(),
            risks: plan.risks.clone(),
            milestones: plan.milestones.clone(),
            acceptance_criteria: plan.acceptance_criteria.clone(),
            suggested_story_id: plan.suggested_story_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> StructuredPlan {
        StructuredPlan {
            work_type: WorkType::Feature,
            summary: "Add push-to-talk capture".to_string(),
            objectives: vec!["Capture audio".to_string(), "Transcribe locally".to_string()],
            risks: vec!["Mic permissions".to_string()],
            milestones: vec!["Prototype".to_string(), "Ship".to_string()],
            sections: vec![PlanSection {
                title: "Approach".to_string(),
                content: "Hold the hotkey and speak.".to_string(),
            }],
            acceptance_criteria: vec!["Transcript saved".to_string()],
            suggested_story_id: Some("US-5.1".to_string()),
            original_brief: "Implement push-to-talk workflow".to_string(),
        }
    }

    #[test]
    fn markdown_has_fixed_heading_and_brief_quote() {
        let md = sample_plan().to_markdown();
        assert!(md.starts_with("# FEATURE Plan\n"));
        assert!(md.contains("## Original Brief\n> Implement push-to-talk workflow"));
        assert!(md.contains("_Suggested Story ID_: US-5.1"));
        assert!(md.ends_with('\n'));
    }

    #[test]
    fn markdown_numbers_milestones_in_order() {
        let md = sample_plan().to_markdown();
        let prototype = md.find("1. Prototype").unwrap();
        let ship = md.find("2. Ship").unwrap();
        assert!(prototype < ship);
    }

    #[test]
    fn markdown_omits_empty_list_sections() {
        let mut plan = sample_plan();
        plan.objectives.clear();
        plan.risks.clear();
        plan.milestones.clear();
        plan.acceptance_criteria.clear();
        plan.sections.clear();
        let md = plan.to_markdown();
        assert!(!md.contains("## Objectives"));
        assert!(!md.contains("## Risks & Unknowns"));
        assert!(!md.contains("## Recommended Milestones"));
        assert!(!md.contains("## Acceptance Criteria"));
        assert!(md.contains("## Original Brief"));
    }

    #[test]
    fn rendering_is_pure() {
        let plan = sample_plan();
        assert_eq!(plan.to_markdown(), plan.to_markdown());
    }

    #[test]
    fn work_type_round_trips_through_serde() {
        let json = serde_json::to_string(&WorkType::NewProject).unwrap();
        assert_eq!(json, "\"NEW_PROJECT\"");
        let parsed: WorkType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, WorkType::NewProject);
    }

    #[test]
    fn unknown_work_type_falls_back_to_feature() {
        assert_eq!(WorkType::parse_lenient("EPIC"), WorkType::Feature);
        assert_eq!(WorkType::parse_lenient("hotfix"), WorkType::Hotfix);
    }
}

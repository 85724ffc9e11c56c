//! OpenAI adapter for prompt enhancement.
//!
//! Calls the chat completions endpoint with a JSON response format and
//! shapes the reply into a `StructuredPlan`. Field parsing is lenient:
//! missing arrays become empty, unknown work types fall back to FEATURE.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::OpenAiSettings;
use crate::domain::{PlanSection, StructuredPlan, WorkType};

use super::Enhancer;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = r#"You are an elite software architect and product lead. Transform terse engineering briefs into full, actionable plans.

Return a JSON object with:
- work_type: one of ["NEW_PROJECT","FEATURE","HOTFIX","REFACTOR","ENHANCEMENT","DOCUMENTATION"]
- summary: concise high-level summary
- objectives: array of key goals
- risks: array of notable risks or unknowns
- recommended_milestones: ordered array of milestone labels
- sections: array of objects { "title": str, "content": str } tailored to the work
- acceptance_criteria: array of verifiable bullets
- suggested_story_id: optional recommended story ID slug (e.g., "US-4.2")

Focus on relevance. Include only sections that serve the work described in the brief."#;

/// Enhancement adapter backed by the OpenAI API.
pub struct OpenAiEnhancer {
    settings: OpenAiSettings,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl OpenAiEnhancer {
    pub fn new(settings: OpenAiSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        let base = self
            .settings
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{}/chat/completions", base)
    }
}

#[async_trait]
impl Enhancer for OpenAiEnhancer {
    async fn enhance(&self, brief: &str) -> Result<StructuredPlan> {
        let brief = brief.trim();
        anyhow::ensure!(!brief.is_empty(), "brief must be non-empty");

        let request = ChatRequest {
            model: &self.settings.model,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_output_tokens,
            response_format: ResponseFormat { kind: "json_object" },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: brief,
                },
            ],
        };

        debug!(model = %self.settings.model, "requesting plan enhancement");

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .json(&request)
            .send()
            .await
            .context("failed to reach the enhancement endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("enhancement request failed ({}): {}", status, body);
        }

        let reply: ChatResponse = response
            .json()
            .await
            .context("failed to decode enhancement response")?;
        let content = reply
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .context("enhancement response contained no choices")?;

        let payload: Value =
            serde_json::from_str(content).context("enhancement reply was not valid JSON")?;
        Ok(plan_from_payload(&payload, brief))
    }
}

/// Shape the model's JSON payload into a plan, tolerating absent fields.
fn plan_from_payload(payload: &Value, brief: &str) -> StructuredPlan {
    let sections = payload
        .get("sections")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| PlanSection {
                    title: item
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or("Details")
                        .to_string(),
                    content: item
                        .get("content")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .trim()
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    StructuredPlan {
        work_type: payload
            .get("work_type")
            .and_then(Value::as_str)
            .map(WorkType::parse_lenient)
            .unwrap_or_default(),
        summary: payload
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        objectives: string_list(payload.get("objectives")),
        risks: string_list(payload.get("risks")),
        milestones: string_list(payload.get("recommended_milestones")),
        sections,
        acceptance_criteria: string_list(payload.get("acceptance_criteria")),
        suggested_story_id: payload
            .get("suggested_story_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        original_brief: brief.to_string(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_parses_into_plan() {
        let payload: Value = serde_json::from_str(
            r#"{
                "work_type": "REFACTOR",
                "summary": " Split the module ",
                "objectives": ["one", " two "],
                "risks": ["regression"],
                "recommended_milestones": ["extract", "verify"],
                "sections": [{"title": "Scope", "content": " just the parser "}],
                "acceptance_criteria": ["tests pass"],
                "suggested_story_id": "US-4.2"
            }"#,
        )
        .unwrap();

        let plan = plan_from_payload(&payload, "refactor the parser");
        assert_eq!(plan.work_type, WorkType::Refactor);
        assert_eq!(plan.summary, "Split the module");
        assert_eq!(plan.objectives, vec!["one", "two"]);
        assert_eq!(plan.milestones, vec!["extract", "verify"]);
        assert_eq!(plan.sections[0].content, "just the parser");
        assert_eq!(plan.suggested_story_id.as_deref(), Some("US-4.2"));
        assert_eq!(plan.original_brief, "refactor the parser");
    }

    #[test]
    fn missing_fields_default_cleanly() {
        let payload: Value = serde_json::from_str(r#"{"summary": "minimal"}"#).unwrap();
        let plan = plan_from_payload(&payload, "brief");
        assert_eq!(plan.work_type, WorkType::Feature);
        assert!(plan.objectives.is_empty());
        assert!(plan.sections.is_empty());
        assert!(plan.suggested_story_id.is_none());
    }

    #[test]
    fn endpoint_respects_base_url_override() {
        let enhancer = OpenAiEnhancer::new(OpenAiSettings {
            api_key: "k".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_output_tokens: 1800,
            base_url: Some("http://localhost:8080/v1/".to_string()),
        });
        assert_eq!(enhancer.endpoint(), "http://localhost:8080/v1/chat/completions");
    }
}

//! Language-model helpers for comments: cluster summaries and screening.

use crate::config::Prompts;
use crate::error::{Result, TubeTalkError};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, instrument};

/// Screening label for a single comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Appropriate,
    Neutral,
    Negative,
    Inappropriate,
}

impl Verdict {
    /// Only comments labelled appropriate are shown as answers.
    pub fn is_displayable(&self) -> bool {
        matches!(self, Verdict::Appropriate)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Appropriate => "appropriate",
            Verdict::Neutral => "neutral",
            Verdict::Negative => "negative",
            Verdict::Inappropriate => "inappropriate",
        };
        f.write_str(label)
    }
}

/// Summarizes and screens comments.
#[async_trait]
pub trait CommentAssistant: Send + Sync {
    /// One-sentence summary of a group of similar comments.
    async fn summarize(&self, comments: &[String]) -> Result<String>;

    /// One verdict per comment, in input order.
    async fn screen(&self, comments: &[String]) -> Result<Vec<Verdict>>;
}

/// Chat-completion backed assistant.
pub struct OpenAIAssistant {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    prompts: Prompts,
}

impl OpenAIAssistant {
    pub fn new(model: &str) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: model.to_string(),
            prompts: Prompts::default(),
        })
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    async fn complete(&self, system: &str, user: String, temperature: f32) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(|e| TubeTalkError::InvalidInput(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| TubeTalkError::InvalidInput(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(temperature)
            .build()
            .map_err(|e| TubeTalkError::InvalidInput(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            TubeTalkError::UpstreamUnavailable(format!("Failed to generate response: {}", e))
        })?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| TubeTalkError::UpstreamUnavailable("Empty response from LLM".to_string()))
    }
}

#[async_trait]
impl CommentAssistant for OpenAIAssistant {
    #[instrument(skip_all, fields(count = comments.len()))]
    async fn summarize(&self, comments: &[String]) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("comments".to_string(), comments.join("\n"));

        let user = self.prompts.render_with_custom(&self.prompts.summary.user, &vars);
        let summary = self.complete(&self.prompts.summary.system, user, 0.3).await?;
        Ok(clean_summary(&summary))
    }

    #[instrument(skip_all, fields(count = comments.len()))]
    async fn screen(&self, comments: &[String]) -> Result<Vec<Verdict>> {
        if comments.is_empty() {
            return Ok(Vec::new());
        }

        let numbered: Vec<String> = comments
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i + 1, c.replace('\n', " ")))
            .collect();

        let mut vars = HashMap::new();
        vars.insert("count".to_string(), comments.len().to_string());
        vars.insert("comments".to_string(), numbered.join("\n"));

        let user = self.prompts.render_with_custom(&self.prompts.screening.user, &vars);
        let raw = self.complete(&self.prompts.screening.system, user, 0.0).await?;
        debug!("Screening response: {}", raw);

        parse_verdicts(&raw, comments.len())
    }
}

/// Strip prefixes and quotes the model sometimes echoes back.
fn clean_summary(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("TLDR:").unwrap_or(trimmed).trim();
    trimmed.trim_matches('"').trim().to_string()
}

/// Parse the JSON label array out of a screening reply.
fn parse_verdicts(raw: &str, expected: usize) -> Result<Vec<Verdict>> {
    let start = raw.find('[');
    let end = raw.rfind(']');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            return Err(TubeTalkError::ContractMismatch(format!(
                "screening reply has no label array: {}",
                raw
            )))
        }
    };

    let verdicts: Vec<Verdict> = serde_json::from_str(json)?;
    if verdicts.len() != expected {
        return Err(TubeTalkError::ContractMismatch(format!(
            "screening returned {} labels for {} comments",
            verdicts.len(),
            expected
        )));
    }
    Ok(verdicts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verdicts() {
        let raw = "Here you go:\n```json\n[\"appropriate\", \"negative\", \"neutral\"]\n```";
        let verdicts = parse_verdicts(raw, 3).unwrap();
        assert_eq!(
            verdicts,
            vec![Verdict::Appropriate, Verdict::Negative, Verdict::Neutral]
        );
    }

    #[test]
    fn test_parse_verdicts_count_mismatch() {
        assert!(matches!(
            parse_verdicts(r#"["appropriate"]"#, 2),
            Err(TubeTalkError::ContractMismatch(_))
        ));
        assert!(parse_verdicts("no labels", 1).is_err());
        assert!(parse_verdicts(r#"["rude"]"#, 1).is_err());
    }

    #[test]
    fn test_clean_summary() {
        assert_eq!(
            clean_summary("TLDR: \"Why didn't Magnus just move his King?\"\n"),
            "Why didn't Magnus just move his King?"
        );
        assert_eq!(clean_summary("plain"), "plain");
    }

    #[test]
    fn test_only_appropriate_is_displayable() {
        assert!(Verdict::Appropriate.is_displayable());
        assert!(!Verdict::Neutral.is_displayable());
        assert!(!Verdict::Inappropriate.is_displayable());
        assert_eq!(Verdict::Negative.to_string(), "negative");
    }
}

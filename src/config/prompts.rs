//! Prompt templates for TubeTalk.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub summary: SummaryPrompts,
    /// Prompts for screening answers before they are shown.
    pub screening: ScreeningPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for summarizing a cluster of comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryPrompts {
    pub system: String,
    pub user: String,
}

impl Default for SummaryPrompts {
    fn default() -> Self {
        Self {
            system: r#"You summarize groups of YouTube comments that say roughly the same thing.

Write a single short sentence, in the voice of a commenter, that captures what the group is saying.

Examples:

Comments:
At that time Magnus was having stomach issues so he offered a draw
For anyone confused Magnus had a bad stomach and offered a draw, his opponent accepted it.
What a man accepting the draw so Magnus could go to the bathroom
TLDR: Magnus had a stomach ache and he offered a draw, which his opponent accepted

Comments:
never knew Thor is a good chess player
I didn't know Thor played chess
Damn Thor plays chess?
TLDR: I never knew Thor played chess

Comments:
YouTube algorithm blessed us again.
The youtube algorithm just does what it wants these days
Here because of YouTube's algorithm..
TLDR: I'm here because of the YouTube algorithm

Reply with the sentence only, without the TLDR prefix or quotes."#
                .to_string(),

            user: r#"Comments:
{{comments}}
TLDR:"#
                .to_string(),
        }
    }
}

/// Prompts for classifying whether comments are fit to display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningPrompts {
    pub system: String,
    pub user: String,
}

impl Default for ScreeningPrompts {
    fn default() -> Self {
        Self {
            system: r#"You moderate YouTube comments before they are shown as answers to a viewer's question.

Label every comment with exactly one of:
- "appropriate": friendly or constructive
- "neutral": opinionated or critical but civil
- "negative": dismissive or mildly rude ("This is stupid", "looks like crap")
- "inappropriate": insulting, obscene or spam ("This is dumb", "This is shit")

Respond with a JSON array of labels, one per comment, in the same order. Example:
["appropriate", "neutral", "inappropriate"]"#
                .to_string(),

            user: r#"Label these {{count}} comments:

{{comments}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let summary_path = custom_path.join("summary.toml");
            if summary_path.exists() {
                let content = std::fs::read_to_string(&summary_path)?;
                prompts.summary = toml::from_str(&content)?;
            }

            let screening_path = custom_path.join("screening.toml");
            if screening_path.exists() {
                let content = std::fs::read_to_string(&screening_path)?;
                prompts.screening = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.summary.user.contains("{{comments}}"));
        assert!(prompts.screening.user.contains("{{count}}"));
    }

    #[test]
    fn test_render_with_custom_prefers_call_site_vars() {
        let mut prompts = Prompts::default();
        prompts.variables.insert("channel".to_string(), "Chess Talk".to_string());
        prompts.variables.insert("comments".to_string(), "ignored".to_string());

        let mut vars = HashMap::new();
        vars.insert("comments".to_string(), "first!".to_string());

        let result = prompts.render_with_custom("{{channel}}: {{comments}}", &vars);
        assert_eq!(result, "Chess Talk: first!");
    }

    #[test]
    fn test_load_custom_summary_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("summary.toml"),
            "system = \"Be brief.\"\nuser = \"{{comments}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.summary.system, "Be brief.");
        assert!(!prompts.screening.system.is_empty());
    }
}

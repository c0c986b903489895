//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    input: &str,
    question: &str,
    top_k: Option<usize>,
    mut settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tubetalk doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    if let Some(k) = top_k {
        settings.qa.top_k = k;
    }

    let orchestrator = Orchestrator::new(settings)?;
    let spinner = Output::spinner("Searching comments...");

    match orchestrator.ask(input, question).await {
        Ok(answers) => {
            spinner.finish_and_clear();

            if answers.is_empty() {
                Output::info("No comments matched this question.");
                return Ok(());
            }

            Output::header("Answers from the comments");
            for answer in &answers {
                Output::answer(answer);
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}

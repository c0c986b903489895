//! Doctor command - verify credentials, storage and configuration.

use crate::cli::Output;
use crate::config::{EmbeddingProvider, Settings, StorageProvider};
use console::style;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("TubeTalk Doctor");
    println!();
    println!("Checking credentials and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("API Keys").bold());
    let key_checks = check_api_keys(settings);
    for check in &key_checks {
        check.print();
    }
    checks.extend(key_checks);

    println!();

    println!("{}", style("Storage").bold());
    let dir_checks = check_directories(settings);
    for check in &dir_checks {
        check.print();
    }
    checks.extend(dir_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);

    println!();

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using TubeTalk.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! TubeTalk is ready to use.");
    }

    Ok(())
}

/// Check the keys each stage needs.
fn check_api_keys(settings: &Settings) -> Vec<CheckResult> {
    let mut results = vec![check_key(
        "YOUTUBE_API_KEY",
        settings.youtube.resolve_api_key(),
        true,
        "Set with: export YOUTUBE_API_KEY='...'",
    )];

    let openai_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());

    match settings.embedding.provider {
        EmbeddingProvider::Cohere => {
            results.push(check_key(
                "COHERE_API_KEY",
                settings.embedding.resolve_cohere_api_key(),
                true,
                "Set with: export COHERE_API_KEY='...'",
            ));
            // Only summaries and answer screening need OpenAI here
            results.push(check_key(
                "OPENAI_API_KEY",
                openai_key,
                false,
                "Cluster summaries and answer screening stay off until it is set",
            ));
        }
        EmbeddingProvider::OpenAI => {
            results.push(check_key(
                "OPENAI_API_KEY",
                openai_key,
                true,
                "Set with: export OPENAI_API_KEY='sk-...'",
            ));
        }
    }

    results
}

fn check_key(name: &str, key: Option<String>, required: bool, hint: &str) -> CheckResult {
    match key {
        Some(key) => CheckResult::ok(name, &format!("configured ({})", mask_key(&key))),
        None if required => CheckResult::error(name, "not set", hint),
        None => CheckResult::warning(name, "not set", hint),
    }
}

/// Show only the ends of a key.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Check data directories.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let data_dir = settings.data_dir();
    if data_dir.exists() {
        results.push(CheckResult::ok(
            "Data directory",
            &format!("{}", data_dir.display()),
        ));
    } else {
        results.push(CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        ));
    }

    if settings.storage.provider == StorageProvider::Memory {
        results.push(CheckResult::warning(
            "Database",
            "in-memory storage",
            "Analyses are lost on exit and 'ask' needs a persistent store",
        ));
        return results;
    }

    let db_path = settings.sqlite_path();
    if db_path.exists() {
        let size = std::fs::metadata(&db_path)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        results.push(CheckResult::ok(
            "Database",
            &format!("{} ({})", db_path.display(), size),
        ));
    } else {
        results.push(CheckResult::warning(
            "Database",
            &format!("{} (not created yet)", db_path.display()),
            "Database will be created on first analysis",
        ));
    }

    results
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: tubetalk config edit",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_check_key_required_and_optional() {
        let missing = check_key("KEY", None, true, "set it");
        assert_eq!(missing.status, CheckStatus::Error);
        assert_eq!(missing.hint, Some("set it".to_string()));

        let optional = check_key("KEY", None, false, "set it");
        assert_eq!(optional.status, CheckStatus::Warning);

        let present = check_key("KEY", Some("abcd-0123456789-wxyz".to_string()), true, "");
        assert_eq!(present.status, CheckStatus::Ok);
        assert_eq!(present.message, "configured (abcd...wxyz)");
    }

    #[test]
    fn test_mask_short_key() {
        assert_eq!(mask_key("short"), "****");
    }

    #[test]
    fn test_memory_storage_warns() {
        let mut settings = Settings::default();
        settings.storage.provider = StorageProvider::Memory;
        let checks = check_directories(&settings);
        let db = checks.iter().find(|c| c.name == "Database").unwrap();
        assert_eq!(db.status, CheckStatus::Warning);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}

//! `tubetalk config`: inspect and edit the settings file.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const FALLBACK_EDITOR: &str = "vi";

pub fn run_config(action: &ConfigAction, settings: Settings, config_path: Option<PathBuf>) -> Result<()> {
    let config_path = config_path.unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let rendered = toml::to_string_pretty(&settings).context("rendering settings as TOML")?;
            if config_path.exists() {
                println!("# {}", config_path.display());
            } else {
                println!("# defaults ({} does not exist)", config_path.display());
            }
            println!("{}", rendered);
        }

        ConfigAction::Edit => edit(&settings, &config_path)?,

        ConfigAction::Path => println!("{}", config_path.display()),
    }

    Ok(())
}

fn edit(settings: &Settings, config_path: &Path) -> Result<()> {
    if ensure_config_file(settings, config_path)? {
        Output::info(&format!("Wrote current settings to {}", config_path.display()));
    }

    let editor = choose_editor(std::env::var("VISUAL").ok(), std::env::var("EDITOR").ok());
    let status = std::process::Command::new(&editor)
        .arg(config_path)
        .status()
        .with_context(|| format!("launching editor '{}' for {}", editor, config_path.display()))?;

    if !status.success() {
        Output::warning(&format!("{} exited with {}; settings left as they were.", editor, status));
        return Ok(());
    }

    // A file that no longer parses would break every later command.
    match Settings::load_from(Some(&config_path.to_path_buf())) {
        Ok(_) => Output::success("Settings updated."),
        Err(e) => Output::error(&format!(
            "{} does not parse: {}. Run 'tubetalk config edit' again to fix it.",
            config_path.display(),
            e
        )),
    }
    Ok(())
}

/// Write `settings` to `path` unless a file is already there. Returns whether
/// it wrote one.
fn ensure_config_file(settings: &Settings, path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    settings
        .save_to(&path.to_path_buf())
        .with_context(|| format!("creating {}", path.display()))?;
    Ok(true)
}

/// `$VISUAL` wins over `$EDITOR`; blank values count as unset.
fn choose_editor(visual: Option<String>, editor: Option<String>) -> String {
    [visual, editor]
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| FALLBACK_EDITOR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_choose_editor_precedence() {
        assert_eq!(choose_editor(Some("hx".into()), Some("nano".into())), "hx");
        assert_eq!(choose_editor(Some("  ".into()), Some("nano".into())), "nano");
        assert_eq!(choose_editor(None, Some("nano".into())), "nano");
        assert_eq!(choose_editor(None, None), FALLBACK_EDITOR);
    }

    #[test]
    fn test_ensure_config_file_writes_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.analysis.num_topics = 9;
        assert!(ensure_config_file(&settings, &path).unwrap());

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.analysis.num_topics, 9);

        settings.analysis.num_topics = 2;
        assert!(!ensure_config_file(&settings, &path).unwrap());
        assert_eq!(Settings::load_from(Some(&path)).unwrap().analysis.num_topics, 9);
    }

    #[test]
    fn test_path_action_succeeds_without_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        run_config(&ConfigAction::Path, Settings::default(), Some(path.clone())).unwrap();
        run_config(&ConfigAction::Show, Settings::default(), Some(path.clone())).unwrap();
        assert!(!path.exists());
    }
}

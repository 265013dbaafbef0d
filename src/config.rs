//! Configuration management for void
//!
//! Stores settings in ~/.config/void/config.json. Secrets may instead come
//! from the environment, which always wins over the file.

use crate::sources::FetchError;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const JIRA_TOKEN_ENV: &str = "JIRA_API_TOKEN";
pub const SLACK_TOKEN_ENV: &str = "SLACK_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub git: GitConfig,
    pub jira: Option<JiraConfig>,
    pub slack: Option<SlackConfig>,
    /// Default window when `--since` is not given, in whole days before today
    pub lookback_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            git: GitConfig::default(),
            jira: None,
            slack: None,
            lookback_days: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitConfig {
    /// Local repository paths
    pub local: Vec<PathBuf>,
    /// GitHub repository URLs
    pub github: Vec<String>,
    pub github_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JiraConfig {
    pub base_url: String,
    pub email: String,
    pub api_token: Option<String>,
    /// Extra JQL ANDed with the date constraint, e.g. `project = OPS`
    pub jql: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SlackConfig {
    pub token: Option<String>,
    pub channels: Vec<String>,
}

/// A Jira section with every required field present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraSettings {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    pub jql: Option<String>,
}

/// A Slack section with a token and at least one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackSettings {
    pub token: String,
    pub channels: Vec<String>,
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("void"))
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// A missing file yields defaults; a corrupt one is moved aside first
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                let backup = preserve_corrupt_config(path, &content);
                warn!(
                    error = %err,
                    backup = %backup.display(),
                    "config file was corrupted; a backup was saved and defaults were loaded"
                );
                Self::default()
            }
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path().context("could not determine config directory")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
                    warn!(error = %e, "failed to set config directory permissions");
                }
            }
        }

        let content = serde_json::to_string_pretty(self).context("failed to serialize config")?;

        #[cfg(unix)]
        write_config_atomic(path, &content)
            .with_context(|| format!("failed to write {}", path.display()))?;

        #[cfg(not(unix))]
        fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;

        Ok(())
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/void/config.json".to_string())
    }

    /// Apply token overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Non-empty values from `lookup` replace the stored tokens. A Jira or
    /// Slack token alone does not create the section.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(token) = get(GITHUB_TOKEN_ENV) {
            self.git.github_token = Some(token);
        }
        if let (Some(token), Some(jira)) = (get(JIRA_TOKEN_ENV), self.jira.as_mut()) {
            jira.api_token = Some(token);
        }
        if let (Some(token), Some(slack)) = (get(SLACK_TOKEN_ENV), self.slack.as_mut()) {
            slack.token = Some(token);
        }
    }

    /// `Ok(None)` when Jira is not configured at all
    pub fn validate_jira(&self) -> Result<Option<JiraSettings>, FetchError> {
        let Some(jira) = &self.jira else {
            return Ok(None);
        };
        let mut missing = Vec::new();
        if jira.base_url.trim().is_empty() {
            missing.push("base_url");
        }
        if jira.email.trim().is_empty() {
            missing.push("email");
        }
        let token = jira
            .api_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if token.is_none() {
            missing.push("api_token");
        }
        match token {
            Some(token) if missing.is_empty() => Ok(Some(JiraSettings {
                base_url: jira.base_url.trim().to_string(),
                email: jira.email.trim().to_string(),
                api_token: token.to_string(),
                jql: jira.jql.clone(),
            })),
            _ => Err(FetchError::Config(format!(
                "jira section is missing {} (or set {})",
                missing.join(", "),
                JIRA_TOKEN_ENV
            ))),
        }
    }

    /// `Ok(None)` when Slack is not configured at all
    pub fn validate_slack(&self) -> Result<Option<SlackSettings>, FetchError> {
        let Some(slack) = &self.slack else {
            return Ok(None);
        };
        let token = slack
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                FetchError::Config(format!("slack section has no token (or set {})", SLACK_TOKEN_ENV))
            })?;
        let channels: Vec<String> = slack
            .channels
            .iter()
            .map(|c| c.trim().trim_start_matches('#').to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if channels.is_empty() {
            return Err(FetchError::Config("slack section lists no channels".to_string()));
        }
        Ok(Some(SlackSettings {
            token: token.to_string(),
            channels,
        }))
    }

    /// Example config written by `--init-config`
    pub fn template() -> Self {
        Self {
            git: GitConfig {
                local: vec![PathBuf::from(".")],
                github: Vec::new(),
                github_token: None,
            },
            jira: Some(JiraConfig {
                base_url: "https://your-team.atlassian.net".to_string(),
                email: String::new(),
                api_token: None,
                jql: Some("assignee = currentUser()".to_string()),
            }),
            slack: Some(SlackConfig {
                token: None,
                channels: vec!["general".to_string()],
            }),
            lookback_days: 1,
        }
    }
}

/// Move a corrupt config aside so the next save does not destroy it
fn preserve_corrupt_config(path: &Path, content: &str) -> PathBuf {
    let suffix = format!("json.corrupt-{}", Utc::now().format("%Y%m%d%H%M%S"));
    let corrupt_path = path.with_extension(suffix);
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
    corrupt_path
}

#[cfg(unix)]
fn write_config_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::PermissionsExt;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;

    // Tokens live in here
    if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
        warn!(error = %e, "failed to set config file permissions");
    }

    file.write_all(content.as_bytes())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.lookback_days, 1);
        assert!(config.git.local.is_empty());
        assert!(config.jira.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"git": {"github": ["https://github.com/acme/api"]}}"#).unwrap();
        assert_eq!(config.git.github.len(), 1);
        assert_eq!(config.lookback_days, 1);
        assert!(config.slack.is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("void").join("config.json");
        let config = Config::template();
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::load_from(&dir.path().join("nope.json")), Config::default());
    }

    #[test]
    fn test_corrupt_file_is_backed_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(Config::load_from(&path), Config::default());
        assert!(!path.exists());
        let backups: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("corrupt"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(backups[0].path()).unwrap(), "{ not json");
    }

    #[test]
    fn test_env_overrides_tokens() {
        let env: HashMap<&str, &str> = [
            (GITHUB_TOKEN_ENV, "gh-token"),
            (JIRA_TOKEN_ENV, "jira-token"),
            (SLACK_TOKEN_ENV, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = Config {
            jira: Some(JiraConfig::default()),
            slack: Some(SlackConfig {
                token: Some("file-token".into()),
                channels: vec![],
            }),
            ..Config::default()
        };
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.git.github_token.as_deref(), Some("gh-token"));
        assert_eq!(config.jira.unwrap().api_token.as_deref(), Some("jira-token"));
        // Blank values never override
        assert_eq!(config.slack.unwrap().token.as_deref(), Some("file-token"));
    }

    #[test]
    fn test_env_token_does_not_create_sections() {
        let mut config = Config::default();
        config.apply_overrides(|_| Some("token".to_string()));
        assert!(config.jira.is_none());
        assert!(config.slack.is_none());
    }

    #[test]
    fn test_validate_jira() {
        let mut config = Config::default();
        assert_eq!(config.validate_jira(), Ok(None));

        config.jira = Some(JiraConfig {
            base_url: "https://acme.atlassian.net".into(),
            email: String::new(),
            api_token: None,
            jql: None,
        });
        match config.validate_jira() {
            Err(FetchError::Config(m)) => {
                assert!(m.contains("email"));
                assert!(m.contains("api_token"));
            }
            other => panic!("unexpected {:?}", other),
        }

        if let Some(jira) = config.jira.as_mut() {
            jira.email = "me@acme.io".into();
            jira.api_token = Some("t".into());
        }
        let settings = config.validate_jira().unwrap().unwrap();
        assert_eq!(settings.api_token, "t");
    }

    #[test]
    fn test_validate_slack() {
        let mut config = Config {
            slack: Some(SlackConfig {
                token: Some("xoxb".into()),
                channels: vec!["#general".into(), " ".into()],
            }),
            ..Config::default()
        };
        let settings = config.validate_slack().unwrap().unwrap();
        assert_eq!(settings.channels, vec!["general".to_string()]);

        config.slack = Some(SlackConfig {
            token: Some("xoxb".into()),
            channels: vec![],
        });
        assert!(matches!(config.validate_slack(), Err(FetchError::Config(_))));
    }
}

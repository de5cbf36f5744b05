use crate::tool::ToolMode;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Permission configuration (loaded from config file).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PermissionConfig {
    /// Default mode (read, write). Default: write.
    pub default_mode: Option<String>,
}

impl PermissionConfig {
    /// Get the tool mode from config, defaulting to Write if not specified.
    #[must_use]
    pub fn mode(&self) -> ToolMode {
        match self
            .default_mode
            .as_deref()
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("read") => ToolMode::Read,
            Some("write") | None => ToolMode::Write,
            Some("agi") => ToolMode::Agi,
            Some(other) => {
                tracing::warn!("Unknown permission mode '{other}', defaulting to write");
                ToolMode::Write
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Selected model name (as Anthropic calls it, e.g. "claude-sonnet-4-5").
    pub model: Option<String>,

    /// Optional API key (fallback when `ANTHROPIC_API_KEY` is not set).
    pub api_key: Option<String>,

    pub data_dir: Option<PathBuf>,

    /// Permission settings.
    pub permissions: PermissionConfig,

    /// Extra instructions appended to the default system prompt.
    /// For project-specific instructions, prefer AGENTS.md instead.
    pub instructions: Option<String>,

    /// Full system prompt override (replaces default entirely).
    /// Prefer `instructions` or ~/.switchback/AGENTS.md to extend the default.
    pub system_prompt: Option<String>,

    /// Delete sessions older than this many days. 0 = never delete.
    #[serde(default = "default_retention_days")]
    pub session_retention_days: u32,
}

fn default_retention_days() -> u32 {
    90
}

impl Config {
    /// Directory holding session journal files.
    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(switchback_data_dir).join("sessions")
    }

    /// Check if first-time setup is needed (no model selected).
    #[must_use]
    pub fn needs_setup(&self) -> bool {
        self.model.is_none()
    }

    /// Get the Anthropic API key.
    /// Priority: config file > env var (explicit config is more intentional).
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            return Some(key.clone());
        }
        std::env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty())
    }

    /// Load configuration with layered precedence.
    ///
    /// Precedence (highest to lowest):
    /// 1. Project shared (.switchback/config.toml)
    /// 2. User global (~/.switchback/config.toml)
    /// 3. Built-in defaults
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Config::default();

        let user_config = switchback_config_dir().join("config.toml");
        if user_config.exists() {
            config.merge_from_file(&user_config)?;
        }

        let project_config = PathBuf::from(".switchback/config.toml");
        if project_config.exists() {
            config.merge_from_file(&project_config)?;
        }

        Ok(config)
    }

    /// Merge config from a TOML file, overriding only non-None values.
    fn merge_from_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let other: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config from {}", path.display()))?;
        self.merge(other);
        Ok(())
    }

    /// Merge another config into this one. Non-default values override.
    fn merge(&mut self, other: Config) {
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if other.permissions.default_mode.is_some() {
            self.permissions.default_mode = other.permissions.default_mode;
        }
        if other.instructions.is_some() {
            self.instructions = other.instructions;
        }
        if other.system_prompt.is_some() {
            self.system_prompt = other.system_prompt;
        }
        if other.session_retention_days != default_retention_days() {
            self.session_retention_days = other.session_retention_days;
        }
    }

    /// Save configuration to the user global config file (~/.switchback/config.toml).
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = switchback_config_dir().join("config.toml");

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }
}

/// Config directory: ~/.switchback/
#[must_use]
pub fn switchback_config_dir() -> PathBuf {
    dirs::home_dir().map_or_else(|| PathBuf::from(".switchback"), |h| h.join(".switchback"))
}

/// Data directory: ~/.switchback/data/
#[must_use]
pub fn switchback_data_dir() -> PathBuf {
    switchback_config_dir().join("data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.model.is_none());
        assert!(config.needs_setup());
    }

    #[test]
    fn test_merge_configs() {
        let mut base = Config::default();
        let other = Config {
            model: Some("claude-sonnet-4-5".to_string()),
            api_key: Some("test-key".to_string()),
            ..Default::default()
        };

        base.merge(other);
        assert_eq!(base.model, Some("claude-sonnet-4-5".to_string()));
        assert_eq!(base.api_key, Some("test-key".to_string()));
    }

    #[test]
    fn test_system_prompt_merge() {
        let mut base = Config::default();
        assert!(base.system_prompt.is_none());

        let other = Config {
            system_prompt: Some("Custom prompt".to_string()),
            ..Default::default()
        };

        base.merge(other);
        assert_eq!(base.system_prompt, Some("Custom prompt".to_string()));
    }

    #[test]
    fn test_instructions_config_parse() {
        let toml_str = r#"instructions = "Use functional style""#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.instructions, Some("Use functional style".to_string()));
        assert!(config.system_prompt.is_none());
    }

    #[test]
    fn test_permission_mode_defaults_to_write() {
        let config = PermissionConfig::default();
        assert!(matches!(config.mode(), ToolMode::Write));
    }
}

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const CONFIG_FILE: &str = ".ai-pr-review.toml";
pub const DEFAULT_MODEL: &str = "gpt-4.1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("OPENAI_API_KEY environment variable not set.")]
    MissingApiKey,
}

/// Top-level configuration loaded from .ai-pr-review.toml and the environment.
///
/// All fields are optional in the file; the LLM API key must come from
/// somewhere before a review can run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub context: ContextConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// REST API root
    pub api_base: String,
    /// Root that `{owner}/{repo}.git` clone URLs hang off
    pub clone_base: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: "https://api.github.com".to_string(),
            clone_base: "https://github.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat completion API key. If None, falls back to OPENAI_API_KEY env var.
    pub api_key: Option<String>,
    /// OpenAI-compatible API root (the `/chat/completions` parent)
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            max_tokens: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Changed files longer than this are cut off with a marker
    pub max_file_lines: Option<usize>,
    pub max_usages_per_symbol: usize,
    /// Attach reference sites of every touched symbol
    pub include_usages: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_file_lines: Some(400),
            max_usages_per_symbol: 20,
            include_usages: true,
        }
    }
}

impl Config {
    /// Load configuration from .ai-pr-review.toml in the current directory,
    /// then overlay the process environment (after loading any `.env` file).
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        dotenvy::dotenv().ok();

        let path = Path::new(CONFIG_FILE);
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            Config::default()
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Fill unset credentials and endpoints from environment lookups.
    ///
    /// Values from the config file win; the environment only fills gaps,
    /// except `OPENAI_BASE_URL` which overrides the default endpoint.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if self.github.token.is_none() {
            self.github.token = var("GITHUB_TOKEN");
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = var("OPENAI_API_KEY");
        }
        if let Some(base_url) = var("OPENAI_BASE_URL") {
            self.llm.base_url = base_url;
        }
    }

    /// The chat completion API key, or a configuration error when absent.
    pub fn llm_api_key(&self) -> Result<&str, ConfigError> {
        self.llm
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert_eq!(config.github.api_base, "https://api.github.com");
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.llm.max_tokens, 2000);
        assert_eq!(config.context.max_usages_per_symbol, 20);
        assert_eq!(config.context.max_file_lines, Some(400));
        assert!(config.context.include_usages);
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[llm]
model = "gpt-4o-mini"
temperature = 0.5

[context]
max_usages_per_symbol = 5
include_usages = false
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.temperature, 0.5);
        assert_eq!(config.llm.max_tokens, 2000);
        assert_eq!(config.context.max_usages_per_symbol, 5);
        assert!(!config.context.include_usages);
        assert_eq!(config.github.clone_base, "https://github.com");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[github]\ntoken = \"from-file\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.github.token.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_env_fills_missing_credentials() {
        let mut config = Config::default();
        config.apply_env(env(&[("GITHUB_TOKEN", "gh"), ("OPENAI_API_KEY", "sk")]));
        assert_eq!(config.github.token.as_deref(), Some("gh"));
        assert_eq!(config.llm_api_key().unwrap(), "sk");
    }

    #[test]
    fn test_file_token_wins_over_env() {
        let mut config = Config::default();
        config.github.token = Some("file".to_string());
        config.apply_env(env(&[("GITHUB_TOKEN", "env")]));
        assert_eq!(config.github.token.as_deref(), Some("file"));
    }

    #[test]
    fn test_missing_api_key_is_an_error() {
        let mut config = Config::default();
        config.apply_env(env(&[("OPENAI_API_KEY", "  ")]));
        assert!(matches!(config.llm_api_key(), Err(ConfigError::MissingApiKey)));
    }
}

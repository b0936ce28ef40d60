use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "gemini.json";

/// Connection settings for the Gemini API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default = "GeminiConfig::default_model")]
    pub model: String,
    #[serde(default = "GeminiConfig::default_base_url")]
    pub base_url: String,
    /// Upper bound for a single generateContent call
    #[serde(default = "GeminiConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl GeminiConfig {
    pub fn default_model() -> String {
        "gemini-2.5-flash".to_string()
    }

    pub fn default_base_url() -> String {
        "https://generativelanguage.googleapis.com/v1beta".to_string()
    }

    pub fn default_timeout_secs() -> u64 {
        60
    }

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: Self::default_model(),
            base_url: Self::default_base_url(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Load the configuration, preferring a config file and falling back to the environment
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self> {
        let (config_path, searched_paths) = Self::determine_config_path(custom_path.as_ref());

        if config_path.exists() {
            return Self::load_from_file(&config_path);
        }

        if custom_path.is_some() {
            anyhow::bail!("Config file not found: {}", config_path.display());
        }

        Self::from_env().with_context(|| {
            format!(
                "No config file found (searched: {}) and environment is incomplete",
                searched_paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }

    /// Read a JSON config file, substituting `${VAR}` references from the environment
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        let value = substitute_env_vars_in_value(value)
            .with_context(|| format!("Failed to substitute env vars in: {}", path.display()))?;

        serde_json::from_value(value)
            .with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Build the configuration from `GEMINI_*` environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .context("GEMINI_API_KEY (or GOOGLE_API_KEY) environment variable not set")?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(timeout) = std::env::var("GEMINI_TIMEOUT_SECS") {
            config.timeout_secs = timeout
                .parse()
                .with_context(|| format!("Invalid GEMINI_TIMEOUT_SECS: {timeout}"))?;
        }
        Ok(config)
    }

    fn determine_config_path(custom_path: Option<&PathBuf>) -> (PathBuf, Vec<PathBuf>) {
        if let Some(path) = custom_path {
            return (path.clone(), vec![path.clone()]);
        }

        let mut searched_paths = Vec::new();
        for base_dir in config_directories() {
            let candidate = base_dir.join(CONFIG_FILE_NAME);
            if searched_paths.contains(&candidate) {
                continue;
            }
            let exists = candidate.exists();
            searched_paths.push(candidate.clone());
            if exists {
                return (candidate, searched_paths);
            }
        }

        let fallback = searched_paths
            .first()
            .cloned()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        (fallback, searched_paths)
    }
}

/// Directories that may contain the config file, ordered by priority
fn config_directories() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(custom_dir) = std::env::var("TOOL_MEDIATOR_CONFIG_DIR") {
        dirs.push(PathBuf::from(custom_dir));
    }
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        dirs.push(PathBuf::from(xdg_config).join("tool-mediator"));
    }
    if let Some(home_dir) = dirs::home_dir() {
        dirs.push(home_dir.join(".config").join("tool-mediator"));
    }

    dirs
}

/// Recursively substitute environment variables in JSON values
fn substitute_env_vars_in_value(value: serde_json::Value) -> Result<serde_json::Value> {
    match value {
        serde_json::Value::String(s) => Ok(serde_json::Value::String(
            substitute_env_vars_in_string(&s)?,
        )),
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(key, val)| Ok((key, substitute_env_vars_in_value(val)?)))
            .collect::<Result<serde_json::Map<_, _>>>()
            .map(serde_json::Value::Object),
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(substitute_env_vars_in_value)
            .collect::<Result<Vec<_>>>()
            .map(serde_json::Value::Array),
        other => Ok(other),
    }
}

/// Substitute environment variables in a string (${VAR_NAME} format)
fn substitute_env_vars_in_string(input: &str) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        let end = rest[start..]
            .find('}')
            .ok_or_else(|| anyhow::anyhow!("Unclosed environment variable substitution: {input}"))?;
        let var_name = &rest[start + 2..start + end];
        let var_value = std::env::var(var_name)
            .with_context(|| format!("Environment variable not set: {var_name}"))?;

        result.push_str(&rest[..start]);
        result.push_str(&var_value);
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn file_config_applies_defaults_and_env_substitution() {
        std::env::set_var("TOOL_MEDIATOR_TEST_KEY", "secret-123");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gemini.json");
        fs::write(&path, r#"{ "api_key": "${TOOL_MEDIATOR_TEST_KEY}" }"#).unwrap();

        let config = GeminiConfig::load(Some(path)).unwrap();
        assert_eq!(config.api_key, "secret-123");
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let err = GeminiConfig::load(Some(missing)).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn substitution_keeps_surrounding_text() {
        std::env::set_var("TOOL_MEDIATOR_TEST_HOST", "example.org");
        let value = substitute_env_vars_in_string("https://${TOOL_MEDIATOR_TEST_HOST}/v1").unwrap();
        assert_eq!(value, "https://example.org/v1");
    }

    #[test]
    fn unclosed_substitution_is_an_error() {
        assert!(substitute_env_vars_in_string("${NOT_CLOSED").is_err());
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let err = substitute_env_vars_in_string("${TOOL_MEDIATOR_SURELY_UNSET_VAR}").unwrap_err();
        assert!(err.to_string().contains("TOOL_MEDIATOR_SURELY_UNSET_VAR"));
    }
}

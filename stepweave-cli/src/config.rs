//! Runner configuration: a TOML file, then `STEPWEAVE_*` environment
//! overrides, then command-line flags, validated before anything is built.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use stepweave_agent::{HttpOracleConfig, OrchestratorConfig};
use stepweave_browser::BrowserEngineConfig;
use stepweave_tools::{CodeToolConfig, SearchConfig};
use thiserror::Error;

pub const ENV_API_KEY: &str = "STEPWEAVE_API_KEY";
pub const ENV_BASE_URL: &str = "STEPWEAVE_BASE_URL";
pub const ENV_MODEL: &str = "STEPWEAVE_MODEL";
pub const ENV_SEARCH_URL: &str = "STEPWEAVE_SEARCH_URL";
pub const ENV_SEARCH_KEY: &str = "STEPWEAVE_SEARCH_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML config: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to set up {component}: {message}")]
    Setup {
        component: &'static str,
        message: String,
    },
}

impl ConfigError {
    pub fn setup(component: &'static str, message: impl ToString) -> Self {
        ConfigError::Setup {
            component,
            message: message.to_string(),
        }
    }
}

mod duration_str {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// `[oracle]`: the OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleSection {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    #[serde(with = "duration_str")]
    pub timeout: Duration,
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(60),
        }
    }
}

impl OracleSection {
    pub fn to_http_config(&self) -> HttpOracleConfig {
        let mut config = HttpOracleConfig::new(&self.base_url, &self.model)
            .with_temperature(self.temperature)
            .with_timeout(self.timeout);
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key);
        }
        config
    }
}

/// `[browser]`: the inner atomic-action loop and its fetch session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserSection {
    pub enabled: bool,
    pub max_steps: u32,
    pub history_window: usize,
    pub enable_vision: bool,
    pub early_exit_check: bool,
    pub summarize_results: bool,
    pub browser_model: Option<String>,
    pub check_model: Option<String>,
    /// Keep the session open between dispatches until the run ends.
    pub keep_warm: bool,
    #[serde(with = "duration_str")]
    pub page_timeout: Duration,
}

impl Default for BrowserSection {
    fn default() -> Self {
        let engine = BrowserEngineConfig::default();
        Self {
            enabled: true,
            max_steps: engine.max_steps,
            history_window: engine.history_window,
            enable_vision: engine.enable_vision,
            early_exit_check: engine.early_exit_check,
            summarize_results: engine.summarize_results,
            browser_model: None,
            check_model: None,
            keep_warm: true,
            page_timeout: Duration::from_secs(30),
        }
    }
}

impl BrowserSection {
    pub fn to_engine_config(&self) -> BrowserEngineConfig {
        BrowserEngineConfig::new()
            .with_max_steps(self.max_steps)
            .with_history_window(self.history_window)
            .with_vision(self.enable_vision)
            .with_early_exit_check(self.early_exit_check)
            .with_summary(self.summarize_results)
            .with_models(self.browser_model.clone(), self.check_model.clone())
    }
}

/// `[files]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesSection {
    pub enabled: bool,
    /// Directory the file tool is confined to.
    pub root: PathBuf,
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            enabled: true,
            root: PathBuf::from("."),
        }
    }
}

/// `[code]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodeSection {
    pub enabled: bool,
    pub interpreter: String,
    pub args: Vec<String>,
    pub extension: String,
    pub timeout_secs: u64,
}

impl Default for CodeSection {
    fn default() -> Self {
        let tool = CodeToolConfig::default();
        Self {
            enabled: true,
            interpreter: tool.interpreter,
            args: tool.args,
            extension: tool.extension,
            timeout_secs: tool.timeout_secs,
        }
    }
}

impl CodeSection {
    pub fn to_tool_config(&self) -> CodeToolConfig {
        CodeToolConfig {
            interpreter: self.interpreter.clone(),
            args: self.args.clone(),
            extension: self.extension.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// `[output]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    /// Runs are written to `<dir>/<run-id>/`.
    pub dir: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("runs"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub oracle: OracleSection,
    pub orchestrator: OrchestratorConfig,
    pub browser: BrowserSection,
    /// The search tool is registered only when a backend is configured.
    pub search: Option<SearchConfig>,
    pub files: FilesSection,
    pub code: CodeSection,
    pub output: OutputSection,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_toml(&content)
    }

    pub fn load_from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `STEPWEAVE_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.oracle.api_key = Some(key);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.oracle.base_url = url;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.oracle.model = model;
        }
        if let Some(endpoint) = get(ENV_SEARCH_URL) {
            match self.search.as_mut() {
                Some(search) => search.endpoint = endpoint,
                None => self.search = Some(SearchConfig::new(endpoint)),
            }
        }
        if let Some(key) = get(ENV_SEARCH_KEY) {
            match self.search.as_mut() {
                Some(search) => search.api_key = Some(key),
                None => tracing::warn!("{ENV_SEARCH_KEY} is set but no search endpoint is configured"),
            }
        }
    }

    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Fail fast on settings that cannot produce a working run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.oracle.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "oracle.base_url must be an http(s) URL, got '{base_url}'"
            )));
        }
        if self.oracle.model.trim().is_empty() {
            return Err(ConfigError::Invalid("oracle.model cannot be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.oracle.temperature) {
            return Err(ConfigError::Invalid(format!(
                "oracle.temperature must be within 0.0..=2.0, got {}",
                self.oracle.temperature
            )));
        }
        if self.oracle.timeout.is_zero() {
            return Err(ConfigError::Invalid("oracle.timeout cannot be zero".to_string()));
        }
        if self.oracle.api_key.is_none() {
            tracing::warn!("No oracle API key configured; requests are sent unauthenticated");
        }

        if self.orchestrator.max_steps == 0 {
            return Err(ConfigError::Invalid(
                "orchestrator.max_steps must be > 0".to_string(),
            ));
        }
        if self.orchestrator.context_entries == Some(0) {
            return Err(ConfigError::Invalid(
                "orchestrator.context_entries must be > 0 when set".to_string(),
            ));
        }

        if self.browser.enabled {
            if self.browser.max_steps == 0 {
                return Err(ConfigError::Invalid("browser.max_steps must be > 0".to_string()));
            }
            if self.browser.page_timeout.is_zero() {
                return Err(ConfigError::Invalid(
                    "browser.page_timeout cannot be zero".to_string(),
                ));
            }
        }

        if let Some(search) = &self.search {
            if search.endpoint.trim().is_empty() {
                return Err(ConfigError::Invalid("search.endpoint cannot be empty".to_string()));
            }
            if search.max_results == 0 {
                return Err(ConfigError::Invalid("search.max_results must be > 0".to_string()));
            }
        }

        if self.code.enabled {
            if self.code.interpreter.trim().is_empty() {
                return Err(ConfigError::Invalid("code.interpreter cannot be empty".to_string()));
            }
            if self.code.timeout_secs == 0 {
                return Err(ConfigError::Invalid("code.timeout_secs must be > 0".to_string()));
            }
        }

        if !(self.files.enabled || self.code.enabled || self.browser.enabled || self.search.is_some()) {
            return Err(ConfigError::Invalid("no tools are enabled".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const FULL: &str = r#"
[oracle]
base_url = "http://localhost:8080/v1"
model = "local-model"
timeout = "90s"

[orchestrator]
max_steps = 25
planner_model = "planner"
enable_subtask_tracking = true

[browser]
max_steps = 8
enable_vision = true
page_timeout = "1m 30s"

[search]
endpoint = "https://search.example.com/api"
max_results = 3

[files]
root = "/srv/workspace"

[code]
interpreter = "node"
extension = "js"

[output]
dir = "out"
"#;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::load_from_toml("").unwrap();
        assert_eq!(config.orchestrator.max_steps, 10);
        assert_eq!(config.output.dir, PathBuf::from("runs"));
        assert!(config.search.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn sections_are_parsed() {
        let config = AppConfig::load_from_toml(FULL).unwrap();
        assert_eq!(config.oracle.model, "local-model");
        assert_eq!(config.oracle.timeout, Duration::from_secs(90));
        assert_eq!(config.oracle.temperature, 0.2);
        assert_eq!(config.orchestrator.max_steps, 25);
        assert_eq!(config.orchestrator.planner_model.as_deref(), Some("planner"));
        assert!(config.orchestrator.enable_subtask_tracking);
        assert_eq!(config.browser.page_timeout, Duration::from_secs(90));
        assert_eq!(config.browser.to_engine_config().max_steps, 8);
        assert!(config.browser.to_engine_config().enable_vision);
        assert_eq!(config.search.as_ref().unwrap().max_results, 3);
        assert_eq!(config.files.root, PathBuf::from("/srv/workspace"));
        assert_eq!(config.code.to_tool_config().interpreter, "node");
        assert_eq!(config.code.timeout_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AppConfig::load_from_toml("[oracle]\nmodle = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        let err = AppConfig::load_from_toml("[oracle]\ntimeout = \"soon\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = AppConfig::load_from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_KEY, "sk-env"),
            (ENV_MODEL, "env-model"),
            (ENV_SEARCH_URL, "https://env-search.example.com"),
            (ENV_SEARCH_KEY, "search-key"),
            (ENV_BASE_URL, "  "),
        ]);
        let mut config = AppConfig::load_from_toml(FULL).unwrap();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.oracle.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.oracle.model, "env-model");
        assert_eq!(config.oracle.base_url, "http://localhost:8080/v1");
        let search = config.search.unwrap();
        assert_eq!(search.endpoint, "https://env-search.example.com");
        assert_eq!(search.api_key.as_deref(), Some("search-key"));
        assert_eq!(search.max_results, 3);
    }

    #[test]
    fn search_url_from_environment_enables_search() {
        let mut config = AppConfig::default();
        config.apply_env(|key| (key == ENV_SEARCH_URL).then(|| "http://127.0.0.1:9200".to_string()));
        assert_eq!(config.search.unwrap().endpoint, "http://127.0.0.1:9200");
    }

    #[test]
    fn validation_fails_fast() {
        let mut config = AppConfig::default();
        config.oracle.base_url = "localhost:8080".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(m)) if m.contains("base_url")));

        let mut config = AppConfig::default();
        config.orchestrator.max_steps = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.oracle.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.files.enabled = false;
        config.code.enabled = false;
        config.browser.enabled = false;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(m)) if m.contains("no tools")));
    }
}

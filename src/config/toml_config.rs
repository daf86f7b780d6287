use crate::adapters::llm::Provider;
use crate::domain::model::StepModels;
use crate::utils::error::{HubError, Result};
use crate::utils::validation::{validate_path, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const DEFAULT_CONFIG_FILE: &str = "hub.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub llm: LlmConfig,
    pub github: GithubConfig,
    pub forms: FormsConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub api_key: Option<String>,
    /// Overrides the provider's endpoint.
    pub base_url: Option<String>,
    pub research_model: Option<String>,
    pub planner_model: Option<String>,
    pub producer_model: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            api_key: None,
            base_url: None,
            research_model: None,
            planner_model: None,
            producer_model: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub token: Option<String>,
    pub owner: Option<String>,
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormsConfig {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "./output".to_string(),
        }
    }
}

fn env_placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"))
}

/// Empty strings and unresolved `${VAR}` placeholders count as unset.
fn resolved(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && !env_placeholder_re().is_match(v))
        .map(str::to_string)
}

impl HubConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| HubError::ConfigError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| HubError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replace `${VAR}` with the variable's value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> String {
        env_placeholder_re()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// The given file, else `hub.toml` when present, else defaults; then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => {
                tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Environment values win over file values.
    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = env("LLM_PROVIDER") {
            self.llm.provider = provider;
        }

        match self.llm.provider.trim().to_ascii_lowercase().as_str() {
            "openai" => {
                if let Some(key) = env("OPENAI_API_KEY") {
                    self.llm.api_key = Some(key);
                }
                if let Some(model) = env("OPENAI_MODEL_PLANNER") {
                    self.llm.planner_model = Some(model);
                }
                if let Some(model) = env("OPENAI_MODEL_PRODUCER") {
                    self.llm.research_model = Some(model.clone());
                    self.llm.producer_model = Some(model);
                }
            }
            _ => {
                if let Some(key) = env("GROQ_API_KEY") {
                    self.llm.api_key = Some(key);
                }
                if let Some(model) = env("GROQ_MODEL") {
                    self.llm.research_model = Some(model.clone());
                    self.llm.planner_model = Some(model.clone());
                    self.llm.producer_model = Some(model);
                }
            }
        }

        if let Some(token) = env("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(owner) = env("GITHUB_OWNER") {
            self.github.owner = Some(owner);
        }
    }

    pub fn provider(&self) -> Result<Provider> {
        self.llm.provider.parse()
    }

    pub fn api_key(&self) -> Result<String> {
        let provider = self.provider()?;
        resolved(self.llm.api_key.as_ref()).ok_or_else(|| HubError::MissingConfigError {
            field: provider.api_key_var().to_string(),
        })
    }

    pub fn step_models(&self) -> Result<StepModels> {
        let default = self.provider()?.default_model().to_string();
        let pick = |model: &Option<String>| resolved(model.as_ref()).unwrap_or_else(|| default.clone());

        Ok(StepModels {
            research: pick(&self.llm.research_model),
            planner: pick(&self.llm.planner_model),
            producer: pick(&self.llm.producer_model),
        })
    }

    pub fn github_token(&self) -> Result<String> {
        resolved(self.github.token.as_ref()).ok_or_else(|| HubError::MissingConfigError {
            field: "GITHUB_TOKEN".to_string(),
        })
    }

    pub fn github_owner(&self) -> Option<String> {
        resolved(self.github.owner.as_ref())
    }
}

impl Validate for HubConfig {
    fn validate(&self) -> Result<()> {
        self.provider()?;

        if let Some(base_url) = resolved(self.llm.base_url.as_ref()) {
            validate_url("llm.base_url", &base_url)?;
        }
        if let Some(api_url) = resolved(self.github.api_url.as_ref()) {
            validate_url("github.api_url", &api_url)?;
        }
        validate_path("output.dir", &self.output.dir)?;
        validate_path(
            "forms.token_path",
            &self.forms.token_path.to_string_lossy(),
        )?;

        Ok(())
    }
}

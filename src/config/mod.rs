//! Configuration management.
//!
//! Settings are layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, else `./drug-discovery-mcp.toml`, else
//!    `<config dir>/drug-discovery-mcp/config.toml`)
//! 3. `DRUG_DISCOVERY_<SECTION>__<KEY>` environment variables
//! 4. well-known variables such as `TAVILY_API_KEY`, for values still unset
//!
//! # Configuration File Format
//!
//! ```toml
//! [http]
//! timeout_secs = 30
//!
//! [pubmed]
//! api_key = "your-ncbi-key"
//! email = "you@example.org"
//!
//! [tavily]
//! api_key = "tvly-..."
//!
//! [chat]
//! port = 3000
//! agent_url = "http://127.0.0.1:8000/v1"
//!
//! [[chat.models]]
//! id = "us.anthropic.claude-3-7-sonnet-20250219-v1:0"
//! label = "Claude 3.7 Sonnet"
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

mod sections;

pub use sections::{
    ArxivConfig, ChatConfig, ChemblConfig, ClinicalTrialsConfig, HttpConfig, LogFormat,
    LoggingConfig, ModelOption, PubMedConfig, TavilyConfig,
};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Prefix of the structured environment overrides
pub const ENV_PREFIX: &str = "DRUG_DISCOVERY";

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "drug-discovery-mcp.toml";

/// Application configuration, read once at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub pubmed: PubMedConfig,
    pub arxiv: ArxivConfig,
    pub chembl: ChemblConfig,
    pub clinical_trials: ClinicalTrialsConfig,
    pub tavily: TavilyConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the given file (or the default locations) and
    /// the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like [`Config::load`], reading variables from `env` instead of the
    /// process environment when given
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();

        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(),
        };
        if let Some(file) = &file {
            tracing::debug!("Using config file: {}", file.display());
            builder = builder.add_source(::config::File::from(file.as_path()).required(true));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env.clone()),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;

        let lookup = |name: &str| -> Option<String> {
            match &env {
                Some(vars) => vars.get(name).cloned(),
                None => std::env::var(name).ok(),
            }
        };
        config.apply_env_fallbacks(lookup);
        config.validate()?;

        Ok(config)
    }

    /// Fill still-unset credentials from their conventional variables
    fn apply_env_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if self.tavily.api_key.is_none() {
            self.tavily.api_key = get("TAVILY_API_KEY");
        }
        if self.pubmed.api_key.is_none() {
            self.pubmed.api_key = get("NCBI_API_KEY");
        }
        if self.pubmed.email.is_none() {
            self.pubmed.email = get("NCBI_EMAIL");
        }
        if self.chat.agent_api_key.is_none() {
            self.chat.agent_api_key = get("AGENT_API_KEY");
        }
        if self.chat.agent_url == ChatConfig::default().agent_url {
            if let Some(url) = get("AGENT_URL") {
                self.chat.agent_url = url;
            }
        }
    }

    /// Check the loaded values once, before anything is built from them
    pub fn validate(&self) -> Result<(), ConfigError> {
        let urls = [
            ("pubmed.base_url", &self.pubmed.base_url),
            ("arxiv.base_url", &self.arxiv.base_url),
            ("arxiv.pdf_base_url", &self.arxiv.pdf_base_url),
            ("chembl.base_url", &self.chembl.base_url),
            ("clinical_trials.base_url", &self.clinical_trials.base_url),
            ("clinical_trials.study_url", &self.clinical_trials.study_url),
            ("tavily.base_url", &self.tavily.base_url),
            ("chat.agent_url", &self.chat.agent_url),
        ];
        for (field, value) in urls {
            url::Url::parse(value).map_err(|e| ConfigError::invalid(field, e.to_string()))?;
        }

        if self.http.timeout_secs == 0 {
            return Err(ConfigError::invalid("http.timeout_secs", "must be greater than zero"));
        }
        if self.http.connect_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "http.connect_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.chat.agent_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "chat.agent_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.chat.models.is_empty() {
            return Err(ConfigError::invalid("chat.models", "at least one model is required"));
        }
        if self.chat.history_window == 0 {
            return Err(ConfigError::invalid(
                "chat.history_window",
                "must be greater than zero",
            ));
        }
        if !matches!(self.tavily.search_depth.as_str(), "basic" | "advanced") {
            return Err(ConfigError::invalid(
                "tavily.search_depth",
                format!("'{}' is not one of: basic, advanced", self.tavily.search_depth),
            ));
        }

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Copy with credentials masked, for display
    pub fn redacted(&self) -> Self {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "********".to_string());
        let mut copy = self.clone();
        copy.pubmed.api_key = mask(&self.pubmed.api_key);
        copy.tavily.api_key = mask(&self.tavily.api_key);
        copy.chat.agent_api_key = mask(&self.chat.agent_api_key);
        copy
    }
}

/// Find a config file in the default locations
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    default_config_path().filter(|p| p.is_file())
}

/// Per-user config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(env!("CARGO_PKG_NAME")).join("config.toml"))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration value for '{field}': {detail}")]
    Invalid { field: String, detail: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid parameter pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, detail: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            detail: detail.into(),
        }
    }
}

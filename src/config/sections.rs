//! Per-section configuration structs.
//!
//! Each adapter gets its own struct carrying its base URL and credentials, so
//! nothing reads the process environment after startup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Outbound HTTP client settings shared by every adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// NCBI E-utilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PubMedConfig {
    pub base_url: String,

    /// Raises the NCBI rate limit from 3 to 10 requests per second
    pub api_key: Option<String>,

    /// Contact address NCBI asks clients to send
    pub email: Option<String>,

    /// Tool name reported to NCBI
    pub tool: String,
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            api_key: None,
            email: None,
            tool: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

/// arXiv export API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArxivConfig {
    pub base_url: String,

    /// Base URL of the PDF mirror
    pub pdf_base_url: String,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: "http://export.arxiv.org/api".to_string(),
            pdf_base_url: "https://arxiv.org/pdf".to_string(),
        }
    }
}

/// ChEMBL REST API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChemblConfig {
    pub base_url: String,
}

impl Default for ChemblConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.ebi.ac.uk/chembl/api/data".to_string(),
        }
    }
}

/// ClinicalTrials.gov API v2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalTrialsConfig {
    pub base_url: String,

    /// Public study page prefix used for record URLs
    pub study_url: String,
}

impl Default for ClinicalTrialsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://clinicaltrials.gov/api/v2".to_string(),
            study_url: "https://clinicaltrials.gov/study".to_string(),
        }
    }
}

/// Tavily web search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TavilyConfig {
    pub base_url: String,

    /// Required at call time; without it `web_search` fails with an authentication error
    pub api_key: Option<String>,

    /// `basic` or `advanced`
    pub search_depth: String,
}

impl Default for TavilyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tavily.com".to_string(),
            api_key: None,
            search_depth: "basic".to_string(),
        }
    }
}

/// A model the chat user can pick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOption {
    /// Identifier passed through to the agent service unmodified
    pub id: String,

    /// Display name
    pub label: String,
}

/// Chat front end and agent service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub host: String,
    pub port: u16,

    /// OpenAI-compatible base URL; `/chat/completions` is appended
    pub agent_url: String,

    pub agent_api_key: Option<String>,

    /// Timeout for one streamed agent turn in seconds
    pub agent_timeout_secs: u64,

    pub models: Vec<ModelOption>,

    /// Thinking budget sent when a turn asks for reasoning
    pub reasoning_budget_tokens: u32,

    /// Number of most recent messages forwarded as history
    pub history_window: usize,

    pub system_prompt: String,

    /// Where generated reports are also saved; downloads only when unset
    pub reports_dir: Option<PathBuf>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            agent_url: "http://127.0.0.1:8000/v1".to_string(),
            agent_api_key: None,
            agent_timeout_secs: 900,
            models: vec![ModelOption {
                id: "us.anthropic.claude-3-7-sonnet-20250219-v1:0".to_string(),
                label: "Claude 3.7 Sonnet".to_string(),
            }],
            reasoning_budget_tokens: 16_000,
            history_window: 10,
            system_prompt: DEFAULT_SYSTEM_PROMPT.trim().to_string(),
            reports_dir: None,
        }
    }
}

impl ChatConfig {
    /// Model used when a request does not name one
    pub fn default_model(&self) -> Option<&ModelOption> {
        self.models.first()
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"
You are an orchestrator agent for drug discovery research.

For simple questions answer directly without calling tools. For research
requests, plan which databases to consult, then gather evidence with the
available tools:
- search_pubmed and search_arxiv for biomedical and preprint literature
- search_compounds, search_targets and get_bioactivity for ChEMBL compound,
  target and potency data (report SMILES and activity values)
- search_trials and get_trial for ClinicalTrials.gov studies
- web_search for recent news and general web results

Synthesize the findings into a structured report:
1. Executive Summary
2. Target Overview
3. Research Landscape
4. Drug Development Status
5. References

Cite every source you use.
"#;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

//! Source adapters with a uniform, trait-based contract.
//!
//! Every external operation (a PubMed search, a ChEMBL activity lookup, a
//! Tavily web search, ...) is one [`Source`]. A source declares its tool
//! descriptor, turns a validated [`Query`] into one logical upstream call and
//! returns normalized [`Record`]s in upstream order.
//!
//! Adding a source means writing one `Source` impl and registering it with the
//! [`SourceRegistry`]. Adapters keep no state between calls: no caching, no
//! retries, no rate limiting.
//!
//! # Providers
//!
//! | Provider         | Tools                                                   |
//! |------------------|---------------------------------------------------------|
//! | `pubmed`         | `search_pubmed`                                         |
//! | `arxiv`          | `search_arxiv`                                          |
//! | `chembl`         | `search_compounds`, `search_targets`, `get_bioactivity` |
//! | `clinicaltrials` | `search_trials`, `get_trial`                            |
//! | `tavily`         | `web_search`                                            |

mod arxiv;
mod chembl;
mod clinical_trials;
pub mod mock;
mod pubmed;
mod registry;
mod tavily;

pub use arxiv::ArxivSource;
pub use chembl::{BioactivitySource, CompoundSearchSource, TargetSearchSource};
pub use clinical_trials::{TrialLookupSource, TrialSearchSource};
pub use mock::MockSource;
pub use pubmed::PubMedSource;
pub use registry::{SourceRegistry, PROVIDERS};
pub use tavily::TavilySource;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::{Query, Record, ToolDescriptor};

/// The Source trait defines the contract every adapter implements.
///
/// # Implementing a New Source
///
/// 1. Build a [`ToolDescriptor`] once in the constructor
/// 2. Parse the query into a typed parameter struct with [`parse_query`]
/// 3. Issue the request through [`HttpClient`](crate::utils::HttpClient), which
///    maps transport and status failures onto [`SourceError`]
/// 4. Convert every response row into a [`Record`], failing with
///    [`SourceError::MalformedResponse`] when a mandatory field is missing
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Stable tool name, e.g. "search_pubmed"
    fn id(&self) -> &str;

    /// Upstream provider this adapter talks to, e.g. "chembl"
    fn provider(&self) -> &str {
        self.id()
    }

    /// Human-readable name of the adapter
    fn name(&self) -> &str;

    /// Tool descriptor, built once at construction
    fn descriptor(&self) -> &ToolDescriptor;

    /// Run one query against the upstream API
    async fn invoke(&self, query: &Query) -> Result<Vec<Record>, SourceError>;
}

/// Failure categories shared by adapters, the tool registry and the agent client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Transport error or non-success status from upstream
    SourceUnavailable,
    /// Upstream answered but the body could not be turned into records
    MalformedResponse,
    /// Arguments did not match the tool's declared schema
    SchemaViolation,
    /// Credentials missing or rejected
    AuthenticationFailure,
    /// No tool registered under the requested name
    UnknownTool,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SourceUnavailable => "SourceUnavailable",
            ErrorKind::MalformedResponse => "MalformedResponse",
            ErrorKind::SchemaViolation => "SchemaViolation",
            ErrorKind::AuthenticationFailure => "AuthenticationFailure",
            ErrorKind::UnknownTool => "UnknownTool",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when invoking a source
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    /// Network failure or non-success upstream status
    #[error("{adapter} unavailable{}: {detail}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Unavailable {
        adapter: String,
        status: Option<u16>,
        detail: String,
    },

    /// Body could not be parsed, or a row lacks a mandatory field
    #[error("Malformed response from {adapter}: {detail}")]
    MalformedResponse { adapter: String, detail: String },

    /// Missing or rejected credentials
    #[error("Authentication failed for {adapter}: {detail}")]
    Authentication { adapter: String, detail: String },

    /// Query could not be mapped onto the adapter's parameters
    #[error("Invalid query for {adapter}: {detail}")]
    InvalidQuery { adapter: String, detail: String },
}

impl SourceError {
    pub fn unavailable(adapter: &str, status: Option<u16>, detail: impl Into<String>) -> Self {
        SourceError::Unavailable {
            adapter: adapter.to_string(),
            status,
            detail: detail.into(),
        }
    }

    pub fn malformed(adapter: &str, detail: impl Into<String>) -> Self {
        SourceError::MalformedResponse {
            adapter: adapter.to_string(),
            detail: detail.into(),
        }
    }

    pub fn authentication(adapter: &str, detail: impl Into<String>) -> Self {
        SourceError::Authentication {
            adapter: adapter.to_string(),
            detail: detail.into(),
        }
    }

    pub fn invalid_query(adapter: &str, detail: impl Into<String>) -> Self {
        SourceError::InvalidQuery {
            adapter: adapter.to_string(),
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::Unavailable { .. } => ErrorKind::SourceUnavailable,
            SourceError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            SourceError::Authentication { .. } => ErrorKind::AuthenticationFailure,
            SourceError::InvalidQuery { .. } => ErrorKind::SchemaViolation,
        }
    }

    /// Name of the adapter that failed
    pub fn adapter(&self) -> &str {
        match self {
            SourceError::Unavailable { adapter, .. }
            | SourceError::MalformedResponse { adapter, .. }
            | SourceError::Authentication { adapter, .. }
            | SourceError::InvalidQuery { adapter, .. } => adapter,
        }
    }

    /// Upstream HTTP status, when the failure came with one
    pub fn status(&self) -> Option<u16> {
        match self {
            SourceError::Unavailable { status, .. } => *status,
            _ => None,
        }
    }
}

/// Deserialize a query into an adapter's typed parameter struct
pub fn parse_query<T: DeserializeOwned>(adapter: &str, query: &Query) -> Result<T, SourceError> {
    query
        .parse()
        .map_err(|e| SourceError::invalid_query(adapter, e.to_string()))
}

/// Unwrap a mandatory response field, or report the row as malformed
pub(crate) fn require<T>(adapter: &str, value: Option<T>, what: &str) -> Result<T, SourceError> {
    value.ok_or_else(|| SourceError::malformed(adapter, format!("missing {}", what)))
}

/// Like [`require`] for text fields, also rejecting blank strings
pub(crate) fn require_text(
    adapter: &str,
    value: Option<String>,
    what: &str,
) -> Result<String, SourceError> {
    require(
        adapter,
        value.filter(|v| !v.trim().is_empty()).map(|v| v.trim().to_string()),
        what,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            SourceError::unavailable("PubMed", Some(503), "down").kind(),
            ErrorKind::SourceUnavailable
        );
        assert_eq!(
            SourceError::malformed("ChEMBL", "bad json").kind(),
            ErrorKind::MalformedResponse
        );
        assert_eq!(
            SourceError::authentication("Tavily", "no key").kind(),
            ErrorKind::AuthenticationFailure
        );
        assert_eq!(
            SourceError::invalid_query("arXiv", "bad").kind(),
            ErrorKind::SchemaViolation
        );
    }

    #[test]
    fn test_error_display() {
        let err = SourceError::unavailable("PubMed", Some(503), "Service Unavailable");
        assert_eq!(err.to_string(), "PubMed unavailable (HTTP 503): Service Unavailable");
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.adapter(), "PubMed");

        let err = SourceError::unavailable("arXiv", None, "connection refused");
        assert_eq!(err.to_string(), "arXiv unavailable: connection refused");
    }

    #[test]
    fn test_error_kind_serializes_by_name() {
        assert_eq!(
            serde_json::to_value(ErrorKind::AuthenticationFailure).unwrap(),
            json!("AuthenticationFailure")
        );
        assert_eq!(ErrorKind::UnknownTool.to_string(), "UnknownTool");
    }

    #[test]
    fn test_parse_query_maps_to_invalid_query() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Params {
            query: String,
        }

        let err = parse_query::<Params>("PubMed", &Query::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    }

    #[test]
    fn test_require_text_rejects_blank() {
        let err = require_text("ChEMBL", Some("  ".to_string()), "molecule_chembl_id").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert_eq!(
            require_text("ChEMBL", Some(" CHEMBL25 ".to_string()), "id").unwrap(),
            "CHEMBL25"
        );
    }
}

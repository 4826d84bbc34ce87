//! Tool registry for MCP tools.
//!
//! Every registered [`Source`] becomes one tool. Arguments are validated
//! against the tool's [`ToolDescriptor`] before the adapter is called, so a
//! malformed call never reaches the network.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{Record, SchemaViolation, ToolDescriptor};
use crate::sources::{ErrorKind, Source, SourceError, SourceRegistry};

/// Errors returned by [`ToolRegistry::invoke`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: field '{field}': {detail}")]
    SchemaViolation {
        tool: String,
        field: String,
        detail: String,
    },

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl ToolError {
    fn schema(tool: &str, violation: SchemaViolation) -> Self {
        ToolError::SchemaViolation {
            tool: tool.to_string(),
            field: violation.field,
            detail: violation.detail,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::UnknownTool(_) => ErrorKind::UnknownTool,
            ToolError::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            ToolError::Source(e) => e.kind(),
        }
    }

    /// The offending field, for schema violations
    pub fn field(&self) -> Option<&str> {
        match self {
            ToolError::SchemaViolation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Structured form sent back to the agent
    pub fn to_failure(&self, tool: &str) -> ToolFailure {
        ToolFailure {
            tool: tool.to_string(),
            kind: self.kind(),
            detail: self.to_string(),
        }
    }
}

/// Serializable failure report: `{tool, kind, detail}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub tool: String,
    pub kind: ErrorKind,
    pub detail: String,
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display is the JSON form so MCP clients can parse the error message
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{} failed ({}): {}", self.tool, self.kind, self.detail),
        }
    }
}

/// Registry for all MCP tools
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    sources: SourceRegistry,
}

impl ToolRegistry {
    /// Expose every source in the registry as a tool
    pub fn from_sources(sources: SourceRegistry) -> Self {
        Self { sources }
    }

    /// Descriptors of all tools, sorted by name
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.sources.all().map(|s| s.descriptor())
    }

    /// Get a tool descriptor by name
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.sources.get(name).map(|s| s.descriptor())
    }

    /// Tool names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.ids()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Validate `args` against the tool's schema and call its adapter
    pub async fn invoke(&self, name: &str, args: Value) -> Result<Vec<Record>, ToolError> {
        let source = self
            .sources
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let result = Self::dispatch(source.as_ref(), &args).await;
        if let Err(e) = &result {
            tracing::warn!(tool = name, kind = %e.kind(), "tool failed: {}", e);
        }
        result
    }

    async fn dispatch(source: &dyn Source, args: &Value) -> Result<Vec<Record>, ToolError> {
        let tool = source.id();
        let query = source
            .descriptor()
            .validate(args)
            .map_err(|v| ToolError::schema(tool, v))?;

        let started = Instant::now();
        let records = source.invoke(&query).await?;
        tracing::info!(
            tool,
            count = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool call completed"
        );

        Ok(records)
    }
}

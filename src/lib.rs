//! # Drug Discovery MCP
//!
//! Model Context Protocol (MCP) tools over the public data sources used in
//! early drug discovery research, plus a chat front end for an external agent
//! that calls them.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Queries, normalized records and tool descriptors
//! - [`sources`]: One adapter per tool (PubMed, arXiv, ChEMBL, ClinicalTrials.gov, Tavily)
//! - [`mcp`]: Tool registry with argument validation, and the MCP server
//! - [`chat`]: Web chat front end that streams replies from the agent service
//! - [`utils`]: HTTP client and terminal tables
//! - [`config`]: Configuration management

pub mod chat;
pub mod config;
pub mod mcp;
pub mod models;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use mcp::{ToolError, ToolRegistry};
pub use models::{Query, Record};
pub use sources::{Source, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

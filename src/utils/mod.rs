//! Utility modules shared by the adapters and the CLI.
//!
//! - [`HttpClient`]: HTTP client that maps transport errors and upstream statuses onto [`SourceError`](crate::sources::SourceError)
//! - [`records_table`] / [`tools_table`]: comfy-table renderings for terminal output
//!
//! # HTTP Client
//!
//! ```rust,no_run
//! use drug_discovery_mcp::config::HttpConfig;
//! use drug_discovery_mcp::utils::HttpClient;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(&HttpConfig::default())?;
//! let body = client
//!     .get_text("Example", "https://api.example.com", &[("q", "HER2".to_string())])
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod display;
mod http;

pub use display::{record_kind, records_table, tools_table, truncate_with_ellipsis, SUMMARY_WIDTH};
pub use http::{status_error, HttpClient};

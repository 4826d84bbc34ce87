//! MCP server implementation using pmcp (Pragmatic AI's rust-mcp-sdk).
//!
//! Each registered tool is wrapped in a pmcp [`ToolHandler`]. Successful
//! calls return the JSON array of records; failures are returned as a tool
//! error whose message is the `{tool, kind, detail}` JSON object.

use crate::mcp::tools::{ToolError, ToolRegistry};
use crate::models::ToolDescriptor;
use async_trait::async_trait;
use pmcp::{
    server::streamable_http_server::StreamableHttpServer, Error, RequestHandlerExtra, Server,
    ServerCapabilities, ToolHandler, ToolInfo,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// The MCP server exposing the drug discovery tools
#[derive(Debug, Clone)]
pub struct McpServer {
    server: Arc<Mutex<Server>>,
}

impl McpServer {
    /// Create a new MCP server with the given tool registry
    pub fn new(tools: Arc<ToolRegistry>) -> Result<Self, pmcp::Error> {
        let server = Self::build_server_impl(tools)?;
        Ok(Self {
            server: Arc::new(Mutex::new(server)),
        })
    }

    fn build_server_impl(tools: Arc<ToolRegistry>) -> Result<Server, pmcp::Error> {
        let mut builder = Server::builder()
            .name(env!("CARGO_PKG_NAME"))
            .version(env!("CARGO_PKG_VERSION"))
            .capabilities(ServerCapabilities::default());

        for descriptor in tools.descriptors() {
            let handler = ToolWrapper::new(descriptor, tools.clone());
            builder = builder.tool(descriptor.name.clone(), handler);
        }

        builder.build()
    }

    /// Run the server in stdio mode (for Claude Desktop and other MCP clients)
    pub async fn run(self) -> Result<(), pmcp::Error> {
        tracing::info!("Starting MCP server in stdio mode");

        // run_stdio() takes ownership of the Server
        let server = Arc::try_unwrap(self.server)
            .map_err(|_| Error::internal("Cannot unwrap Arc - multiple references exist"))?
            .into_inner();

        server.run_stdio().await
    }

    /// Run the server in streamable HTTP mode
    pub async fn run_http(&self, addr: &str) -> Result<(SocketAddr, JoinHandle<()>), pmcp::Error> {
        tracing::info!("Starting MCP server in HTTP mode on {}", addr);

        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::invalid_params(format!("Invalid address: {}", e)))?;

        let http_server = StreamableHttpServer::new(socket_addr, self.server.clone());
        http_server.start().await
    }
}

/// Adapts one registry tool to pmcp's ToolHandler
#[derive(Debug, Clone)]
struct ToolWrapper {
    name: String,
    description: String,
    input_schema: Value,
    tools: Arc<ToolRegistry>,
}

impl ToolWrapper {
    fn new(descriptor: &ToolDescriptor, tools: Arc<ToolRegistry>) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            input_schema: descriptor.input_schema(),
            tools,
        }
    }

    async fn call(&self, args: Value) -> Result<Value, Error> {
        match self.tools.invoke(&self.name, args).await {
            Ok(records) => serde_json::to_value(records)
                .map_err(|e| Error::internal(format!("failed to encode records: {}", e))),
            Err(e) => Err(to_pmcp_error(&self.name, &e)),
        }
    }
}

/// Schema violations are the caller's fault; everything else is internal
fn to_pmcp_error(tool: &str, error: &ToolError) -> Error {
    let failure = error.to_failure(tool).to_string();
    match error {
        ToolError::SchemaViolation { .. } | ToolError::UnknownTool(_) => {
            Error::invalid_params(failure)
        }
        ToolError::Source(_) => Error::internal(failure),
    }
}

#[async_trait]
impl ToolHandler for ToolWrapper {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> Result<Value, Error> {
        self.call(args).await
    }

    fn metadata(&self) -> Option<ToolInfo> {
        Some(ToolInfo::new(
            self.name.clone(),
            Some(self.description.clone()),
            self.input_schema.clone(),
        ))
    }
}

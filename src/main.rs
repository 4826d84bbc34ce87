use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use drug_discovery_mcp::chat::{self, HttpAgentSession};
use drug_discovery_mcp::config::{default_config_path, find_config_file, Config, LogFormat};
use drug_discovery_mcp::mcp::{McpServer, ToolRegistry};
use drug_discovery_mcp::models::Record;
use drug_discovery_mcp::sources::{SourceRegistry, PROVIDERS};
use drug_discovery_mcp::utils::{records_table, tools_table};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Drug Discovery MCP - research tools over PubMed, arXiv, ChEMBL, ClinicalTrials.gov and web search
#[derive(Parser, Debug)]
#[command(name = "drug-discovery-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MCP research tools for drug discovery, with a chat front end", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show all environment variables
    #[arg(long, global = true)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

impl OutputFormat {
    fn resolve(self) -> Self {
        match self {
            OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Table,
            OutputFormat::Auto => OutputFormat::Json,
            other => other,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server (for Claude Desktop and other MCP clients)
    Serve {
        /// Serve streamable HTTP instead of stdio
        #[arg(long)]
        http: bool,

        /// Port for HTTP mode
        #[arg(long, short, default_value_t = 8080)]
        port: u16,

        /// Host to bind to for HTTP mode
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Only expose the tools of these providers (repeatable)
        #[arg(long, short)]
        source: Vec<String>,
    },

    /// Run the chat front end
    Chat {
        /// Host to bind to (overrides chat.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides chat.port)
        #[arg(long, short)]
        port: Option<u16>,

        /// Agent service base URL (overrides chat.agent_url)
        #[arg(long)]
        agent_url: Option<String>,
    },

    /// List available tools and their parameters
    #[command(alias = "ls")]
    Tools,

    /// Call one tool and print its records
    Invoke {
        /// Tool name, e.g. search_pubmed
        tool: String,

        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        args: String,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a configuration file with the default values
    Init {
        /// Target path (default: the per-user config location)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },

    /// Print the effective configuration with credentials masked
    Show,

    /// Print the config file in use
    Path,
}

/// Print all recognized environment variables
fn print_env_vars() {
    println!("Drug Discovery MCP - Environment Variables");
    println!();
    println!("API Keys:");
    println!("  TAVILY_API_KEY              Tavily API key (required for web_search)");
    println!("  NCBI_API_KEY                NCBI E-utilities key (higher rate limits)");
    println!("  NCBI_EMAIL                  Contact email sent to NCBI");
    println!("  AGENT_API_KEY               Bearer key for the agent service");
    println!();
    println!("Chat:");
    println!("  AGENT_URL                   OpenAI-compatible agent base URL (default: http://127.0.0.1:8000/v1)");
    println!();
    println!("Structured Overrides:");
    println!("  DRUG_DISCOVERY_<SECTION>__<KEY>  Any config value, e.g. DRUG_DISCOVERY_HTTP__TIMEOUT_SECS=60");
    println!();
    println!("Other Settings:");
    println!("  RUST_LOG                    Rust logging filter (e.g., debug, drug_discovery_mcp=trace)");
    println!();
    println!("Example:");
    println!("  export TAVILY_API_KEY=\"tvly-...\"");
    println!("  export DRUG_DISCOVERY_CHAT__PORT=\"3001\"");
}

/// Initialize tracing on stderr; stdout carries MCP stdio frames and command output
fn init_tracing(cli: &Cli, config: &Config) {
    let directive = if cli.quiet {
        "drug_discovery_mcp=error".to_string()
    } else {
        match cli.verbose {
            0 => config.logging.level.clone(),
            1 => "drug_discovery_mcp=debug".to_string(),
            _ => "drug_discovery_mcp=trace".to_string(),
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(std::io::stderr().is_terminal()),
            )
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.env {
        print_env_vars();
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&cli, &config);

    match cli.command {
        Some(Commands::Serve {
            http,
            port,
            host,
            source,
        }) => {
            let mut sources = SourceRegistry::from_config(&config)?;
            if !source.is_empty() {
                sources.retain_providers(&source)?;
            }
            tracing::info!(
                "Serving {} tools: {}",
                sources.len(),
                sources.ids().collect::<Vec<_>>().join(", ")
            );

            let server = McpServer::new(Arc::new(ToolRegistry::from_sources(sources)))?;
            if http {
                let (addr, handle) = server.run_http(&format!("{}:{}", host, port)).await?;
                tracing::info!("MCP server listening on http://{}", addr);
                tokio::select! {
                    result = handle => result.context("MCP HTTP server task failed")?,
                    _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down MCP server"),
                }
            } else {
                server.run().await?;
            }
        }

        Some(Commands::Chat {
            host,
            port,
            agent_url,
        }) => {
            let mut chat_config = config.chat.clone();
            if let Some(host) = host {
                chat_config.host = host;
            }
            if let Some(port) = port {
                chat_config.port = port;
            }
            if let Some(url) = agent_url {
                url::Url::parse(&url).with_context(|| format!("invalid agent URL '{}'", url))?;
                chat_config.agent_url = url;
            }

            let agent = HttpAgentSession::new(&chat_config, &config.http)?;
            tracing::info!("Forwarding chat turns to {}", agent.endpoint());
            chat::serve(chat_config, Arc::new(agent)).await?;
        }

        Some(Commands::Tools) => {
            let tools = ToolRegistry::from_sources(SourceRegistry::from_config(&config)?);
            output_tools(&tools, cli.output);
        }

        Some(Commands::Invoke { tool, args }) => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("arguments must be a JSON object")?;
            let tools = ToolRegistry::from_sources(SourceRegistry::from_config(&config)?);

            match tools.invoke(&tool, args).await {
                Ok(records) => output_records(&records, cli.output)?,
                Err(e) => {
                    println!("{}", e.to_failure(&tool));
                    bail!("{} failed: {}", tool, e);
                }
            }
        }

        Some(Commands::Config { command }) => match command {
            ConfigCommands::Init { path, force } => {
                let path = path
                    .or_else(default_config_path)
                    .context("could not determine a config directory; pass --path")?;
                if path.exists() && !force {
                    bail!("{} already exists (use --force to overwrite)", path.display());
                }
                Config::default().save(&path)?;
                println!("Wrote {}", path.display());
            }
            ConfigCommands::Show => print!("{}", config.redacted().to_toml()?),
            ConfigCommands::Path => match cli.config.or_else(find_config_file) {
                Some(path) => println!("{}", path.display()),
                None => println!("(none; using defaults and environment)"),
            },
        },

        None => {
            println!("No command given. Run with --help for usage.");
            println!("Providers: {}", PROVIDERS.join(", "));
        }
    }

    Ok(())
}

fn output_tools(tools: &ToolRegistry, format: OutputFormat) {
    match format.resolve() {
        OutputFormat::Json => {
            let listing: Vec<serde_json::Value> = tools
                .descriptors()
                .map(|d| {
                    serde_json::json!({
                        "name": d.name,
                        "description": d.description,
                        "inputSchema": d.input_schema(),
                    })
                })
                .collect();
            println!("{}", serde_json::Value::Array(listing));
        }
        OutputFormat::Plain => {
            for descriptor in tools.descriptors() {
                println!("{} - {}", descriptor.name, descriptor.description);
            }
        }
        _ => println!("{}", tools_table(tools.descriptors())),
    }
}

fn output_records(records: &[Record], format: OutputFormat) -> Result<()> {
    match format.resolve() {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        OutputFormat::Plain => {
            for record in records {
                println!("{}", record.summary());
            }
        }
        _ => {
            if records.is_empty() {
                println!("No results.");
            } else {
                println!("{}", records_table(records));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_version() {
        let version = env!("CARGO_PKG_VERSION");
        let parts: Vec<&str> = version.split('.').collect();
        assert!(parts.len() >= 2);
        assert!(parts[0].parse::<u32>().is_ok());
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["drug-discovery-mcp"]);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert_eq!(cli.output, OutputFormat::Auto);
        assert!(cli.config.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::parse_from(["drug-discovery-mcp", "-vv", "tools"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_output_format_explicit() {
        assert_eq!(OutputFormat::Json.resolve(), OutputFormat::Json);
        assert_eq!(OutputFormat::Plain.resolve(), OutputFormat::Plain);
    }

    #[test]
    fn test_cli_serve_command() {
        let cli = Cli::parse_from(["drug-discovery-mcp", "serve"]);
        match &cli.command {
            Some(Commands::Serve {
                http,
                port,
                host,
                source,
            }) => {
                assert!(!*http);
                assert_eq!(*port, 8080);
                assert_eq!(host, "127.0.0.1");
                assert!(source.is_empty());
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_serve_source_subset() {
        let cli = Cli::parse_from([
            "drug-discovery-mcp",
            "serve",
            "--http",
            "--source",
            "chembl",
            "-s",
            "clinicaltrials",
        ]);
        match cli.command {
            Some(Commands::Serve { http, source, .. }) => {
                assert!(http);
                assert_eq!(source, vec!["chembl", "clinicaltrials"]);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_invoke_command() {
        let cli = Cli::parse_from([
            "drug-discovery-mcp",
            "invoke",
            "search_pubmed",
            r#"{"gene": "HER2"}"#,
            "-o",
            "json",
        ]);
        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Some(Commands::Invoke { tool, args }) => {
                assert_eq!(tool, "search_pubmed");
                assert_eq!(args, r#"{"gene": "HER2"}"#);
            }
            _ => panic!("Expected Invoke command"),
        }
    }

    #[test]
    fn test_cli_invoke_default_args() {
        let cli = Cli::parse_from(["drug-discovery-mcp", "invoke", "get_trial"]);
        assert!(matches!(cli.command, Some(Commands::Invoke { args, .. }) if args == "{}"));
    }

    #[test]
    fn test_cli_chat_overrides() {
        let cli = Cli::parse_from(["drug-discovery-mcp", "chat", "--port", "3100"]);
        match cli.command {
            Some(Commands::Chat { port, host, .. }) => {
                assert_eq!(port, Some(3100));
                assert!(host.is_none());
            }
            _ => panic!("Expected Chat command"),
        }
    }

    #[test]
    fn test_cli_config_init() {
        let cli = Cli::parse_from(["drug-discovery-mcp", "config", "init", "--force"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                command: ConfigCommands::Init { force: true, .. }
            })
        ));
    }
}

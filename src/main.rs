use anyhow::{Context, Result};
use aws_docs_mcp::config::{find_config_file, load_config, Config, LogFormat, TransportMode};
use aws_docs_mcp::content::ExtractionStrategy;
use aws_docs_mcp::mcp::{McpDispatcher, SessionManager, ToolRegistry, TransportKind};
use aws_docs_mcp::models::{DEFAULT_RECOMMENDATIONS, DEFAULT_SEARCH_RESULTS};
use aws_docs_mcp::sources::AwsDocsSource;
use aws_docs_mcp::transport::{
    serve_http, AppState, HttpSettings, Shutdown, SseTransport, StdioTransport,
    StreamableHttpTransport, Transport,
};
use aws_docs_mcp::utils::HttpClient;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log level variable honoured for compatibility with existing launch scripts
const LEGACY_LOG_ENV: &str = "FASTMCP_LOG_LEVEL";

/// AWS Docs MCP - Search, read and explore AWS documentation over MCP
#[derive(Parser, Debug)]
#[command(name = "aws-docs-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MCP server for searching, reading and exploring AWS documentation", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Upstream request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// HTML to Markdown strategy (dom or text)
    #[arg(long, global = true)]
    strategy: Option<ExtractionStrategy>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server
    Serve {
        /// Transport to serve: stdio, sse, http or all
        #[arg(long, short)]
        transport: Option<TransportMode>,

        /// Host to bind for the HTTP transports
        #[arg(long)]
        host: Option<String>,

        /// Port to bind for the HTTP transports
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Search the documentation
    #[command(alias = "s")]
    Search {
        /// Search terms
        query: String,

        /// Maximum number of results
        #[arg(long, short, default_value_t = DEFAULT_SEARCH_RESULTS)]
        max_results: usize,

        /// Number of results to skip
        #[arg(long, default_value_t = 0)]
        start_index: usize,
    },

    /// Print a documentation page as Markdown
    #[command(alias = "r")]
    Read {
        /// Documentation page URL
        url: String,

        /// Maximum number of characters to print
        #[arg(long, short)]
        max_length: Option<usize>,

        /// Character offset to start from
        #[arg(long, default_value_t = 0)]
        start_index: usize,
    },

    /// Related pages for a documentation URL or a content excerpt
    Recommend {
        /// Documentation URL or excerpt
        target: String,

        /// Maximum number of recommendations
        #[arg(long, short, default_value_t = DEFAULT_RECOMMENDATIONS)]
        max_results: usize,
    },

    /// Print the tool definitions as JSON
    Tools,

    /// Print the effective configuration as TOML
    Config,
}

/// Filter directive for the subscriber
///
/// `RUST_LOG` wins, then the legacy level variable, then `-v`/`-q`, then the
/// configured level.
fn log_filter(
    rust_log: Option<String>,
    legacy_level: Option<String>,
    verbose: u8,
    quiet: bool,
    configured: &str,
) -> String {
    if let Some(filter) = rust_log.filter(|f| !f.trim().is_empty()) {
        return filter;
    }

    let level = if let Some(level) = legacy_level.filter(|l| !l.trim().is_empty()) {
        match level.trim().to_ascii_lowercase().as_str() {
            "warning" => "warn".to_string(),
            "critical" | "fatal" => "error".to_string(),
            other => other.to_string(),
        }
    } else if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => configured.to_string(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    format!("aws_docs_mcp={level},tower_http={level}")
}

fn init_tracing(cli: &Cli, config: &Config) {
    let filter = log_filter(
        std::env::var("RUST_LOG").ok(),
        std::env::var(LEGACY_LOG_ENV).ok(),
        cli.verbose,
        cli.quiet,
        &config.logging.level,
    );
    let env_filter = tracing_subscriber::EnvFilter::new(filter);
    let registry = tracing_subscriber::registry().with(env_filter);

    // stdout is reserved for the stdio transport
    match config.logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }
}

/// Apply global and `serve` flags on top of the loaded configuration
fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(timeout) = cli.timeout {
        config.upstream.timeout_secs = timeout;
    }
    if let Some(strategy) = cli.strategy {
        config.extraction.strategy = strategy;
    }
    if let Some(Commands::Serve {
        transport,
        host,
        port,
    }) = &cli.command
    {
        if let Some(transport) = transport {
            config.server.transport = *transport;
        }
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }
}

fn build_tools(config: &Config) -> Result<ToolRegistry> {
    let client = HttpClient::with_settings(&config.upstream.user_agent, config.upstream.timeout())
        .context("failed to build HTTP client")?;
    let source = Arc::new(AwsDocsSource::new(client, config.upstream.endpoints()));
    let extractor = config
        .extraction
        .strategy
        .build()
        .context("failed to build content extractor")?;
    Ok(ToolRegistry::documentation(
        source,
        extractor,
        config.upstream.tool_settings(),
    ))
}

/// Flip the shutdown flag on SIGINT or SIGTERM
fn spawn_signal_handler(tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "cannot listen for SIGTERM");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!("shutdown requested");
        let _ = tx.send(true);
    });
}

async fn serve(config: &Config, shutdown: Shutdown) -> Result<()> {
    let dispatcher = Arc::new(McpDispatcher::new(build_tools(config)?));
    let sessions = Arc::new(SessionManager::new(config.sessions.inactivity_timeout()));
    let addr = config.server.bind_address();

    let transports = match config.server.transport {
        TransportMode::Stdio => vec![TransportKind::Stdio],
        TransportMode::Sse => vec![TransportKind::Sse],
        TransportMode::Http => vec![TransportKind::Http],
        TransportMode::All => vec![TransportKind::Sse, TransportKind::Http],
    };
    let settings = HttpSettings {
        heartbeat: config.sessions.heartbeat(),
        sse_max_age: config.sessions.sse_max_age(),
        sweep_interval: config.sessions.sweep_interval(),
        transports,
    };
    let state = AppState::new(dispatcher.clone(), sessions.clone(), settings, shutdown.clone());

    tracing::info!(
        transport = ?config.server.transport,
        strategy = ?config.extraction.strategy,
        "starting aws-docs-mcp {}",
        aws_docs_mcp::VERSION
    );

    let transport: Box<dyn Transport> = match config.server.transport {
        TransportMode::Stdio => Box::new(StdioTransport::new(dispatcher, sessions)),
        TransportMode::Sse => Box::new(SseTransport::new(addr, state)),
        TransportMode::Http => Box::new(StreamableHttpTransport::new(addr, state)),
        TransportMode::All => {
            let routes = SseTransport::routes().merge(StreamableHttpTransport::routes());
            serve_http(&addr, state, routes).await?;
            return Ok(());
        }
    };
    tracing::debug!(kind = %transport.kind(), "transport ready");
    transport.serve(shutdown).await?;
    Ok(())
}

/// Run one tool from the command line and print its text
async fn run_tool(config: &Config, name: &str, args: serde_json::Value) -> Result<()> {
    let tools = build_tools(config)?;
    let result = tools.invoke(name, args).await?;
    println!("{}", result.first_text().unwrap_or_default());
    if result.is_error {
        anyhow::bail!("{} reported an error", name);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(find_config_file);
    let mut config = load_config(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("failed to load configuration from {}", path.display()),
        None => "failed to load configuration".to_string(),
    })?;
    apply_overrides(&cli, &mut config);

    init_tracing(&cli, &config);
    if let Some(path) = &config_path {
        tracing::debug!("Using config file: {}", path.display());
    }

    match cli.command {
        None | Some(Commands::Serve { .. }) => {
            let (tx, rx) = watch::channel(false);
            spawn_signal_handler(tx);
            serve(&config, rx).await?;
        }

        Some(Commands::Search {
            query,
            max_results,
            start_index,
        }) => {
            run_tool(
                &config,
                "search_documentation",
                json!({ "query": query, "max_results": max_results, "start_index": start_index }),
            )
            .await?;
        }

        Some(Commands::Read {
            url,
            max_length,
            start_index,
        }) => {
            let mut args = json!({ "url": url, "start_index": start_index });
            if let Some(max_length) = max_length {
                args["max_length"] = json!(max_length);
            }
            run_tool(&config, "read_documentation", args).await?;
        }

        Some(Commands::Recommend {
            target,
            max_results,
        }) => {
            run_tool(
                &config,
                "recommend",
                json!({ "content_or_url": target, "max_results": max_results }),
            )
            .await?;
        }

        Some(Commands::Tools) => {
            let tools = build_tools(&config)?;
            println!("{}", serde_json::to_string_pretty(&tools.definitions())?);
        }

        Some(Commands::Config) => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_search_command() {
        let cli = Cli::parse_from(["aws-docs-mcp", "search", "s3 versioning", "--max-results", "3"]);
        match &cli.command {
            Some(Commands::Search {
                query,
                max_results,
                start_index,
            }) => {
                assert_eq!(query, "s3 versioning");
                assert_eq!(*max_results, 3);
                assert_eq!(*start_index, 0);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_read_command() {
        let cli = Cli::parse_from([
            "aws-docs-mcp",
            "read",
            "https://docs.aws.amazon.com/lambda/latest/dg/welcome.html",
            "--start-index",
            "5000",
        ]);
        match &cli.command {
            Some(Commands::Read {
                url,
                max_length,
                start_index,
            }) => {
                assert!(url.ends_with("welcome.html"));
                assert_eq!(*max_length, None);
                assert_eq!(*start_index, 5000);
            }
            _ => panic!("Expected Read command"),
        }
    }

    #[test]
    fn test_cli_serve_defaults_come_from_config() {
        let cli = Cli::parse_from(["aws-docs-mcp", "serve"]);
        let mut config = Config::default();
        apply_overrides(&cli, &mut config);
        assert_eq!(config.server.transport, TransportMode::Stdio);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_cli_serve_flags_override_config() {
        let cli = Cli::parse_from([
            "aws-docs-mcp",
            "--timeout",
            "5",
            "--strategy",
            "text",
            "serve",
            "--transport",
            "all",
            "--port",
            "9000",
        ]);
        let mut config = Config::default();
        apply_overrides(&cli, &mut config);
        assert_eq!(config.server.transport, TransportMode::All);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.upstream.timeout_secs, 5);
        assert_eq!(config.extraction.strategy, ExtractionStrategy::Text);
    }

    #[test]
    fn test_cli_rejects_unknown_transport() {
        assert!(Cli::try_parse_from(["aws-docs-mcp", "serve", "--transport", "smoke"]).is_err());
    }

    #[test]
    fn test_log_filter_precedence() {
        assert_eq!(
            log_filter(Some("debug".into()), Some("ERROR".into()), 2, false, "info"),
            "debug"
        );
        assert_eq!(
            log_filter(None, Some("WARNING".into()), 2, false, "info"),
            "aws_docs_mcp=warn,tower_http=warn"
        );
        assert_eq!(
            log_filter(None, None, 1, false, "info"),
            "aws_docs_mcp=debug,tower_http=debug"
        );
        assert_eq!(
            log_filter(None, None, 0, true, "info"),
            "aws_docs_mcp=error,tower_http=error"
        );
        assert_eq!(
            log_filter(None, None, 0, false, "warn"),
            "aws_docs_mcp=warn,tower_http=warn"
        );
    }
}

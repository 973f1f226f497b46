//! agent-notify-mcp: MCP stdio server exposing the `notify` tool.

use agent_notify::client::{NotifyClient, DEFAULT_URL, URL_ENV};
use agent_notify::mcp_server::AgentNotifyMcp;
use clap::Parser;
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "agent-notify-mcp", about = "MCP server forwarding notify calls to agent-notify")]
struct Args {
    /// Daemon base URL
    #[arg(long, env = URL_ENV, default_value = DEFAULT_URL)]
    url: String,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // stdout carries the protocol, so logs go to stderr
    let filter = if args.verbose {
        EnvFilter::new("debug,rmcp=info")
    } else {
        EnvFilter::new("info,rmcp=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let service = AgentNotifyMcp::new(NotifyClient::new(&args.url))
        .serve(stdio())
        .await?;
    info!("MCP server ready on stdio");
    service.waiting().await?;

    Ok(())
}

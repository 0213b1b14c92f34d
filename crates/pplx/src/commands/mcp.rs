//! Mcp command - serve the perplexity_query tool on stdio.

use anyhow::Result;
use clap::Args;

use pplx_mcp::McpServer;

use super::{Context, build_transport};

/// Arguments for the mcp command.
#[derive(Args, Debug)]
pub struct McpArgs {
    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Run the MCP server until the client closes stdin.
pub async fn run(args: McpArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let transport = build_transport(&loaded, args.timeout)?;

    let server = McpServer::new(transport).with_defaults(loaded.config.defaults.clone());
    server.run(tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}

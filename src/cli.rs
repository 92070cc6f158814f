//! CLI argument types.
//!
//! Defined separately from `main.rs` so tests can construct and parse them
//! directly.

use clap::Parser;

use crate::config::TransportMode;

/// Transport-translating reverse proxy for MCP servers.
///
/// Accepts downstream clients speaking SSE or streamable HTTP and forwards
/// to an upstream MCP server speaking either transport.
#[derive(Parser, Debug)]
#[command(name = "mcp-bridge", version)]
pub struct Args {
    /// Transport accepted from downstream clients.
    #[arg(long, value_enum, default_value = "sse")]
    pub input_mode: TransportMode,

    /// Transport spoken to the upstream server.
    #[arg(long, value_enum, default_value = "streamable")]
    pub output_mode: TransportMode,

    /// Frontend listen port.
    #[arg(long, default_value_t = 3000)]
    pub port: u16,

    /// Upstream MCP endpoint URL (default derived from --output-mode).
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Route of the downstream SSE stream.
    #[arg(long, default_value = "/sse")]
    pub sse_endpoint: String,

    /// Route of the downstream streamable-HTTP endpoint.
    #[arg(long, default_value = "/mcp")]
    pub http_endpoint: String,

    /// Enable debug logging.
    #[arg(long)]
    pub verbose: bool,
}

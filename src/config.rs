//! Runtime configuration resolved from CLI arguments.

use std::fmt;

use clap::ValueEnum;
use reqwest::Url;

use crate::cli::Args;
use crate::error::ProxyError;

/// Default upstream endpoint when `--output-mode streamable` and no
/// `--endpoint` is given.
const DEFAULT_STREAMABLE_ENDPOINT: &str = "http://localhost:3001/mcp";

/// Default upstream endpoint when `--output-mode sse` and no `--endpoint` is
/// given.
const DEFAULT_SSE_ENDPOINT: &str = "http://localhost:3001/sse";

/// Which MCP wire transport a side of the proxy speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportMode {
    /// Server-Sent Events: long-lived read stream plus a message POST side
    /// channel.
    Sse,
    /// Streamable HTTP: one POST per request, NDJSON response stream.
    Streamable,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Sse => write!(f, "sse"),
            TransportMode::Streamable => write!(f, "streamable"),
        }
    }
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Transport accepted from downstream clients.
    pub input_mode: TransportMode,
    /// Transport spoken to the upstream server.
    pub output_mode: TransportMode,
    /// Frontend listen port.
    pub port: u16,
    /// Upstream endpoint URL.
    pub endpoint: Url,
    /// Route of the downstream SSE stream.
    pub sse_path: String,
    /// Route of the downstream streamable-HTTP endpoint.
    pub http_path: String,
}

impl ProxyConfig {
    /// Resolve CLI arguments into a validated configuration.
    ///
    /// The upstream endpoint defaults per output mode when not given. Route
    /// paths are normalized to carry a leading slash.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Config`] if the endpoint URL does not parse or
    /// a route path is empty.
    pub fn from_args(args: Args) -> Result<Self, ProxyError> {
        let endpoint = match &args.endpoint {
            Some(raw) => Url::parse(raw)
                .map_err(|e| ProxyError::Config(format!("invalid --endpoint '{raw}': {e}")))?,
            None => {
                let default = match args.output_mode {
                    TransportMode::Sse => DEFAULT_SSE_ENDPOINT,
                    TransportMode::Streamable => DEFAULT_STREAMABLE_ENDPOINT,
                };
                Url::parse(default)
                    .map_err(|e| ProxyError::Config(format!("invalid default endpoint: {e}")))?
            }
        };

        Ok(Self {
            input_mode: args.input_mode,
            output_mode: args.output_mode,
            port: args.port,
            endpoint,
            sse_path: normalize_path(&args.sse_endpoint, "--sse-endpoint")?,
            http_path: normalize_path(&args.http_endpoint, "--http-endpoint")?,
        })
    }
}

/// Ensure a route path is non-empty and starts with `/`.
fn normalize_path(path: &str, flag: &str) -> Result<String, ProxyError> {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        return Err(ProxyError::Config(format!("{flag} must name a route path")));
    }
    if trimmed.starts_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("/{trimmed}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> Args {
        let mut full = vec!["mcp-bridge"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap()
    }

    #[test]
    fn defaults_resolve() {
        let config = ProxyConfig::from_args(args(&[])).unwrap();
        assert_eq!(config.input_mode, TransportMode::Sse);
        assert_eq!(config.output_mode, TransportMode::Streamable);
        assert_eq!(config.port, 3000);
        assert_eq!(config.endpoint.as_str(), DEFAULT_STREAMABLE_ENDPOINT);
        assert_eq!(config.sse_path, "/sse");
        assert_eq!(config.http_path, "/mcp");
    }

    #[test]
    fn default_endpoint_follows_output_mode() {
        let config = ProxyConfig::from_args(args(&["--output-mode", "sse"])).unwrap();
        assert_eq!(config.endpoint.as_str(), DEFAULT_SSE_ENDPOINT);
    }

    #[test]
    fn explicit_endpoint_wins() {
        let config =
            ProxyConfig::from_args(args(&["--endpoint", "http://10.0.0.5:9000/mcp"])).unwrap();
        assert_eq!(config.endpoint.as_str(), "http://10.0.0.5:9000/mcp");
    }

    #[test]
    fn invalid_endpoint_rejected() {
        let err = ProxyConfig::from_args(args(&["--endpoint", "not a url"])).unwrap_err();
        assert!(matches!(err, ProxyError::Config(_)));
    }

    #[test]
    fn paths_gain_leading_slash() {
        let config = ProxyConfig::from_args(args(&["--sse-endpoint", "events"])).unwrap();
        assert_eq!(config.sse_path, "/events");
    }

    #[test]
    fn empty_path_rejected() {
        let err = ProxyConfig::from_args(args(&["--http-endpoint", " "])).unwrap_err();
        assert!(matches!(err, ProxyError::Config(_)));
    }

    #[test]
    fn display_matches_cli_names() {
        assert_eq!(TransportMode::Sse.to_string(), "sse");
        assert_eq!(TransportMode::Streamable.to_string(), "streamable");
    }
}

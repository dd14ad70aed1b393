use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{ClientConfig, ReconnectStrategy};
use crate::credentials::PageParams;
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "vidbot")]
#[command(version)]
#[command(about = "Terminal client for the video analysis WebSocket service")]
pub struct Args {
    /// TOML config file; CLI flags override its values
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// WebSocket endpoint (ws:// or wss://)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Full page URL whose query carries pid and ks
    #[arg(long, conflicts_with = "query")]
    pub page_url: Option<String>,

    /// Bare query string carrying pid and ks (e.g. "pid=123&ks=...")
    #[arg(long)]
    pub query: Option<String>,

    /// Reconnect strategy after the socket closes
    #[arg(long, value_enum)]
    pub backoff: Option<ReconnectStrategy>,

    /// Give up after this many reconnect attempts (exponential only)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Seconds before a pending request is released (0 disables)
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Log filter, e.g. "debug" or "vidbot_client=trace"
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Args {
    /// The config file (or defaults) with CLI overrides applied.
    ///
    /// # Errors
    /// Config read or parse failures.
    pub fn resolve_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(strategy) = self.backoff {
            config.reconnect.strategy = strategy;
        }
        if let Some(n) = self.max_attempts {
            config.reconnect.max_attempts = n;
        }
        if let Some(secs) = self.request_timeout {
            config.request_timeout_secs = secs;
        }
        Ok(config)
    }

    /// Page parameters from `--page-url` or `--query`; empty when neither.
    ///
    /// # Errors
    /// `InvalidRequest` when `--page-url` is not a URL.
    pub fn page_params(&self) -> Result<PageParams> {
        match (&self.page_url, &self.query) {
            (Some(url), _) => PageParams::from_page_url(url),
            (None, Some(query)) => Ok(PageParams::from_query(query)),
            (None, None) => Ok(PageParams::default()),
        }
    }
}

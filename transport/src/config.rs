//! Transport configuration.
//!
//! # Design
//! Defaults work out of the box; `from_env` lets a host override them
//! without code changes. Unparseable numeric overrides are logged and
//! ignored rather than failing construction.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

pub const DOWNLOAD_DIR_VAR: &str = "SYNCTRANSFER_DOWNLOAD_DIR";
pub const WORKER_THREADS_VAR: &str = "SYNCTRANSFER_WORKER_THREADS";
pub const USER_AGENT_VAR: &str = "SYNCTRANSFER_USER_AGENT";
pub const MAX_REDIRECTS_VAR: &str = "SYNCTRANSFER_MAX_REDIRECTS";

const DEFAULT_WORKER_THREADS: usize = 2;
const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Settings for a [`ThreadedTransport`](crate::ThreadedTransport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Directory downloads are written into. Created on first use.
    pub download_dir: PathBuf,
    /// Async worker threads in the transport's runtime.
    pub worker_threads: usize,
    /// Sent as `User-Agent` unless the request sets its own.
    pub user_agent: String,
    /// Redirects followed before the last response is returned as-is.
    pub max_redirects: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            download_dir: env::temp_dir().join("synctransfer"),
            worker_threads: DEFAULT_WORKER_THREADS,
            user_agent: concat!("synctransfer/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl TransportConfig {
    /// Defaults, overridden by any `SYNCTRANSFER_*` variables that are set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = non_empty_var(DOWNLOAD_DIR_VAR) {
            config.download_dir = PathBuf::from(dir);
        }
        if let Some(agent) = non_empty_var(USER_AGENT_VAR) {
            config.user_agent = agent;
        }
        if let Some(threads) = parsed_var::<usize>(WORKER_THREADS_VAR) {
            config.worker_threads = threads.max(1);
        }
        if let Some(redirects) = parsed_var(MAX_REDIRECTS_VAR) {
            config.max_redirects = redirects;
        }
        config
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = non_empty_var(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparseable override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = TransportConfig::default();
        assert!(config.download_dir.ends_with("synctransfer"));
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.max_redirects, 10);
        assert!(config.user_agent.starts_with("synctransfer/"));
    }

    #[test]
    fn builders_override_fields() {
        let config = TransportConfig::default()
            .with_download_dir("/tmp/dl")
            .with_worker_threads(0)
            .with_user_agent("test-agent")
            .with_max_redirects(0);
        assert_eq!(config.download_dir, PathBuf::from("/tmp/dl"));
        assert_eq!(config.worker_threads, 1);
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.max_redirects, 0);
    }
}

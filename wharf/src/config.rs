//! Typed, validated boot configuration, loaded from a TOML file and
//! merged into the raw [`crate::env::Env`] table. `skynet_start.c`'s
//! config is a Lua table read by `lua-config.c`; this keeps the same keys
//! (`thread`, `harbor`, `start`, `bootstrap`, `logger`) but parses them
//! with `serde`/`toml` instead, the way the rest of the pack's services
//! configure themselves.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

fn default_thread() -> usize {
    8
}

fn default_harbor() -> u8 {
    1
}

fn default_start() -> String {
    "bootstrap".to_string()
}

fn default_bootstrap() -> String {
    "snlua bootstrap".to_string()
}

fn default_logservice() -> String {
    "logger".to_string()
}

fn default_profile() -> bool {
    true
}

fn default_cpath() -> String {
    "./cservice/?.so".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Number of worker threads draining the ready-queue.
    #[serde(default = "default_thread")]
    pub thread: usize,

    /// This node's id, packed into the high byte of every handle it
    /// allocates.
    #[serde(default = "default_harbor")]
    pub harbor: u8,

    /// Name bound to the first launched service.
    #[serde(default = "default_start")]
    pub start: String,

    /// `module args...` string passed to the bootstrap launch.
    #[serde(default = "default_bootstrap")]
    pub bootstrap: String,

    /// Optional path the logger service appends to; `None` logs to
    /// stderr via `env_logger`.
    #[serde(default)]
    pub logger: Option<String>,

    #[serde(default)]
    pub daemon: Option<String>,

    /// Name of the service launched to own the process-wide log, matching
    /// `skynet_main.c`'s `logservice` option.
    #[serde(default = "default_logservice")]
    pub logservice: String,

    /// Whether per-service CPU accounting (`STAT cpu`/`STAT time`) is
    /// turned on. Skynet defaults this to on.
    #[serde(default = "default_profile")]
    pub profile: bool,

    /// `;`-separated search path for native service modules, matching
    /// `skynet_main.c`'s `cpath` option.
    #[serde(default = "default_cpath")]
    pub cpath: String,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            thread: default_thread(),
            harbor: default_harbor(),
            start: default_start(),
            bootstrap: default_bootstrap(),
            logger: None,
            daemon: None,
            logservice: default_logservice(),
            profile: default_profile(),
            cpath: default_cpath(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Config> {
        toml::from_str(s).map_err(|e| Error::Config(format!("config parse error: {e}")))
    }

    pub fn load(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        Config::from_toml_str(&text)
    }
}

// src/config.rs
// Configuration system for devgate

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

pub const DEFAULT_LISTEN_ADDR: &str = ":9090";
pub const DEFAULT_UPSTREAM: &str = "http://api-dev:9500";
pub const DEFAULT_INTERCEPT_PREFIX: &str = "/api";

/// Address the listener binds, written as `:port`, `host:port` or `[v6]:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenAddr {
    pub host: String,
    pub port: u16,
}

impl FromStr for ListenAddr {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidListenAddr(s.to_string());

        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse::<u16>().map_err(|_| invalid())?;

        let host = match host {
            // `:9090` listens on every interface
            "" => "0.0.0.0".to_string(),
            h if h.starts_with('[') && h.ends_with(']') && h.len() > 2 => {
                h[1..h.len() - 1].to_string()
            }
            h if h.contains(':') || h.contains('[') || h.contains(']') => return Err(invalid()),
            h => h.to_string(),
        };

        Ok(ListenAddr { host, port })
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Immutable runtime configuration, built once before the server starts.
#[derive(Debug, Clone)]
pub struct Config {
    /// Canonical, absolute root of the static file tree.
    pub static_dir: PathBuf,
    pub listen: ListenAddr,
    pub upstream: Url,
    /// Non-empty and always starts with `/`.
    pub intercept_prefix: String,
    pub strip_prefix: bool,
    /// Serve files whose symlinks resolve outside `static_dir`.
    pub symlinks: bool,
}

/// Keys accepted in a `--config` JSON file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfiguration {
    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default)]
    pub port: Option<String>,

    #[serde(default)]
    pub proxy_addr: Option<String>,

    #[serde(default)]
    pub addr_prefix: Option<String>,

    #[serde(default)]
    pub strip_prefix: Option<bool>,

    #[serde(default)]
    pub symlinks: Option<bool>,
}

/// Values given on the command line. They win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<String>,
    pub dir: Option<String>,
    pub port: Option<String>,
    pub proxy_addr: Option<String>,
    pub addr_prefix: Option<String>,
    pub strip_prefix: Option<bool>,
    pub symlinks: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    FileNotFound(String),
    ParseError(String),
    InvalidListenAddr(String),
    InvalidUpstream(String),
    InvalidPrefix(String),
    StaticDir(String),
    IoError(std::io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Configuration file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse configuration: {}", msg),
            ConfigError::InvalidListenAddr(addr) => write!(
                f,
                "Invalid listen address '{}', expected ':port' or 'host:port'",
                addr
            ),
            ConfigError::InvalidUpstream(msg) => write!(f, "Invalid upstream URL: {}", msg),
            ConfigError::InvalidPrefix(prefix) => write!(
                f,
                "Invalid intercept prefix '{}', it must be non-empty and start with '/'",
                prefix
            ),
            ConfigError::StaticDir(msg) => write!(f, "Static directory error: {}", msg),
            ConfigError::IoError(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

pub struct ConfigLoader {
    current_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(current_dir: PathBuf) -> Self {
        Self { current_dir }
    }

    /// Merge command line, config file and defaults (in that order of
    /// precedence) and validate the result.
    pub fn load_configuration(&self, overrides: &Overrides) -> Result<Config, ConfigError> {
        let (file, file_dir) = match overrides.config_file {
            Some(ref path) => {
                let config_path = self.current_dir.join(path);
                let file = self.read_file(&config_path)?;
                let file_dir = config_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.current_dir.clone());
                (file, file_dir)
            }
            None => (FileConfiguration::default(), self.current_dir.clone()),
        };

        // A relative --dir is taken from where the command runs, a relative
        // "dir" key from where the config file lives.
        let dir = match (&overrides.dir, &file.dir) {
            (Some(dir), _) => self.current_dir.join(dir),
            (None, Some(dir)) => file_dir.join(dir),
            (None, None) => self.current_dir.clone(),
        };
        let static_dir = resolve_static_dir(&dir)?;

        let listen = overrides
            .port
            .as_deref()
            .or(file.port.as_deref())
            .unwrap_or(DEFAULT_LISTEN_ADDR)
            .parse::<ListenAddr>()?;

        let upstream = parse_upstream(
            overrides
                .proxy_addr
                .as_deref()
                .or(file.proxy_addr.as_deref())
                .unwrap_or(DEFAULT_UPSTREAM),
        )?;

        let intercept_prefix = validate_prefix(
            overrides
                .addr_prefix
                .as_deref()
                .or(file.addr_prefix.as_deref())
                .unwrap_or(DEFAULT_INTERCEPT_PREFIX),
        )?;

        Ok(Config {
            static_dir,
            listen,
            upstream,
            intercept_prefix,
            strip_prefix: overrides.strip_prefix.or(file.strip_prefix).unwrap_or(false),
            symlinks: overrides.symlinks || file.symlinks.unwrap_or(false),
        })
    }

    fn read_file(&self, config_path: &Path) -> Result<FileConfiguration, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::FileNotFound(
                config_path.to_string_lossy().to_string(),
            ));
        }

        let contents = fs::read_to_string(config_path)?;
        log::info!("Loading configuration from: {}", config_path.display());

        serde_json::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", config_path.display(), e)))
    }
}

fn resolve_static_dir(dir: &Path) -> Result<PathBuf, ConfigError> {
    let absolute = fs::canonicalize(dir)
        .map_err(|e| ConfigError::StaticDir(format!("{}: {}", dir.display(), e)))?;

    if !absolute.is_dir() {
        return Err(ConfigError::StaticDir(format!(
            "{} is not a directory",
            absolute.display()
        )));
    }

    fs::read_dir(&absolute).map_err(|e| {
        ConfigError::StaticDir(format!("{} is not readable: {}", absolute.display(), e))
    })?;

    Ok(absolute)
}

fn parse_upstream(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUpstream(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" {
        return Err(ConfigError::InvalidUpstream(format!(
            "{}: only http upstreams are supported",
            raw
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidUpstream(format!("{}: missing host", raw)));
    }

    Ok(url)
}

fn validate_prefix(prefix: &str) -> Result<String, ConfigError> {
    if prefix.is_empty() || !prefix.starts_with('/') {
        return Err(ConfigError::InvalidPrefix(prefix.to_string()));
    }
    Ok(prefix.to_string())
}

#[cfg(test)]
impl Config {
    /// Config rooted at `static_dir` with an upstream nobody listens on.
    pub(crate) fn for_tests(static_dir: &Path) -> Self {
        Config {
            static_dir: static_dir.canonicalize().unwrap(),
            listen: "127.0.0.1:0".parse().unwrap(),
            upstream: Url::parse("http://127.0.0.1:9").unwrap(),
            intercept_prefix: DEFAULT_INTERCEPT_PREFIX.to_string(),
            strip_prefix: false,
            symlinks: false,
        }
    }
}

use std::collections::{HashMap, HashSet};
use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::payload::{PayloadMode, PayloadModeError};

pub const DEFAULT_API_URL: &str = "https://api.keen.io/3.0/projects";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("\"project_id\" is required but not set")]
    ProjectIdMissing,

    #[error("\"write_key\" is required but not set")]
    WriteKeyMissing,

    #[error("\"api_url\" is not a valid URL: {0}")]
    ApiUrlInvalid(String),

    #[error("{0} has invalid value: {1}")]
    InvalidValue(String, String),

    #[error(transparent)]
    Mode(#[from] PayloadModeError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub project_id: String,
    pub write_key: String,
    pub api_url: Url,
    pub debug: bool,
    pub verbose_tags: HashSet<String>,
    pub mode: PayloadMode,
    pub timeout: Duration,
    pub verify_tls: bool,
}

impl Config {
    /// Read `KEEN_FORWARDER_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = env::vars()
            .filter_map(|(k, v)| {
                k.strip_prefix("KEEN_FORWARDER_")
                    .map(|rest| (rest.to_ascii_lowercase(), v))
            })
            .collect();
        Self::parse(&vars)
    }

    /// Parse the host pipeline's flat settings map.
    pub fn parse(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let project_id = require(vars, "project_id", ConfigError::ProjectIdMissing)?;
        let write_key = require(vars, "write_key", ConfigError::WriteKeyMissing)?;
        let api_url = parse_api_url(vars)?;
        let debug = parse_bool(vars, "debug", false)?;
        let verbose_tags = parse_tags(vars);
        let mode = match vars.get("mode") {
            Some(raw) => PayloadMode::parse(raw)?,
            None => PayloadMode::PerCollection,
        };
        let timeout = parse_duration_ms(vars, "timeout_ms", 5000)?;
        let verify_tls = parse_bool(vars, "verify_tls", true)?;

        Ok(Self {
            project_id,
            write_key,
            api_url,
            debug,
            verbose_tags,
            mode,
            timeout,
            verify_tls,
        })
    }
}

fn require(
    vars: &HashMap<String, String>,
    name: &str,
    missing: ConfigError,
) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|s| !s.is_empty())
        .cloned()
        .ok_or(missing)
}

fn parse_api_url(vars: &HashMap<String, String>) -> Result<Url, ConfigError> {
    let raw = vars
        .get("api_url")
        .filter(|s| !s.is_empty())
        .map(String::as_str)
        .unwrap_or(DEFAULT_API_URL);

    Url::parse(raw)
        .ok()
        .filter(|url| !url.cannot_be_a_base())
        .ok_or_else(|| ConfigError::ApiUrlInvalid(raw.to_owned()))
}

fn parse_bool(
    vars: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(name).map(|s| s.as_str()) {
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue(
            name.to_owned(),
            other.to_owned(),
        )),
        None => Ok(default),
    }
}

fn parse_duration_ms(
    vars: &HashMap<String, String>,
    name: &str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    match vars.get(name) {
        Some(val) => {
            let ms: u64 = val
                .parse()
                .map_err(|_| ConfigError::InvalidValue(name.to_owned(), val.clone()))?;
            Ok(Duration::from_millis(ms))
        }
        None => Ok(Duration::from_millis(default_ms)),
    }
}

fn parse_tags(vars: &HashMap<String, String>) -> HashSet<String> {
    vars.get("verbose_tags")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

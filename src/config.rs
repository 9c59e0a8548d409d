use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cli::GlobalArgs;
use crate::error::PlannerError;
use crate::gemini::DEFAULT_BASE_URL;

// Precedence: CLI > env > file > defaults.

const DEFAULT_DATA_DIR: &str = ".phplan";
const DEFAULT_REQUEST_TIMEOUT_SEC: u64 = 300;

const ENV_PREFIX: &str = "PHPLAN_";

/// Resolved application configuration.
///
/// Built from three layers with precedence CLI > env > file > defaults.
/// The API key has no CLI flag so it never shows up in shell history.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub request_timeout_sec: u64,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("data_dir", &self.data_dir)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_sec", &self.request_timeout_sec)
            .field("log_level", &self.log_level)
            .field("log_file", &self.log_file)
            .finish()
    }
}

/// TOML-deserializable config file representation. All fields optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    api_key: Option<String>,
    api_base_url: Option<String>,
    request_timeout_sec: Option<u64>,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
}

/// Intermediate layer where every field is optional, used to merge sources.
#[derive(Debug, Default)]
struct ConfigLayer {
    data_dir: Option<PathBuf>,
    api_key: Option<String>,
    api_base_url: Option<String>,
    request_timeout_sec: Option<u64>,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration with precedence: CLI > env > file > defaults.
    ///
    /// `config_path` comes from `args.config`; without it no file is read.
    pub fn load(args: &GlobalArgs) -> anyhow::Result<Self> {
        Self::load_with_env(args, real_env_var)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_sec)
    }

    /// Internal constructor that accepts an env-var lookup function,
    /// enabling deterministic testing without process-global mutation.
    fn load_with_env(
        args: &GlobalArgs,
        env_fn: fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let file_layer = match args.config.as_deref() {
            Some(path) => load_file_layer(path)?,
            None => ConfigLayer::default(),
        };
        let env_layer = load_env_layer(env_fn)?;
        let cli_layer = cli_layer_from(args);

        let merged = merge_layers(file_layer, env_layer, cli_layer);

        let request_timeout_sec = merged
            .request_timeout_sec
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SEC);
        if request_timeout_sec == 0 {
            anyhow::bail!("request_timeout_sec must be greater than zero");
        }

        Ok(AppConfig {
            data_dir: merged
                .data_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            api_key: merged.api_key.filter(|k| !k.trim().is_empty()),
            api_base_url: merged
                .api_base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            request_timeout_sec,
            log_level: merged.log_level,
            log_file: merged.log_file,
        })
    }
}

fn load_file_layer(path: &Path) -> anyhow::Result<ConfigLayer> {
    let contents = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
    let fc: FileConfig = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;
    Ok(ConfigLayer {
        data_dir: fc.data_dir,
        api_key: fc.api_key,
        api_base_url: fc.api_base_url,
        request_timeout_sec: fc.request_timeout_sec,
        log_level: fc.log_level,
        log_file: fc.log_file,
    })
}

fn real_env_var(suffix: &str) -> Option<String> {
    let key = format!("{ENV_PREFIX}{suffix}");
    env::var(&key).ok().filter(|v| !v.is_empty())
}

fn load_env_layer(env_fn: fn(&str) -> Option<String>) -> Result<ConfigLayer, PlannerError> {
    Ok(ConfigLayer {
        data_dir: env_fn("DATA_DIR").map(PathBuf::from),
        api_key: env_fn("API_KEY"),
        api_base_url: env_fn("API_BASE_URL"),
        request_timeout_sec: parse_env_u64(env_fn, "REQUEST_TIMEOUT_SEC")?,
        log_level: env_fn("LOG_LEVEL"),
        log_file: env_fn("LOG_FILE").map(PathBuf::from),
    })
}

fn parse_env_u64(
    env_fn: fn(&str) -> Option<String>,
    suffix: &str,
) -> Result<Option<u64>, PlannerError> {
    match env_fn(suffix) {
        Some(s) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|e| PlannerError::ConfigEnvParseError {
                var: format!("{ENV_PREFIX}{suffix}"),
                detail: e.to_string(),
            }),
        None => Ok(None),
    }
}

fn cli_layer_from(args: &GlobalArgs) -> ConfigLayer {
    ConfigLayer {
        data_dir: args.data_dir.clone(),
        api_key: None,
        api_base_url: args.api_base_url.clone(),
        request_timeout_sec: args.timeout_sec,
        log_level: args.log_level.clone(),
        log_file: args.log_file.clone(),
    }
}

/// Merge three layers. For each field, pick CLI first, then env, then file.
fn merge_layers(file: ConfigLayer, env: ConfigLayer, cli: ConfigLayer) -> ConfigLayer {
    ConfigLayer {
        data_dir: cli.data_dir.or(env.data_dir).or(file.data_dir),
        api_key: cli.api_key.or(env.api_key).or(file.api_key),
        api_base_url: cli.api_base_url.or(env.api_base_url).or(file.api_base_url),
        request_timeout_sec: cli
            .request_timeout_sec
            .or(env.request_timeout_sec)
            .or(file.request_timeout_sec),
        log_level: cli.log_level.or(env.log_level).or(file.log_level),
        log_file: cli.log_file.or(env.log_file).or(file.log_file),
    }
}

use anyhow::{bail, Context, Result};
use clap::Parser;
use runner_manager_core::{wire::DEFAULT_MAX_FRAME_BYTES, TimeWindow};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use url::Url;

const DEFAULT_URL: &str = "ws://localhost:9090/api/runners/ws";

#[derive(Parser, Debug, Default)]
#[command(
    name = "runner-manager-dashboard",
    about = "Live view of runner controllers and their resource usage"
)]
pub struct Args {
    /// Websocket endpoint of the runner manager backend.
    #[arg(long, env = "RMD_URL")]
    pub url: Option<String>,
    /// Session token passed as the `token` query parameter.
    #[arg(long, env = "RMD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    /// Initial chart window: all, 5m, 15m, 1h, 6h, 24h.
    #[arg(long, env = "RMD_WINDOW")]
    pub window: Option<String>,
    #[arg(long, env = "RMD_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
    #[arg(long, env = "RMD_CONFIG_PATH")]
    pub config: Option<PathBuf>,
}

/// On-disk settings; every key is optional and overridden by flags and env.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub window: Option<String>,
    pub max_frame_bytes: Option<usize>,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub url: Url,
    pub window: TimeWindow,
    pub max_frame_bytes: usize,
    pub log_dir: Option<PathBuf>,
    pub log_stdout: bool,
    pub client_id: String,
}

pub fn load(args: Args) -> Result<Config> {
    let path = config_path(args.config.as_deref());
    let file = load_file(&path)?;
    resolve(args, file)
}

pub fn resolve(args: Args, file: FileConfig) -> Result<Config> {
    let base = non_empty(args.url)
        .or_else(|| non_empty(file.url))
        .unwrap_or_else(|| DEFAULT_URL.to_string());
    let token = args.token.or(file.token).unwrap_or_default();
    let url = connection_url(&base, token.trim())?;

    let window = match non_empty(args.window).or_else(|| non_empty(file.window)) {
        Some(raw) => raw
            .parse::<TimeWindow>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("invalid window '{raw}'"))?,
        None => TimeWindow::Unbounded,
    };

    let max_frame_bytes = file
        .max_frame_bytes
        .filter(|max| *max > 0)
        .unwrap_or(DEFAULT_MAX_FRAME_BYTES);

    Ok(Config {
        url,
        window,
        max_frame_bytes,
        log_dir: args.log_dir.or(file.log_dir),
        log_stdout: resolve_log_stdout(),
        client_id: format!("rmd-{}", std::process::id()),
    })
}

/// Appends `token` as a query parameter, replacing any token already present.
pub fn connection_url(base: &str, token: &str) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("invalid url '{base}'"))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        bail!("url must use ws:// or wss://, got '{}'", url.scheme());
    }
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "token")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        pairs.append_pair("token", token);
    }
    Ok(url)
}

pub fn load_file(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("runner-manager")
        .join("dashboard.toml")
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn resolve_log_stdout() -> bool {
    env::var("RMD_LOG_STDOUT")
        .ok()
        .and_then(|value| parse_bool_flag(&value))
        .unwrap_or(false)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

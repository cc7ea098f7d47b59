//! Server configuration.
//!
//! Values come from an optional JSON file. Any field missing from the file
//! keeps its default.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_name: String,
    pub server_welcome1: String,
    pub server_welcome2: String,
    /// Whether player chat is relayed at all.
    pub server_chat: bool,
    /// 0 free-for-all, 1 teams, 2 experimental (mother cells), 3 rainbow.
    pub server_gamemode: u32,
    /// Simulation tick length in milliseconds.
    pub tick_ms: u64,
    pub max_connections: usize,
    /// Seconds without a recognised frame before a client is dropped.
    pub server_timeout: u64,

    pub border_width: f64,
    pub border_height: f64,
    /// Upper bound of the per-player coordinate scramble. 0 disables it.
    pub scramble_limit: i32,
    /// Clients connecting from these addresses may use the operator keys.
    pub operator_ips: Vec<IpAddr>,

    pub player_max_nick: usize,
    pub player_start_size: f64,
    pub player_size_increment: f64,
    pub player_min_split_size: f64,
    pub player_min_eject_size: f64,
    pub player_max_cells: usize,

    pub filter_bad_words: bool,
    pub bad_words: Vec<String>,

    pub eject_min_size: f64,
    pub eject_max_size: f64,
    pub eject_size_loss: f64,
    pub eject_speed: f64,
    pub eject_random_color: bool,

    pub virus_min_size: f64,
    pub food_min_size: f64,
    pub food_max_size: f64,
    pub food_brush_limit: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: "cellnet".to_string(),
            server_welcome1: "Welcome to cellnet!".to_string(),
            server_welcome2: String::new(),
            server_chat: true,
            server_gamemode: 0,
            tick_ms: 40,
            max_connections: 64,
            server_timeout: 300,
            border_width: 14142.0,
            border_height: 14142.0,
            scramble_limit: 0,
            operator_ips: Vec::new(),
            player_max_nick: 16,
            player_start_size: 64.0,
            player_size_increment: 20.0,
            player_min_split_size: 60.0,
            player_min_eject_size: 32.0,
            player_max_cells: 16,
            filter_bad_words: true,
            bad_words: Vec::new(),
            eject_min_size: 12.0,
            eject_max_size: 12.0,
            eject_size_loss: 12.0,
            eject_speed: 780.0,
            eject_random_color: false,
            virus_min_size: 100.0,
            food_min_size: 10.0,
            food_max_size: 20.0,
            food_brush_limit: 100.0,
        }
    }
}

impl Config {
    /// Loads the config file at `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given, using defaults");
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Reads the newline-separated random skin list.
///
/// A missing or unreadable file yields an empty list, which makes `<r>`
/// resolve to no skin.
pub fn load_random_skins(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let skins = parse_skin_list(&text);
            info!("Loaded {} random skins from {}", skins.len(), path.display());
            skins
        }
        Err(e) => {
            warn!("No random skins available ({}): {}", path.display(), e);
            Vec::new()
        }
    }
}

pub fn parse_skin_list(text: &str) -> Vec<String> {
    text.split(['\r', '\n'])
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

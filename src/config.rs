// src/config.rs
use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use toml;

use crate::clock::{is_valid_date_format, DEFAULT_DATE_FORMAT};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Argon2Params {
    pub m_cost: u32, // KiB
    pub t_cost: u32, // iterations
    pub p_cost: u32, // parallelism
}

impl Default for Argon2Params {
    fn default() -> Self {
        Argon2Params {
            m_cost: 19456,
            t_cost: 2,
            p_cost: 1,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    File,
    Remote,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(BackendKind::File),
            "remote" | "supabase" => Ok(BackendKind::Remote),
            other => Err(format!("unknown backend '{}' (expected 'file' or 'remote')", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RemoteConfig {
    pub url: String,
    pub api_key: String,
    pub table: String,
    pub timeout_seconds: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            url: String::new(),
            api_key: String::new(),
            table: "guestbook".to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub backend: BackendKind,
    pub data_file: PathBuf,
    /// Entries that predate this store; added to displayed totals only.
    pub legacy_count: usize,
    /// Cap for listings that give no limit. 0 means no cap.
    pub list_limit: usize,
    pub date_format: String,
    /// Display zone for timestamps. Unset means system local time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,
    pub argon2_params: Argon2Params,
    pub remote: RemoteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: BackendKind::File,
            data_file: PathBuf::from("guestbook.json"),
            legacy_count: 14,
            list_limit: 200,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            utc_offset_minutes: None,
            argon2_params: Argon2Params::default(),
            remote: RemoteConfig::default(),
        }
    }
}

fn get_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "GuestbookRS", "GuestbookRS")
        .map(|proj_dirs| proj_dirs.config_dir().join("guestbook_config.toml"))
}

fn save_default_config(config_path: &Path, config: &Config) -> Result<(), String> {
    info!("Attempting to save default config to {:?}", config_path);
    if let Some(parent_dir) = config_path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            fs::create_dir_all(parent_dir)
                .map_err(|e| format!("Failed to create config directory {:?}: {}", parent_dir, e))?;
            info!("Created config directory: {:?}", parent_dir);
        }
    }

    let toml_string = toml::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize default config to TOML: {}", e))?;

    let mut file = fs::File::create(config_path)
        .map_err(|e| format!("Failed to create default config file {:?}: {}", config_path, e))?;

    file.write_all(toml_string.as_bytes())
        .map_err(|e| format!("Failed to write default config to {:?}: {}", config_path, e))?;

    info!("Saved default configuration to {:?}", config_path);
    Ok(())
}

fn read_config_file(config_path: &Path) -> Option<Config> {
    match fs::read_to_string(config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(loaded_config) => {
                info!("Configuration loaded from {:?}", config_path);
                Some(loaded_config)
            }
            Err(e) => {
                warn!(
                    "Failed to parse config file at {:?}: {}. Using default configuration.",
                    config_path, e
                );
                None
            }
        },
        Err(e) => {
            warn!(
                "Failed to read config file at {:?}: {}. Using default configuration.",
                config_path, e
            );
            None
        }
    }
}

/// Loads the configuration file, then applies environment overrides.
///
/// With an explicit path the file is read as-is; otherwise the per-user config
/// directory is used and a default file is created there on first run.
pub fn load_config(explicit_path: Option<&Path>) -> Config {
    let file_config = match explicit_path {
        Some(path) => read_config_file(path),
        None => match get_config_path() {
            Some(config_path) if config_path.exists() => read_config_file(&config_path),
            Some(config_path) => {
                info!(
                    "Config file not found at {:?}. Creating and using default configuration.",
                    config_path
                );
                if let Err(e) = save_default_config(&config_path, &Config::default()) {
                    warn!("Failed to save default configuration: {}", e);
                }
                None
            }
            None => {
                warn!("Could not determine config directory. Using default configuration.");
                None
            }
        },
    };

    let mut config = file_config.unwrap_or_default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.sanitize();
    config
}

impl Config {
    /// Replaces values that would break rendering with their defaults.
    pub fn sanitize(&mut self) {
        if !is_valid_date_format(&self.date_format) {
            warn!(
                "Ignoring invalid date_format {:?}; using {:?}",
                self.date_format, DEFAULT_DATE_FORMAT
            );
            self.date_format = DEFAULT_DATE_FORMAT.to_string();
        }
        if let Some(minutes) = self.utc_offset_minutes {
            let in_range = minutes
                .checked_mul(60)
                .and_then(chrono::FixedOffset::east_opt)
                .is_some();
            if !in_range {
                warn!("Ignoring out-of-range utc_offset_minutes={}; using local time", minutes);
                self.utc_offset_minutes = None;
            }
        }
        if self.list_limit == 0 {
            info!("list_limit is 0; listings are not capped");
        }
    }
}

/// Applies `GUESTBOOK_*` and `SUPABASE_*` variables on top of `config`.
/// `lookup` abstracts the environment so the rules can be exercised in tests.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(value) = lookup("GUESTBOOK_BACKEND") {
        match value.parse::<BackendKind>() {
            Ok(kind) => config.backend = kind,
            Err(e) => warn!("Ignoring GUESTBOOK_BACKEND: {}", e),
        }
    }
    if let Some(value) = lookup("GUESTBOOK_FILE") {
        config.data_file = PathBuf::from(value);
    }
    if let Some(value) = lookup("GUESTBOOK_LEGACY_COUNT") {
        match value.trim().parse::<usize>() {
            Ok(count) => config.legacy_count = count,
            Err(e) => warn!("Ignoring GUESTBOOK_LEGACY_COUNT={:?}: {}", value, e),
        }
    }
    if let Some(value) = lookup("SUPABASE_URL") {
        config.remote.url = value;
    }
    // The service-role key wins over the anonymous key when both are set.
    if let Some(value) = lookup("SUPABASE_SERVICE_ROLE_KEY").or_else(|| lookup("SUPABASE_ANON_KEY")) {
        config.remote.api_key = value;
    }
}

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "mdreview";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Background of commented text, `RRGGBB` hex.
    #[serde(default = "default_highlight_color")]
    pub highlight_color: String,

    /// Background of the active selection, `RRGGBB` hex.
    #[serde(default = "default_selection_color")]
    pub selection_color: String,

    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default = "default_wait_poll_interval_ms")]
    pub wait_poll_interval_ms: u64,

    /// List comments whose text is no longer found in the side panel.
    #[serde(default = "default_true")]
    pub show_orphaned: bool,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_highlight_color() -> String {
    "5C4A1E".to_string()
}

fn default_selection_color() -> String {
    "2B4A6F".to_string()
}

fn default_wait_poll_interval_ms() -> u64 {
    250
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            highlight_color: default_highlight_color(),
            selection_color: default_selection_color(),
            log_level: LogLevel::default(),
            wait_poll_interval_ms: default_wait_poll_interval_ms(),
            show_orphaned: true,
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Directory for the log file when none is given on the command line.
pub fn state_dir() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .map(|dir| dir.join(APP_NAME))
}

/// Where the active settings came from, reported once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsOrigin {
    Loaded(PathBuf),
    Created(PathBuf),
    Migrated { path: PathBuf, from: u32 },
}

impl fmt::Display for SettingsOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsOrigin::Loaded(path) => write!(f, "Loaded settings from {path:?}"),
            SettingsOrigin::Created(path) => {
                write!(f, "Settings file not found, created defaults at {path:?}")
            }
            SettingsOrigin::Migrated { path, from } => write!(
                f,
                "Migrated settings at {path:?} from v{from} to v{CURRENT_VERSION}"
            ),
        }
    }
}

/// Loads the config file into the global settings, creating it with
/// defaults on first run. Runs before the logger exists, so nothing is
/// logged here: the caller reports the outcome. On error the defaults stay.
pub fn load_settings() -> Result<SettingsOrigin> {
    let path = config_path().context("Could not determine config directory")?;
    if path.exists() {
        load_settings_from_path(&path)
    } else {
        save_settings_to_file(&get_settings(), &path)?;
        Ok(SettingsOrigin::Created(path))
    }
}

pub fn load_settings_from_path(path: &Path) -> Result<SettingsOrigin> {
    let mut settings = read_settings_file(path)?;
    let from = settings.version;
    if from < CURRENT_VERSION {
        migrate_settings(&mut settings);
    }
    if let Ok(mut global) = SETTINGS.write() {
        *global = settings.clone();
    }

    if from < CURRENT_VERSION {
        save_settings_to_file(&settings, path)?;
        Ok(SettingsOrigin::Migrated {
            path: path.to_path_buf(),
            from,
        })
    } else {
        Ok(SettingsOrigin::Loaded(path.to_path_buf()))
    }
}

fn read_settings_file(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {path:?}"))?;
    serde_yaml::from_str::<Settings>(&content)
        .with_context(|| format!("Failed to parse settings file {path:?}"))
}

fn migrate_settings(settings: &mut Settings) {
    settings.version = CURRENT_VERSION;
}

fn save_settings_to_file(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {parent:?}"))?;
        }
    }
    fs::write(path, generate_settings_yaml(settings))
        .with_context(|| format!("Failed to save settings to {path:?}"))
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(SETTINGS_HEADER);
    content.push_str(&format!("version: {}\n", settings.version));
    content.push_str(&format!(
        "highlight_color: \"{}\"\n",
        settings.highlight_color
    ));
    content.push_str(&format!(
        "selection_color: \"{}\"\n",
        settings.selection_color
    ));
    content.push_str(&format!("log_level: {}\n", settings.log_level.as_str()));
    content.push_str(&format!(
        "wait_poll_interval_ms: {}\n",
        settings.wait_poll_interval_ms
    ));
    content.push_str(&format!("show_orphaned: {}\n", settings.show_orphaned));

    content
}

const SETTINGS_HEADER: &str = r#"# mdreview settings
#
# highlight_color / selection_color: background colors as RRGGBB hex
# log_level: error | warn | info | debug | trace
# wait_poll_interval_ms: how often `mdreview wait` checks for the .done file
# show_orphaned: list comments whose text is gone from the document

"#;

pub fn get_settings() -> Settings {
    SETTINGS
        .read()
        .map(|s| s.clone())
        .unwrap_or_default()
}

pub fn get_log_level() -> LogLevel {
    SETTINGS.read().map(|s| s.log_level).unwrap_or_default()
}

pub fn get_wait_poll_interval() -> Duration {
    let ms = SETTINGS
        .read()
        .map(|s| s.wait_poll_interval_ms)
        .unwrap_or_else(|_| default_wait_poll_interval_ms());
    Duration::from_millis(ms.max(10))
}

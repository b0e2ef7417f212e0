use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const CONFIG_DIR_NAME: &str = "triage";
const CONFIG_FILE_NAME: &str = "config.json";
const DATABASE_FILE_NAME: &str = "triage.db";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-8b";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_STEP_RETRIES: u32 = 2;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub llm_provider: LlmProvider,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub smtp: SmtpSettings,
    pub step_retries: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
    pub starttls: bool,
}

/// On-disk configuration written by `triage config init`. Every value is kept
/// as text so the wizard can edit fields uniformly; [`AppConfig::resolve`]
/// does the typed parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredConfig {
    pub database_path: Option<String>,
    pub llm_provider: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub gemini_base_url: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_starttls: Option<String>,
    pub step_retries: Option<String>,
    pub retry_delay_ms: Option<String>,
}

pub fn config_directory() -> AppResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .ok_or_else(|| AppError::Configuration("could not locate a config directory".to_string()))
}

pub fn config_file_path() -> AppResult<PathBuf> {
    Ok(config_directory()?.join(CONFIG_FILE_NAME))
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME).join(DATABASE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
}

impl StoredConfig {
    pub fn load() -> AppResult<Self> {
        Self::load_from(&config_file_path()?)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|err| AppError::Configuration(format!("invalid config file: {err}"))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(AppError::Io(err)),
        }
    }

    pub fn save(&self) -> AppResult<()> {
        self.save_to(&config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|err| AppError::Configuration(format!("failed to write config: {err}")))?;
        fs::write(path, data)?;
        Ok(())
    }
}

impl AppConfig {
    pub fn load() -> AppResult<Self> {
        let stored = StoredConfig::load()?;
        Self::resolve(stored, |key| env::var(key).ok())
    }

    /// Layers environment overrides on top of the stored file, then falls back
    /// to built-in defaults.
    pub fn resolve(stored: StoredConfig, env: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let pick = |key: &str, stored: Option<String>| {
            env(key)
                .or(stored)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let llm_provider = pick("TRIAGE_LLM_PROVIDER", stored.llm_provider)
            .map(|provider| match provider.to_lowercase().as_str() {
                "gemini" => LlmProvider::Gemini,
                other => LlmProvider::Custom(other.to_string()),
            })
            .unwrap_or(LlmProvider::Gemini);

        let smtp_port = match pick("SMTP_PORT", stored.smtp_port) {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| AppError::Configuration(format!("invalid SMTP port '{port}'")))?,
            None => DEFAULT_SMTP_PORT,
        };

        let starttls = match pick("SMTP_STARTTLS", stored.smtp_starttls) {
            Some(flag) => parse_flag(&flag).ok_or_else(|| {
                AppError::Configuration(format!("invalid SMTP STARTTLS flag '{flag}'"))
            })?,
            None => true,
        };

        let step_retries = match pick("TRIAGE_STEP_RETRIES", stored.step_retries) {
            Some(count) => count
                .parse::<u32>()
                .map_err(|_| AppError::Configuration(format!("invalid retry count '{count}'")))?,
            None => DEFAULT_STEP_RETRIES,
        };

        let retry_delay = match pick("TRIAGE_RETRY_DELAY_MS", stored.retry_delay_ms) {
            Some(millis) => millis.parse::<u64>().map(Duration::from_millis).map_err(|_| {
                AppError::Configuration(format!("invalid retry delay '{millis}'"))
            })?,
            None => DEFAULT_RETRY_DELAY,
        };

        Ok(Self {
            database_path: pick("TRIAGE_DATABASE_PATH", stored.database_path)
                .map(PathBuf::from)
                .unwrap_or_else(default_database_path),
            llm_provider,
            gemini_api_key: pick("GEMINI_API_KEY", stored.gemini_api_key),
            gemini_model: pick("GEMINI_MODEL", stored.gemini_model)
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_base_url: pick("GEMINI_BASE_URL", stored.gemini_base_url)
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            smtp: SmtpSettings {
                host: pick("SMTP_HOST", stored.smtp_host),
                port: smtp_port,
                username: pick("SMTP_USERNAME", stored.smtp_username),
                password: pick("SMTP_PASSWORD", stored.smtp_password),
                from: pick("SMTP_FROM", stored.smtp_from),
                starttls,
            },
            step_retries,
            retry_delay,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

use crate::domain::model::EligibilityCriteria;
use crate::utils::error::{Result, SyncError};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_secret, validate_socket_addr,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_KICKOFF_STAGE: &str = "Project Kickoff";
pub const DEFAULT_PROJECT_TYPE: &str = "New Implementation Project";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub crm: CrmConfig,
    pub board: BoardConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    #[serde(default = "default_crm_api_base")]
    pub api_base: String,
    #[serde(default = "default_crm_accounts_url")]
    pub accounts_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Seeds the first session; refreshed like any other token once it expires.
    pub access_token: Option<String>,
    #[serde(default = "default_crm_module")]
    pub module: String,
    #[serde(default = "default_board_field")]
    pub board_field: String,
    #[serde(default = "default_board_field_label")]
    pub board_field_label: String,
    #[serde(default = "default_true")]
    pub ensure_field: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default = "default_board_api_base")]
    pub api_base: String,
    pub api_key: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_kickoff_stage")]
    pub kickoff_stage: String,
    #[serde(default = "default_project_type")]
    pub project_type: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            kickoff_stage: default_kickoff_stage(),
            project_type: default_project_type(),
            request_timeout_seconds: default_request_timeout_seconds(),
            run_on_startup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub file: Option<String>,
    /// "compact" or "json"
    pub format: Option<String>,
}

fn default_crm_api_base() -> String {
    "https://www.zohoapis.com".to_string()
}

fn default_crm_accounts_url() -> String {
    "https://accounts.zoho.com".to_string()
}

fn default_crm_module() -> String {
    "Deals".to_string()
}

fn default_board_field() -> String {
    "Trello_Board_ID".to_string()
}

fn default_board_field_label() -> String {
    "Trello Board ID".to_string()
}

fn default_board_api_base() -> String {
    "https://api.trello.com".to_string()
}

fn default_interval_seconds() -> u64 {
    300
}

fn default_kickoff_stage() -> String {
    DEFAULT_KICKOFF_STAGE.to_string()
}

fn default_project_type() -> String {
    DEFAULT_PROJECT_TYPE.to_string()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_true() -> bool {
    true
}

impl SyncConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SyncError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| SyncError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unset variables are left
    /// as-is so validation can name the missing field.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| SyncError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn criteria(&self) -> EligibilityCriteria {
        EligibilityCriteria {
            kickoff_stage: self.sync.kickoff_stage.clone(),
            project_type: self.sync.project_type.clone(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.request_timeout_seconds)
    }

    pub fn log_format(&self) -> Result<LogFormat> {
        match self.logging.format.as_deref() {
            None | Some("compact") => Ok(LogFormat::Compact),
            Some("json") => Ok(LogFormat::Json),
            Some(other) => Err(SyncError::InvalidConfigValueError {
                field: "logging.format".to_string(),
                value: other.to_string(),
                reason: "Valid formats: compact, json".to_string(),
            }),
        }
    }
}

impl Validate for SyncConfig {
    fn validate(&self) -> Result<()> {
        validate_url("crm.api_base", &self.crm.api_base)?;
        validate_url("crm.accounts_url", &self.crm.accounts_url)?;
        validate_secret("crm.client_id", &self.crm.client_id)?;
        validate_secret("crm.client_secret", &self.crm.client_secret)?;
        validate_secret("crm.refresh_token", &self.crm.refresh_token)?;
        validate_non_empty_string("crm.module", &self.crm.module)?;
        validate_non_empty_string("crm.board_field", &self.crm.board_field)?;

        validate_url("board.api_base", &self.board.api_base)?;
        validate_secret("board.api_key", &self.board.api_key)?;
        validate_secret("board.token", &self.board.token)?;

        validate_positive_number("sync.interval_seconds", self.sync.interval_seconds, 1)?;
        validate_positive_number(
            "sync.request_timeout_seconds",
            self.sync.request_timeout_seconds,
            1,
        )?;
        validate_non_empty_string("sync.kickoff_stage", &self.sync.kickoff_stage)?;
        validate_non_empty_string("sync.project_type", &self.sync.project_type)?;

        validate_socket_addr("server.bind", &self.server.bind)?;
        self.log_format()?;

        tracing::debug!("Configuration validation passed");
        Ok(())
    }
}

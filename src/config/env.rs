use crate::config::toml_config::{
    BoardConfig, CrmConfig, LoggingConfig, ServerConfig, SyncConfig, SyncSettings,
};
use crate::utils::error::{Result, SyncError};
use std::str::FromStr;

impl SyncConfig {
    /// Builds the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name).ok_or_else(|| SyncError::MissingConfigError {
                field: name.to_string(),
            })
        };
        let settings = SyncSettings::default();
        let server = ServerConfig::default();

        Ok(Self {
            crm: CrmConfig {
                api_base: lookup("CRM_API_BASE")
                    .unwrap_or_else(|| "https://www.zohoapis.com".to_string()),
                accounts_url: lookup("CRM_ACCOUNTS_URL")
                    .unwrap_or_else(|| "https://accounts.zoho.com".to_string()),
                client_id: required("CRM_CLIENT_ID")?,
                client_secret: required("CRM_CLIENT_SECRET")?,
                refresh_token: required("CRM_REFRESH_TOKEN")?,
                access_token: lookup("CRM_ACCESS_TOKEN"),
                module: lookup("CRM_MODULE").unwrap_or_else(|| "Deals".to_string()),
                board_field: lookup("CRM_BOARD_FIELD")
                    .unwrap_or_else(|| "Trello_Board_ID".to_string()),
                board_field_label: lookup("CRM_BOARD_FIELD_LABEL")
                    .unwrap_or_else(|| "Trello Board ID".to_string()),
                ensure_field: parse_var(&lookup, "CRM_ENSURE_FIELD", true)?,
            },
            board: BoardConfig {
                api_base: lookup("BOARD_API_BASE")
                    .unwrap_or_else(|| "https://api.trello.com".to_string()),
                api_key: required("BOARD_API_KEY")?,
                token: required("BOARD_TOKEN")?,
            },
            sync: SyncSettings {
                interval_seconds: parse_var(
                    &lookup,
                    "SYNC_INTERVAL_SECONDS",
                    settings.interval_seconds,
                )?,
                kickoff_stage: lookup("SYNC_KICKOFF_STAGE").unwrap_or(settings.kickoff_stage),
                project_type: lookup("SYNC_PROJECT_TYPE").unwrap_or(settings.project_type),
                request_timeout_seconds: parse_var(
                    &lookup,
                    "SYNC_REQUEST_TIMEOUT_SECONDS",
                    settings.request_timeout_seconds,
                )?,
                run_on_startup: parse_var(&lookup, "SYNC_RUN_ON_STARTUP", true)?,
            },
            server: ServerConfig {
                bind: lookup("SERVER_BIND").unwrap_or(server.bind),
            },
            logging: LoggingConfig {
                file: lookup("LOG_FILE"),
                format: lookup("LOG_FORMAT"),
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| SyncError::InvalidConfigValueError {
                field: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

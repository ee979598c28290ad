//! CRM client speaking the Zoho CRM v2 REST dialect.

use crate::adapters::auth::{CrmSession, OAuthCredentials, SessionStore, TokenRefresher};
use crate::adapters::http::{build_client, RemoteReply};
use crate::config::toml_config::CrmConfig;
use crate::domain::model::{Deal, EligibilityCriteria, EligibleSet};
use crate::domain::ports::RecordSource;
use crate::utils::error::{RemoteSystem, Result, SyncError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

const NAME_FIELD: &str = "Deal_Name";
const STAGE_FIELD: &str = "Stage";
const TYPE_FIELD: &str = "Type";
const PAGE_SIZE: u32 = 200;
const MAX_PAGES: u32 = 50;

#[derive(Debug, Deserialize)]
struct SearchReply {
    #[serde(default)]
    data: Vec<Map<String, Value>>,
    info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(default)]
    more_records: bool,
}

/// Per-entry status block used by record updates and field creation.
#[derive(Debug, Deserialize)]
struct EntryStatus {
    status: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateReply {
    #[serde(default)]
    data: Vec<EntryStatus>,
}

#[derive(Debug, Deserialize)]
struct FieldsReply {
    #[serde(default)]
    fields: Vec<FieldMeta>,
}

#[derive(Debug, Deserialize)]
struct FieldMeta {
    api_name: String,
}

#[derive(Debug, Deserialize)]
struct FieldCreateReply {
    #[serde(default)]
    fields: Vec<EntryStatus>,
}

pub struct CrmClient {
    client: Client,
    api_base: String,
    module: String,
    board_field: String,
    board_field_label: String,
    criteria: EligibilityCriteria,
    sessions: SessionStore,
}

impl CrmClient {
    pub fn new(config: &CrmConfig, criteria: EligibilityCriteria, client: Client) -> Self {
        let refresher = TokenRefresher::new(
            client.clone(),
            OAuthCredentials {
                accounts_url: config.accounts_url.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                refresh_token: config.refresh_token.clone(),
            },
        );
        let seed = config.access_token.as_deref().map(CrmSession::seeded);

        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            module: config.module.clone(),
            board_field: config.board_field.clone(),
            board_field_label: config.board_field_label.clone(),
            criteria,
            sessions: SessionStore::new(refresher, seed),
        }
    }

    pub fn from_config(
        config: &CrmConfig,
        criteria: EligibilityCriteria,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self::new(config, criteria, build_client(timeout)?))
    }

    pub fn board_field(&self) -> &str {
        &self.board_field
    }

    fn url(&self, path: &str) -> String {
        format!("{}/crm/v2/{}", self.api_base, path)
    }

    fn search_criteria(&self) -> String {
        format!(
            "(({}:equals:{})and({}:equals:{}))",
            STAGE_FIELD,
            escape_criteria_value(&self.criteria.kickoff_stage),
            TYPE_FIELD,
            escape_criteria_value(&self.criteria.project_type)
        )
    }

    /// Sends the request built by `build` with the current session. A 401
    /// renews the session and retries once; a second 401 is an auth failure.
    async fn send_authorized<F>(&self, operation: &str, build: F) -> Result<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let session = self.sessions.current().await?;
        let response = build(&session.authorization())
            .send()
            .await
            .map_err(|e| SyncError::transport(RemoteSystem::Crm, e))?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!("CRM rejected the access token during {}, reauthenticating", operation);
        let session = self.sessions.renew(Some(&session)).await?;
        let response = build(&session.authorization())
            .send()
            .await
            .map_err(|e| SyncError::transport(RemoteSystem::Crm, e))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(SyncError::Auth {
                system: RemoteSystem::Crm,
                message: format!("access token rejected again during {}", operation),
            });
        }
        Ok(response)
    }

    async fn fetch_page(&self, page: u32) -> Result<Option<SearchReply>> {
        let url = self.url(&format!("{}/search", self.module));
        let criteria = self.search_criteria();
        let page_param = page.to_string();
        let per_page = PAGE_SIZE.to_string();

        let response = self
            .send_authorized("search", |authorization| {
                self.client
                    .get(&url)
                    .header("Authorization", authorization)
                    .query(&[
                        ("criteria", criteria.as_str()),
                        ("page", page_param.as_str()),
                        ("per_page", per_page.as_str()),
                    ])
            })
            .await?;

        // No matches at all.
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        RemoteReply::<SearchReply>::read(response, RemoteSystem::Crm)
            .await?
            .into_result(RemoteSystem::Crm, "search")
            .map(Some)
    }

    fn parse_deal(&self, row: &Map<String, Value>) -> Result<Deal> {
        let id = match row.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(SyncError::rejection(
                    RemoteSystem::Crm,
                    "search",
                    "MALFORMED_RECORD",
                    "record without an id",
                ))
            }
        };

        Ok(Deal {
            id,
            name: text_field(row, NAME_FIELD).unwrap_or_default(),
            stage: text_field(row, STAGE_FIELD).unwrap_or_default(),
            deal_type: text_field(row, TYPE_FIELD).unwrap_or_default(),
            board_reference: text_field(row, &self.board_field),
        })
    }

    /// Creates the board-reference custom field if the module lacks it.
    /// Returns `true` when the field was created.
    pub async fn ensure_board_field(&self) -> Result<bool> {
        let url = self.url("settings/fields");
        let module = self.module.as_str();

        let response = self
            .send_authorized("list fields", |authorization| {
                self.client
                    .get(&url)
                    .header("Authorization", authorization)
                    .query(&[("module", module)])
            })
            .await?;
        let existing = RemoteReply::<FieldsReply>::read(response, RemoteSystem::Crm)
            .await?
            .into_result(RemoteSystem::Crm, "list fields")?;

        if existing
            .fields
            .iter()
            .any(|field| field.api_name == self.board_field)
        {
            tracing::debug!("CRM field {} already exists", self.board_field);
            return Ok(false);
        }

        tracing::info!(
            "Creating CRM field '{}' ({}) on {}",
            self.board_field_label,
            self.board_field,
            self.module
        );
        let body = serde_json::json!({
            "fields": [{
                "field_label": self.board_field_label,
                "data_type": "text",
                "length": 255
            }]
        });
        let response = self
            .send_authorized("create field", |authorization| {
                self.client
                    .post(&url)
                    .header("Authorization", authorization)
                    .query(&[("module", module)])
                    .json(&body)
            })
            .await?;
        let created = RemoteReply::<FieldCreateReply>::read(response, RemoteSystem::Crm)
            .await?
            .into_result(RemoteSystem::Crm, "create field")?;

        require_success(created.fields.first(), "create field")?;
        Ok(true)
    }
}

#[async_trait]
impl RecordSource for CrmClient {
    async fn fetch_eligible(&self) -> Result<EligibleSet> {
        let mut eligible = EligibleSet::default();
        let mut already_linked = 0usize;
        let mut malformed = 0usize;

        for page in 1..=MAX_PAGES {
            let Some(reply) = self.fetch_page(page).await? else {
                break;
            };

            for row in &reply.data {
                let deal = match self.parse_deal(row) {
                    Ok(deal) => deal,
                    Err(e) => {
                        tracing::warn!("Ignoring CRM row on page {}: {}", page, e);
                        malformed += 1;
                        continue;
                    }
                };
                if deal.has_board_reference() {
                    already_linked += 1;
                    continue;
                }
                eligible.deals.push(deal);
            }

            let more = reply.info.map(|info| info.more_records).unwrap_or(false);
            if !more {
                break;
            }
            if page == MAX_PAGES {
                tracing::warn!(
                    "Stopped CRM search after {} pages; remaining deals wait for the next run",
                    MAX_PAGES
                );
                eligible.truncated = true;
            }
        }

        tracing::debug!(
            "CRM search returned {} eligible deals ({} already linked, {} malformed)",
            eligible.deals.len(),
            already_linked,
            malformed
        );
        Ok(eligible)
    }

    async fn write_board_reference(&self, record_id: &str, board_id: &str) -> Result<()> {
        let url = self.url(&format!("{}/{}", self.module, record_id));
        let mut entry = Map::new();
        entry.insert(self.board_field.clone(), Value::String(board_id.to_string()));
        let body = serde_json::json!({ "data": [entry] });

        let response = self
            .send_authorized("update", |authorization| {
                self.client
                    .put(&url)
                    .header("Authorization", authorization)
                    .json(&body)
            })
            .await?;

        let reply = RemoteReply::<UpdateReply>::read(response, RemoteSystem::Crm)
            .await?
            .into_result(RemoteSystem::Crm, "update")?;

        require_success(reply.data.first(), "update")?;
        tracing::debug!("Linked deal {} to board {}", record_id, board_id);
        Ok(())
    }

    async fn check_connection(&self) -> Result<()> {
        let url = self.url("org");
        let response = self
            .send_authorized("org lookup", |authorization| {
                self.client.get(&url).header("Authorization", authorization)
            })
            .await?;

        RemoteReply::<Value>::read(response, RemoteSystem::Crm)
            .await?
            .into_result(RemoteSystem::Crm, "org lookup")
            .map(|_| ())
    }
}

/// Only an explicit `"status": "success"` counts.
fn require_success(entry: Option<&EntryStatus>, operation: &str) -> Result<()> {
    let Some(entry) = entry else {
        return Err(SyncError::rejection(
            RemoteSystem::Crm,
            operation,
            "NO_STATUS",
            "response carried no per-record status",
        ));
    };

    if entry.status.as_deref() == Some("success") {
        return Ok(());
    }

    Err(SyncError::rejection(
        RemoteSystem::Crm,
        operation,
        entry
            .code
            .clone()
            .or_else(|| entry.status.clone())
            .unwrap_or_else(|| "UNKNOWN".to_string()),
        entry
            .message
            .clone()
            .unwrap_or_else(|| "no message".to_string()),
    ))
}

fn text_field(row: &Map<String, Value>, field: &str) -> Option<String> {
    match row.get(field) {
        Some(Value::String(value)) => Some(value.clone()),
        Some(Value::Number(value)) => Some(value.to_string()),
        _ => None,
    }
}

/// Parentheses and commas are criteria syntax and must be escaped in values.
fn escape_criteria_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '(' | ')' | ',') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

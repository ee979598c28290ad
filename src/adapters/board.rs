//! Task-board client speaking the Trello REST dialect.

use crate::adapters::http::{build_client, RemoteReply};
use crate::config::toml_config::BoardConfig;
use crate::domain::model::{Board, BoardList, Card, ProjectBoard};
use crate::domain::ports::BoardProvisioner;
use crate::utils::error::{RemoteSystem, Result, SyncError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const BOARD_NAME_PREFIX: &str = "Project: ";

/// Lists in creation order; position is the 1-based index.
pub const LIST_TEMPLATE: [&str; 3] = ["To Do", "In Progress", "Done"];

/// Starter cards for the To Do list, in creation order.
pub const CARD_TEMPLATE: [(&str, &str); 3] = [
    (
        "Kickoff Meeting Scheduled",
        "Schedule the kickoff meeting with the client and confirm attendees.",
    ),
    (
        "Requirements Gathering",
        "Collect and document the client's implementation requirements.",
    ),
    (
        "System Setup",
        "Provision and configure the client's environment.",
    ),
];

#[derive(Debug, Deserialize)]
struct BoardReply {
    id: String,
    name: String,
    url: Option<String>,
    #[serde(rename = "shortUrl")]
    short_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListReply {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CardReply {
    id: String,
    name: String,
    #[serde(rename = "idList")]
    id_list: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BoardClient {
    client: Client,
    api_base: String,
    api_key: String,
    token: String,
}

impl BoardClient {
    pub fn new(config: &BoardConfig, client: Client) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            token: config.token.clone(),
        }
    }

    pub fn from_config(config: &BoardConfig, timeout: Duration) -> Result<Self> {
        Ok(Self::new(config, build_client(timeout)?))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/1/{}", self.api_base, path)
    }

    async fn post<T>(&self, path: &str, operation: &str, params: &[(&str, &str)]) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(self.url(path))
            .query(&[("key", self.api_key.as_str()), ("token", self.token.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| SyncError::transport(RemoteSystem::Board, e))?;

        RemoteReply::<T>::read(response, RemoteSystem::Board)
            .await?
            .into_result(RemoteSystem::Board, operation)
    }

    async fn create_board(&self, name: &str, description: &str) -> Result<Board> {
        let reply: BoardReply = self
            .post(
                "boards/",
                "create board",
                &[
                    ("name", name),
                    ("desc", description),
                    ("defaultLists", "false"),
                    ("prefs_permissionLevel", "private"),
                ],
            )
            .await?;

        let url = reply.url.or(reply.short_url).unwrap_or_default();
        Ok(Board {
            id: reply.id,
            name: reply.name,
            url,
        })
    }

    async fn create_list(&self, board_id: &str, name: &str, position: u32) -> Result<BoardList> {
        let pos = position.to_string();
        let reply: ListReply = self
            .post(
                "lists",
                "create list",
                &[("idBoard", board_id), ("name", name), ("pos", pos.as_str())],
            )
            .await?;

        Ok(BoardList {
            id: reply.id,
            name: reply.name,
            position,
        })
    }

    async fn create_card(&self, list_id: &str, name: &str, description: &str) -> Result<Card> {
        let reply: CardReply = self
            .post(
                "cards",
                "create card",
                &[("idList", list_id), ("name", name), ("desc", description)],
            )
            .await?;

        Ok(Card {
            id: reply.id,
            name: reply.name,
            list_id: reply.id_list.unwrap_or_else(|| list_id.to_string()),
            url: reply.url,
        })
    }
}

#[async_trait]
impl BoardProvisioner for BoardClient {
    async fn create_project_board(&self, name: &str, record_id: &str) -> Result<ProjectBoard> {
        let board_name = format!("{}{}", BOARD_NAME_PREFIX, name);
        let description = format!("Project board for CRM deal {}", record_id);

        let board = self.create_board(&board_name, &description).await?;
        tracing::debug!("Created board {} ({})", board.id, board.name);

        let mut lists = Vec::with_capacity(LIST_TEMPLATE.len());
        for (index, list_name) in LIST_TEMPLATE.iter().enumerate() {
            let list = self.create_list(&board.id, list_name, index as u32 + 1).await?;
            lists.push(list);
        }

        let todo_id = lists[0].id.clone();
        let mut cards = Vec::with_capacity(CARD_TEMPLATE.len());
        for (card_name, card_description) in CARD_TEMPLATE {
            let card = self.create_card(&todo_id, card_name, card_description).await?;
            cards.push(card);
        }

        tracing::debug!(
            "Board {} provisioned with {} lists and {} cards",
            board.id,
            lists.len(),
            cards.len()
        );
        Ok(ProjectBoard {
            board,
            lists,
            cards,
        })
    }

    async fn check_connection(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url("members/me"))
            .query(&[("key", self.api_key.as_str()), ("token", self.token.as_str())])
            .send()
            .await
            .map_err(|e| SyncError::transport(RemoteSystem::Board, e))?;

        RemoteReply::<serde_json::Value>::read(response, RemoteSystem::Board)
            .await?
            .into_result(RemoteSystem::Board, "member lookup")
            .map(|_| ())
    }
}

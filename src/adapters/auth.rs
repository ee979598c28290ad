use crate::adapters::http::RemoteReply;
use crate::utils::error::{RemoteSystem, Result, SyncError};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Refresh this long before the CRM says the token expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// An issued CRM access token. Never modified; reauthentication yields a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmSession {
    access_token: String,
    issued_at: DateTime<Utc>,
    lifetime: Option<Duration>,
}

impl CrmSession {
    pub fn new(access_token: impl Into<String>, issued_at: DateTime<Utc>, lifetime: Option<Duration>) -> Self {
        Self {
            access_token: access_token.into(),
            issued_at,
            lifetime,
        }
    }

    /// A token handed in through configuration; its lifetime is unknown, so
    /// only a 401 will replace it.
    pub fn seeded(access_token: impl Into<String>) -> Self {
        Self::new(access_token, Utc::now(), None)
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn authorization(&self) -> String {
        format!("Zoho-oauthtoken {}", self.access_token)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.lifetime {
            Some(lifetime) => now + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.issued_at + lifetime,
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub accounts_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenReply {
    Granted {
        access_token: String,
        expires_in: Option<i64>,
    },
    Denied {
        error: String,
    },
}

/// Exchanges the long-lived refresh token for access tokens.
#[derive(Debug, Clone)]
pub struct TokenRefresher {
    client: Client,
    credentials: OAuthCredentials,
}

impl TokenRefresher {
    pub fn new(client: Client, credentials: OAuthCredentials) -> Self {
        Self { client, credentials }
    }

    pub async fn refresh(&self) -> Result<CrmSession> {
        let url = format!(
            "{}/oauth/v2/token",
            self.credentials.accounts_url.trim_end_matches('/')
        );
        tracing::debug!("Requesting CRM access token from {}", url);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SyncError::transport(RemoteSystem::Crm, e))?;

        match RemoteReply::<TokenReply>::read(response, RemoteSystem::Crm).await? {
            RemoteReply::Success(TokenReply::Granted {
                access_token,
                expires_in,
            }) => {
                tracing::info!("Obtained new CRM access token");
                Ok(CrmSession::new(
                    access_token,
                    Utc::now(),
                    expires_in.map(Duration::seconds),
                ))
            }
            RemoteReply::Success(TokenReply::Denied { error }) => Err(SyncError::Auth {
                system: RemoteSystem::Crm,
                message: error,
            }),
            RemoteReply::Failure { status, message } => Err(SyncError::Auth {
                system: RemoteSystem::Crm,
                message: format!("token endpoint returned {}: {}", status, message),
            }),
        }
    }
}

/// Holds the current session and swaps in a fresh one when it goes stale.
#[derive(Debug)]
pub struct SessionStore {
    refresher: TokenRefresher,
    current: RwLock<Option<Arc<CrmSession>>>,
}

impl SessionStore {
    pub fn new(refresher: TokenRefresher, seed: Option<CrmSession>) -> Self {
        Self {
            refresher,
            current: RwLock::new(seed.map(Arc::new)),
        }
    }

    pub async fn current(&self) -> Result<Arc<CrmSession>> {
        {
            let guard = self.current.read().await;
            if let Some(session) = guard.as_ref() {
                if !session.is_expired_at(Utc::now()) {
                    return Ok(Arc::clone(session));
                }
            }
        }
        self.renew(None).await
    }

    /// Replaces `stale` (or an expired/missing session) with a new one. If
    /// another caller already replaced it, that newer session is returned
    /// without another refresh.
    pub async fn renew(&self, stale: Option<&Arc<CrmSession>>) -> Result<Arc<CrmSession>> {
        let mut guard = self.current.write().await;
        if let Some(existing) = guard.as_ref() {
            let is_stale = stale.is_some_and(|stale| Arc::ptr_eq(stale, existing));
            if !is_stale && !existing.is_expired_at(Utc::now()) {
                return Ok(Arc::clone(existing));
            }
        }

        let session = Arc::new(self.refresher.refresh().await?);
        *guard = Some(Arc::clone(&session));
        Ok(session)
    }
}

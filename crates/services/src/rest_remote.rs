//! Remote progress table served over a PostgREST-compatible HTTP API.

use async_trait::async_trait;
use lingua_core::model::{RemoteProgressRecord, UserId};
use reqwest::{Client, RequestBuilder, StatusCode};
use storage::repository::{RemoteError, RemoteProgressRepository};
use tracing::debug;
use url::Url;

use crate::config::RemoteConfig;

const TABLE_PATH: [&str; 3] = ["rest", "v1", "user_progress"];
const CONFLICT_KEY: &str = "user_id,tense_id";

#[derive(Clone)]
pub struct RestProgressRemote {
    client: Client,
    config: RemoteConfig,
}

impl RestProgressRemote {
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn table_url(&self) -> Result<Url, RemoteError> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::Network("remote base URL cannot hold a path".into()))?
            .pop_if_empty()
            .extend(TABLE_PATH);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(token)
    }
}

fn status_error(status: StatusCode) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized,
        other => RemoteError::Backend {
            status: other.as_u16(),
        },
    }
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout
    } else if err.is_decode() {
        RemoteError::Serialization(err.to_string())
    } else {
        RemoteError::Network(err.to_string())
    }
}

#[async_trait]
impl RemoteProgressRepository for RestProgressRemote {
    async fn fetch_all(&self, user_id: &UserId) -> Result<Vec<RemoteProgressRecord>, RemoteError> {
        let request = self
            .client
            .get(self.table_url()?)
            .query(&[("select", "*".to_string()), ("user_id", format!("eq.{user_id}"))]);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let rows: Vec<RemoteProgressRecord> = response.json().await.map_err(transport_error)?;
        debug!(%user_id, rows = rows.len(), "fetched remote progress");
        Ok(rows)
    }

    async fn upsert_many(&self, records: &[RemoteProgressRecord]) -> Result<(), RemoteError> {
        if records.is_empty() {
            return Ok(());
        }

        let request = self
            .client
            .post(self.table_url()?)
            .query(&[("on_conflict", CONFLICT_KEY)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(records);

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        debug!(rows = records.len(), "upserted remote progress");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(base: &str) -> RestProgressRemote {
        RestProgressRemote::new(RemoteConfig {
            base_url: Url::parse(base).unwrap(),
            api_key: "anon".into(),
            access_token: None,
        })
    }

    #[test]
    fn table_url_appends_rest_path() {
        assert_eq!(
            remote("https://example.supabase.co").table_url().unwrap().as_str(),
            "https://example.supabase.co/rest/v1/user_progress"
        );
        assert_eq!(
            remote("https://proxy.local/db/").table_url().unwrap().as_str(),
            "https://proxy.local/db/rest/v1/user_progress"
        );
    }

    #[test]
    fn auth_statuses_map_to_unauthorized() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED),
            RemoteError::Unauthorized
        ));
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE),
            RemoteError::Backend { status: 503 }
        ));
    }
}

//! HubSpot CRM v3 client.
//!
//! [`CrmSource`] is the seam between the aggregation pipeline and the
//! upstream API; [`HubSpotClient`] is the reqwest implementation used in
//! production.

use crate::crm::CrmError;
use crate::models::{DealRecord, OwnerRecord, Page, DEAL_PROPERTIES};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Source of paginated owner and deal records.
#[async_trait]
pub trait CrmSource: Send + Sync {
    /// Fetch one page of owners, starting after `after`.
    async fn owners_page(
        &self,
        limit: u32,
        after: Option<&str>,
    ) -> Result<Page<OwnerRecord>, CrmError>;

    /// Fetch one page of deals with the dashboard properties, starting after `after`.
    async fn deals_page(
        &self,
        limit: u32,
        after: Option<&str>,
    ) -> Result<Page<DealRecord>, CrmError>;
}

/// Settings for [`HubSpotClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
}

/// Bearer-authenticated HubSpot REST client.
pub struct HubSpotClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl HubSpotClient {
    pub fn new(config: ClientConfig) -> Result<Self, CrmError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CrmError::Transport {
                url: config.base_url.clone(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Page<T>, CrmError> {
        let url = self.url(path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| CrmError::Transport {
                url: url.clone(),
                message: if e.is_timeout() {
                    format!("timed out after {}s", self.config.timeout_seconds)
                } else if e.is_connect() {
                    "cannot connect".to_string()
                } else {
                    e.to_string()
                },
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Status { status, body });
        }

        response
            .json::<Page<T>>()
            .await
            .map_err(|e| CrmError::Decode(e.to_string()))
    }
}

fn page_query(limit: u32, after: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = vec![("limit", limit.to_string())];
    if let Some(after) = after {
        query.push(("after", after.to_string()));
    }
    query
}

#[async_trait]
impl CrmSource for HubSpotClient {
    async fn owners_page(
        &self,
        limit: u32,
        after: Option<&str>,
    ) -> Result<Page<OwnerRecord>, CrmError> {
        self.get_page("/crm/v3/owners", &page_query(limit, after))
            .await
    }

    async fn deals_page(
        &self,
        limit: u32,
        after: Option<&str>,
    ) -> Result<Page<DealRecord>, CrmError> {
        let mut query = page_query(limit, after);
        query.push(("properties", DEAL_PROPERTIES.to_string()));
        self.get_page("/crm/v3/objects/deals", &query).await
    }
}

//! Rate-limited client for the third-party stats API.
//!
//! Every request must hold the client's single permit, so across all players
//! at most one request is ever in flight. The provider bans bursts, which is
//! why this throttle is global rather than per player.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::blob::{self, CompetitiveStats};
use super::snapshot::{HeroCounters, Region, StatsSnapshot};
use super::SnapshotSource;
use crate::error::StatsError;
use std::collections::BTreeMap;

/// Default base URL of the stats API.
pub const DEFAULT_API_BASE_URL: &str = "https://owapi.net/api/v3/";

/// Default pause between the dependent stats and heroes requests.
pub const DEFAULT_INTER_CALL_DELAY: Duration = Duration::from_secs(1);

/// Raw response from a transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// Issues a GET request and returns the raw response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, StatsError>;
}

/// Transport backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, StatsError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("oversessions/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StatsError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, StatsError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StatsError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| StatsError::Transport(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

/// Replace `#` so a BattleTag can be embedded in a request path.
pub fn url_battle_tag(battle_tag: &str) -> String {
    battle_tag.replace('#', "-")
}

/// Client for the stats API.
pub struct StatsClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    permit: Arc<Semaphore>,
    inter_call_delay: Duration,
}

impl StatsClient {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            transport,
            base_url,
            permit: Arc::new(Semaphore::new(1)),
            inter_call_delay: DEFAULT_INTER_CALL_DELAY,
        }
    }

    pub fn with_inter_call_delay(mut self, delay: Duration) -> Self {
        self.inter_call_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one GET while holding the permit.
    ///
    /// The permit is released when the guard drops, which also covers a
    /// caller dropping this future on timeout.
    async fn request(&self, path: &str) -> Result<String, StatsError> {
        let _permit = self
            .permit
            .acquire()
            .await
            .map_err(|_| StatsError::Cancelled)?;

        let url = format!("{}{}", self.base_url, path);
        let response = self.transport.get(&url).await?;

        if !response.is_success() {
            let err = StatsError::Upstream {
                status: response.status,
                method: "GET".to_string(),
                url,
            };
            tracing::warn!(error = %err, "Bad response");
            return Err(err);
        }

        tracing::debug!(method = "GET", url = %url, "Request was successful");
        Ok(response.body)
    }

    /// Fetch the competitive summary from the best region.
    pub async fn fetch_stats(&self, battle_tag: &str) -> Result<Option<CompetitiveStats>, StatsError> {
        let tag = url_battle_tag(battle_tag);
        let body = self.request(&format!("u/{}/stats", tag)).await?;
        blob::parse_stats(&body, &tag).inspect_err(|e| {
            tracing::error!(error = %e, battle_tag, "Could not decode response as JSON");
        })
    }

    /// Fetch per-hero competitive counters for one region.
    pub async fn fetch_heroes(
        &self,
        battle_tag: &str,
        region: Region,
    ) -> Result<BTreeMap<String, HeroCounters>, StatsError> {
        let tag = url_battle_tag(battle_tag);
        let body = self.request(&format!("u/{}/heroes", tag)).await?;
        blob::parse_heroes(&body, region).inspect_err(|e| {
            tracing::error!(error = %e, battle_tag, "Could not decode response as JSON");
        })
    }

    async fn fetch_stats_and_heroes(&self, battle_tag: &str) -> Result<Option<StatsSnapshot>, StatsError> {
        let Some(stats) = self.fetch_stats(battle_tag).await? else {
            tracing::info!(battle_tag, "No region with competitive stats for player");
            return Ok(None);
        };

        // Back-to-back calls for the same player get 429s without this
        tokio::time::sleep(self.inter_call_delay).await;

        let heroes = self.fetch_heroes(battle_tag, stats.region).await?;

        Ok(Some(StatsSnapshot {
            battle_tag: battle_tag.to_string(),
            region: Some(stats.region),
            rank: stats.rank,
            overall: Some(stats.overall),
            heroes,
        }))
    }
}

#[async_trait]
impl SnapshotSource for StatsClient {
    async fn fetch_snapshot(
        &self,
        battle_tag: &str,
        timeout: Duration,
    ) -> Result<Option<StatsSnapshot>, StatsError> {
        match tokio::time::timeout(timeout, self.fetch_stats_and_heroes(battle_tag)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(battle_tag, ?timeout, "Stats request timed out");
                Err(StatsError::Cancelled)
            }
        }
    }
}

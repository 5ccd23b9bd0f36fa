//! Access to the third-party stats provider.
//!
//! - `snapshot` - Point-in-time stats types
//! - `blob` - Lenient decoding of provider responses
//! - `client` - Rate-limited HTTP client

pub mod blob;
pub mod client;
pub mod snapshot;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StatsError;

pub use client::{HttpResponse, ReqwestTransport, StatsClient, Transport, DEFAULT_API_BASE_URL};
pub use snapshot::{HeroCounters, OverallRecord, Region, StatsSnapshot};

/// Anything that can produce a snapshot for a BattleTag.
///
/// `Ok(None)` means the player exists but has no competitive stats.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(
        &self,
        battle_tag: &str,
        timeout: Duration,
    ) -> Result<Option<StatsSnapshot>, StatsError>;
}

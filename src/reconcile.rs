//! Retry-until-different polling for post-session stats.
//!
//! The stats provider only picks up a finished game some time after the
//! player quits, sometimes several minutes later. A fetch right after the
//! session often still shows the opening numbers, so the closing snapshot is
//! polled until it differs from the opening one or the attempt budget runs
//! out.
//!
//! ```text
//! Polling ──candidate differs──▶ Resolved
//!    │
//!    └────budget exhausted─────▶ Exhausted
//! ```

use std::time::Duration;

use crate::stats::{SnapshotSource, StatsSnapshot};

/// Default number of fetch attempts per reconciliation.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default pause between attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default timeout for a single attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget and pacing for a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub max_attempts: u32,
    pub poll_interval: Duration,
    pub attempt_timeout: Duration,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

/// How a reconciliation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A candidate differing from the opening snapshot was found
    Resolved,
    /// Every attempt matched the opening snapshot or failed
    Exhausted,
}

/// Result of a reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Latest successfully fetched snapshot, if any fetch succeeded
    pub after: Option<StatsSnapshot>,
    pub attempts: u32,
    pub resolution: Resolution,
}

/// Poll `source` until its snapshot differs from `prev`.
///
/// Failed attempts are logged and count as "not changed yet". The loop never
/// sleeps after its final attempt.
pub async fn reconcile(
    source: &dyn SnapshotSource,
    policy: &ReconcilePolicy,
    battle_tag: &str,
    prev: Option<&StatsSnapshot>,
) -> Reconciled {
    let max_attempts = policy.max_attempts.max(1);
    let mut latest: Option<StatsSnapshot> = None;
    let mut attempts = 0;

    while attempts < max_attempts {
        attempts += 1;
        tracing::debug!(battle_tag, attempt = attempts, "fetching post-session stats");

        match source.fetch_snapshot(battle_tag, policy.attempt_timeout).await {
            Ok(candidate) => {
                let different = candidate.as_ref() != prev;
                latest = candidate;
                if different {
                    tracing::debug!(battle_tag, attempts, "successfully retrieved updated stats");
                    return Reconciled {
                        after: latest,
                        attempts,
                        resolution: Resolution::Resolved,
                    };
                }
            }
            Err(e) => {
                tracing::warn!(battle_tag, attempt = attempts, error = %e, "post-session fetch failed");
            }
        }

        if attempts < max_attempts {
            tokio::time::sleep(policy.poll_interval).await;
        }
    }

    tracing::info!(battle_tag, attempts, "stats unchanged after all attempts");
    Reconciled {
        after: latest,
        attempts,
        resolution: Resolution::Exhausted,
    }
}

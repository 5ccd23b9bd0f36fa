//! Test doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StatsError;
use crate::stats::{SnapshotSource, StatsSnapshot};

type FetchResult = Result<Option<StatsSnapshot>, StatsError>;

/// Snapshot source that replays a script of results.
///
/// Once the script runs out the last result repeats.
pub struct ScriptedSource {
    script: Mutex<VecDeque<FetchResult>>,
    last: Mutex<Option<FetchResult>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<FetchResult>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Source that always returns the same snapshot.
    pub fn constant(snapshot: Option<StatsSnapshot>) -> Self {
        Self::new(vec![Ok(snapshot)])
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn fetch_snapshot(&self, battle_tag: &str, _timeout: Duration) -> FetchResult {
        self.calls.lock().unwrap().push(battle_tag.to_string());

        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(result) => {
                *last = Some(result.clone());
                result
            }
            None => last.clone().unwrap_or(Ok(None)),
        }
    }
}

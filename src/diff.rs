//! Session diffs between two stats snapshots.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::stats::{HeroCounters, StatsSnapshot};

/// Win/draw/loss counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Wdl {
    pub win: i64,
    pub draw: i64,
    pub loss: i64,
}

impl Wdl {
    pub fn new(win: i64, draw: i64, loss: i64) -> Self {
        Self { win, draw, loss }
    }

    pub fn is_zero(&self) -> bool {
        self.win == 0 && self.draw == 0 && self.loss == 0
    }

    /// Games gained on one hero between two readings.
    ///
    /// Differences are taken on the raw counters and then truncated toward
    /// zero.
    pub fn between(prev: &HeroCounters, next: &HeroCounters) -> Self {
        Self {
            win: (next.won - prev.won) as i64,
            draw: (next.drawn() - prev.drawn()) as i64,
            loss: (next.lost - prev.lost) as i64,
        }
    }
}

/// Length of a session in whole hours and minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionLength {
    pub hours: i64,
    pub minutes: i64,
}

impl SessionLength {
    /// Floor to whole minutes. Negative spans count as zero.
    pub fn from_duration(elapsed: chrono::Duration) -> Self {
        let total = elapsed.num_minutes().max(0);
        Self {
            hours: total / 60,
            minutes: total % 60,
        }
    }
}

impl fmt::Display for SessionLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hours > 0 {
            write!(f, "{} hrs {} min", self.hours, self.minutes)
        } else {
            write!(f, "{} min", self.minutes)
        }
    }
}

/// Summary of one finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionDiff {
    pub username: String,
    pub final_rank: i64,
    pub rank_delta: i64,
    pub length: SessionLength,
    pub heroes: BTreeMap<String, Wdl>,
}

impl SessionDiff {
    /// Total across all heroes.
    pub fn totals(&self) -> Wdl {
        self.heroes.values().fold(Wdl::default(), |acc, wdl| Wdl {
            win: acc.win + wdl.win,
            draw: acc.draw + wdl.draw,
            loss: acc.loss + wdl.loss,
        })
    }
}

/// Compute the diff between a session's opening and closing snapshots.
///
/// Heroes missing from `prev` are diffed against zero. Heroes that appear
/// only in `prev` are left out.
pub fn diff(
    username: &str,
    prev: &StatsSnapshot,
    next: &StatsSnapshot,
    elapsed: chrono::Duration,
) -> SessionDiff {
    let zero = HeroCounters::default();
    let heroes = next
        .heroes
        .iter()
        .map(|(name, counters)| {
            let baseline = prev.heroes.get(name).unwrap_or(&zero);
            (name.clone(), Wdl::between(baseline, counters))
        })
        .collect();

    SessionDiff {
        username: username.to_string(),
        final_rank: next.rank,
        rank_delta: next.rank - prev.rank,
        length: SessionLength::from_duration(elapsed),
        heroes,
    }
}

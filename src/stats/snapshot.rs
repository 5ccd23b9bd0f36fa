//! Point-in-time competitive statistics for one player.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Regions the stats provider reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Us,
    Eu,
    Kr,
}

impl Region {
    /// Tie-break order when two regions have played the same number of games.
    pub const PRIORITY: [Region; 3] = [Region::Us, Region::Eu, Region::Kr];

    /// Key used for this region in response bodies.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Us => "us",
            Self::Eu => "eu",
            Self::Kr => "kr",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Us => write!(f, "US"),
            Self::Eu => write!(f, "EU"),
            Self::Kr => write!(f, "KR"),
        }
    }
}

/// Competitive counters for a single hero.
///
/// The provider reports these as floats, so they are kept as floats here and
/// only truncated when a diff is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeroCounters {
    pub won: f64,
    pub played: f64,
    pub lost: f64,
}

impl HeroCounters {
    pub fn new(won: f64, played: f64, lost: f64) -> Self {
        Self { won, played, lost }
    }

    /// Games that were neither won nor lost.
    pub fn drawn(&self) -> f64 {
        self.played - self.won - self.lost
    }
}

impl fmt::Display for HeroCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{Played:{} Won:{} Lost:{}}}",
            self.played, self.won, self.lost
        )
    }
}

/// Overall competitive record across all heroes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallRecord {
    pub games: i64,
    pub wins: i64,
    pub losses: i64,
}

/// A snapshot of a player's competitive stats in one region.
///
/// Heroes the player has never played in competitive are absent from
/// `heroes`, never present with zero counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub battle_tag: String,
    pub region: Option<Region>,
    pub rank: i64,
    pub overall: Option<OverallRecord>,
    pub heroes: BTreeMap<String, HeroCounters>,
}

impl StatsSnapshot {
    pub fn new(battle_tag: impl Into<String>, rank: i64) -> Self {
        Self {
            battle_tag: battle_tag.into(),
            rank,
            ..Self::default()
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_hero(mut self, name: impl Into<String>, counters: HeroCounters) -> Self {
        self.heroes.insert(name.into(), counters);
        self
    }

    pub fn with_overall(mut self, overall: OverallRecord) -> Self {
        self.overall = Some(overall);
        self
    }

    pub fn hero(&self, name: &str) -> Option<&HeroCounters> {
        self.heroes.get(name)
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{BattleTag:{} Rank:{}", self.battle_tag, self.rank)?;
        if let Some(region) = self.region {
            write!(f, " Region:{}", region)?;
        }
        write!(f, " Heroes:{}}}", self.heroes.len())
    }
}

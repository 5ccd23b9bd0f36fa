//! Lenient decoding of region-keyed response blobs.
//!
//! A body that is not a JSON object is rejected outright. Inside the object,
//! a field with an unexpected type is logged and read as its zero value so a
//! single odd field never discards the rest of the response.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::snapshot::{HeroCounters, OverallRecord, Region};
use crate::error::StatsError;

/// Competitive summary from the `stats` endpoint for the chosen region.
#[derive(Debug, Clone, PartialEq)]
pub struct CompetitiveStats {
    pub region: Region,
    pub rank: i64,
    pub overall: OverallRecord,
}

/// Parse a body into its top-level object.
pub fn parse_object(body: &str) -> Result<Map<String, Value>, StatsError> {
    let value: Value = serde_json::from_str(body).map_err(|e| StatsError::Decode {
        reason: e.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StatsError::Decode {
            reason: format!("expected object at top level, found {}", type_name(&other)),
        }),
    }
}

/// Decode a `u/<tag>/stats` body and pick the best region.
///
/// Returns `PlayerNotFound` when no region is present at all, and `Ok(None)`
/// when regions exist but none of them carries competitive stats.
pub fn parse_stats(body: &str, battle_tag: &str) -> Result<Option<CompetitiveStats>, StatsError> {
    let root = parse_object(body)?;

    let mut any_region = false;
    let mut best: Option<CompetitiveStats> = None;

    for region in Region::PRIORITY {
        let Some(region_obj) = object_field(&root, region.key(), "") else {
            continue;
        };
        any_region = true;

        let stats_path = format!("{}.stats", region.key());
        let Some(competitive) = object_field(region_obj, "stats", region.key())
            .and_then(|stats| object_field(stats, "competitive", &stats_path))
        else {
            continue;
        };

        let path = format!("{}.competitive", stats_path);
        let overall_path = format!("{}.overall_stats", path);
        let overall_obj = object_field(competitive, "overall_stats", &path);
        let (rank, overall) = match overall_obj {
            Some(obj) => (
                int_field(obj, "comprank", &overall_path),
                OverallRecord {
                    games: int_field(obj, "games", &overall_path),
                    wins: int_field(obj, "wins", &overall_path),
                    losses: int_field(obj, "losses", &overall_path),
                },
            ),
            None => (0, OverallRecord::default()),
        };

        // Strictly greater keeps the earlier region on ties
        let better = match &best {
            Some(current) => overall.games > current.overall.games,
            None => true,
        };
        if better {
            best = Some(CompetitiveStats {
                region,
                rank,
                overall,
            });
        }
    }

    if !any_region {
        return Err(StatsError::PlayerNotFound {
            battle_tag: battle_tag.to_string(),
        });
    }

    Ok(best)
}

/// Decode a `u/<tag>/heroes` body for one region.
///
/// Heroes absent from the body, or reported as `null`, are left out of the
/// returned map.
pub fn parse_heroes(body: &str, region: Region) -> Result<BTreeMap<String, HeroCounters>, StatsError> {
    let root = parse_object(body)?;
    let mut heroes = BTreeMap::new();

    let heroes_path = format!("{}.heroes", region.key());
    let stats_path = format!("{}.stats", heroes_path);
    let competitive = object_field(&root, region.key(), "")
        .and_then(|r| object_field(r, "heroes", region.key()))
        .and_then(|h| object_field(h, "stats", &heroes_path))
        .and_then(|s| object_field(s, "competitive", &stats_path));
    let path = format!("{}.competitive", stats_path);

    let Some(competitive) = competitive else {
        return Ok(heroes);
    };

    for (name, entry) in competitive {
        let hero_path = format!("{}.{}", path, name);
        let Some(hero) = as_object(entry, &hero_path) else {
            continue;
        };
        let general_path = format!("{}.general_stats", hero_path);
        let counters = match object_field(hero, "general_stats", &hero_path) {
            Some(general) => HeroCounters {
                won: float_field(general, "games_won", &general_path),
                played: float_field(general, "games_played", &general_path),
                lost: float_field(general, "games_lost", &general_path),
            },
            None => HeroCounters::default(),
        };
        heroes.insert(name.clone(), counters);
    }

    Ok(heroes)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Option<&'a Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => {
            tracing::warn!(
                field = path,
                found = type_name(other),
                "Ignoring type error when decoding response as JSON"
            );
            None
        }
    }
}

fn object_field<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Option<&'a Map<String, Value>> {
    let value = obj.get(key)?;
    as_object(value, &join(path, key))
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn float_field(obj: &Map<String, Value>, key: &str, path: &str) -> f64 {
    match obj.get(key) {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(other) => {
            tracing::warn!(
                field = %join(path, key),
                found = type_name(other),
                "Ignoring type error when decoding response as JSON"
            );
            0.0
        }
    }
}

fn int_field(obj: &Map<String, Value>, key: &str, path: &str) -> i64 {
    match obj.get(key) {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(other) => {
            tracing::warn!(
                field = %join(path, key),
                found = type_name(other),
                "Ignoring type error when decoding response as JSON"
            );
            0
        }
    }
}

//! Runtime configuration and the player roster.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::reconcile::ReconcilePolicy;
use crate::stats::DEFAULT_API_BASE_URL;

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,

    /// Directory for daily log files; console only when unset
    pub dir: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

/// Bot configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Presence game name that counts as playing
    pub target_game: String,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub inter_call_delay_secs: u64,
    pub poll_interval_secs: u64,
    pub max_attempts: u32,
    pub debounce_secs: u64,

    /// Post an explicit notice when a session changed nothing
    pub announce_unchanged: bool,

    /// Post a placeholder on session end and edit it once stats arrive
    pub pending_notice: bool,

    /// Hero name to message label, e.g. guild emoji
    pub hero_labels: HashMap<String, String>,

    /// Chat user id to BattleTag
    pub roster: HashMap<String, String>,

    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_game: "Overwatch".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 10,
            inter_call_delay_secs: 1,
            poll_interval_secs: 60,
            max_attempts: 10,
            debounce_secs: 2,
            announce_unchanged: false,
            pending_notice: false,
            hero_labels: HashMap::new(),
            roster: HashMap::new(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents, &path.display().to_string())
    }

    pub fn from_json(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn inter_call_delay(&self) -> Duration {
        Duration::from_secs(self.inter_call_delay_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }

    pub fn reconcile_policy(&self) -> ReconcilePolicy {
        ReconcilePolicy {
            max_attempts: self.max_attempts,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            attempt_timeout: self.request_timeout(),
        }
    }

    /// Roster with invalid BattleTags dropped to `None`.
    ///
    /// The user stays tracked so a tag can be bound later.
    pub fn validated_roster(&self) -> HashMap<String, Option<String>> {
        self.roster
            .iter()
            .map(|(user_id, tag)| {
                let tag = if is_valid_battle_tag(tag) {
                    Some(tag.clone())
                } else {
                    tracing::warn!(user_id = %user_id, battle_tag = %tag, "invalid battleTag, player will not be tracked for stats");
                    None
                };
                (user_id.clone(), tag)
            })
            .collect()
    }
}

/// A BattleTag is 3-12 word characters, `#`, then digits.
pub fn is_valid_battle_tag(tag: &str) -> bool {
    let Some((name, number)) = tag.split_once('#') else {
        return false;
    };
    let name_len = name.chars().count();
    (3..=12).contains(&name_len)
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
}

/// A roster file line that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterError {
    pub line: usize,
    pub entry: String,
    pub reason: &'static str,
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid battleTag entry on line {} ({:?}): {}",
            self.line, self.entry, self.reason
        )
    }
}

impl std::error::Error for RosterError {}

/// Parse a roster file: one `<userId> <battleTag>` pair per line.
///
/// Blank lines are skipped. Bad lines are returned alongside the entries
/// that did parse.
pub fn parse_roster(contents: &str) -> (HashMap<String, String>, Vec<RosterError>) {
    let mut roster = HashMap::new();
    let mut errors = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let entry = line.trim();
        if entry.is_empty() {
            continue;
        }

        let fields: Vec<&str> = entry.split_whitespace().collect();
        match fields.as_slice() {
            [user_id, battle_tag] => {
                roster.insert(user_id.to_string(), battle_tag.to_string());
            }
            _ => errors.push(RosterError {
                line: idx + 1,
                entry: entry.to_string(),
                reason: "expected a user id and a battleTag",
            }),
        }
    }

    (roster, errors)
}

/// Load a roster file and merge it over `config.roster`.
pub fn load_roster(config: &mut Config, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let (roster, errors) = parse_roster(&contents);
    for err in &errors {
        tracing::error!(file = %path.display(), "{}", err);
    }
    tracing::info!(entries = roster.len(), file = %path.display(), "loaded battleTag roster");

    config.roster.extend(roster);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.target_game, "Overwatch");
        assert_eq!(config.reconcile_policy(), ReconcilePolicy::default());
        assert_eq!(config.debounce(), Duration::from_secs(2));
        assert_eq!(config.inter_call_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = Config::from_json(
            r#"{"max_attempts": 3, "announce_unchanged": true, "roster": {"1001": "Alice#1234"}}"#,
            "inline",
        )
        .unwrap();

        assert_eq!(config.max_attempts, 3);
        assert!(config.announce_unchanged);
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.roster["1001"], "Alice#1234");
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_bad_json_is_error() {
        let err = Config::from_json("{not json", "inline").unwrap_err();
        assert!(err.to_string().starts_with("could not parse inline"));
    }

    #[test]
    fn test_parse_roster() {
        let contents = "1001 Alice#1234\n\n1002 Bob#5678\nbroken-line\n1003 a b\n";
        let (roster, errors) = parse_roster(contents);

        assert_eq!(roster.len(), 2);
        assert_eq!(roster["1002"], "Bob#5678");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line, 4);
        assert_eq!(errors[1].entry, "1003 a b");
    }

    #[test]
    fn test_battle_tag_format() {
        assert!(is_valid_battle_tag("Alice#1234"));
        assert!(is_valid_battle_tag("snake_layer#11"));
        assert!(!is_valid_battle_tag("Al#1234"));
        assert!(!is_valid_battle_tag("Alice"));
        assert!(!is_valid_battle_tag("Alice#"));
        assert!(!is_valid_battle_tag("Alice#12a"));
        assert!(!is_valid_battle_tag("ThirteenChars#1"));
    }

    #[test]
    fn test_validated_roster_keeps_untagged_users() {
        let mut config = Config::default();
        config.roster.insert("1001".to_string(), "Alice#1234".to_string());
        config.roster.insert("1002".to_string(), "nope".to_string());

        let roster = config.validated_roster();
        assert_eq!(roster["1001"], Some("Alice#1234".to_string()));
        assert_eq!(roster["1002"], None);
    }

    #[test]
    fn test_roster_error_display() {
        let err = RosterError {
            line: 3,
            entry: "x".to_string(),
            reason: "expected a user id and a battleTag",
        };
        assert_eq!(
            err.to_string(),
            "invalid battleTag entry on line 3 (\"x\"): expected a user id and a battleTag"
        );
    }
}

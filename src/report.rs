//! Session outcomes and their chat message text.

use std::collections::HashMap;

use crate::diff::{self, SessionDiff, Wdl};
use crate::stats::StatsSnapshot;

/// What to publish for a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionReport {
    /// Nothing worth publishing
    Nothing,

    /// Only one side of the session has stats, so just show the rank
    Baseline { username: String, rank: i64 },

    /// Stats did not move during the session
    NoChange { username: String, rank: i64 },

    /// Full session summary
    Diff(SessionDiff),
}

impl SessionReport {
    pub fn is_nothing(&self) -> bool {
        matches!(self, Self::Nothing)
    }
}

/// Decide what to report from the opening and closing snapshots.
///
/// | prev    | after   | report                                  |
/// |---------|---------|-----------------------------------------|
/// | absent  | absent  | `Nothing`                               |
/// | absent  | present | `Baseline` with the closing rank        |
/// | present | absent  | `Baseline` with the opening rank        |
/// | equal   | equal   | `Nothing`, or `NoChange` when announced |
/// | differs | differs | `Diff`                                  |
pub fn summarize(
    username: &str,
    prev: Option<&StatsSnapshot>,
    after: Option<&StatsSnapshot>,
    elapsed: chrono::Duration,
    announce_unchanged: bool,
) -> SessionReport {
    match (prev, after) {
        (None, None) => {
            tracing::warn!(username, "no user stats found");
            SessionReport::Nothing
        }
        (None, Some(next)) => {
            tracing::warn!(username, "no previous user stats found");
            SessionReport::Baseline {
                username: username.to_string(),
                rank: next.rank,
            }
        }
        (Some(prev), None) => {
            tracing::warn!(username, "no next user stats found");
            SessionReport::Baseline {
                username: username.to_string(),
                rank: prev.rank,
            }
        }
        (Some(prev), Some(next)) if prev == next => {
            tracing::info!(username, "no change in stats over session");
            if announce_unchanged {
                SessionReport::NoChange {
                    username: username.to_string(),
                    rank: next.rank,
                }
            } else {
                SessionReport::Nothing
            }
        }
        (Some(prev), Some(next)) => {
            let session = diff::diff(username, prev, next, elapsed);
            tracing::info!(
                username,
                final_rank = session.final_rank,
                rank_delta = session.rank_delta,
                length = %session.length,
                "outputting session data"
            );
            SessionReport::Diff(session)
        }
    }
}

/// Labels used for heroes in messages, such as guild emoji.
#[derive(Debug, Clone, Default)]
pub struct HeroLabels {
    labels: HashMap<String, String>,
}

impl HeroLabels {
    pub fn new(labels: HashMap<String, String>) -> Self {
        Self { labels }
    }

    /// Label for a hero, falling back to its name.
    pub fn label<'a>(&'a self, hero: &'a str) -> &'a str {
        self.labels.get(hero).map(String::as_str).unwrap_or(hero)
    }

    /// Repeat each hero's label once per game counted by `pick`.
    fn repeat(&self, session: &SessionDiff, pick: impl Fn(&Wdl) -> i64) -> String {
        let mut parts = Vec::new();
        for (hero, wdl) in &session.heroes {
            for _ in 0..pick(wdl).max(0) {
                parts.push(self.label(hero));
            }
        }
        parts.join(" ")
    }

    /// Render the message text for a report.
    ///
    /// Returns `None` for [`SessionReport::Nothing`].
    pub fn render(&self, report: &SessionReport) -> Option<String> {
        match report {
            SessionReport::Nothing => None,
            SessionReport::Baseline { username, rank } | SessionReport::NoChange { username, rank } => {
                Some(format!("**{}**: SR {}", username, rank))
            }
            SessionReport::Diff(session) => {
                let sign = if session.rank_delta >= 0 { "+" } else { "" };
                Some(format!(
                    "**{}**:\nlength: {}\nwins: {}\ndraws: {}\nlosses: {}\nSR: {} ({}{})",
                    session.username,
                    session.length,
                    self.repeat(session, |w| w.win),
                    self.repeat(session, |w| w.draw),
                    self.repeat(session, |w| w.loss),
                    session.final_rank,
                    sign,
                    session.rank_delta,
                ))
            }
        }
    }
}

/// Placeholder posted while a session is being reconciled.
pub fn pending_message(username: &str) -> String {
    format!("**{}**: *(fetching session stats...)*", username)
}

/// Shown when no stats could be retrieved at all.
pub fn error_message(username: &str) -> String {
    format!("**{}**: *(error retrieving data)*", username)
}

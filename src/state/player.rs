//! Per-player session state machine.
//!
//! Tracks whether each player is in the target game and turns presence
//! updates into session transitions.
//!
//! # State Diagram
//!
//! ```text
//! ┌──────────┐      started       ┌───────────┐
//! │   Idle   │───────────────────▶│  Playing  │
//! └──────────┘                    └─────┬─────┘
//!      ▲                                │
//!      │            stopped             │
//!      └────────────────────────────────┘
//! ```
//!
//! A transition that lands inside the debounce window of the previous one
//! is dropped and the state is left as it was. A stop followed by a restart
//! within the window therefore reads as one uninterrupted session.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::stats::StatsSnapshot;

/// Default window in which a second transition is treated as a duplicate.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Whether a player is in the target game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    /// Not in the target game (possibly in some other game)
    #[default]
    Idle,

    /// In the target game
    Playing,
}

impl Activity {
    pub fn from_playing(playing: bool) -> Self {
        if playing {
            Self::Playing
        } else {
            Self::Idle
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Playing => write!(f, "Playing"),
        }
    }
}

/// Effect of a presence update on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    NoChange,
    Started,
    Stopped,
}

/// Classify a change in "playing the target game".
pub fn classify(prev_playing: bool, next_playing: bool) -> Transition {
    match (prev_playing, next_playing) {
        (false, true) => Transition::Started,
        (true, false) => Transition::Stopped,
        _ => Transition::NoChange,
    }
}

/// Session state for one tracked player.
#[derive(Debug, Clone)]
pub struct PlayerState {
    user_id: String,

    /// Latest display name seen for this player
    username: Option<String>,

    /// Identity at the stats provider, if configured
    battle_tag: Option<String>,

    activity: Activity,

    /// Snapshot taken at the start of the current or last session
    last_snapshot: Option<StatsSnapshot>,

    /// When the last effective transition happened
    last_transition: Option<DateTime<Utc>>,

    debounce: chrono::Duration,
}

impl PlayerState {
    pub fn new(user_id: impl Into<String>, battle_tag: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            battle_tag,
            activity: Activity::Idle,
            last_snapshot: None,
            last_transition: None,
            debounce: to_chrono(DEFAULT_DEBOUNCE),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = to_chrono(debounce);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Name to show in messages, falling back to the user id.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.user_id)
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = Some(username.into());
    }

    pub fn battle_tag(&self) -> Option<&str> {
        self.battle_tag.as_deref()
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn is_playing(&self) -> bool {
        self.activity.is_playing()
    }

    pub fn last_snapshot(&self) -> Option<&StatsSnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn set_last_snapshot(&mut self, snapshot: Option<StatsSnapshot>) {
        self.last_snapshot = snapshot;
    }

    pub fn last_transition(&self) -> Option<DateTime<Utc>> {
        self.last_transition
    }

    /// Check whether `now` falls inside the debounce window.
    pub fn recently_updated(&self, now: DateTime<Utc>) -> bool {
        match self.last_transition {
            Some(last) => now - last < self.debounce,
            None => false,
        }
    }

    /// Apply a presence observation at `now`.
    ///
    /// `last_transition` only moves forward: an observation older than the
    /// last transition is always inside the window and gets dropped.
    pub fn observe(&mut self, playing: bool, now: DateTime<Utc>) -> Transition {
        let transition = classify(self.is_playing(), playing);
        if transition == Transition::NoChange {
            return Transition::NoChange;
        }

        if self.recently_updated(now) {
            tracing::debug!(
                user_id = %self.user_id,
                ?transition,
                "Ignoring transition inside debounce window"
            );
            return Transition::NoChange;
        }

        self.activity = Activity::from_playing(playing);
        self.last_transition = Some(now);
        transition
    }

    /// Mark as already playing at startup, without debounce.
    pub fn prime(&mut self, now: DateTime<Utc>) {
        self.activity = Activity::Playing;
        self.last_transition = Some(match self.last_transition {
            Some(last) if last > now => last,
            _ => now,
        });
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{User:{} Activity:{} BattleTag:{} Snapshot:",
            self.display_name(),
            self.activity,
            self.battle_tag.as_deref().unwrap_or("-"),
        )?;
        match &self.last_snapshot {
            Some(snapshot) => write!(f, "{}", snapshot)?,
            None => write!(f, "-")?,
        }
        match self.last_transition {
            Some(ts) => write!(f, " Timestamp:{}}}", ts.to_rfc3339()),
            None => write!(f, " Timestamp:-}}"),
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn tagged() -> PlayerState {
        PlayerState::new("1001", Some("Player#1234".to_string()))
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(false, true), Transition::Started);
        assert_eq!(classify(true, false), Transition::Stopped);
        assert_eq!(classify(false, false), Transition::NoChange);
        assert_eq!(classify(true, true), Transition::NoChange);
    }

    #[test]
    fn test_initial_state() {
        let state = tagged();
        assert!(!state.is_playing());
        assert_eq!(state.activity(), Activity::Idle);
        assert_eq!(state.last_transition(), None);
        assert_eq!(state.display_name(), "1001");
    }

    #[test]
    fn test_session_flow() {
        let mut state = tagged();

        assert_eq!(state.observe(true, at(0)), Transition::Started);
        assert!(state.is_playing());
        assert_eq!(state.last_transition(), Some(at(0)));

        // Still playing
        assert_eq!(state.observe(true, at(60)), Transition::NoChange);
        assert_eq!(state.last_transition(), Some(at(0)));

        assert_eq!(state.observe(false, at(7500)), Transition::Stopped);
        assert!(!state.is_playing());
        assert_eq!(state.last_transition(), Some(at(7500)));
    }

    #[test]
    fn test_other_game_is_idle() {
        let mut state = tagged();

        // Switching between other games never leaves Idle
        assert_eq!(state.observe(false, at(0)), Transition::NoChange);
        assert_eq!(state.observe(false, at(100)), Transition::NoChange);
        assert_eq!(state.last_transition(), None);
    }

    #[test]
    fn test_debounce_collapses_rapid_flicker() {
        let mut state = tagged();

        assert_eq!(state.observe(true, at(0)), Transition::Started);
        // Stop one second later is a duplicate
        assert_eq!(state.observe(false, at(1)), Transition::NoChange);
        assert!(state.is_playing());
        assert_eq!(state.last_transition(), Some(at(0)));

        // Outside the window the stop takes effect
        assert_eq!(state.observe(false, at(3)), Transition::Stopped);
    }

    #[test]
    fn test_debounce_window_pairs() {
        // Any two flips within the window yield at most one effective transition
        for gap_ms in [0_i64, 1, 500, 1999] {
            for start_playing in [false, true] {
                let mut state = tagged();
                if start_playing {
                    state.prime(at(-100));
                }
                let t0 = at(0);
                let t1 = t0 + chrono::Duration::milliseconds(gap_ms);

                let first = state.observe(!start_playing, t0);
                let second = state.observe(start_playing, t1);

                let effective = [first, second]
                    .iter()
                    .filter(|t| **t != Transition::NoChange)
                    .count();
                assert!(effective <= 1, "gap {}ms produced {}", gap_ms, effective);
            }
        }
    }

    #[test]
    fn test_out_of_order_observation_ignored() {
        let mut state = tagged();
        assert_eq!(state.observe(true, at(100)), Transition::Started);

        // Captured before the last transition
        assert_eq!(state.observe(false, at(50)), Transition::NoChange);
        assert_eq!(state.last_transition(), Some(at(100)));
    }

    #[test]
    fn test_prime() {
        let mut state = tagged();
        state.prime(at(0));
        assert!(state.is_playing());
        assert_eq!(state.last_transition(), Some(at(0)));

        // Priming never moves the timestamp backwards
        state.prime(at(-10));
        assert_eq!(state.last_transition(), Some(at(0)));
    }

    #[test]
    fn test_custom_debounce() {
        let mut state = tagged().with_debounce(Duration::ZERO);
        assert_eq!(state.observe(true, at(0)), Transition::Started);
        assert_eq!(state.observe(false, at(0)), Transition::Stopped);
    }

    #[test]
    fn test_display() {
        let mut state = tagged();
        state.set_username("Alice");
        assert_eq!(
            state.to_string(),
            "{User:Alice Activity:Idle BattleTag:Player#1234 Snapshot:- Timestamp:-}"
        );
    }
}

//! Session state for the tracked roster.
//!
//! - `player` - Per-player session state machine
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     SessionRegistry                      │
//! │                                                          │
//! │   user_id ──▶ Arc<Mutex<PlayerState>>                    │
//! │   user_id ──▶ Arc<Mutex<PlayerState>>                    │
//! │   ...                                                    │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │           PlayerState (per player)                 │  │
//! │  │                                                    │  │
//! │  │        Idle ──started──▶ Playing                   │  │
//! │  │          ▲                  │                      │  │
//! │  │          └─────stopped──────┘                      │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The set of players is fixed when the registry is built, so lookups need
//! no lock. Each entry has its own mutex and holding it serializes every
//! transition and reconciliation for that one player.

pub mod player;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

pub use player::{classify, Activity, PlayerState, Transition, DEFAULT_DEBOUNCE};

/// Shared handle to one player's state.
pub type SessionHandle = Arc<Mutex<PlayerState>>;

/// Arena of per-player session state, keyed by chat user id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry for every rostered user.
    ///
    /// Users without a BattleTag still get an entry.
    pub fn from_roster<'a, I>(roster: I, debounce: Duration) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Option<String>)>,
    {
        let mut registry = Self::new();
        for (user_id, battle_tag) in roster {
            let state = PlayerState::new(user_id.clone(), battle_tag.clone()).with_debounce(debounce);
            tracing::debug!(user_id = %user_id, battle_tag = ?battle_tag, "initialized player state");
            registry.insert(state);
        }
        registry
    }

    /// Add a player, replacing any existing entry with the same id.
    pub fn insert(&mut self, state: PlayerState) {
        self.sessions
            .insert(state.user_id().to_string(), Arc::new(Mutex::new(state)));
    }

    /// Get the state handle for a player.
    pub fn get(&self, user_id: &str) -> Option<SessionHandle> {
        self.sessions.get(user_id).cloned()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.sessions.contains_key(user_id)
    }

    pub fn user_ids(&self) -> impl Iterator<Item = &String> {
        self.sessions.keys()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

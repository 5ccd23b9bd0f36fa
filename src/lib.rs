//! Oversessions
//!
//! Tracks game sessions from chat presence and reports what changed in a
//! player's competitive stats over each session.
//!
//! # Overview
//!
//! - **Session State** - One debounced state machine per rostered player,
//!   flipping between idle and playing as presence updates arrive.
//!
//! - **Stats Client** - Fetches a player's rank and per-hero counters from
//!   the stats provider, one request at a time across the whole process.
//!
//! - **Reconciliation** - After a session ends the provider lags behind, so
//!   the closing snapshot is polled until it differs from the opening one or
//!   the attempt budget runs out.
//!
//! - **Diff and Reports** - Per-hero wins, draws and losses plus the rank
//!   change, rendered as a chat message.
//!
//! # Design Principles
//!
//! 1. **Per-player serialization** - A player's updates are applied one at
//!    a time; different players never wait on each other.
//!
//! 2. **Traits at the edges** - HTTP, the stats source and the publishing
//!    sink are traits so the core runs against in-memory doubles.
//!
//! 3. **Lenient decoding** - Provider type mismatches are logged and read
//!    as zero instead of failing the whole snapshot.
//!
//! # Example
//!
//! ```rust
//! use oversessions::diff::diff;
//! use oversessions::stats::{HeroCounters, StatsSnapshot};
//!
//! let before = StatsSnapshot::new("Alice#1234", 2500)
//!     .with_hero("ana", HeroCounters::new(10.0, 20.0, 8.0));
//! let after = StatsSnapshot::new("Alice#1234", 2550)
//!     .with_hero("ana", HeroCounters::new(12.0, 23.0, 9.0));
//!
//! let session = diff("Alice", &before, &after, chrono::Duration::minutes(125));
//! assert_eq!(session.rank_delta, 50);
//! assert_eq!(session.heroes["ana"].win, 2);
//! assert_eq!(session.length.to_string(), "2 hrs 5 min");
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod logging;
pub mod publish;
pub mod reconcile;
pub mod report;
pub mod router;
pub mod state;
pub mod stats;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{ConfigError, PublishError, StatsError};
pub use publish::{MemoryPublisher, MessageHandle, Publisher, StdoutPublisher};
pub use reconcile::{reconcile, ReconcilePolicy, Reconciled, Resolution};
pub use report::{HeroLabels, SessionReport};
pub use router::{EventRouter, Handled, PresenceEvent, RouterOptions};
pub use state::{PlayerState, SessionRegistry, Transition};
pub use stats::{SnapshotSource, StatsClient, StatsSnapshot};

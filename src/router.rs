//! Routes presence updates into session transitions.
//!
//! Each update is handled on its own task. Handling takes the player's
//! mutex for its whole duration, including a post-session reconciliation
//! that can run for several minutes, so updates for one player are applied
//! strictly in turn while other players proceed in parallel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::publish::{MessageHandle, Publisher};
use crate::reconcile::{reconcile, ReconcilePolicy};
use crate::report::{self, summarize, HeroLabels, SessionReport};
use crate::state::{PlayerState, SessionRegistry, Transition};
use crate::stats::{SnapshotSource, StatsSnapshot};

/// A presence change from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PresenceEvent {
    pub user_id: String,

    /// Display name, when the platform sends one
    #[serde(default)]
    pub username: Option<String>,

    /// Game being played; `None` when not playing anything
    #[serde(default)]
    pub game: Option<String>,

    /// Startup snapshot of a player already in game, rather than a change
    #[serde(default)]
    pub prime: bool,
}

impl PresenceEvent {
    pub fn new(user_id: impl Into<String>, game: Option<&str>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            game: game.map(str::to_string),
            prime: false,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn primed(mut self) -> Self {
        self.prime = true;
        self
    }
}

/// What handling an event amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// Not on the roster
    UnknownUser,
    /// On the roster but without a BattleTag
    NoBattleTag,
    /// No effective transition
    Ignored,
    /// Session started; `baseline` tells whether a snapshot was fetched
    Started { baseline: bool },
    /// Player seeded as already in game
    Primed { baseline: bool },
    /// Session ended with this report
    Stopped(SessionReport),
}

/// Router behaviour knobs.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub target_game: String,
    pub fetch_timeout: Duration,
    pub policy: ReconcilePolicy,
    pub announce_unchanged: bool,
    pub pending_notice: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RouterOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_game: config.target_game.clone(),
            fetch_timeout: config.request_timeout(),
            policy: config.reconcile_policy(),
            announce_unchanged: config.announce_unchanged,
            pending_notice: config.pending_notice,
        }
    }
}

/// Turns presence events into session reports.
pub struct EventRouter {
    registry: Arc<SessionRegistry>,
    source: Arc<dyn SnapshotSource>,
    publisher: Arc<dyn Publisher>,
    labels: HeroLabels,
    options: RouterOptions,
}

impl EventRouter {
    pub fn new(
        registry: Arc<SessionRegistry>,
        source: Arc<dyn SnapshotSource>,
        publisher: Arc<dyn Publisher>,
        options: RouterOptions,
    ) -> Self {
        Self {
            registry,
            source,
            publisher,
            labels: HeroLabels::default(),
            options,
        }
    }

    pub fn with_labels(mut self, labels: HeroLabels) -> Self {
        self.labels = labels;
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    fn is_target(&self, game: Option<&str>) -> bool {
        game == Some(self.options.target_game.as_str())
    }

    /// Handle an event on its own task, stamped with the arrival time.
    pub fn dispatch(self: &Arc<Self>, event: PresenceEvent) -> JoinHandle<Handled> {
        let now = Utc::now();
        let router = Arc::clone(self);
        tokio::spawn(async move { router.handle_at(event, now).await })
    }

    /// Seed a player that is already in game at startup.
    pub async fn prime(&self, user_id: &str, game: Option<&str>) -> Handled {
        self.handle_at(PresenceEvent::new(user_id, game).primed(), Utc::now())
            .await
    }

    /// Handle an event observed at `now`.
    pub async fn handle_at(&self, event: PresenceEvent, now: DateTime<Utc>) -> Handled {
        tracing::debug!(?event, "start handling presence update");

        let Some(handle) = self.registry.get(&event.user_id) else {
            tracing::debug!(user_id = %event.user_id, "presence update for untracked user");
            return Handled::UnknownUser;
        };
        let mut state = handle.lock().await;

        if let Some(username) = &event.username {
            state.set_username(username.clone());
        }

        let Some(battle_tag) = state.battle_tag().map(str::to_string) else {
            if event.prime {
                tracing::warn!(user_id = %event.user_id, "cannot prime player without a battleTag");
            } else {
                tracing::info!(user_id = %event.user_id, "no associated battleTag");
            }
            return Handled::NoBattleTag;
        };

        let playing = self.is_target(event.game.as_deref());

        if event.prime {
            if !playing {
                return Handled::Ignored;
            }
            state.prime(now);
            let baseline = self.refresh_baseline(&mut state, &battle_tag).await;
            tracing::debug!("initialized player data: {}", *state);
            return Handled::Primed { baseline };
        }

        let started_at = state.last_transition();
        let handled = match state.observe(playing, now) {
            Transition::NoChange => Handled::Ignored,
            Transition::Started => {
                let baseline = self.refresh_baseline(&mut state, &battle_tag).await;
                Handled::Started { baseline }
            }
            Transition::Stopped => {
                let elapsed = started_at
                    .map(|start| now - start)
                    .unwrap_or_else(chrono::Duration::zero);
                let report = self.finish_session(&mut state, &battle_tag, elapsed).await;
                Handled::Stopped(report)
            }
        };

        tracing::debug!("player state transition: {}", *state);
        handled
    }

    /// Best-effort snapshot at session start.
    ///
    /// A failed fetch leaves the session without a baseline.
    async fn refresh_baseline(&self, state: &mut PlayerState, battle_tag: &str) -> bool {
        match self
            .source
            .fetch_snapshot(battle_tag, self.options.fetch_timeout)
            .await
        {
            Ok(snapshot) => {
                let found = snapshot.is_some();
                state.set_last_snapshot(snapshot);
                found
            }
            Err(e) => {
                tracing::error!(battle_tag, error = %e, "failed to get stats or hero data");
                state.set_last_snapshot(None);
                false
            }
        }
    }

    async fn finish_session(
        &self,
        state: &mut PlayerState,
        battle_tag: &str,
        elapsed: chrono::Duration,
    ) -> SessionReport {
        let username = state.display_name().to_string();
        tracing::debug!(player = %username, "attempt to get user stats");

        let pending = if self.options.pending_notice {
            self.create(&report::pending_message(&username)).await
        } else {
            None
        };

        let prev = state.last_snapshot().cloned();
        let reconciled = reconcile(
            self.source.as_ref(),
            &self.options.policy,
            battle_tag,
            prev.as_ref(),
        )
        .await;

        let report = summarize(
            &username,
            prev.as_ref(),
            reconciled.after.as_ref(),
            elapsed,
            self.options.announce_unchanged,
        );

        match (self.labels.render(&report), pending) {
            (Some(text), Some(handle)) => self.update(&handle, &text).await,
            (Some(text), None) => {
                self.create(&text).await;
            }
            (None, Some(handle)) => {
                let text =
                    placeholder_replacement(&username, prev.as_ref(), reconciled.after.as_ref());
                self.update(&handle, &text).await;
            }
            (None, None) => {}
        }

        if reconciled.after.is_some() {
            state.set_last_snapshot(reconciled.after);
        }
        report
    }

    async fn create(&self, content: &str) -> Option<MessageHandle> {
        match self.publisher.create(content).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "failed to publish message");
                None
            }
        }
    }

    async fn update(&self, handle: &MessageHandle, content: &str) {
        if let Err(e) = self.publisher.update(handle, content).await {
            tracing::error!(error = %e, %handle, "failed to update message");
        }
    }
}

/// Final text for a placeholder when the report itself is silent.
fn placeholder_replacement(
    username: &str,
    prev: Option<&StatsSnapshot>,
    after: Option<&StatsSnapshot>,
) -> String {
    match after.or(prev) {
        Some(snapshot) => format!("**{}**: SR {}", username, snapshot.rank),
        None => report::error_message(username),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Wdl;
    use crate::error::StatsError;
    use crate::publish::MemoryPublisher;
    use crate::state::DEFAULT_DEBOUNCE;
    use crate::stats::HeroCounters;
    use crate::testing::ScriptedSource;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    const GAME: &str = "Overwatch";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn before() -> StatsSnapshot {
        StatsSnapshot::new("Alice#1234", 2500).with_hero("ana", HeroCounters::new(10.0, 20.0, 8.0))
    }

    fn after() -> StatsSnapshot {
        StatsSnapshot::new("Alice#1234", 2550).with_hero("ana", HeroCounters::new(12.0, 23.0, 9.0))
    }

    fn registry() -> Arc<SessionRegistry> {
        let mut roster: HashMap<String, Option<String>> = HashMap::new();
        roster.insert("alice".to_string(), Some("Alice#1234".to_string()));
        roster.insert("bob".to_string(), Some("Bob#5678".to_string()));
        roster.insert("carol".to_string(), None);
        Arc::new(SessionRegistry::from_roster(&roster, DEFAULT_DEBOUNCE))
    }

    struct Harness {
        router: Arc<EventRouter>,
        source: Arc<ScriptedSource>,
        publisher: Arc<MemoryPublisher>,
    }

    fn harness(source: ScriptedSource, options: RouterOptions) -> Harness {
        let source = Arc::new(source);
        let publisher = Arc::new(MemoryPublisher::new());
        let router = Arc::new(EventRouter::new(
            registry(),
            source.clone(),
            publisher.clone(),
            options,
        ));
        Harness {
            router,
            source,
            publisher,
        }
    }

    fn playing(user: &str) -> PresenceEvent {
        PresenceEvent::new(user, Some(GAME)).with_username(user.to_uppercase())
    }

    fn idle(user: &str) -> PresenceEvent {
        PresenceEvent::new(user, None)
    }

    #[tokio::test(start_paused = true)]
    async fn test_untagged_user_never_fetches() {
        let h = harness(ScriptedSource::constant(Some(before())), RouterOptions::default());

        assert_eq!(h.router.handle_at(playing("carol"), at(0)).await, Handled::NoBattleTag);
        assert_eq!(h.router.handle_at(idle("carol"), at(600)).await, Handled::NoBattleTag);

        assert_eq!(h.source.call_count(), 0);
        assert!(h.publisher.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_user() {
        let h = harness(ScriptedSource::constant(None), RouterOptions::default());
        assert_eq!(h.router.handle_at(playing("mallory"), at(0)).await, Handled::UnknownUser);
        assert_eq!(h.source.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_session_publishes_diff() {
        let source = ScriptedSource::new(vec![
            Ok(Some(before())),
            Ok(Some(before())),
            Ok(Some(after())),
        ]);
        let h = harness(source, RouterOptions::default());

        assert_eq!(
            h.router.handle_at(playing("alice"), at(0)).await,
            Handled::Started { baseline: true }
        );
        let Handled::Stopped(SessionReport::Diff(session)) =
            h.router.handle_at(idle("alice"), at(125 * 60)).await
        else {
            panic!("expected a session diff");
        };

        assert_eq!(session.username, "ALICE");
        assert_eq!(session.rank_delta, 50);
        assert_eq!(session.heroes["ana"], Wdl::new(2, 0, 1));
        assert_eq!(
            h.publisher.messages(),
            vec!["**ALICE**:\nlength: 2 hrs 5 min\nwins: ana ana\ndraws: \nlosses: ana\nSR: 2550 (+50)"]
        );
        assert_eq!(h.source.calls(), vec!["Alice#1234"; 3]);

        // The closing snapshot becomes the next baseline
        let state = h.router.registry().get("alice").unwrap();
        assert_eq!(state.lock().await.last_snapshot(), Some(&after()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_games_are_not_sessions() {
        let h = harness(ScriptedSource::constant(Some(before())), RouterOptions::default());

        let event = PresenceEvent::new("alice", Some("Hearthstone"));
        assert_eq!(h.router.handle_at(event, at(0)).await, Handled::Ignored);
        assert_eq!(h.router.handle_at(idle("alice"), at(60)).await, Handled::Ignored);
        assert_eq!(h.source.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_flicker_is_ignored() {
        let h = harness(ScriptedSource::constant(Some(before())), RouterOptions::default());

        h.router.handle_at(playing("alice"), at(0)).await;
        assert_eq!(h.router.handle_at(idle("alice"), at(1)).await, Handled::Ignored);

        assert_eq!(h.source.call_count(), 1);
        assert!(h.publisher.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_session_exhausts_and_announces() {
        let options = RouterOptions {
            announce_unchanged: true,
            ..RouterOptions::default()
        };
        let h = harness(ScriptedSource::constant(Some(before())), options);

        h.router.handle_at(playing("alice"), at(0)).await;
        let handled = h.router.handle_at(idle("alice"), at(3600)).await;

        assert_eq!(
            handled,
            Handled::Stopped(SessionReport::NoChange {
                username: "ALICE".to_string(),
                rank: 2500
            })
        );
        // One baseline fetch plus ten reconciliation attempts
        assert_eq!(h.source.call_count(), 11);
        assert_eq!(h.publisher.messages(), vec!["**ALICE**: SR 2500"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_session_is_silent_by_default() {
        let h = harness(ScriptedSource::constant(Some(before())), RouterOptions::default());

        h.router.handle_at(playing("alice"), at(0)).await;
        let handled = h.router.handle_at(idle("alice"), at(3600)).await;

        assert_eq!(handled, Handled::Stopped(SessionReport::Nothing));
        assert!(h.publisher.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_start_fetch_reports_current_rank() {
        let source = ScriptedSource::new(vec![Err(StatsError::Cancelled), Ok(Some(after()))]);
        let h = harness(source, RouterOptions::default());

        assert_eq!(
            h.router.handle_at(playing("alice"), at(0)).await,
            Handled::Started { baseline: false }
        );
        h.router.handle_at(idle("alice"), at(600)).await;

        assert_eq!(h.publisher.messages(), vec!["**ALICE**: SR 2550"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_start_fetch_drops_stale_baseline() {
        let third = StatsSnapshot::new("Alice#1234", 2600);
        let source = ScriptedSource::new(vec![
            Ok(Some(before())),
            Ok(Some(after())),
            Err(StatsError::Cancelled),
            Ok(Some(third)),
        ]);
        let h = harness(source, RouterOptions::default());

        h.router.handle_at(playing("alice"), at(0)).await;
        h.router.handle_at(idle("alice"), at(600)).await;
        h.router.handle_at(playing("alice"), at(1200)).await;
        let handled = h.router.handle_at(idle("alice"), at(1800)).await;

        assert_eq!(
            handled,
            Handled::Stopped(SessionReport::Baseline {
                username: "ALICE".to_string(),
                rank: 2600
            })
        );
        assert_eq!(h.publisher.messages().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_notice_is_edited_in_place() {
        let options = RouterOptions {
            pending_notice: true,
            ..RouterOptions::default()
        };
        let source = ScriptedSource::new(vec![Ok(Some(before())), Ok(Some(after()))]);
        let h = harness(source, options);

        h.router.handle_at(playing("alice"), at(0)).await;
        h.router.handle_at(idle("alice"), at(45 * 60)).await;

        let messages = h.publisher.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("**ALICE**:\nlength: 45 min"));
        assert_eq!(h.publisher.edit_count(&MessageHandle("msg-1".to_string())), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_notice_without_any_stats() {
        let options = RouterOptions {
            pending_notice: true,
            ..RouterOptions::default()
        };
        let h = harness(ScriptedSource::new(vec![Err(StatsError::Cancelled)]), options);

        h.router.handle_at(playing("alice"), at(0)).await;
        let handled = h.router.handle_at(idle("alice"), at(600)).await;

        assert_eq!(handled, Handled::Stopped(SessionReport::Nothing));
        assert_eq!(h.publisher.messages(), vec!["**ALICE**: *(error retrieving data)*"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prime_seeds_playing_player() {
        let h = harness(ScriptedSource::constant(Some(before())), RouterOptions::default());

        assert_eq!(
            h.router.prime("alice", Some(GAME)).await,
            Handled::Primed { baseline: true }
        );
        assert_eq!(h.router.prime("bob", None).await, Handled::Ignored);

        let alice = h.router.registry().get("alice").unwrap();
        assert!(alice.lock().await.is_playing());
        let bob = h.router.registry().get("bob").unwrap();
        assert!(!bob.lock().await.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_user_events_are_serialized() {
        let h = harness(ScriptedSource::constant(Some(before())), RouterOptions::default());
        h.router.handle_at(playing("alice"), at(0)).await;

        let stop = {
            let router = Arc::clone(&h.router);
            tokio::spawn(async move { router.handle_at(idle("alice"), at(600)).await })
        };
        tokio::task::yield_now().await;

        let restart = {
            let router = Arc::clone(&h.router);
            tokio::spawn(async move { router.handle_at(playing("alice"), at(1200)).await })
        };

        assert_eq!(restart.await.unwrap(), Handled::Started { baseline: true });
        assert!(stop.is_finished());
        assert_eq!(stop.await.unwrap(), Handled::Stopped(SessionReport::Nothing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_users_proceed_during_reconciliation() {
        let h = harness(ScriptedSource::constant(Some(before())), RouterOptions::default());
        h.router.handle_at(playing("alice"), at(0)).await;

        let stop = {
            let router = Arc::clone(&h.router);
            tokio::spawn(async move { router.handle_at(idle("alice"), at(600)).await })
        };
        tokio::task::yield_now().await;

        assert_eq!(
            h.router.handle_at(playing("bob"), at(601)).await,
            Handled::Started { baseline: true }
        );
        assert!(!stop.is_finished());
        stop.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_runs_on_task() {
        let h = harness(ScriptedSource::constant(Some(before())), RouterOptions::default());

        let handled = h.router.dispatch(playing("alice")).await.unwrap();
        assert_eq!(handled, Handled::Started { baseline: true });
    }

    #[test]
    fn test_presence_event_json() {
        let event: PresenceEvent =
            serde_json::from_str(r#"{"user_id": "alice", "game": "Overwatch"}"#).unwrap();
        assert_eq!(event, PresenceEvent::new("alice", Some("Overwatch")));

        let event: PresenceEvent =
            serde_json::from_str(r#"{"user_id": "bob", "username": "Bob", "prime": true}"#).unwrap();
        assert!(event.prime);
        assert_eq!(event.game, None);
        assert_eq!(event.username.as_deref(), Some("Bob"));
    }
}

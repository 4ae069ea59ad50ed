//! The stream notifier.
//!
//! Decides when a member has just gone live, looks the stream up and posts an
//! announcement to every notify channel of the member's server.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::announcement::Announcement;
use super::history::{NotifierContext, within_cooldown};
use super::source::{LookupError, StreamSource, StreamerResolver};
use crate::Result;
use crate::config::ConfigService;
use crate::messaging::MessageSink;
use crate::presence::{MemberState, PresenceUpdate};

/// Notifier tuning.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Minimum time between two announcements for the same member.
    pub cooldown: Duration,
    /// How often the history is swept of entries past their cooldown.
    pub sweep_interval: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(2 * 60 * 60),
            sweep_interval: Duration::from_secs(15 * 60),
        }
    }
}

impl NotifierConfig {
    fn cooldown_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.cooldown).unwrap_or(TimeDelta::MAX)
    }
}

/// External services the notifier talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub configs: Arc<ConfigService>,
    pub resolver: Arc<dyn StreamerResolver>,
    pub source: Arc<dyn StreamSource>,
    pub sink: Arc<dyn MessageSink>,
}

/// Result of a channel (re)configuration, rendered as the user-facing confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelsConfigured {
    Disabled,
    Notifying(Vec<String>),
}

impl fmt::Display for ChannelsConfigured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "**Disabled stream notifications in this server.**"),
            Self::Notifying(channels) => {
                let mentions: Vec<String> = channels.iter().map(|c| format!("<#{c}>")).collect();
                write!(f, "**Notifying streams in:** {}", mentions.join(" "))
            }
        }
    }
}

/// What a presence update led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceOutcome {
    /// The server has no notify channels.
    NotConfigured,
    /// Not a go-live edge, or still inside the cooldown.
    NoEdge,
    /// The member has no linked streaming account.
    UserNotResolved,
    /// A lookup request failed.
    RequestFailed,
    /// The streaming service does not consider the stream live.
    NotLive,
    /// The announcement went out to `delivered` of `channels` channels.
    Announced { delivered: usize, channels: usize },
}

/// Go-live notifier for one bot process.
pub struct StreamNotifier {
    config: NotifierConfig,
    context: NotifierContext,
    collaborators: Collaborators,
    cancellation_token: CancellationToken,
}

impl StreamNotifier {
    pub fn new(
        config: NotifierConfig,
        context: NotifierContext,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            config,
            context,
            collaborators,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Build a replacement notifier that keeps this one's history.
    ///
    /// Call [`stop`](Self::stop) on the old notifier once the new one is running.
    pub fn reload(&self, config: NotifierConfig) -> Self {
        Self::new(config, self.context.clone(), self.collaborators.clone())
    }

    pub fn context(&self) -> &NotifierContext {
        &self.context
    }

    /// Replace the notify channels of a server. An empty list disables
    /// announcements for that server.
    pub async fn configure_channels(
        &self,
        server_id: &str,
        channels: Vec<String>,
    ) -> Result<ChannelsConfigured> {
        self.collaborators
            .configs
            .set_notify_channels(server_id, channels.clone())
            .await?;

        let confirmation = if channels.is_empty() {
            ChannelsConfigured::Disabled
        } else {
            ChannelsConfigured::Notifying(channels)
        };
        info!(server_id = %server_id, "{}", confirmation);
        Ok(confirmation)
    }

    /// Whether `after` is a fresh go-live edge outside the cooldown.
    pub fn detect_go_live(&self, before: &MemberState, after: &MemberState) -> bool {
        self.detect_go_live_at(before, after, Utc::now())
    }

    /// [`detect_go_live`](Self::detect_go_live) evaluated at `now`.
    ///
    /// The history is updated on every edge, including suppressed ones.
    pub fn detect_go_live_at(
        &self,
        before: &MemberState,
        after: &MemberState,
        now: DateTime<Utc>,
    ) -> bool {
        if !after.is_streaming() {
            return false;
        }

        if before.is_streaming() {
            return false;
        }

        let previous = self.context.history().record(&after.member_id, now);

        match previous {
            Some(last) if within_cooldown(last, now, self.config.cooldown_delta()) => {
                debug!(
                    member_id = %after.member_id,
                    last_notified = %last,
                    "Go-live suppressed by cooldown"
                );
                false
            }
            _ => true,
        }
    }

    /// Handle one presence update.
    ///
    /// Every failure is logged and ends the attempt; nothing is retried here.
    /// The history write in [`detect_go_live`](Self::detect_go_live) must stay
    /// ahead of the first await, so a concurrent update for the same member
    /// sees it and is suppressed.
    pub async fn handle_presence_update(&self, update: &PresenceUpdate) -> PresenceOutcome {
        let (before, after) = (&update.before, &update.after);

        if !self.collaborators.configs.is_enabled(&after.server_id) {
            return PresenceOutcome::NotConfigured;
        }

        if !self.detect_go_live(before, after) {
            return PresenceOutcome::NoEdge;
        }

        let streamer_id = match self.collaborators.resolver.resolve_streamer_id(after).await {
            Ok(id) => id,
            Err(LookupError::RequestFailed(e)) => {
                info!(
                    member_id = %after.member_id,
                    member = %after.display_name,
                    error = %e,
                    "Could not get streamer id"
                );
                return PresenceOutcome::RequestFailed;
            }
            Err(LookupError::UserNotResolved(e)) => {
                debug!(member_id = %after.member_id, "{}", e);
                return PresenceOutcome::UserNotResolved;
            }
        };

        let stream = match self.collaborators.source.fetch_stream(&streamer_id).await {
            Ok(stream) => stream,
            Err(e) => {
                info!(
                    member_id = %after.member_id,
                    member = %after.display_name,
                    streamer_id = %streamer_id,
                    error = %e,
                    "Could not get stream"
                );
                return PresenceOutcome::RequestFailed;
            }
        };

        if !stream.is_live {
            debug!(streamer_id = %streamer_id, "Stream reported offline, skipping");
            return PresenceOutcome::NotLive;
        }

        let announcement = Announcement::render(after, &stream, Utc::now());
        let channels = self.collaborators.configs.notify_channels(&after.server_id);

        let mut delivered = 0;
        for channel_id in &channels {
            match self
                .collaborators
                .sink
                .send_message(channel_id, &announcement)
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    channel_id = %channel_id,
                    member_id = %after.member_id,
                    error = %e,
                    "Failed to send stream announcement"
                ),
            }
        }

        info!(
            member = %after.display_name,
            server_id = %after.server_id,
            delivered,
            channels = channels.len(),
            "Announced stream"
        );

        PresenceOutcome::Announced {
            delivered,
            channels: channels.len(),
        }
    }

    /// Handle every update from `rx`, each in its own task.
    ///
    /// The channel is bounded, so a slow notifier applies backpressure to the
    /// producer instead of dropping updates. When the channel closes, in-flight
    /// updates are awaited before the returned handle completes.
    /// [`stop`](Self::stop) aborts them instead.
    pub fn spawn_listener(
        self: &Arc<Self>,
        mut rx: mpsc::Receiver<PresenceUpdate>,
    ) -> JoinHandle<()> {
        let notifier = Arc::clone(self);
        let cancellation_token = self.cancellation_token.clone();

        tokio::spawn(async move {
            let mut in_flight = JoinSet::new();

            loop {
                while in_flight.try_join_next().is_some() {}

                tokio::select! {
                    _ = cancellation_token.cancelled() => {
                        debug!("Presence listener shutting down");
                        return;
                    }
                    update = rx.recv() => {
                        let Some(update) = update else {
                            debug!("Presence channel closed");
                            break;
                        };
                        debug!(
                            member_id = %update.member_id(),
                            server_id = %update.server_id(),
                            "Presence update received"
                        );
                        let notifier = notifier.clone();
                        in_flight.spawn(async move {
                            notifier.handle_presence_update(&update).await;
                        });
                    }
                }
            }

            while in_flight.join_next().await.is_some() {}
        })
    }

    /// Periodically drop history entries past their cooldown.
    pub fn start_history_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let history = Arc::clone(self.context.history());
        let cooldown = self.config.cooldown_delta();
        let interval = self.config.sweep_interval;
        let cancellation_token = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => {
                        debug!("History sweeper shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let removed = history.sweep(Utc::now(), cooldown);
                        if removed > 0 {
                            debug!(removed, remaining = history.len(), "Swept stream history");
                        }
                    }
                }
            }
        })
    }

    /// Stop background tasks started by this notifier.
    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::config::MemoryStore;
    use crate::notifier::StreamMetadata;
    use crate::presence::Activity;

    struct Fixed;

    #[async_trait]
    impl StreamerResolver for Fixed {
        async fn resolve_streamer_id(&self, _member: &MemberState) -> std::result::Result<String, LookupError> {
            Ok("42".to_string())
        }
    }

    #[async_trait]
    impl StreamSource for Fixed {
        async fn fetch_stream(&self, _id: &str) -> std::result::Result<StreamMetadata, LookupError> {
            Ok(StreamMetadata {
                is_live: true,
                game_name: Some("Celeste".into()),
                ..StreamMetadata::offline()
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MessageSink for Recorder {
        async fn send_message(&self, channel_id: &str, _announcement: &Announcement) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if channel_id == "broken" {
                return Err(crate::Error::Other("channel gone".into()));
            }
            self.sent.lock().push(channel_id.to_string());
            Ok(())
        }
    }

    async fn notifier(config: NotifierConfig) -> (StreamNotifier, Arc<Recorder>) {
        let sink = Arc::new(Recorder::default());
        let configs = ConfigService::load(Arc::new(MemoryStore::default()))
            .await
            .unwrap();
        let collaborators = Collaborators {
            configs: Arc::new(configs),
            resolver: Arc::new(Fixed),
            source: Arc::new(Fixed),
            sink: sink.clone(),
        };
        (
            StreamNotifier::new(config, NotifierContext::new(), collaborators),
            sink,
        )
    }

    fn state(activity: Option<Activity>) -> MemberState {
        MemberState {
            member_id: "1".into(),
            server_id: "9".into(),
            display_name: "Afro".into(),
            avatar_url: None,
            color: None,
            activity,
        }
    }

    fn offline() -> MemberState {
        state(None)
    }

    fn streaming() -> MemberState {
        state(Some(Activity::streaming("Any%", "https://twitch.tv/afro")))
    }

    #[tokio::test]
    async fn test_not_streaming_after_never_fires() {
        let (notifier, _) = notifier(NotifierConfig::default()).await;
        let now = Utc::now();

        assert!(!notifier.detect_go_live_at(&offline(), &offline(), now));
        assert!(!notifier.detect_go_live_at(&streaming(), &offline(), now));
        assert!(!notifier.detect_go_live_at(&state(Some(Activity::playing("x"))), &state(Some(Activity::playing("y"))), now));
        assert!(notifier.context().history().is_empty());
    }

    #[tokio::test]
    async fn test_streaming_to_streaming_is_not_an_edge() {
        let (notifier, _) = notifier(NotifierConfig::default()).await;
        assert!(!notifier.detect_go_live_at(&streaming(), &streaming(), Utc::now()));
        assert!(notifier.context().history().is_empty());
    }

    #[tokio::test]
    async fn test_first_edge_fires_and_records() {
        let (notifier, _) = notifier(NotifierConfig::default()).await;
        let now = Utc::now();

        assert!(notifier.detect_go_live_at(&offline(), &streaming(), now));
        assert_eq!(notifier.context().history().last_notified("1"), Some(now));
    }

    #[tokio::test]
    async fn test_cooldown_window() {
        let (notifier, _) = notifier(NotifierConfig::default()).await;
        let t0 = Utc::now();

        assert!(notifier.detect_go_live_at(&offline(), &streaming(), t0));
        assert!(!notifier.detect_go_live_at(&offline(), &streaming(), t0 + TimeDelta::hours(1)));
        // The suppressed edge at t0+1h restarted the window.
        assert!(!notifier.detect_go_live_at(&offline(), &streaming(), t0 + TimeDelta::hours(2)));
        assert!(notifier.detect_go_live_at(&offline(), &streaming(), t0 + TimeDelta::hours(5)));
    }

    #[tokio::test]
    async fn test_cooldown_elapsed_after_three_hours() {
        let (notifier, _) = notifier(NotifierConfig::default()).await;
        let t0 = Utc::now();

        assert!(notifier.detect_go_live_at(&offline(), &streaming(), t0));
        assert!(notifier.detect_go_live_at(&offline(), &streaming(), t0 + TimeDelta::hours(3)));
    }

    #[tokio::test]
    async fn test_reload_keeps_history() {
        let (notifier, _) = notifier(NotifierConfig::default()).await;
        let t0 = Utc::now();
        assert!(notifier.detect_go_live_at(&offline(), &streaming(), t0));

        let reloaded = notifier.reload(NotifierConfig::default());
        notifier.stop();

        assert!(!reloaded.detect_go_live_at(&offline(), &streaming(), t0 + TimeDelta::minutes(1)));
    }

    #[tokio::test]
    async fn test_configure_channels_confirmation() {
        let (notifier, _) = notifier(NotifierConfig::default()).await;

        let confirmation = notifier
            .configure_channels("9", vec!["100".into(), "200".into()])
            .await
            .unwrap();
        assert_eq!(
            confirmation.to_string(),
            "**Notifying streams in:** <#100> <#200>"
        );

        let confirmation = notifier.configure_channels("9", Vec::new()).await.unwrap();
        assert_eq!(confirmation, ChannelsConfigured::Disabled);
        assert_eq!(
            confirmation.to_string(),
            "**Disabled stream notifications in this server.**"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_server_does_not_touch_history() {
        let (notifier, sink) = notifier(NotifierConfig::default()).await;

        let outcome = notifier
            .handle_presence_update(&PresenceUpdate::new(offline(), streaming()))
            .await;

        assert_eq!(outcome, PresenceOutcome::NotConfigured);
        assert!(notifier.context().history().is_empty());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_channel_does_not_block_others() {
        let (notifier, sink) = notifier(NotifierConfig::default()).await;
        notifier
            .configure_channels("9", vec!["broken".into(), "200".into()])
            .await
            .unwrap();

        let outcome = notifier
            .handle_presence_update(&PresenceUpdate::new(offline(), streaming()))
            .await;

        assert_eq!(
            outcome,
            PresenceOutcome::Announced {
                delivered: 1,
                channels: 2
            }
        );
        assert_eq!(*sink.sent.lock(), vec!["200".to_string()]);
    }

    #[tokio::test]
    async fn test_listener_handles_channel_updates() {
        let (notifier, sink) = notifier(NotifierConfig::default()).await;
        notifier.configure_channels("9", vec!["100".into()]).await.unwrap();
        let notifier = Arc::new(notifier);

        let (tx, rx) = mpsc::channel(16);
        let handle = notifier.spawn_listener(rx);

        tx.send(PresenceUpdate::new(offline(), streaming())).await.unwrap();
        tx.send(PresenceUpdate::new(offline(), streaming())).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while sink.calls.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        notifier.stop();
        handle.await.unwrap();

        assert_eq!(*sink.sent.lock(), vec!["100".to_string()]);
    }

    #[tokio::test]
    async fn test_listener_drops_no_updates_under_burst() {
        let (notifier, sink) = notifier(NotifierConfig::default()).await;
        notifier.configure_channels("9", vec!["100".into()]).await.unwrap();
        let notifier = Arc::new(notifier);

        // Capacity far below the burst size.
        let (tx, rx) = mpsc::channel(1);
        let handle = notifier.spawn_listener(rx);

        for i in 0..50 {
            let mut before = offline();
            before.member_id = format!("member-{i}");
            let mut after = streaming();
            after.member_id = format!("member-{i}");
            tx.send(PresenceUpdate::new(before, after)).await.unwrap();
        }
        drop(tx);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sink.sent.lock().len(), 50);
        assert_eq!(notifier.context().history().len(), 50);
    }

    #[tokio::test]
    async fn test_history_sweeper_evicts_elapsed_entries() {
        let (notifier, _) = notifier(NotifierConfig {
            cooldown: Duration::from_secs(60),
            sweep_interval: Duration::from_millis(10),
        })
        .await;
        let notifier = Arc::new(notifier);
        notifier
            .context()
            .history()
            .record("stale", Utc::now() - TimeDelta::hours(1));
        notifier.context().history().record("fresh", Utc::now());

        let handle = notifier.start_history_sweeper();
        tokio::time::sleep(Duration::from_millis(100)).await;
        notifier.stop();
        handle.await.unwrap();

        let history = notifier.context().history();
        assert!(history.last_notified("stale").is_none());
        assert!(history.last_notified("fresh").is_some());
    }
}

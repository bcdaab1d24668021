//! Config Refresh & Polling
//!
//! Every source of "go fetch config again" (mount, panel open, the poll
//! timer, a storage signal from an admin save) is a [`RefreshTrigger`] fed
//! into the widget's single internal queue. The widget handles them one at a
//! time:
//!
//! 1. Issue a sequence number from [`RefreshGuard`]
//! 2. [`fetch_snapshot`] fetches the three resources concurrently
//! 3. The result is applied only if its sequence is newer than the last
//!    applied one, so a slow refresh can never overwrite a newer one
//!
//! A resource that fails to load keeps its previous value.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::api::{resolve_avatar_url, WidgetApi};
use crate::models::{MessagingConfig, StarterQuestionConfig, WidgetConfig};
use crate::storage::{LocalStore, CONFIG_VERSION_KEY};

/// Why a refresh was requested
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// Widget mount
    Initial,
    /// The panel was opened
    PanelOpened,
    /// Poll timer tick while the panel is open
    Poll,
    /// The shared config version marker changed
    StorageSignal,
    /// The surface asked for it
    Manual,
}

/// What happened to the avatar during a refresh
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AvatarUpdate {
    /// Keep whatever is shown (probe failed, or config fetch failed)
    Keep,
    /// No avatar configured; show the default
    Default,
    /// Show this validated URL
    Set(String),
}

/// Result of one refresh round; `None` means "fetch failed, keep previous"
#[derive(Clone, Debug)]
pub struct ConfigSnapshot {
    /// Widget config
    pub widget: Option<WidgetConfig>,
    /// Messaging config
    pub messaging: Option<MessagingConfig>,
    /// Starter question config
    pub starters: Option<StarterQuestionConfig>,
    /// Avatar outcome
    pub avatar: AvatarUpdate,
}

/// Fetch all three config resources concurrently
///
/// Failures are logged and reported as `None` so that callers keep their
/// previous values. The avatar is re-probed only when its resolved URL
/// differs from `current_avatar`.
pub async fn fetch_snapshot<A: WidgetApi + ?Sized>(
    api: &A,
    current_avatar: Option<&str>,
) -> ConfigSnapshot {
    let (widget, messaging, starters) = futures::future::join3(
        api.widget_config(),
        api.messaging_config(),
        api.starter_questions(),
    )
    .await;

    let widget = widget
        .map_err(|e| tracing::warn!(error = %e, "Failed to fetch widget config"))
        .ok();
    let messaging = messaging
        .map_err(|e| tracing::warn!(error = %e, "Failed to fetch messaging config"))
        .ok();
    let starters = starters
        .map_err(|e| tracing::warn!(error = %e, "Failed to fetch starter questions"))
        .ok();

    let avatar = match &widget {
        Some(config) => resolve_avatar(api, config, current_avatar).await,
        None => AvatarUpdate::Keep,
    };

    ConfigSnapshot {
        widget,
        messaging,
        starters,
        avatar,
    }
}

/// Resolve and validate the configured avatar
pub async fn resolve_avatar<A: WidgetApi + ?Sized>(
    api: &A,
    config: &WidgetConfig,
    current_avatar: Option<&str>,
) -> AvatarUpdate {
    let Some(raw) = config.avatar_url.as_deref().filter(|u| !u.trim().is_empty()) else {
        return AvatarUpdate::Default;
    };

    let url = resolve_avatar_url(api.base_url(), raw);
    if current_avatar == Some(url.as_str()) {
        return AvatarUpdate::Keep;
    }

    match api.probe_avatar(&url).await {
        Ok(()) => AvatarUpdate::Set(url),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Avatar failed to load, keeping previous");
            AvatarUpdate::Keep
        }
    }
}

/// Sequence numbers for refresh results
#[derive(Clone, Copy, Debug, Default)]
pub struct RefreshGuard {
    issued: u64,
    applied: u64,
}

impl RefreshGuard {
    /// Issue the next sequence number
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Accept `seq` if it is newer than the last applied result
    pub fn accept(&mut self, seq: u64) -> bool {
        if seq <= self.applied {
            return false;
        }
        self.applied = seq;
        true
    }

    /// Sequence of the last applied result (0 = none yet)
    #[must_use]
    pub fn applied(&self) -> u64 {
        self.applied
    }
}

/// What changed when a snapshot was applied
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfigChanges {
    /// Widget config replaced
    pub widget: bool,
    /// Messaging config replaced
    pub messaging: bool,
    /// Starter questions replaced
    pub starters: bool,
    /// Avatar changed
    pub avatar: bool,
}

impl ConfigChanges {
    /// Whether the header/launcher appearance needs re-rendering
    #[must_use]
    pub fn appearance(&self) -> bool {
        self.widget || self.avatar
    }
}

/// Last good config for a mount
#[derive(Clone, Debug, Default)]
pub struct ConfigState {
    /// Widget config
    pub widget: WidgetConfig,
    /// Messaging config
    pub messaging: MessagingConfig,
    /// Starter question config
    pub starters: StarterQuestionConfig,
    /// Validated avatar URL (`None` = default avatar)
    pub avatar_url: Option<String>,
}

impl ConfigState {
    /// Replace every successfully fetched resource wholesale
    pub fn apply(&mut self, snapshot: ConfigSnapshot) -> ConfigChanges {
        let mut changes = ConfigChanges::default();

        if let Some(widget) = snapshot.widget {
            changes.widget = widget != self.widget;
            self.widget = widget;
        }
        if let Some(messaging) = snapshot.messaging {
            changes.messaging = messaging != self.messaging;
            self.messaging = messaging;
        }
        if let Some(starters) = snapshot.starters {
            changes.starters = starters != self.starters;
            self.starters = starters;
        }
        match snapshot.avatar {
            AvatarUpdate::Keep => {}
            AvatarUpdate::Default => {
                changes.avatar = self.avatar_url.take().is_some();
            }
            AvatarUpdate::Set(url) => {
                changes.avatar = self.avatar_url.as_deref() != Some(url.as_str());
                self.avatar_url = Some(url);
            }
        }

        changes
    }
}

/// Periodic refresh while the panel is open
#[derive(Debug)]
pub struct Poller {
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl Poller {
    /// A stopped poller ticking every `interval`
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: None,
        }
    }

    /// Start ticking; does nothing if already running
    ///
    /// `on_tick` returns `false` once nobody is listening, which ends the
    /// task.
    pub fn start<F>(&mut self, on_tick: F)
    where
        F: Fn() -> bool + Send + 'static,
    {
        if self.is_running() {
            return;
        }

        let period = self.interval;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; opening the panel already refreshed
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !on_tick() {
                    break;
                }
            }
        }));
        tracing::debug!(interval_ms = period.as_millis() as u64, "Config poller started");
    }

    /// Stop ticking immediately
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Config poller stopped");
        }
    }

    /// Whether the poller is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Watch the shared store for config version bumps
///
/// `on_signal` is called for every write to the version key and returns
/// `false` once nobody is listening.
pub fn watch_config_version<F>(store: &Arc<LocalStore>, on_signal: F) -> JoinHandle<()>
where
    F: Fn() -> bool + Send + 'static,
{
    let mut events = store.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) if event.key.as_deref() == Some(CONFIG_VERSION_KEY) => {
                    if !on_signal() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    // A version bump may be among the skipped events
                    tracing::debug!(skipped, "Storage watcher lagged");
                    if !on_signal() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::api::mock::{ApiCall, Endpoint, MockApi};

    #[test]
    fn test_guard_discards_stale_results() {
        let mut guard = RefreshGuard::default();
        let first = guard.issue();
        let second = guard.issue();

        assert!(guard.accept(second));
        assert!(!guard.accept(first));
        assert!(!guard.accept(second));
        assert_eq!(guard.applied(), second);
    }

    #[tokio::test]
    async fn test_failed_resource_keeps_previous() {
        let api = MockApi::new();
        api.set_messaging_config(MessagingConfig {
            server_error_message: Some("Oops".into()),
            ..Default::default()
        });
        api.set_starter_questions(StarterQuestionConfig {
            enabled: true,
            questions: vec!["Q1".into()],
        });

        let mut state = ConfigState::default();
        state.apply(fetch_snapshot(&api, None).await);
        assert_eq!(state.messaging.server_error(), Some("Oops"));

        api.fail(Endpoint::MessagingConfig, 503, "");
        api.set_starter_questions(StarterQuestionConfig::default());
        let changes = state.apply(fetch_snapshot(&api, None).await);

        assert!(!changes.messaging);
        assert!(changes.starters);
        assert_eq!(state.messaging.server_error(), Some("Oops"));
        assert!(!state.starters.enabled);
    }

    #[tokio::test]
    async fn test_avatar_resolution() {
        let api = MockApi::new();
        let config = WidgetConfig {
            avatar_url: Some("/static/bot.png".into()),
            ..Default::default()
        };
        let expected = "http://mock.invalid/static/bot.png".to_string();

        assert_eq!(
            resolve_avatar(&api, &config, None).await,
            AvatarUpdate::Set(expected.clone())
        );
        assert_eq!(api.calls(), vec![ApiCall::ProbeAvatar(expected.clone())]);

        // Already showing it: no second probe
        assert_eq!(
            resolve_avatar(&api, &config, Some(&expected)).await,
            AvatarUpdate::Keep
        );
        assert_eq!(api.count(Endpoint::ProbeAvatar), 1);

        api.fail(Endpoint::ProbeAvatar, 404, "");
        let other = WidgetConfig {
            avatar_url: Some("https://cdn.example.com/x.png".into()),
            ..Default::default()
        };
        assert_eq!(resolve_avatar(&api, &other, Some(&expected)).await, AvatarUpdate::Keep);

        assert_eq!(
            resolve_avatar(&api, &WidgetConfig::default(), Some(&expected)).await,
            AvatarUpdate::Default
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_start_is_idempotent_and_stop_is_immediate() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut poller = Poller::new(Duration::from_secs(30));

        for _ in 0..2 {
            let ticks = ticks.clone();
            poller.start(move || {
                ticks.fetch_add(1, Ordering::SeqCst);
                true
            });
        }
        assert!(poller.is_running());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        poller.stop();
        assert!(!poller.is_running());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_storage_watch_fires_on_version_key_only() {
        let store = LocalStore::in_memory();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let watcher = watch_config_version(&store, move || tx.send(()).is_ok());

        store.set("unrelated", "x").await.unwrap();
        store.bump_config_version().await.unwrap();

        rx.recv().await.unwrap();
        assert!(rx.try_recv().is_err());
        watcher.abort();
    }
}

//! Local Store
//!
//! A small persistent key/value store shared by every widget (and admin
//! publisher) in the process. It plays the role browser local storage plays
//! for the embedded widget:
//!
//! - Reads are synchronous and served from memory
//! - Writes update memory, persist the whole map to a JSON file, and
//!   broadcast a [`StorageEvent`] to every subscriber
//! - All writes are single-key and last-write-wins, so no locking beyond the
//!   in-memory map is needed
//!
//! On top of the raw store sit the two typed views the widget needs:
//! [`ClientIdentity`] and [`OnboardingProgress`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::error::{WidgetError, WidgetResult};

/// Key holding the persisted client identity
pub const CLIENT_ID_KEY: &str = "chat_client_id";
/// Key set once the onboarding form was submitted
pub const FORM_SUBMITTED_KEY: &str = "chatbot_form_submitted";
/// Key set once the starter question screen was used or skipped
pub const STARTER_SEEN_KEY: &str = "chatbot_starter_seen";
/// Key whose writes signal that widget config changed server-side
pub const CONFIG_VERSION_KEY: &str = "widget_config_version";

const TRUE: &str = "true";

/// A change notification for one key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that changed (`None` when the whole store was cleared)
    pub key: Option<String>,
    /// New value (`None` when removed)
    pub new_value: Option<String>,
}

/// Persistent key/value store
#[derive(Debug)]
pub struct LocalStore {
    /// Backing file (`None` = memory only)
    path: Option<PathBuf>,
    /// Current contents
    values: RwLock<BTreeMap<String, String>>,
    /// Change broadcast
    events: broadcast::Sender<StorageEvent>,
}

impl LocalStore {
    /// Create an in-memory store (nothing is persisted)
    #[must_use]
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self::with_values(None, BTreeMap::new()))
    }

    /// Open a store backed by `path`, loading existing contents if present
    ///
    /// A missing file starts an empty store. A corrupt file is logged and
    /// replaced on the next write rather than failing the widget.
    pub async fn open(path: impl Into<PathBuf>) -> WidgetResult<Arc<Self>> {
        let path = path.into();
        let values = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(values) => values,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Corrupt store file, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(WidgetError::Storage { path, source }),
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "Opened local store");
        Ok(Arc::new(Self::with_values(Some(path), values)))
    }

    fn with_values(path: Option<PathBuf>, values: BTreeMap<String, String>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            path,
            values: RwLock::new(values),
            events,
        }
    }

    /// Backing file path, if persisted
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read a value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Write a value, persist, and notify subscribers
    pub async fn set(&self, key: &str, value: impl Into<String>) -> WidgetResult<()> {
        let value = value.into();
        self.values.write().insert(key.to_string(), value.clone());
        self.persist().await?;
        self.notify(StorageEvent {
            key: Some(key.to_string()),
            new_value: Some(value),
        });
        Ok(())
    }

    /// Remove a value, persist, and notify subscribers
    pub async fn remove(&self, key: &str) -> WidgetResult<()> {
        let existed = self.values.write().remove(key).is_some();
        if existed {
            self.persist().await?;
            self.notify(StorageEvent {
                key: Some(key.to_string()),
                new_value: None,
            });
        }
        Ok(())
    }

    /// Remove every value
    pub async fn clear(&self) -> WidgetResult<()> {
        self.values.write().clear();
        self.persist().await?;
        self.notify(StorageEvent {
            key: None,
            new_value: None,
        });
        Ok(())
    }

    /// Subscribe to change notifications
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: StorageEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn persist(&self) -> WidgetResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let snapshot = serde_json::to_string_pretty(&*self.values.read())?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| WidgetError::Storage {
                    path: path.clone(),
                    source,
                })?;
        }

        tokio::fs::write(path, snapshot)
            .await
            .map_err(|source| WidgetError::Storage {
                path: path.clone(),
                source,
            })
    }

    /// Write a fresh config version marker (milliseconds since epoch)
    ///
    /// Every widget sharing this store refreshes its config when it sees
    /// this key change.
    pub async fn bump_config_version(&self) -> WidgetResult<String> {
        let marker = chrono::Utc::now().timestamp_millis().to_string();
        self.set(CONFIG_VERSION_KEY, marker.clone()).await?;
        Ok(marker)
    }
}

/// The persisted, never-rotated visitor identifier
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    /// Load the identity from `store`, generating and persisting one if absent
    ///
    /// If persisting fails the freshly generated id is still returned so the
    /// widget keeps working for this mount.
    pub async fn load_or_create(store: &LocalStore) -> Self {
        if let Some(id) = store.get(CLIENT_ID_KEY).filter(|id| !id.is_empty()) {
            return Self(id);
        }

        let id = uuid::Uuid::new_v4().to_string();
        if let Err(e) = store.set(CLIENT_ID_KEY, id.clone()).await {
            tracing::warn!(error = %e, "Could not persist client identity");
        }
        Self(id)
    }

    /// The identifier string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Onboarding flags gating which screen a fresh mount shows
#[derive(Clone, Debug)]
pub struct OnboardingProgress {
    store: Arc<LocalStore>,
}

impl OnboardingProgress {
    /// View the onboarding flags in `store`
    #[must_use]
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// Whether the onboarding form was submitted
    #[must_use]
    pub fn form_submitted(&self) -> bool {
        self.store.get(FORM_SUBMITTED_KEY).as_deref() == Some(TRUE)
    }

    /// Whether the starter question screen was used or skipped
    #[must_use]
    pub fn starter_seen(&self) -> bool {
        self.store.get(STARTER_SEEN_KEY).as_deref() == Some(TRUE)
    }

    /// Record the form submission
    pub async fn mark_form_submitted(&self) -> WidgetResult<()> {
        self.store.set(FORM_SUBMITTED_KEY, TRUE).await
    }

    /// Record that the starter screen was used or skipped
    pub async fn mark_starter_seen(&self) -> WidgetResult<()> {
        self.store.set(STARTER_SEEN_KEY, TRUE).await
    }

    /// Forget the form submission
    pub async fn reset_form(&self) -> WidgetResult<()> {
        self.store.remove(FORM_SUBMITTED_KEY).await
    }

    /// Forget that starter questions were seen
    pub async fn reset_starter_questions(&self) -> WidgetResult<()> {
        self.store.remove(STARTER_SEEN_KEY).await
    }

    /// Forget both onboarding flags
    pub async fn reset_all(&self) -> WidgetResult<()> {
        self.reset_form().await?;
        self.reset_starter_questions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_client_identity_round_trips_across_mounts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");

        let first = {
            let store = LocalStore::open(&path).await.unwrap();
            ClientIdentity::load_or_create(&store).await
        };
        let second = {
            let store = LocalStore::open(&path).await.unwrap();
            ClientIdentity::load_or_create(&store).await
        };

        assert!(!first.as_str().is_empty());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_flags_are_string_true() {
        let store = LocalStore::in_memory();
        let progress = OnboardingProgress::new(store.clone());
        assert!(!progress.form_submitted());

        progress.mark_form_submitted().await.unwrap();
        assert!(progress.form_submitted());
        assert_eq!(store.get(FORM_SUBMITTED_KEY).as_deref(), Some("true"));

        // Anything but "true" reads as unset
        store.set(STARTER_SEEN_KEY, "yes").await.unwrap();
        assert!(!progress.starter_seen());
    }

    #[tokio::test]
    async fn test_resets_only_touch_their_flags() {
        let store = LocalStore::in_memory();
        let id = ClientIdentity::load_or_create(&store).await;
        let progress = OnboardingProgress::new(store.clone());
        progress.mark_form_submitted().await.unwrap();
        progress.mark_starter_seen().await.unwrap();

        progress.reset_form().await.unwrap();
        assert!(!progress.form_submitted());
        assert!(progress.starter_seen());

        progress.reset_all().await.unwrap();
        assert!(!progress.starter_seen());
        assert_eq!(store.get(CLIENT_ID_KEY), Some(id.0.clone()));

        store.clear().await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_writes_broadcast_to_subscribers() {
        let store = LocalStore::in_memory();
        let mut rx = store.subscribe();

        let marker = store.bump_config_version().await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.key.as_deref(), Some(CONFIG_VERSION_KEY));
        assert_eq!(event.new_value, Some(marker));

        // Removing an absent key is silent
        store.remove("missing").await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let store = LocalStore::open(&path).await.unwrap();
        assert!(store.is_empty());
        store.set("k", "v").await.unwrap();

        let reopened = LocalStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("k").as_deref(), Some("v"));
    }
}

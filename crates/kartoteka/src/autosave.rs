//! # Autosave
//!
//! Debounced saving of in-progress form state, with an offline draft in the
//! fallback store.
//!
//! ```text
//! idle ──update──▶ pending ──delay──▶ saving ──ok──▶ saved
//!                     ▲                  │
//!                     └──retry timer─── error
//! ```
//!
//! - Every [`Autosave::update`] restarts the debounce timer. Only the last value
//!   inside one window is saved.
//! - Online with an `on_save` callback, the callback is awaited. Offline, or with
//!   no callback, the value is written as a draft under `autosave_{key}` as
//!   `{data, timestamp, path}`.
//! - A failed callback is retried after `delay * attempts`, capped at
//!   [`MAX_RETRY_DELAY`]. The [`SaveNotifier`] hears about the first failure and
//!   every third one after that.
//! - [`Autosave::navigate`] saves a pending value right away, so a route change
//!   never drops an edit.
//!
//! Timers are tokio tasks; an [`Autosave`] must be used inside a tokio runtime.
//! A superseded timer is not aborted. It wakes, sees a newer generation and exits.

use crate::error::KartotekaError;
use crate::store::fallback::{self, keys, FallbackStore};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, warn};

pub const DEFAULT_DELAY: Duration = Duration::from_millis(2000);
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

pub type SaveFuture = Pin<Box<dyn Future<Output = crate::error::Result<()>> + Send>>;
pub type SaveCallback<T> = Arc<dyn Fn(T) -> SaveFuture + Send + Sync>;

/// Wrap an async closure as a [`SaveCallback`].
pub fn save_callback<T, C, Fut>(callback: C) -> SaveCallback<T>
where
    C: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = crate::error::Result<()>> + Send + 'static,
{
    Arc::new(move |data| Box::pin(callback(data)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    Idle,
    Pending,
    Saving,
    Saved,
    Error,
    Offline,
}

/// Receives user-visible save failures.
pub trait SaveNotifier: Send + Sync {
    fn save_failed(&self, key: &str, attempts: u32, error: &KartotekaError);
}

/// Default notifier: a `tracing` warning.
pub struct LogNotifier;

impl SaveNotifier for LogNotifier {
    fn save_failed(&self, key: &str, attempts: u32, error: &KartotekaError) {
        warn!("autosave '{}' failed (attempt {}): {}", key, attempts, error);
    }
}

/// The envelope stored under `autosave_{key}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

pub struct AutosaveOptions<T> {
    key: String,
    delay: Duration,
    on_save: Option<SaveCallback<T>>,
    notifier: Arc<dyn SaveNotifier>,
}

impl<T> AutosaveOptions<T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            delay: DEFAULT_DELAY,
            on_save: None,
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn on_save(mut self, callback: SaveCallback<T>) -> Self {
        self.on_save = Some(callback);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn SaveNotifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

fn retry_delay(delay: Duration, attempts: u32) -> Duration {
    delay.saturating_mul(attempts).min(MAX_RETRY_DELAY)
}

fn should_notify(attempts: u32) -> bool {
    attempts == 1 || attempts % 3 == 0
}

struct State<T> {
    pending: Option<T>,
    generation: u64,
    online: bool,
    enabled: bool,
    attempts: u32,
    path: Option<String>,
}

struct Inner<T, F> {
    key: String,
    delay: Duration,
    on_save: Option<SaveCallback<T>>,
    notifier: Arc<dyn SaveNotifier>,
    fallback: F,
    state: Mutex<State<T>>,
    status: watch::Sender<SaveStatus>,
}

impl<T, F> Inner<T, F>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    F: FallbackStore + 'static,
{
    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: SaveStatus) {
        self.status.send_replace(status);
    }

    fn draft_key(&self) -> String {
        keys::autosave(&self.key)
    }

    fn schedule(self: &Arc<Self>, generation: u64, delay: Duration) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire(generation).await;
        });
    }

    async fn fire(self: Arc<Self>, generation: u64) {
        let (data, online, path) = {
            let mut state = self.state();
            if state.generation != generation {
                return;
            }
            match state.pending.take() {
                Some(data) => (data, state.online, state.path.clone()),
                None => return,
            }
        };
        self.save(data, online, path).await;
    }

    async fn save(self: &Arc<Self>, data: T, online: bool, path: Option<String>) {
        let callback = match (&self.on_save, online) {
            (Some(callback), true) => Arc::clone(callback),
            _ => {
                self.write_draft(data, path, online);
                return;
            }
        };

        self.set_status(SaveStatus::Saving);
        match callback(data.clone()).await {
            Ok(()) => {
                let newer = {
                    let mut state = self.state();
                    state.attempts = 0;
                    state.pending.is_some()
                };
                if newer {
                    self.set_status(SaveStatus::Pending);
                } else {
                    self.remove_draft();
                    self.set_status(SaveStatus::Saved);
                }
            }
            Err(e) => {
                let (attempts, retry, latest) = {
                    let mut state = self.state();
                    state.attempts += 1;
                    let retry = if state.pending.is_none() {
                        state.pending = Some(data);
                        state.generation += 1;
                        Some(state.generation)
                    } else {
                        None
                    };
                    (state.attempts, retry, state.pending.clone())
                };
                debug!("autosave '{}' attempt {} failed: {}", self.key, attempts, e);
                if let Some(latest) = latest {
                    if let Err(e) = self.store_draft(latest, path) {
                        error!("failed to store draft '{}': {}", self.key, e);
                    }
                }
                if should_notify(attempts) {
                    self.notifier.save_failed(&self.key, attempts, &e);
                }
                self.set_status(SaveStatus::Error);
                if let Some(generation) = retry {
                    self.schedule(generation, retry_delay(self.delay, attempts));
                }
            }
        }
    }

    fn store_draft(&self, data: T, path: Option<String>) -> crate::error::Result<()> {
        let draft = Draft {
            data,
            timestamp: Utc::now(),
            path,
        };
        fallback::set_json(&self.fallback, &self.draft_key(), &draft)
    }

    fn write_draft(&self, data: T, path: Option<String>, online: bool) {
        match self.store_draft(data, path) {
            Ok(()) => {
                debug!("autosave '{}' stored as draft", self.key);
                self.set_status(if online {
                    SaveStatus::Saved
                } else {
                    SaveStatus::Offline
                });
            }
            Err(e) => {
                error!("failed to store draft '{}': {}", self.key, e);
                self.notifier.save_failed(&self.key, 1, &e);
                self.set_status(SaveStatus::Error);
            }
        }
    }

    fn read_draft(&self) -> Option<Draft<T>> {
        fallback::get_json(&self.fallback, &self.draft_key()).unwrap_or_else(|e| {
            warn!("discarding unreadable draft '{}': {}", self.key, e);
            None
        })
    }

    fn remove_draft(&self) {
        if let Err(e) = self.fallback.remove(&self.draft_key()) {
            warn!("failed to clear draft '{}': {}", self.key, e);
        }
    }
}

/// Debounced autosave for one piece of form state.
pub struct Autosave<T, F> {
    inner: Arc<Inner<T, F>>,
}

impl<T, F> Autosave<T, F>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    F: FallbackStore + 'static,
{
    pub fn new(options: AutosaveOptions<T>, fallback: F) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self {
            inner: Arc::new(Inner {
                key: options.key,
                delay: options.delay,
                on_save: options.on_save,
                notifier: options.notifier,
                fallback,
                state: Mutex::new(State {
                    pending: None,
                    generation: 0,
                    online: true,
                    enabled: true,
                    attempts: 0,
                    path: None,
                }),
                status,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Record a change and restart the debounce timer. Ignored while disabled.
    pub fn update(&self, data: T) {
        let generation = {
            let mut state = self.inner.state();
            if !state.enabled {
                return;
            }
            state.pending = Some(data);
            state.generation += 1;
            state.generation
        };
        self.inner.set_status(SaveStatus::Pending);
        self.inner.schedule(generation, self.inner.delay);
    }

    /// The activation condition: while disabled, changes are not tracked.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.state().enabled = enabled;
    }

    /// Connectivity signal. Coming back online resubmits a stored draft.
    pub fn set_online(&self, online: bool) {
        let resume = {
            let mut state = self.inner.state();
            let was_online = state.online;
            state.online = online;
            if online && !was_online && state.pending.is_none() && self.inner.on_save.is_some() {
                self.inner.read_draft().map(|draft| {
                    state.pending = Some(draft.data);
                    state.path = state.path.take().or(draft.path);
                    state.generation += 1;
                    state.generation
                })
            } else {
                None
            }
        };

        if !online {
            self.inner.set_status(SaveStatus::Offline);
        } else if let Some(generation) = resume {
            self.inner.set_status(SaveStatus::Pending);
            self.inner.schedule(generation, self.inner.delay);
        } else if self.status() == SaveStatus::Offline {
            self.inner.set_status(SaveStatus::Idle);
        }
    }

    /// Save anything pending now, then record the new location.
    pub async fn navigate(&self, path: &str) {
        self.flush().await;
        self.inner.state().path = Some(path.to_string());
    }

    /// Save the pending value immediately, cancelling its timer.
    pub async fn flush(&self) {
        let (data, online, path) = {
            let mut state = self.inner.state();
            let Some(data) = state.pending.take() else {
                return;
            };
            state.generation += 1;
            (data, state.online, state.path.clone())
        };
        self.inner.save(data, online, path).await;
    }

    pub fn status(&self) -> SaveStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    pub fn draft(&self) -> Option<Draft<T>> {
        self.inner.read_draft()
    }

    /// Hand a stored draft to `on_data_loaded`. Returns whether there was one.
    pub fn load_draft<C>(&self, on_data_loaded: C) -> bool
    where
        C: FnOnce(T),
    {
        match self.inner.read_draft() {
            Some(draft) => {
                debug!("restoring draft '{}' from {}", self.inner.key, draft.timestamp);
                on_data_loaded(draft.data);
                true
            }
            None => false,
        }
    }

    pub fn clear_draft(&self) {
        self.inner.remove_draft();
    }
}

//! services/timeline_api/src/web/state.rs
//!
//! Defines the application's shared state and the state of each mounted widget.

use crate::config::Config;
use medical_timeline_core::{
    ActionDispatcher, FieldWidgetRegistry, LoadSequencing, PortResult, RecordLoader, RecordRef,
    TimelineWidget,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub loader: RecordLoader,
    pub dispatcher: Arc<dyn ActionDispatcher>,
    pub registry: Arc<FieldWidgetRegistry>,
    /// Mounted widgets. Hosts should unmount them; idle ones are evicted anyway.
    pub widgets: RwLock<HashMap<Uuid, Arc<WidgetSession>>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        loader: RecordLoader,
        dispatcher: Arc<dyn ActionDispatcher>,
        registry: FieldWidgetRegistry,
    ) -> Self {
        Self {
            config,
            loader,
            dispatcher,
            registry: Arc::new(registry),
            widgets: RwLock::new(HashMap::new()),
        }
    }

    /// Builds a fresh, not yet loaded timeline widget bound to `props`.
    pub fn new_widget(&self, props: Option<Vec<RecordRef>>) -> WidgetSession {
        WidgetSession::new(TimelineWidget::new(
            self.loader.clone(),
            self.dispatcher.clone(),
            self.config.timestamp_formatter(),
            self.config.load_sequencing,
            props,
        ))
    }

    /// Looks up a mounted widget and marks it as used.
    pub async fn widget(&self, id: Uuid) -> Option<Arc<WidgetSession>> {
        let session = self.widgets.read().await.get(&id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Unmounts every widget left unused for longer than the configured idle timeout.
    /// Returns how many were removed.
    pub async fn evict_idle(&self, now: Instant) -> usize {
        let timeout = self.config.widget_idle_timeout;
        let mut widgets = self.widgets.write().await;
        let before = widgets.len();
        widgets.retain(|widget_id, session| {
            let keep = session.idle_for(now) <= timeout;
            if !keep {
                session.cancel();
                info!("Evicted idle timeline {}.", widget_id);
            }
            keep
        });
        before - widgets.len()
    }
}

//=========================================================================================
// WidgetSession (One Mounted Timeline)
//=========================================================================================

/// A mounted timeline widget plus the bookkeeping for its in-flight load.
///
/// The widget lock is only held between awaits, so row clicks are served while a
/// load is waiting on the store.
pub struct WidgetSession {
    pub widget: Mutex<TimelineWidget>,
    /// A token to cancel the load currently in flight.
    in_flight: StdMutex<CancellationToken>,
    last_used: StdMutex<Instant>,
}

impl WidgetSession {
    pub fn new(widget: TimelineWidget) -> Self {
        Self {
            widget: Mutex::new(widget),
            in_flight: StdMutex::new(CancellationToken::new()),
            last_used: StdMutex::new(Instant::now()),
        }
    }

    pub fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    pub fn idle_for(&self, now: Instant) -> std::time::Duration {
        let last_used = *self.last_used.lock().unwrap_or_else(|e| e.into_inner());
        now.saturating_duration_since(last_used)
    }

    /// Loads the currently bound rows. `Ok(false)` means a newer load superseded this one.
    pub async fn load(&self) -> PortResult<bool> {
        let (pending, token) = {
            let mut widget = self.widget.lock().await;
            let pending = widget.begin_load();
            let token = CancellationToken::new();
            let previous = {
                let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
                std::mem::replace(&mut *in_flight, token.clone())
            };
            if widget.sequencing() == LoadSequencing::DiscardStale {
                previous.cancel();
            }
            (pending, token)
        };

        let ticket = pending.ticket();
        let completed = tokio::select! {
            _ = token.cancelled() => {
                debug!(?ticket, "Timeline load superseded before completion.");
                return Ok(false);
            }
            completed = pending.run() => completed,
        };

        self.widget.lock().await.finish_load(completed)
    }

    /// Applies a host property change, reloading unless the rows are already on display.
    pub async fn update_props(&self, next: Option<Vec<RecordRef>>) -> PortResult<bool> {
        let changed = self.widget.lock().await.set_props(next);
        if !changed {
            return Ok(false);
        }
        self.load().await
    }

    /// Cancels the load in flight, if any. Used when the widget is unmounted.
    pub fn cancel(&self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ChannelDispatcher, MemoryStore};
    use async_trait::async_trait;
    use medical_timeline_core::{
        FieldWidgetRegistry, NoteId, NoteRecord, NoteStore, PortResult, RecordLoader,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Holds the first bulk read until released.
    struct GatedStore {
        inner: MemoryStore,
        gate: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NoteStore for GatedStore {
        async fn read_notes(&self, ids: &[NoteId]) -> PortResult<Vec<NoteRecord>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.gate.notified().await;
            }
            self.inner.read_notes(ids).await
        }
    }

    fn app_state(store: Arc<GatedStore>, sequencing: &str) -> AppState {
        let config = Config::from_lookup(|name| match name {
            "LOAD_SEQUENCING" => Some(sequencing.to_string()),
            "VIEWER_UTC_OFFSET_MINUTES" => Some("0".to_string()),
            _ => None,
        })
        .unwrap();
        let patients = Arc::new(MemoryStore::new());
        let loader = RecordLoader::new(store, patients, config.loader_options());
        let (dispatcher, _navigation) = ChannelDispatcher::channel();
        AppState::new(
            Arc::new(config),
            loader,
            Arc::new(dispatcher),
            FieldWidgetRegistry::new(),
        )
    }

    fn gated_store() -> Arc<GatedStore> {
        let inner = MemoryStore::new();
        let mut older = NoteRecord::new(1);
        older.date = Some("2024-01-01 00:00:00".to_string());
        let mut newer = NoteRecord::new(2);
        newer.date = Some("2024-02-01 00:00:00".to_string());
        inner.upsert_note(older);
        inner.upsert_note(newer);
        Arc::new(GatedStore {
            inner,
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        })
    }

    async fn wait_for_calls(store: &GatedStore, calls: usize) {
        while store.calls.load(Ordering::SeqCst) < calls {
            tokio::task::yield_now().await;
        }
    }

    async fn shown_ids(session: &WidgetSession) -> Vec<NoteId> {
        session
            .widget
            .lock()
            .await
            .records()
            .iter()
            .map(|r| r.id)
            .collect()
    }

    #[tokio::test]
    async fn newer_load_cancels_the_one_in_flight() {
        let store = gated_store();
        let state = app_state(store.clone(), "discard_stale");
        let session = Arc::new(state.new_widget(Some(vec![RecordRef::saved(1)])));

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.load().await }
        });
        wait_for_calls(&store, 1).await;

        let applied = session
            .update_props(Some(vec![RecordRef::saved(1), RecordRef::saved(2)]))
            .await
            .unwrap();
        assert!(applied);

        assert_eq!(first.await.unwrap(), Ok(false));
        assert_eq!(shown_ids(&session).await, vec![2, 1]);
    }

    #[tokio::test]
    async fn last_write_wins_lets_the_older_load_overwrite() {
        let store = gated_store();
        let state = app_state(store.clone(), "last_write_wins");
        let session = Arc::new(state.new_widget(Some(vec![RecordRef::saved(1)])));

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.load().await }
        });
        wait_for_calls(&store, 1).await;

        session
            .update_props(Some(vec![RecordRef::saved(1), RecordRef::saved(2)]))
            .await
            .unwrap();
        assert_eq!(shown_ids(&session).await, vec![2, 1]);

        store.gate.notify_one();
        assert_eq!(first.await.unwrap(), Ok(true));
        assert_eq!(shown_ids(&session).await, vec![1]);
    }

    #[tokio::test]
    async fn only_idle_widgets_are_evicted() {
        let state = app_state(gated_store(), "discard_stale");
        let idle = Uuid::new_v4();
        let active = Uuid::new_v4();
        {
            let mut widgets = state.widgets.write().await;
            widgets.insert(idle, Arc::new(state.new_widget(None)));
            widgets.insert(active, Arc::new(state.new_widget(None)));
        }

        let later = Instant::now() + state.config.widget_idle_timeout;
        std::thread::sleep(std::time::Duration::from_millis(5));
        state.widget(active).await.unwrap();
        // Only `idle` has been unused for longer than the timeout at `later + 1ms`.
        let evicted = state
            .evict_idle(later + std::time::Duration::from_millis(1))
            .await;

        assert_eq!(evicted, 1);
        assert!(state.widget(idle).await.is_none());
        assert!(state.widget(active).await.is_some());
    }
}

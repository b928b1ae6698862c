//! Search and saved-widget views.
//!
//! `SearchView` builds a session list from user searches and can persist it.
//! `SavedView` shows the persisted set and keeps it fresh with a
//! [`RefreshLoop`] for as long as it is open.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use weatherdash_core::{RefreshConfig, StorageError, WidgetError};
use weatherdash_weather::{ConditionsSource, TemperatureUnit};

use crate::refresh::{RefreshHandle, RefreshLoop, TickReport};
use crate::store::WidgetStore;
use crate::widget::{Widget, WidgetId};
use crate::widget_list::{SharedWidgetList, WidgetList};

/// How long a notice stays visible.
pub const NOTICE_AUTO_HIDE: Duration = Duration::from_millis(1500);

pub const SAVED_MESSAGE: &str = "Widgets saved successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// Transient message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Info,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Error,
        }
    }

    pub fn saved() -> Self {
        Self::info(SAVED_MESSAGE)
    }

    pub fn auto_hide(&self) -> Duration {
        NOTICE_AUTO_HIDE
    }
}

impl From<&WidgetError> for Notice {
    fn from(err: &WidgetError) -> Self {
        Self::error(err.user_message())
    }
}

/// Clears the loading flag when a search settles, however it ends.
struct LoadingGuard<'a>(&'a AtomicBool);

impl<'a> LoadingGuard<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SearchView<S, W> {
    source: Arc<S>,
    store: Arc<W>,
    widgets: SharedWidgetList,
    unit: TemperatureUnit,
    loading: AtomicBool,
}

impl<S: ConditionsSource, W: WidgetStore> SearchView<S, W> {
    pub fn new(source: Arc<S>, store: Arc<W>, unit: TemperatureUnit) -> Self {
        Self {
            source,
            store,
            widgets: WidgetList::new().shared(),
            unit,
            loading: AtomicBool::new(false),
        }
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    /// Unit used by subsequent searches. Existing widgets keep theirs.
    pub fn set_unit(&mut self, unit: TemperatureUnit) {
        self.unit = unit;
    }

    pub fn loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Fetch conditions for `city` and append a widget for it.
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, city: Option<&str>) -> Result<Widget, WidgetError> {
        let city = city
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(WidgetError::NoCitySelected)?;
        let unit = self.unit;

        let conditions = {
            let _loading = LoadingGuard::start(&self.loading);
            self.source.fetch_conditions(city, unit).await?
        };

        let widget = Widget::with_conditions(city, unit, conditions);
        self.widgets.write().add(widget.clone());
        tracing::info!("Added widget {} for {}", widget.id, city);
        Ok(widget)
    }

    /// Drop a widget from the session list only.
    pub fn remove(&self, id: WidgetId) -> Option<Widget> {
        self.widgets.write().remove_by_id(id)
    }

    /// Persist the session widgets whose city is not saved yet. Returns the
    /// widgets actually added.
    pub fn save_to_user(&self) -> Result<Vec<Widget>, WidgetError> {
        let session = self.widgets.read().snapshot();
        let added = self.store.merge_and_save(&session)?;
        tracing::info!("Saved {} of {} session widget(s)", added.len(), session.len());
        Ok(added)
    }

    /// Session widgets in the order they were searched.
    pub fn widgets(&self) -> Vec<Widget> {
        self.widgets.read().snapshot()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Ready,
    Closed,
}

pub struct SavedView<W> {
    store: Arc<W>,
    widgets: SharedWidgetList,
    state: ViewState,
    refresh: Option<RefreshHandle>,
}

impl<W: WidgetStore> SavedView<W> {
    /// A view that has not loaded anything yet.
    pub fn new(store: Arc<W>) -> Self {
        Self {
            store,
            widgets: WidgetList::new().shared(),
            state: ViewState::Loading,
            refresh: None,
        }
    }

    /// Load the persisted set and start refreshing it.
    pub fn open<S: ConditionsSource>(source: Arc<S>, store: Arc<W>, config: &RefreshConfig) -> Self {
        let mut view = Self::new(store);
        view.start(source, config.interval(), None);
        view
    }

    /// Load the persisted set without refreshing it. Only valid while loading.
    pub fn load(&mut self) {
        if self.state != ViewState::Loading {
            tracing::warn!("Saved view already loaded (state {:?})", self.state);
            return;
        }
        let saved = self.store.load();
        tracing::debug!("Saved view loaded {} widget(s)", saved.len());
        self.widgets.write().replace_all(saved);
        self.state = ViewState::Ready;
    }

    /// Load the persisted set and start a refresh loop that publishes its
    /// reports on `reports`. Only valid while loading.
    pub fn start<S: ConditionsSource>(
        &mut self,
        source: Arc<S>,
        interval: Duration,
        reports: Option<mpsc::UnboundedSender<TickReport>>,
    ) {
        if self.state != ViewState::Loading {
            tracing::warn!("Saved view already started (state {:?})", self.state);
            return;
        }
        self.load();

        let mut refresh = RefreshLoop::new(source, Arc::clone(&self.widgets), interval);
        if let Some(reports) = reports {
            refresh = refresh.with_reports(reports);
        }
        self.refresh = Some(refresh.spawn());
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    /// Saved widgets, most recently added first.
    pub fn widgets(&self) -> Vec<Widget> {
        self.widgets.read().latest_first()
    }

    /// Remove a widget and persist the reduced set. Unknown ids do nothing.
    /// If the write fails the widget is put back, so the view keeps matching
    /// storage.
    pub fn remove(&self, id: WidgetId) -> Result<Option<Widget>, StorageError> {
        let (index, removed, remaining) = {
            let mut widgets = self.widgets.write();
            let Some(index) = widgets.position(id) else {
                tracing::debug!("Widget {} not in saved view", id);
                return Ok(None);
            };
            let removed = widgets.remove_by_id(id);
            (index, removed, widgets.snapshot())
        };
        let Some(removed) = removed else {
            return Ok(None);
        };

        if let Err(e) = self.store.overwrite(&remaining) {
            tracing::warn!("Could not persist removal of widget {}: {}", removed.id, e);
            self.widgets.write().insert_at(index, removed);
            return Err(e);
        }
        tracing::info!("Removed saved widget {} ({})", removed.id, removed.city);
        Ok(Some(removed))
    }

    /// Stop refreshing. Fetches already in flight may still land.
    pub async fn close(&mut self) {
        if let Some(refresh) = self.refresh.take() {
            refresh.stop().await;
        }
        self.state = ViewState::Closed;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::store::{FileKeyValueStore, LocalWidgetStore, MemoryKeyValueStore};
    use crate::testing::{conditions, FakeSource, FlakyKeyValueStore};

    type MemoryStore = LocalWidgetStore<MemoryKeyValueStore>;

    fn search_view(source: FakeSource) -> (SearchView<FakeSource, MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(LocalWidgetStore::in_memory());
        let view = SearchView::new(Arc::new(source), Arc::clone(&store), TemperatureUnit::Celsius);
        (view, store)
    }

    fn saved(city: &str, raw_id: i64) -> Widget {
        Widget {
            id: WidgetId::from_raw(raw_id),
            city: city.to_string(),
            weather_data: Some(conditions(city, 1.0)),
            unit: TemperatureUnit::Celsius,
        }
    }

    #[tokio::test]
    async fn test_search_appends_widget_with_data() {
        let (view, _) = search_view(FakeSource::with(&[("London", 11.5)]));

        let widget = view.search(Some("London")).await.unwrap();

        assert_eq!(widget.city, "London");
        assert_eq!(widget.unit, TemperatureUnit::Celsius);
        assert_eq!(widget.weather_data.as_ref().unwrap().temperature, 11.5);
        assert_eq!(view.widgets(), vec![widget]);
        assert!(!view.loading());
    }

    #[tokio::test]
    async fn test_search_without_city_asks_for_selection() {
        let source = FakeSource::with(&[("London", 11.5)]);
        let (view, _) = search_view(source);

        for input in [None, Some(""), Some("   ")] {
            let err = view.search(input).await.unwrap_err();
            assert!(matches!(err, WidgetError::NoCitySelected));
            assert_eq!(Notice::from(&err).message, "Please Select City");
        }
        assert!(view.widgets().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_city_leaves_list_unchanged() {
        let (view, _) = search_view(FakeSource::with(&[("London", 11.5)]));
        view.search(Some("London")).await.unwrap();

        let err = view.search(Some("Atlantis")).await.unwrap_err();

        let notice = Notice::from(&err);
        assert_eq!(notice.message, "City not found");
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(view.widgets().len(), 1);
        assert!(!view.loading());
    }

    #[tokio::test]
    async fn test_searches_append_in_order() {
        let (view, _) = search_view(FakeSource::with(&[("London", 1.0), ("Paris", 2.0)]));
        view.search(Some("London")).await.unwrap();
        view.search(Some("Paris")).await.unwrap();
        view.search(Some("London")).await.unwrap();

        let cities: Vec<_> = view.widgets().into_iter().map(|w| w.city).collect();
        assert_eq!(cities, vec!["London", "Paris", "London"]);
    }

    #[tokio::test]
    async fn test_set_unit_applies_to_next_search() {
        let (mut view, _) = search_view(FakeSource::with(&[("Paris", 10.0)]));
        view.search(Some("Paris")).await.unwrap();
        view.set_unit(TemperatureUnit::Fahrenheit);

        let widget = view.search(Some("Paris")).await.unwrap();

        assert_eq!(view.unit(), TemperatureUnit::Fahrenheit);
        assert_eq!(widget.unit, TemperatureUnit::Fahrenheit);
        assert_eq!(widget.weather_data.unwrap().temperature, 50.0);
        assert_eq!(view.widgets()[0].unit, TemperatureUnit::Celsius);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_flag_set_while_fetching() {
        let source = FakeSource::with(&[("London", 1.0)]).delayed(Duration::from_secs(2));
        let (view, _) = search_view(source);
        let view = Arc::new(view);

        let search = {
            let view = Arc::clone(&view);
            tokio::spawn(async move { view.search(Some("London")).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(view.loading());

        search.await.unwrap().unwrap();
        assert!(!view.loading());
    }

    #[tokio::test]
    async fn test_session_remove_does_not_touch_store() {
        let (view, store) = search_view(FakeSource::with(&[("London", 1.0), ("Paris", 2.0)]));
        let london = view.search(Some("London")).await.unwrap();
        view.search(Some("Paris")).await.unwrap();
        view.save_to_user().unwrap();

        assert!(view.remove(london.id).is_some());
        assert!(view.remove(london.id).is_none());

        assert_eq!(view.widgets().len(), 1);
        assert_eq!(store.load().len(), 2);
    }

    #[tokio::test]
    async fn test_saving_same_city_twice_is_rejected() {
        let store = Arc::new(LocalWidgetStore::in_memory());
        let source = Arc::new(FakeSource::with(&[("Paris", 14.0)]));

        let first = SearchView::new(Arc::clone(&source), Arc::clone(&store), TemperatureUnit::Celsius);
        first.search(Some("Paris")).await.unwrap();
        let added = first.save_to_user().unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(Notice::saved().message, "Widgets saved successfully!");

        let second = SearchView::new(source, Arc::clone(&store), TemperatureUnit::Celsius);
        second.search(Some("Paris")).await.unwrap();
        let err = second.save_to_user().unwrap_err();

        assert!(matches!(err, WidgetError::DuplicateCity(ref city) if city == "Paris"));
        assert_eq!(Notice::from(&err).message, "This city already exists!");
        let stored = store.load();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].city, "Paris");
    }

    #[tokio::test]
    async fn test_saving_empty_session_is_rejected() {
        let (view, store) = search_view(FakeSource::default());

        let err = view.save_to_user().unwrap_err();

        assert!(matches!(err, WidgetError::DuplicateCity(_)));
        assert!(store.load().is_empty());
    }

    #[tokio::test]
    async fn test_save_keeps_only_new_cities() {
        let (view, store) = search_view(FakeSource::with(&[("London", 1.0), ("Paris", 2.0)]));
        store.overwrite(&[saved("London", 1)]).unwrap();
        view.search(Some("London")).await.unwrap();
        view.search(Some("Paris")).await.unwrap();

        let added = view.save_to_user().unwrap();

        assert_eq!(added.len(), 1);
        assert_eq!(added[0].city, "Paris");
        let cities: Vec<_> = store.load().into_iter().map(|w| w.city).collect();
        assert_eq!(cities, vec!["London", "Paris"]);
    }

    #[tokio::test]
    async fn test_saved_view_loads_latest_first() {
        let store = Arc::new(LocalWidgetStore::in_memory());
        store.overwrite(&[saved("London", 1), saved("Paris", 2)]).unwrap();

        let mut view = SavedView::open(
            Arc::new(FakeSource::default()),
            store,
            &RefreshConfig::default(),
        );

        assert_eq!(view.state(), ViewState::Ready);
        let cities: Vec<_> = view.widgets().into_iter().map(|w| w.city).collect();
        assert_eq!(cities, vec!["Paris", "London"]);
        view.close().await;
    }

    #[tokio::test]
    async fn test_removed_widget_is_gone_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalWidgetStore::<FileKeyValueStore>::open(dir.path()).unwrap());
        store
            .overwrite(&[saved("London", 1), saved("Paris", 2), saved("Tokyo", 3)])
            .unwrap();

        let mut view = SavedView::open(Arc::new(FakeSource::default()), store, &RefreshConfig::default());
        let removed = view.remove(WidgetId::from_raw(2)).unwrap().unwrap();
        assert_eq!(removed.city, "Paris");
        assert!(view.remove(WidgetId::from_raw(2)).unwrap().is_none());
        view.close().await;

        let reopened = LocalWidgetStore::<FileKeyValueStore>::open(dir.path()).unwrap();
        let cities: Vec<_> = reopened.load().into_iter().map(|w| w.city).collect();
        assert_eq!(cities, vec!["London", "Tokyo"]);
    }

    #[tokio::test]
    async fn test_failed_removal_keeps_widget_in_view() {
        let store = Arc::new(LocalWidgetStore::new(FlakyKeyValueStore::default()));
        store
            .overwrite(&[saved("London", 1), saved("Paris", 2), saved("Tokyo", 3)])
            .unwrap();

        let mut view = SavedView::new(Arc::clone(&store));
        view.load();
        store.slots().fail_writes(true);

        assert!(view.remove(WidgetId::from_raw(2)).is_err());

        let cities: Vec<_> = view.widgets().into_iter().map(|w| w.city).collect();
        assert_eq!(cities, vec!["Tokyo", "Paris", "London"]);
        assert_eq!(store.load().len(), 3);
        view.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_saved_view_refreshes_until_closed() {
        let store = Arc::new(LocalWidgetStore::in_memory());
        store.overwrite(&[saved("London", 1)]).unwrap();
        let source = Arc::new(FakeSource::with(&[("London", 21.0)]));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut view = SavedView::new(store);
        assert_eq!(view.state(), ViewState::Loading);
        view.start(Arc::clone(&source), Duration::from_secs(5), Some(tx));

        let report = rx.recv().await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(view.widgets()[0].weather_data.as_ref().unwrap().temperature, 21.0);

        view.close().await;
        assert_eq!(view.state(), ViewState::Closed);
        let calls = source.calls();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls(), calls);
    }

    #[tokio::test]
    async fn test_start_twice_is_ignored() {
        let store = Arc::new(LocalWidgetStore::in_memory());
        store.overwrite(&[saved("London", 1)]).unwrap();
        let source = Arc::new(FakeSource::default());

        let mut view = SavedView::new(Arc::clone(&store));
        view.start(Arc::clone(&source), Duration::from_secs(5), None);
        store.overwrite(&[saved("London", 1), saved("Paris", 2)]).unwrap();
        view.start(source, Duration::from_secs(5), None);

        assert_eq!(view.widgets().len(), 1);
        view.close().await;
    }

    #[tokio::test]
    async fn test_load_without_refresh() {
        let store = Arc::new(LocalWidgetStore::in_memory());
        store.overwrite(&[saved("London", 1)]).unwrap();

        let mut view = SavedView::new(store);
        view.load();
        view.load();

        assert_eq!(view.state(), ViewState::Ready);
        assert_eq!(view.widgets().len(), 1);
        view.close().await;
        assert_eq!(view.state(), ViewState::Closed);
    }

    #[test]
    fn test_notice_auto_hide() {
        let notice = Notice::from(&WidgetError::NotFound("Atlantis".into()));
        assert_eq!(notice.auto_hide(), Duration::from_millis(1500));
        assert_eq!(Notice::saved().kind, NoticeKind::Info);
    }
}

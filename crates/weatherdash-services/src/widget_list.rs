//! In-memory ordered collection of the widgets on screen.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use weatherdash_weather::Conditions;

use crate::widget::{Widget, WidgetId};

/// Widget list shared between a view and its refresh loop.
pub type SharedWidgetList = Arc<RwLock<WidgetList>>;

/// Outcome of applying one refresh result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshApply {
    Applied,
    /// A newer tick already updated this widget.
    Stale,
    /// The widget was removed while its fetch was in flight.
    Missing,
}

/// Ordered widgets; ids are unique at all times.
#[derive(Debug, Default, Clone)]
pub struct WidgetList {
    widgets: Vec<Widget>,
    last_tick: HashMap<WidgetId, u64>,
}

impl WidgetList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedWidgetList {
        Arc::new(RwLock::new(self))
    }

    /// Append a widget. Returns false (and leaves the list untouched) when the
    /// id is already present.
    pub fn add(&mut self, widget: Widget) -> bool {
        if self.contains(widget.id) {
            tracing::warn!("Ignoring widget with duplicate id {}", widget.id);
            return false;
        }
        self.widgets.push(widget);
        true
    }

    /// Remove the widget with `id`. Unknown ids are a no-op.
    pub fn remove_by_id(&mut self, id: WidgetId) -> Option<Widget> {
        let index = self.position(id)?;
        self.last_tick.remove(&id);
        Some(self.widgets.remove(index))
    }

    /// Put a widget back at `index` (clamped to the end). Returns false when
    /// the id is already present.
    pub fn insert_at(&mut self, index: usize, widget: Widget) -> bool {
        if self.contains(widget.id) {
            tracing::warn!("Ignoring widget with duplicate id {}", widget.id);
            return false;
        }
        let index = index.min(self.widgets.len());
        self.widgets.insert(index, widget);
        true
    }

    pub fn position(&self, id: WidgetId) -> Option<usize> {
        self.widgets.iter().position(|w| w.id == id)
    }

    /// Replace the whole list, keeping the first widget for any repeated id.
    pub fn replace_all(&mut self, widgets: Vec<Widget>) {
        let mut seen = HashSet::with_capacity(widgets.len());
        let mut kept = Vec::with_capacity(widgets.len());
        for widget in widgets {
            if seen.insert(widget.id) {
                kept.push(widget);
            } else {
                tracing::warn!("Dropping widget with duplicate id {} ({})", widget.id, widget.city);
            }
        }
        self.widgets = kept;
        self.last_tick.clear();
    }

    /// Store refreshed conditions for `id`, unless a newer tick got there first.
    pub fn apply_refresh(&mut self, id: WidgetId, tick: u64, conditions: Conditions) -> RefreshApply {
        let Some(widget) = self.widgets.iter_mut().find(|w| w.id == id) else {
            return RefreshApply::Missing;
        };
        if self.last_tick.get(&id).is_some_and(|&applied| applied > tick) {
            return RefreshApply::Stale;
        }
        widget.weather_data = Some(conditions);
        self.last_tick.insert(id, tick);
        RefreshApply::Applied
    }

    pub fn get(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.widgets.iter().any(|w| w.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Widget> {
        self.widgets.iter()
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Copy of the widgets in insertion order.
    pub fn snapshot(&self) -> Vec<Widget> {
        self.widgets.clone()
    }

    /// Copy of the widgets, most recently added first.
    pub fn latest_first(&self) -> Vec<Widget> {
        self.widgets.iter().rev().cloned().collect()
    }
}

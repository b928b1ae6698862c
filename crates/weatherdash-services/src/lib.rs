//! Dashboard services: widgets, their persistence, background refresh and
//! the search/saved views built on top of them.

pub mod cities;
pub mod dashboard;
pub mod refresh;
pub mod store;
pub mod widget;
pub mod widget_list;

#[cfg(test)]
mod testing;

pub use cities::{CityCatalog, CityOption};
pub use dashboard::{Notice, NoticeKind, SavedView, SearchView, ViewState, NOTICE_AUTO_HIDE};
pub use refresh::{RefreshHandle, RefreshLoop, TickReport};
pub use store::{
    FileKeyValueStore, KeyValueStore, LocalWidgetStore, MemoryKeyValueStore, WidgetStore,
    USER_DATA_KEY,
};
pub use widget::{Widget, WidgetId};
pub use widget_list::{RefreshApply, SharedWidgetList, WidgetList};

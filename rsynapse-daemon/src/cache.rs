use crate::plugin_manager::PluginInstance;
use dashmap::DashMap;
use rsynapse_plugin::{
    ActionFn, Icon, IsDefault, Preview, Query, QueryResult, RefreshFn, RefreshableResult,
    default_action_index,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct CachedAction {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub prevent_hide_after_action: bool,
    pub action: ActionFn,
}

impl IsDefault for CachedAction {
    fn is_default(&self) -> bool {
        self.is_default
    }
}

/// What remains addressable of a result after it was shown, so that its
/// actions and refresh callback can run later.
#[derive(Clone)]
pub struct ResultCacheEntry {
    pub result_id: String,
    pub title: String,
    pub subtitle: String,
    pub icon: Icon,
    pub preview: Preview,
    pub context_data: String,
    pub refresh_interval_ms: u64,
    pub refresh: Option<RefreshFn>,
    pub actions: Vec<CachedAction>,
    pub query: Query,
    // Declared last: callbacks above must drop before the plugin library.
    pub plugin: Arc<PluginInstance>,
}

impl ResultCacheEntry {
    fn new(query: &Query, plugin: &Arc<PluginInstance>, result: &QueryResult) -> Self {
        Self {
            result_id: result.id.clone(),
            title: result.title.clone(),
            subtitle: result.subtitle.clone(),
            icon: result.icon.clone(),
            preview: result.preview.clone(),
            context_data: result.context_data.clone(),
            refresh_interval_ms: result.refresh_interval_ms,
            refresh: result.on_refresh.clone(),
            actions: result
                .actions
                .iter()
                .map(|action| CachedAction {
                    id: action.id.clone(),
                    name: action.name.clone(),
                    is_default: action.is_default,
                    prevent_hide_after_action: action.prevent_hide_after_action,
                    action: Arc::clone(&action.action),
                })
                .collect(),
            query: query.clone(),
            plugin: Arc::clone(plugin),
        }
    }

    /// Position of `action_id` in `actions`, or of the default action when
    /// no id is given.
    pub fn action_index(&self, action_id: Option<&str>) -> Option<usize> {
        match action_id {
            Some(id) => self.actions.iter().position(|action| action.id == id),
            None => default_action_index(&self.actions),
        }
    }

    pub fn to_refreshable(&self) -> RefreshableResult {
        RefreshableResult {
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            icon: self.icon.clone(),
            preview: self.preview.clone(),
            context_data: self.context_data.clone(),
            refresh_interval_ms: self.refresh_interval_ms,
        }
    }
}

impl std::fmt::Debug for ResultCacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCacheEntry")
            .field("result_id", &self.result_id)
            .field("title", &self.title)
            .field("plugin", &self.plugin.name())
            .field("actions", &self.actions.len())
            .finish()
    }
}

/// Result id to entry. Entries are replaced whole behind an `Arc`, so a
/// reader sees either the old entry or the new one.
///
/// There is no eviction: entries live until replaced or [`ResultCache::clear`].
#[derive(Default)]
pub struct ResultCache {
    entries: DashMap<String, Arc<ResultCacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins; nothing of a previous entry with the same id survives.
    pub fn record(&self, query: &Query, plugin: &Arc<PluginInstance>, result: &QueryResult) {
        let entry = ResultCacheEntry::new(query, plugin, result);
        self.entries.insert(entry.result_id.clone(), Arc::new(entry));
    }

    pub fn lookup(&self, result_id: &str) -> Option<Arc<ResultCacheEntry>> {
        self.entries.get(result_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Stores a refreshed snapshot, keeping the callbacks. Returns `false`
    /// if the id is no longer cached.
    pub fn update_refreshable(&self, result_id: &str, refreshed: RefreshableResult) -> bool {
        match self.entries.get_mut(result_id) {
            Some(mut slot) => {
                let mut entry = ResultCacheEntry::clone(slot.value());
                entry.title = refreshed.title;
                entry.subtitle = refreshed.subtitle;
                entry.icon = refreshed.icon;
                entry.preview = refreshed.preview;
                entry.context_data = refreshed.context_data;
                entry.refresh_interval_ms = refreshed.refresh_interval_ms;
                *slot.value_mut() = Arc::new(entry);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

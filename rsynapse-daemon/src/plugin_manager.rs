use anyhow::{Context, Result};
use libloading::{Library, Symbol};
use rsynapse_plugin::{
    GLOBAL_TRIGGER_KEYWORD, Plugin, PluginCommand, Query, QueryKind, QueryResult,
    normalize_refresh_interval,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Plugin properties captured once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PluginMetadata {
    name: String,
    trigger_keywords: Vec<String>,
    commands: Vec<PluginCommand>,
    accepts_selection: bool,
}

pub struct PluginInstance {
    // Dropped before `_library`, which holds the plugin's code.
    plugin: Box<dyn Plugin>,
    metadata: PluginMetadata,
    _library: Option<Arc<Library>>,
}

impl PluginInstance {
    pub fn new(plugin: Box<dyn Plugin>) -> Self {
        Self::with_library(plugin, None)
    }

    fn with_library(plugin: Box<dyn Plugin>, library: Option<Arc<Library>>) -> Self {
        let metadata = PluginMetadata {
            name: plugin.name().to_string(),
            trigger_keywords: plugin.trigger_keywords(),
            commands: plugin.commands(),
            accepts_selection: plugin.accepts_selection(),
        };
        Self {
            plugin,
            metadata,
            _library: library,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn trigger_keywords(&self) -> &[String] {
        &self.metadata.trigger_keywords
    }

    pub fn has_command(&self, command: &str) -> bool {
        self.metadata.commands.iter().any(|c| c.command == command)
    }

    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    fn accepts(&self, query: &Query) -> bool {
        match query.kind {
            QueryKind::Selection => self.metadata.accepts_selection,
            QueryKind::Input if query.is_global_query() => self
                .trigger_keywords()
                .iter()
                .any(|k| k == GLOBAL_TRIGGER_KEYWORD),
            QueryKind::Input => self
                .trigger_keywords()
                .iter()
                .any(|k| *k == query.trigger_keyword),
        }
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Looks up which plugin owns a trigger keyword.
pub trait PluginRegistry {
    fn find_by_trigger_keyword(&self, keyword: &str) -> Option<Arc<PluginInstance>>;
}

impl PluginRegistry for [Arc<PluginInstance>] {
    fn find_by_trigger_keyword(&self, keyword: &str) -> Option<Arc<PluginInstance>> {
        self.iter()
            .find(|instance| instance.trigger_keywords().iter().any(|k| k == keyword))
            .cloned()
    }
}

/// Results of one plugin for one query.
#[derive(Debug)]
pub struct ResultBatch {
    pub plugin: Arc<PluginInstance>,
    pub results: Vec<QueryResult>,
}

/// The two signals a running query reports through: any number of
/// batches, then `done` exactly once.
#[derive(Debug)]
pub struct QueryHandle {
    pub batches: mpsc::UnboundedReceiver<ResultBatch>,
    pub done: oneshot::Receiver<()>,
}

/// The plugin layer as seen by the dispatch engine.
pub trait QueryLayer: PluginRegistry + Send + Sync {
    /// Starts the query on every candidate plugin and returns immediately.
    /// Must be called from within a tokio runtime.
    fn query(&self, query: Query) -> QueryHandle;
}

#[derive(Default)]
pub struct PluginManager {
    instances: Vec<Arc<PluginInstance>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Arc<PluginInstance> {
        let instance = Arc::new(PluginInstance::new(plugin));
        info!(plugin = instance.name(), "Registered plugin");
        self.instances.push(Arc::clone(&instance));
        instance
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Loads every `.so` in `path` that exports `_rsynapse_init`.
    ///
    /// # Safety
    ///
    /// The libraries are trusted to export a constructor with the expected
    /// signature, built against the same `rsynapse-plugin`.
    pub unsafe fn load_plugins_from(&mut self, path: &Path) -> Result<usize> {
        info!(path = %path.display(), "Loading plugins");
        let mut loaded = 0;

        for entry in std::fs::read_dir(path)
            .with_context(|| format!("Failed to read plugin directory at: {:?}", path))?
        {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "so") {
                debug!(path = %path.display(), "Attempting to load library");

                let lib = unsafe { Library::new(&path) }
                    .with_context(|| format!("Failed to open plugin library {:?}", path))?;
                let plugin = {
                    let constructor: Symbol<unsafe extern "C" fn() -> *mut dyn Plugin> =
                        unsafe { lib.get(b"_rsynapse_init") }
                            .with_context(|| format!("Missing _rsynapse_init in {:?}", path))?;
                    unsafe { Box::from_raw(constructor()) }
                };
                let instance = Arc::new(PluginInstance::with_library(plugin, Some(Arc::new(lib))));
                info!(plugin = instance.name(), "Loaded plugin");
                self.instances.push(instance);
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    fn candidates(&self, query: &Query) -> Vec<Arc<PluginInstance>> {
        self.instances
            .iter()
            .filter(|instance| instance.accepts(query))
            .cloned()
            .collect()
    }
}

impl PluginRegistry for PluginManager {
    fn find_by_trigger_keyword(&self, keyword: &str) -> Option<Arc<PluginInstance>> {
        self.instances.as_slice().find_by_trigger_keyword(keyword)
    }
}

impl QueryLayer for PluginManager {
    fn query(&self, query: Query) -> QueryHandle {
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();
        let candidates = self.candidates(&query);
        let query = Arc::new(query);

        tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            for instance in candidates {
                let query = Arc::clone(&query);
                let batch_tx = batch_tx.clone();
                tasks.spawn_blocking(move || {
                    let started = Instant::now();
                    let results: Vec<QueryResult> =
                        instance.plugin().query(&query).into_iter().map(polish).collect();
                    debug!(
                        plugin = instance.name(),
                        count = results.len(),
                        cost_ms = started.elapsed().as_millis() as u64,
                        "Plugin query finished"
                    );
                    // The receiver is gone once the dispatcher stopped listening.
                    let _ = batch_tx.send(ResultBatch {
                        plugin: instance,
                        results,
                    });
                });
            }
            drop(batch_tx);

            while let Some(joined) = tasks.join_next().await {
                if let Err(error) = joined {
                    warn!(%error, "Plugin query task failed");
                }
            }
            let _ = done_tx.send(());
        });

        QueryHandle {
            batches: batch_rx,
            done: done_rx,
        }
    }
}

/// Fills in missing ids and normalizes the refresh interval. The score is
/// left untouched.
fn polish(mut result: QueryResult) -> QueryResult {
    if result.id.is_empty() {
        result.id = Uuid::new_v4().to_string();
    }
    for action in &mut result.actions {
        if action.id.is_empty() {
            action.id = Uuid::new_v4().to_string();
        }
    }
    result.refresh_interval_ms = normalize_refresh_interval(result.refresh_interval_ms);
    result
}

mod query;
mod result;

pub use query::{Query, QueryKind, Selection, SelectionKind};
pub use result::{
    ActionContext, ActionFn, Icon, IsDefault, Preview, QueryResult, QueryResultUi,
    RefreshFn, RefreshableResult, ResultAction, ResultActionUi, default_action_index,
    normalize_refresh_interval,
};

/// Trigger keyword a plugin declares to receive global queries.
pub const GLOBAL_TRIGGER_KEYWORD: &str = "*";

/// A sub-operation a plugin offers after its trigger keyword,
/// e.g. `install` in `wpm install foo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginCommand {
    pub command: String,
    pub description: String,
}

impl PluginCommand {
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: description.into(),
        }
    }
}

/// Implemented by every plugin. A plugin library exports its instance
/// through [`declare_plugin!`].
pub trait Plugin: Send + Sync {

    /// Returns the name of the plugin.
    fn name(&self) -> &'static str;

    /// Keywords routing a query to this plugin. The default only
    /// subscribes to global queries.
    fn trigger_keywords(&self) -> Vec<String> {
        vec![GLOBAL_TRIGGER_KEYWORD.to_string()]
    }

    fn commands(&self) -> Vec<PluginCommand> {
        Vec::new()
    }

    /// Opt in to receive selection queries.
    fn accepts_selection(&self) -> bool {
        false
    }

    /// Called by the daemon to get results for a given query.
    /// Runs on a blocking thread, so it may take its time.
    fn query(&self, query: &Query) -> Vec<QueryResult>;
}

/// Exports the `_rsynapse_init` entry point the daemon looks up when
/// loading a plugin library.
///
/// The entry point returns a fat `*mut dyn Plugin`, which has no C
/// layout, so `improper_ctypes_definitions` is allowed. Both sides are
/// Rust built against the same `rsynapse-plugin`, and the daemon only
/// turns the pointer back into a `Box`.
#[macro_export]
macro_rules! declare_plugin {
    ($ctor:expr) => {
        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub unsafe extern "C" fn _rsynapse_init() -> *mut dyn $crate::Plugin {
            let plugin: Box<dyn $crate::Plugin> = Box::new($ctor);
            Box::into_raw(plugin)
        }
    };
}

pub mod action;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod logging;
pub mod plugin_manager;
pub mod protocol;
pub mod query_parser;

pub use action::{ActionInvoker, InvokedAction};
pub use cache::{CachedAction, ResultCache, ResultCacheEntry};
pub use dispatch::{DispatchEngine, DispatchEvent, DispatchOutcome, DispatchState, QUERY_TIMEOUT};
pub use error::CoreError;
pub use handler::{HotkeyRegistrar, RecordingHotkeys, RequestHandler};
pub use plugin_manager::{
    PluginInstance, PluginManager, PluginRegistry, QueryHandle, QueryLayer,
    ResultBatch,
};
pub use protocol::{Method, Request, Response};

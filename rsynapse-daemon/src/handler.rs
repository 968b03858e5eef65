use crate::action::ActionInvoker;
use crate::cache::ResultCache;
use crate::dispatch::{DispatchEngine, DispatchEvent};
use crate::error::CoreError;
use crate::plugin_manager::QueryLayer;
use crate::protocol::{Method, Request, Response};
use crate::query_parser;
use parking_lot::Mutex;
use rsynapse_plugin::{Query, Selection};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Registers the global launcher hotkey. Talking to the desktop is left
/// to the implementor.
pub trait HotkeyRegistrar: Send + Sync {
    fn register_main_hotkey(&self, hotkey: &str) -> anyhow::Result<()>;
}

/// Remembers the requested hotkey without binding it anywhere.
#[derive(Default)]
pub struct RecordingHotkeys {
    current: Mutex<Option<String>>,
}

impl RecordingHotkeys {
    pub fn current(&self) -> Option<String> {
        self.current.lock().clone()
    }
}

impl HotkeyRegistrar for RecordingHotkeys {
    fn register_main_hotkey(&self, hotkey: &str) -> anyhow::Result<()> {
        if hotkey.trim().is_empty() {
            anyhow::bail!("hotkey is empty");
        }
        info!(hotkey, "Main hotkey registered");
        *self.current.lock() = Some(hotkey.to_string());
        Ok(())
    }
}

/// Routes transport requests to the query core and answers each through
/// a response sink.
pub struct RequestHandler {
    engine: DispatchEngine,
    invoker: ActionInvoker,
    hotkeys: Arc<dyn HotkeyRegistrar>,
}

impl RequestHandler {
    pub fn new(layer: Arc<dyn QueryLayer>, hotkeys: Arc<dyn HotkeyRegistrar>) -> Self {
        let cache = Arc::new(ResultCache::new());
        Self {
            engine: DispatchEngine::new(layer, Arc::clone(&cache)),
            invoker: ActionInvoker::new(cache),
            hotkeys,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        self.engine.cache()
    }

    pub async fn handle_json(&self, payload: &str, sink: &mpsc::Sender<Response>) {
        match Request::from_json(payload) {
            Ok(request) => self.handle(request, sink).await,
            Err(error) => {
                error!(%error, "Invalid request payload");
                let _ = sink.send(Response::error(&Request::default(), &error)).await;
            }
        }
    }

    pub async fn handle(&self, mut request: Request, sink: &mpsc::Sender<Response>) {
        request.ensure_id();
        let method = match request.method.parse::<Method>() {
            Ok(method) => method,
            Err(e) => return reply_error(&request, e, sink).await,
        };

        match method {
            Method::Query => self.handle_query(&request, sink).await,
            Method::QuerySelection => self.handle_query_selection(&request, sink).await,
            Method::Action => self.handle_action(&request, sink).await,
            Method::Refresh => self.handle_refresh(&request, sink).await,
            Method::RegisterMainHotkey => self.handle_register_main_hotkey(&request, sink).await,
        }
    }

    async fn handle_query(&self, request: &Request, sink: &mpsc::Sender<Response>) {
        let raw = match request.param("query") {
            Ok(raw) => raw.to_string(),
            Err(e) => return reply_error(request, e, sink).await,
        };
        self.stream(request, Pending::Raw(raw), sink).await;
    }

    async fn handle_query_selection(&self, request: &Request, sink: &mpsc::Sender<Response>) {
        let selection = if let Some(text) = request.optional_param("text") {
            Selection::text(text)
        } else if let Some(files) = request.optional_param("files") {
            Selection::files(files.lines().map(PathBuf::from).collect())
        } else {
            return reply_error(request, CoreError::MissingParameter("text"), sink).await;
        };
        let query = query_parser::parse_selection(selection);
        self.stream(request, Pending::Built(query), sink).await;
    }

    async fn stream(&self, request: &Request, pending: Pending, sink: &mpsc::Sender<Response>) {
        let (events_tx, events_rx) = mpsc::channel(16);

        let dispatching = async {
            let events_tx = events_tx;
            match pending {
                Pending::Raw(raw) => self.engine.dispatch(&request.id, &raw, &events_tx).await,
                Pending::Built(query) => {
                    self.engine
                        .dispatch_query(&request.id, query, &events_tx)
                        .await
                }
            }
        };
        let forwarding = async {
            let mut events_rx = events_rx;
            while let Some(event) = events_rx.recv().await {
                let response = match event {
                    DispatchEvent::Batch(results) => Response::success(request, &results),
                    DispatchEvent::Timeout { query, request_id } => Response::error(
                        request,
                        &CoreError::QueryTimeout { query, request_id },
                    ),
                };
                if sink.send(response).await.is_err() {
                    break;
                }
            }
        };

        tokio::join!(dispatching, forwarding);
    }

    async fn handle_action(&self, request: &Request, sink: &mpsc::Sender<Response>) {
        let result_id = match request.param("id") {
            Ok(id) => id,
            Err(e) => return reply_error(request, e, sink).await,
        };
        match self.invoker.invoke(result_id, request.optional_param("actionId")).await {
            Ok(invoked) => {
                let data = json!({
                    "actionId": invoked.action_id,
                    "preventHideAfterAction": invoked.prevent_hide_after_action,
                });
                let _ = sink.send(Response::success(request, &data)).await;
            }
            Err(e) => reply_error(request, e, sink).await,
        }
    }

    async fn handle_refresh(&self, request: &Request, sink: &mpsc::Sender<Response>) {
        let result_id = match request.param("id") {
            Ok(id) => id,
            Err(e) => return reply_error(request, e, sink).await,
        };
        match self.invoker.refresh(result_id).await {
            Ok(refreshed) => {
                let _ = sink.send(Response::success(request, &refreshed)).await;
            }
            Err(e) => reply_error(request, e, sink).await,
        }
    }

    async fn handle_register_main_hotkey(&self, request: &Request, sink: &mpsc::Sender<Response>) {
        let hotkey = match request.param("hotkey") {
            Ok(hotkey) => hotkey,
            Err(e) => return reply_error(request, e, sink).await,
        };
        let response = match self.hotkeys.register_main_hotkey(hotkey) {
            Ok(()) => Response::empty_success(request),
            Err(e) => Response::error(request, &e),
        };
        let _ = sink.send(response).await;
    }
}

enum Pending {
    Raw(String),
    Built(Query),
}

async fn reply_error(request: &Request, error: CoreError, sink: &mpsc::Sender<Response>) {
    error!(request_id = %request.id, method = %request.method, %error, "Request failed");
    let _ = sink.send(Response::error(request, &error)).await;
}

use anyhow::Result;
use rsynapse_daemon::config::Settings;
use rsynapse_daemon::{PluginManager, RecordingHotkeys, Request, RequestHandler, Response};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use zbus::{ConnectionBuilder, SignalContext, interface};

struct Engine {
    handler: Arc<RequestHandler>,
}

#[interface(name = "org.rsynapse.Engine1")]
impl Engine {
    /// Accepts one JSON request and returns its id. Every response is
    /// delivered later through the `Response` signal.
    async fn request(
        &self,
        payload: String,
        #[zbus(signal_context)] ctxt: SignalContext<'_>,
    ) -> String {
        let mut request = match Request::from_json(&payload) {
            Ok(request) => request,
            Err(error) => {
                warn!(%error, "Rejecting malformed request");
                emit(&ctxt, &Response::error(&Request::default(), &error)).await;
                return String::new();
            }
        };
        let id = request.ensure_id().to_string();

        let handler = Arc::clone(&self.handler);
        let ctxt = ctxt.to_owned();
        tokio::spawn(async move {
            let (tx, mut rx) = mpsc::channel::<Response>(16);
            let handling = async move { handler.handle(request, &tx).await };
            let emitting = async {
                while let Some(response) = rx.recv().await {
                    emit(&ctxt, &response).await;
                }
            };
            tokio::join!(handling, emitting);
        });

        id
    }

    #[zbus(signal)]
    async fn response(ctxt: &SignalContext<'_>, payload: &str) -> zbus::Result<()>;
}

async fn emit(ctxt: &SignalContext<'_>, response: &Response) {
    match serde_json::to_string(response) {
        Ok(payload) => {
            if let Err(e) = Engine::response(ctxt, &payload).await {
                error!(error = %e, request_id = %response.id, "Failed to emit response");
            }
        }
        Err(e) => error!(error = %e, request_id = %response.id, "Failed to encode response"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    rsynapse_daemon::logging::init(&settings.logging)?;

    info!("Daemon starting up. Determining plugin path...");
    let mut manager = PluginManager::new();
    match settings.plugin_dir() {
        Some(plugin_path) if plugin_path.exists() => {
            let loaded = unsafe { manager.load_plugins_from(&plugin_path)? };
            info!(loaded, "Plugins loaded");
        }
        Some(plugin_path) => {
            warn!(path = %plugin_path.display(), "Plugin directory does not exist");
        }
        None => error!("Could not determine plugin path"),
    }

    if manager.is_empty() {
        warn!("No plugins loaded. The daemon will not return any results.");
    }

    let handler = RequestHandler::new(Arc::new(manager), Arc::new(RecordingHotkeys::default()));
    let engine = Engine {
        handler: Arc::new(handler),
    };

    let _conn = ConnectionBuilder::session()?
        .name("com.rsynapse.Engine")?
        .serve_at("/org/rsynapse/Engine1", engine)?
        .build()
        .await?;

    info!("rsynapse server is running.");
    std::future::pending::<()>().await;

    Ok(())
}

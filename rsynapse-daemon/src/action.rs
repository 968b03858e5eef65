use crate::cache::{ResultCache, ResultCacheEntry};
use crate::error::CoreError;
use rsynapse_plugin::{ActionContext, RefreshableResult, normalize_refresh_interval};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a triggered action. Hiding the launcher afterwards is up to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokedAction {
    pub result_id: String,
    pub action_id: String,
    pub prevent_hide_after_action: bool,
}

/// Runs the callbacks of cached results. Callbacks are plugin code, so they
/// run on the blocking pool like `Plugin::query`.
pub struct ActionInvoker {
    cache: Arc<ResultCache>,
}

impl ActionInvoker {
    pub fn new(cache: Arc<ResultCache>) -> Self {
        Self { cache }
    }

    /// Runs `action_id` on the cached result, or its default action when no
    /// id is given.
    pub async fn invoke(
        &self,
        result_id: &str,
        action_id: Option<&str>,
    ) -> Result<InvokedAction, CoreError> {
        let entry = self.lookup(result_id)?;
        let index = entry
            .action_index(action_id)
            .ok_or_else(|| CoreError::ActionNotFound {
                result_id: result_id.to_string(),
                action_id: action_id.unwrap_or_default().to_string(),
            })?;

        let action = &entry.actions[index];
        info!(
            result_id,
            action = %action.name,
            plugin = entry.plugin.name(),
            "Executing action"
        );
        let invoked = InvokedAction {
            result_id: result_id.to_string(),
            action_id: action.id.clone(),
            prevent_hide_after_action: action.prevent_hide_after_action,
        };

        let context = ActionContext {
            context_data: entry.context_data.clone(),
        };
        // The entry travels with the callback so its plugin stays loaded
        // even if the cache supersedes it meanwhile.
        run_callback(result_id, move || (entry.actions[index].action)(&context)).await?;
        Ok(invoked)
    }

    /// Asks the owning plugin for a fresh snapshot of the result and stores
    /// it. Results without a refresh callback come back unchanged.
    pub async fn refresh(&self, result_id: &str) -> Result<RefreshableResult, CoreError> {
        let entry = self.lookup(result_id)?;
        let current = entry.to_refreshable();
        if entry.refresh.is_none() {
            return Ok(current);
        }

        let mut refreshed = run_callback(result_id, move || match entry.refresh.as_ref() {
            Some(refresh) => refresh(current),
            None => current,
        })
        .await?;
        refreshed.refresh_interval_ms = normalize_refresh_interval(refreshed.refresh_interval_ms);
        debug!(result_id, title = %refreshed.title, "Refreshed result");

        if !self.cache.update_refreshable(result_id, refreshed.clone()) {
            return Err(CoreError::ResultNotFound(result_id.to_string()));
        }
        Ok(refreshed)
    }

    fn lookup(&self, result_id: &str) -> Result<Arc<ResultCacheEntry>, CoreError> {
        self.cache
            .lookup(result_id)
            .ok_or_else(|| CoreError::ResultNotFound(result_id.to_string()))
    }
}

async fn run_callback<F, T>(result_id: &str, callback: F) -> Result<T, CoreError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(callback).await.map_err(|e| {
        warn!(result_id, error = %e, "Plugin callback failed");
        CoreError::CallbackFailed {
            result_id: result_id.to_string(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin_manager::PluginInstance;
    use rsynapse_plugin::{Plugin, Query, QueryResult, ResultAction};
    use parking_lot::Mutex;

    struct Noop;

    impl Plugin for Noop {
        fn name(&self) -> &'static str {
            "Noop"
        }

        fn query(&self, _query: &Query) -> Vec<QueryResult> {
            Vec::new()
        }
    }

    fn recording_action(id: &str, log: &Arc<Mutex<Vec<String>>>) -> ResultAction {
        let log = Arc::clone(log);
        let name = id.to_string();
        let mut action = ResultAction::new(id, move |ctx: &ActionContext| {
            log.lock().push(format!("{name}:{}", ctx.context_data));
        });
        action.id = id.to_string();
        action
    }

    fn setup(result: QueryResult) -> (ActionInvoker, Arc<ResultCache>) {
        let cache = Arc::new(ResultCache::new());
        let plugin = Arc::new(PluginInstance::new(Box::new(Noop)));
        cache.record(&Query::input("q"), &plugin, &result);
        (ActionInvoker::new(Arc::clone(&cache)), cache)
    }

    #[tokio::test]
    async fn unknown_result_is_not_found() {
        let invoker = ActionInvoker::new(Arc::new(ResultCache::new()));
        assert_eq!(
            invoker.invoke("ghost", None).await,
            Err(CoreError::ResultNotFound("ghost".to_string()))
        );
        assert_eq!(
            invoker.refresh("ghost").await,
            Err(CoreError::ResultNotFound("ghost".to_string()))
        );
    }

    #[tokio::test]
    async fn runs_default_action_with_context_data() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut result = QueryResult::new("Firefox");
        result.id = "r1".to_string();
        result.context_data = "firefox.desktop".to_string();
        result.actions.push(recording_action("open", &log));
        let mut copy = recording_action("copy", &log);
        copy.is_default = true;
        copy.prevent_hide_after_action = true;
        result.actions.push(copy);
        let (invoker, _cache) = setup(result);

        let invoked = invoker.invoke("r1", None).await.unwrap();
        assert_eq!(invoked.action_id, "copy");
        assert!(invoked.prevent_hide_after_action);

        invoker.invoke("r1", Some("open")).await.unwrap();
        assert_eq!(
            *log.lock(),
            vec!["copy:firefox.desktop", "open:firefox.desktop"]
        );
    }

    #[tokio::test]
    async fn first_action_is_default_without_flag() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut result = QueryResult::new("Calc");
        result.id = "r1".to_string();
        result.actions.push(recording_action("first", &log));
        result.actions.push(recording_action("second", &log));
        let (invoker, _cache) = setup(result);

        assert_eq!(invoker.invoke("r1", None).await.unwrap().action_id, "first");
    }

    #[tokio::test]
    async fn unknown_or_missing_action_is_not_found() {
        let mut result = QueryResult::new("Bare");
        result.id = "bare".to_string();
        let (invoker, _cache) = setup(result);

        assert!(matches!(
            invoker.invoke("bare", None).await,
            Err(CoreError::ActionNotFound { .. })
        ));
        assert_eq!(
            invoker.invoke("bare", Some("nope")).await,
            Err(CoreError::ActionNotFound {
                result_id: "bare".to_string(),
                action_id: "nope".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn refresh_updates_cached_snapshot() {
        let mut result = QueryResult::new("0");
        result.id = "counter".to_string();
        result.refresh_interval_ms = 1000;
        result.on_refresh = Some(Arc::new(|mut current: RefreshableResult| {
            let n: u32 = current.title.parse().unwrap_or(0);
            current.title = (n + 1).to_string();
            current.refresh_interval_ms = 1234;
            current
        }));
        let (invoker, cache) = setup(result);

        let refreshed = invoker.refresh("counter").await.unwrap();
        assert_eq!(refreshed.title, "1");
        assert_eq!(refreshed.refresh_interval_ms, 1200);
        assert_eq!(invoker.refresh("counter").await.unwrap().title, "2");
        assert_eq!(cache.lookup("counter").unwrap().title, "2");
    }

    #[tokio::test]
    async fn refresh_without_callback_returns_current() {
        let mut result = QueryResult::new("static");
        result.id = "s".to_string();
        let (invoker, _cache) = setup(result);

        assert_eq!(invoker.refresh("s").await.unwrap().title, "static");
    }

    #[tokio::test]
    async fn panicking_callbacks_become_errors() {
        let mut result = QueryResult::new("Broken");
        result.id = "broken".to_string();
        let mut action = ResultAction::new("Crash", |_: &ActionContext| panic!("action bug"));
        action.id = "crash".to_string();
        result.actions.push(action);
        result.on_refresh = Some(Arc::new(|_: RefreshableResult| -> RefreshableResult {
            panic!("refresh bug")
        }));
        let (invoker, cache) = setup(result);

        assert!(matches!(
            invoker.invoke("broken", None).await,
            Err(CoreError::CallbackFailed { result_id, .. }) if result_id == "broken"
        ));
        assert!(matches!(
            invoker.refresh("broken").await,
            Err(CoreError::CallbackFailed { .. })
        ));
        assert_eq!(cache.lookup("broken").unwrap().title, "Broken");
    }

    #[tokio::test]
    async fn slow_action_leaves_runtime_responsive() {
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let mut result = QueryResult::new("Slow");
        result.id = "slow".to_string();
        let mut action = ResultAction::new("Wait", move |_: &ActionContext| {
            let _ = started_tx.send(());
            let _ = release_rx.lock().recv();
        });
        action.id = "wait".to_string();
        result.actions.push(action);
        let (invoker, _cache) = setup(result);
        let invoker = Arc::new(invoker);

        let running = tokio::spawn({
            let invoker = Arc::clone(&invoker);
            async move { invoker.invoke("slow", None).await }
        });
        tokio::task::spawn_blocking(move || started_rx.recv())
            .await
            .unwrap()
            .unwrap();

        // The current-thread runtime still makes progress while the action blocks.
        tokio::task::yield_now().await;
        assert!(!running.is_finished());
        release_tx.send(()).unwrap();
        assert_eq!(running.await.unwrap().unwrap().action_id, "wait");
    }
}

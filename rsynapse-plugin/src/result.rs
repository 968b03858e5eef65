use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Called when the user triggers an action on a result.
pub type ActionFn = Arc<dyn Fn(&ActionContext) + Send + Sync>;

/// Produces an updated snapshot of a result that asked to be refreshed.
pub type RefreshFn = Arc<dyn Fn(RefreshableResult) -> RefreshableResult + Send + Sync>;

/// Icon payload. The daemon never looks inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icon {
    pub kind: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub kind: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionContext {
    /// Context data of the result the action belongs to.
    pub context_data: String,
}

/// One candidate answer a plugin returns for a query.
#[derive(Clone, Default)]
pub struct QueryResult {
    /// Optional. A random id is assigned when left empty.
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub icon: Icon,
    pub preview: Preview,
    /// Higher sorts first.
    pub score: i64,
    /// Passed back to the action callbacks.
    pub context_data: String,
    pub actions: Vec<ResultAction>,
    /// 0 disables refreshing. Other values are rounded to the nearest
    /// multiple of 100, see [`normalize_refresh_interval`].
    pub refresh_interval_ms: u64,
    pub on_refresh: Option<RefreshFn>,
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("subtitle", &self.subtitle)
            .field("score", &self.score)
            .field("context_data", &self.context_data)
            .field("actions", &self.actions)
            .field("refresh_interval_ms", &self.refresh_interval_ms)
            .field("on_refresh", &self.on_refresh.is_some())
            .finish()
    }
}

impl QueryResult {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn default_action(&self) -> Option<&ResultAction> {
        default_action_index(&self.actions).map(|i| &self.actions[i])
    }

    /// Callback-free copy sent to the presentation layer.
    pub fn to_ui(&self, query_id: &str) -> QueryResultUi {
        QueryResultUi {
            query_id: query_id.to_string(),
            id: self.id.clone(),
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            icon: self.icon.clone(),
            preview: self.preview.clone(),
            score: self.score,
            context_data: self.context_data.clone(),
            actions: self
                .actions
                .iter()
                .map(|action| ResultActionUi {
                    id: action.id.clone(),
                    name: action.name.clone(),
                    icon: action.icon.clone(),
                    is_default: action.is_default,
                    prevent_hide_after_action: action.prevent_hide_after_action,
                })
                .collect(),
            refresh_interval_ms: self.refresh_interval_ms,
        }
    }
}

#[derive(Clone)]
pub struct ResultAction {
    /// Optional. A random id is assigned when left empty.
    pub id: String,
    pub name: String,
    pub icon: Icon,
    /// At most one action per result should set this. Without one, the
    /// first action is the default.
    pub is_default: bool,
    /// Keep the launcher window open after the action ran.
    pub prevent_hide_after_action: bool,
    pub action: ActionFn,
}

impl ResultAction {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&ActionContext) + Send + Sync + 'static,
    {
        Self {
            id: String::new(),
            name: name.into(),
            icon: Icon::default(),
            is_default: false,
            prevent_hide_after_action: false,
            action: Arc::new(action),
        }
    }
}

impl fmt::Debug for ResultAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultAction")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("is_default", &self.is_default)
            .field("prevent_hide_after_action", &self.prevent_hide_after_action)
            .finish()
    }
}

/// The part of a result a refresh callback may rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshableResult {
    pub title: String,
    pub subtitle: String,
    pub icon: Icon,
    pub preview: Preview,
    pub context_data: String,
    pub refresh_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultUi {
    pub query_id: String,
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub icon: Icon,
    pub preview: Preview,
    pub score: i64,
    pub context_data: String,
    pub actions: Vec<ResultActionUi>,
    pub refresh_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultActionUi {
    pub id: String,
    pub name: String,
    pub icon: Icon,
    pub is_default: bool,
    pub prevent_hide_after_action: bool,
}

/// Index of the action marked default, falling back to the first one.
pub fn default_action_index<T: IsDefault>(actions: &[T]) -> Option<usize> {
    if actions.is_empty() {
        return None;
    }
    Some(actions.iter().position(|a| a.is_default()).unwrap_or(0))
}

/// Anything carrying an `is_default` flag.
pub trait IsDefault {
    fn is_default(&self) -> bool;
}

impl IsDefault for ResultAction {
    fn is_default(&self) -> bool {
        self.is_default
    }
}

/// Rounds to the nearest multiple of 100, halves rounding up. 0 stays 0,
/// and any other value never rounds below 100.
pub fn normalize_refresh_interval(ms: u64) -> u64 {
    if ms == 0 {
        return 0;
    }
    (ms.saturating_add(50) / 100 * 100).max(100)
}

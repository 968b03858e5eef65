use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// Text typed by the user.
    Input,
    /// Content the user selected or dropped onto the launcher.
    Selection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionKind {
    Text,
    File,
    Image,
}

/// User selected or drag-dropped data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub kind: SelectionKind,
    pub text: String,
    pub file_paths: Vec<PathBuf>,
}

impl Selection {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: SelectionKind::Text,
            text: text.into(),
            file_paths: Vec::new(),
        }
    }

    pub fn files(paths: Vec<PathBuf>) -> Self {
        Self {
            kind: SelectionKind::File,
            text: String::new(),
            file_paths: paths,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SelectionKind::Text => f.write_str(&self.text),
            SelectionKind::File => {
                let joined = self
                    .file_paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join("\n");
                f.write_str(&joined)
            }
            SelectionKind::Image => f.write_str("<image>"),
        }
    }
}

/// A parsed user request, handed to every candidate plugin.
///
/// Only the fields matching `kind` are meaningful: `raw_query`,
/// `trigger_keyword`, `command` and `search` for [`QueryKind::Input`],
/// `selection` for [`QueryKind::Selection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub kind: QueryKind,
    /// Includes the trigger keyword, if any. Plugins should prefer `search`.
    pub raw_query: String,
    /// Empty for a global query.
    pub trigger_keyword: String,
    pub command: String,
    pub search: String,
    pub selection: Option<Selection>,
}

impl Query {
    /// An unrouted input query whose search term is the whole text.
    pub fn input(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            kind: QueryKind::Input,
            search: raw.clone(),
            raw_query: raw,
            trigger_keyword: String::new(),
            command: String::new(),
            selection: None,
        }
    }

    pub fn selection(selection: Selection) -> Self {
        Self {
            kind: QueryKind::Selection,
            raw_query: String::new(),
            trigger_keyword: String::new(),
            command: String::new(),
            search: String::new(),
            selection: Some(selection),
        }
    }

    pub fn is_global_query(&self) -> bool {
        self.kind == QueryKind::Input && self.trigger_keyword.is_empty()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, &self.selection) {
            (QueryKind::Input, _) => f.write_str(&self.raw_query),
            (QueryKind::Selection, Some(selection)) => fmt::Display::fmt(selection, f),
            (QueryKind::Selection, None) => Ok(()),
        }
    }
}

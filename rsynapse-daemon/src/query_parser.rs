//! Turns raw launcher input into a routed [`Query`].
//!
//! The first space separated term may be a plugin trigger keyword. When it
//! is, and the input contains at least one space, the query is routed to
//! that plugin and the second term may name one of its commands. Anything
//! else is a global query whose search term is the whole input.

use crate::plugin_manager::PluginRegistry;
use rsynapse_plugin::{Query, QueryKind, Selection};

pub fn parse<R>(raw: &str, registry: &R) -> Query
where
    R: PluginRegistry + ?Sized,
{
    if raw.is_empty() {
        return Query::input("");
    }

    // Consecutive spaces yield empty terms; they are kept as-is.
    let terms: Vec<&str> = raw.split(' ').collect();
    let possible_trigger = terms[0];

    let instance = match registry.find_by_trigger_keyword(possible_trigger) {
        // A bare keyword without any space is ambiguous with a plain search.
        Some(instance) if raw.contains(' ') => instance,
        _ => return Query::input(raw),
    };

    let (command, search) = match terms.len() {
        1 => (String::new(), String::new()),
        // "wpm install" searches for "install"; only "wpm install foo" runs the command.
        2 => (String::new(), terms[1].to_string()),
        _ if instance.has_command(terms[1]) => (terms[1].to_string(), terms[2..].join(" ")),
        _ => (String::new(), terms[1..].join(" ")),
    };

    Query {
        kind: QueryKind::Input,
        raw_query: raw.to_string(),
        trigger_keyword: possible_trigger.to_string(),
        command,
        search,
        selection: None,
    }
}

pub fn parse_selection(selection: Selection) -> Query {
    Query::selection(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin_manager::PluginInstance;
    use rsynapse_plugin::{Plugin, PluginCommand, QueryResult};
    use std::sync::Arc;

    struct Wpm;

    impl Plugin for Wpm {
        fn name(&self) -> &'static str {
            "Plugin Manager"
        }

        fn trigger_keywords(&self) -> Vec<String> {
            vec!["wpm".to_string()]
        }

        fn commands(&self) -> Vec<PluginCommand> {
            vec![
                PluginCommand::new("install", "Install plugins"),
                PluginCommand::new("uninstall", "Uninstall plugins"),
            ]
        }

        fn query(&self, _query: &Query) -> Vec<QueryResult> {
            Vec::new()
        }
    }

    fn registry() -> Vec<Arc<PluginInstance>> {
        vec![Arc::new(PluginInstance::new(Box::new(Wpm)))]
    }

    fn parts(query: &Query) -> (&str, &str, &str) {
        (
            query.trigger_keyword.as_str(),
            query.command.as_str(),
            query.search.as_str(),
        )
    }

    #[test]
    fn empty_input_is_an_empty_input_query() {
        let query = parse("", registry().as_slice());
        assert_eq!(query.kind, QueryKind::Input);
        assert_eq!(parts(&query), ("", "", ""));
        assert_eq!(query.raw_query, "");
    }

    #[test]
    fn keyword_command_and_search() {
        let query = parse("wpm install foo", registry().as_slice());
        assert_eq!(parts(&query), ("wpm", "install", "foo"));
        assert_eq!(query.raw_query, "wpm install foo");
    }

    #[test]
    fn single_word_after_keyword_is_search() {
        let query = parse("wpm install", registry().as_slice());
        assert_eq!(parts(&query), ("wpm", "", "install"));
    }

    #[test]
    fn bare_keyword_falls_back_to_global_search() {
        let query = parse("wpm", registry().as_slice());
        assert_eq!(parts(&query), ("", "", "wpm"));
        assert!(query.is_global_query());
    }

    #[test]
    fn keyword_with_trailing_space_routes_without_search() {
        let query = parse("wpm ", registry().as_slice());
        assert_eq!(parts(&query), ("wpm", "", ""));
        assert!(!query.is_global_query());
    }

    #[test]
    fn unknown_second_term_joins_into_search() {
        let query = parse("wpm foo bar baz", registry().as_slice());
        assert_eq!(parts(&query), ("wpm", "", "foo bar baz"));
    }

    #[test]
    fn command_with_multi_word_search() {
        let query = parse("wpm uninstall clipboard history", registry().as_slice());
        assert_eq!(parts(&query), ("wpm", "uninstall", "clipboard history"));
    }

    #[test]
    fn consecutive_spaces_are_not_collapsed() {
        // terms: ["wpm", "", "install", "foo"]
        let query = parse("wpm  install foo", registry().as_slice());
        assert_eq!(parts(&query), ("wpm", "", " install foo"));

        // terms: ["wpm", "install", "", "foo"]
        let query = parse("wpm install  foo", registry().as_slice());
        assert_eq!(parts(&query), ("wpm", "install", " foo"));

        // terms: ["wpm", "", ""]
        let query = parse("wpm  ", registry().as_slice());
        assert_eq!(parts(&query), ("wpm", "", " "));
    }

    #[test]
    fn unregistered_first_term_is_global() {
        let query = parse("firefox private window", registry().as_slice());
        assert_eq!(parts(&query), ("", "", "firefox private window"));
    }

    #[test]
    fn input_without_space_is_never_routed() {
        let registry = registry();
        for raw in ["wpm", "install", "wpminstall", "a", "wpm\tinstall"] {
            let query = parse(raw, registry.as_slice());
            assert_eq!(parts(&query), ("", "", raw), "input {raw:?}");
        }
    }

    #[test]
    fn parsing_is_deterministic() {
        let registry = registry();
        for raw in ["", "wpm", "wpm ", "wpm install", "wpm install foo", "x y z"] {
            assert_eq!(parse(raw, registry.as_slice()), parse(raw, registry.as_slice()));
        }
    }

    #[test]
    fn selection_is_wrapped_unchanged() {
        let query = parse_selection(Selection::text("copied text"));
        assert_eq!(query.kind, QueryKind::Selection);
        assert_eq!(query.to_string(), "copied text");
    }
}

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::resolve::ResolutionContext;

/// A compiled triage query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryPredicate {
    pub label_excludes: Vec<String>,
    /// Board field name to required value, as typed.
    pub field_filters: BTreeMap<String, String>,
    /// Board fields that must be absent or empty.
    pub field_excludes: BTreeSet<String>,
    /// Free-text tokens, in order. Only used by the repository search.
    pub search_terms: Vec<String>,
}

impl QueryPredicate {
    pub fn has_field_predicates(&self) -> bool {
        !self.field_filters.is_empty() || !self.field_excludes.is_empty()
    }

    /// Search string for the repository listing: free text plus a
    /// `-label:"X"` qualifier per excluded label, so exclusion happens
    /// before the listing limit applies.
    pub fn search(&self) -> Option<String> {
        let qualifiers = self
            .label_excludes
            .iter()
            .map(|label| format!("-label:\"{label}\""));
        let parts: Vec<String> = self.search_terms.iter().cloned().chain(qualifiers).collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

enum Token<'q> {
    LabelExclude(&'q str),
    HasExclude(&'q str),
    Filter(&'q str, &'q str),
    Text(&'q str),
}

fn classify(token: &str) -> Token<'_> {
    if let Some(label) = token.strip_prefix("-label:") {
        Token::LabelExclude(label)
    } else if let Some(key) = token.strip_prefix("-has:") {
        Token::HasExclude(key)
    } else if let Some((key, value)) = token.split_once(':') {
        Token::Filter(key, value)
    } else {
        Token::Text(token)
    }
}

/// Field keys a query mentions, so the schema can be loaded before compiling.
pub fn referenced_keys(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .filter_map(|token| match classify(token) {
            Token::HasExclude(key) | Token::Filter(key, _) if !key.is_empty() => {
                Some(key.to_string())
            }
            _ => None,
        })
        .collect()
}

/// Compile `query` against the board schema.
///
/// Field keys that match neither a board field nor a configured alias key are
/// dropped, which broadens the match instead of failing the run.
pub fn compile(query: &str, ctx: &ResolutionContext<'_>) -> QueryPredicate {
    let mut predicate = QueryPredicate::default();

    for token in query.split_whitespace() {
        match classify(token) {
            Token::LabelExclude(label) => {
                if !label.is_empty() {
                    predicate.label_excludes.push(label.to_string());
                }
            }
            Token::HasExclude(key) => match ctx.board_field_name(key) {
                Some(field) => {
                    predicate.field_excludes.insert(field);
                }
                None => tracing::debug!(key, "dropping -has: for unknown field"),
            },
            Token::Filter(key, value) => {
                if key.is_empty() || value.is_empty() {
                    continue;
                }
                match ctx.board_field_name(key) {
                    Some(field) => {
                        predicate.field_filters.insert(field, value.to_string());
                    }
                    None => tracing::debug!(key, "dropping filter for unknown field"),
                }
            }
            Token::Text(text) => predicate.search_terms.push(text.to_string()),
        }
    }

    predicate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::mock::sample_fields;
    use crate::config::FieldMapping;
    use crate::resolve::{FieldAliasMap, SchemaCache};

    fn compile_with_sample(query: &str) -> QueryPredicate {
        let schema = SchemaCache::new(sample_fields());
        let mut mappings = BTreeMap::new();
        mappings.insert(
            "size".to_string(),
            FieldMapping {
                field: "Estimate".into(),
                values: BTreeMap::new(),
            },
        );
        let aliases = FieldAliasMap::new(&mappings);
        compile(query, &ResolutionContext::new(&schema, &aliases))
    }

    #[test]
    fn label_exclude_only() {
        let p = compile_with_sample("-label:pm-tracked");
        assert_eq!(p.label_excludes, vec!["pm-tracked"]);
        assert!(p.field_filters.is_empty());
        assert!(p.field_excludes.is_empty());
        assert!(!p.has_field_predicates());
    }

    #[test]
    fn filter_and_has_resolve_to_board_names() {
        let p = compile_with_sample("status:backlog -has:estimate");
        assert_eq!(p.field_filters.len(), 1);
        assert_eq!(p.field_filters["Status"], "backlog");
        assert_eq!(p.field_excludes.iter().collect::<Vec<_>>(), vec!["Estimate"]);
        assert!(p.label_excludes.is_empty());
    }

    #[test]
    fn alias_key_maps_to_board_field() {
        let p = compile_with_sample("-has:size");
        assert!(p.field_excludes.contains("Estimate"));
    }

    #[test]
    fn unknown_fields_are_dropped() {
        let p = compile_with_sample("sprint:12 -has:milestone priority:P1");
        assert_eq!(p.field_filters.len(), 1);
        assert_eq!(p.field_filters["Priority"], "P1");
        assert!(p.field_excludes.is_empty());
    }

    #[test]
    fn free_text_is_kept_for_search() {
        let p = compile_with_sample("login crash -label:wontfix");
        assert_eq!(p.search_terms, vec!["login", "crash"]);
        assert_eq!(p.label_excludes, vec!["wontfix"]);
        assert_eq!(p.search().as_deref(), Some("login crash -label:\"wontfix\""));
    }

    #[test]
    fn empty_pieces_are_ignored() {
        let p = compile_with_sample("-label: status: :x");
        assert_eq!(p, QueryPredicate::default());
    }

    #[test]
    fn value_keeps_text_after_first_colon() {
        let p = compile_with_sample("notes:see:here");
        assert_eq!(p.field_filters["Notes"], "see:here");
    }

    #[test]
    fn referenced_keys_lists_field_tokens() {
        assert_eq!(
            referenced_keys("status:ready -has:Estimate -label:x words"),
            vec!["status", "Estimate"]
        );
    }
}

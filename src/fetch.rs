use std::collections::{BTreeMap, BTreeSet};

use crate::board::{BoardApi, FieldValueNode, IssueFilter, ItemNode, DEFAULT_PAGE_SIZE};
use crate::error::BoardError;
use crate::model::field::{FieldDataType, FieldValue, ResolvedValue};
use crate::model::item::BoardItem;
use crate::query::QueryPredicate;
use crate::resolve::{parse_number_prefix, ResolutionContext};

/// Limit used for the repository listing when the caller sets none.
const DEFAULT_ISSUE_LIMIT: usize = 100;

/// Collects board items matching a predicate. Every call paginates from the
/// start.
pub struct ItemFetcher<'a> {
    api: &'a dyn BoardApi,
    ctx: ResolutionContext<'a>,
    page_size: usize,
    limit: Option<usize>,
}

/// A field filter with its value resolved against the schema.
#[derive(Debug, Clone, PartialEq)]
enum Expected {
    OptionId(String),
    /// Compared case-insensitively against the option name or text.
    Name(String),
    Number(f64),
}

impl<'a> ItemFetcher<'a> {
    pub fn new(api: &'a dyn BoardApi, ctx: ResolutionContext<'a>) -> Self {
        Self {
            api,
            ctx,
            page_size: DEFAULT_PAGE_SIZE,
            limit: None,
        }
    }

    /// Stop once this many matching items are collected.
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub async fn fetch(&self, predicate: &QueryPredicate) -> Result<Vec<BoardItem>, BoardError> {
        if predicate.has_field_predicates() {
            self.fetch_from_board(predicate).await
        } else {
            self.fetch_from_repository(predicate).await
        }
    }

    async fn fetch_from_board(&self, predicate: &QueryPredicate) -> Result<Vec<BoardItem>, BoardError> {
        let expected: Vec<(String, Expected)> = predicate
            .field_filters
            .iter()
            .map(|(field, value)| (field.clone(), self.expected_value(field, value)))
            .collect();

        let mut matched = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .api
                .list_items(self.page_size, cursor.as_deref())
                .await
                .map_err(|e| BoardError::pagination(&e))?;
            pages += 1;

            for node in page.nodes {
                let Some(item) = decode_item(node) else {
                    continue;
                };
                if matches_predicate(&item, predicate, &expected) {
                    matched.push(item);
                    if self.limit.is_some_and(|l| matched.len() >= l) {
                        tracing::debug!(pages, matched = matched.len(), "limit reached");
                        return Ok(matched);
                    }
                }
            }

            if !page.page_info.has_next_page {
                break;
            }
            match page.page_info.end_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    return Err(BoardError::PaginationFailure(
                        "page reported more items but no end cursor".into(),
                    ))
                }
            }
        }

        tracing::debug!(pages, matched = matched.len(), "fetched board items");
        Ok(matched)
    }

    async fn fetch_from_repository(
        &self,
        predicate: &QueryPredicate,
    ) -> Result<Vec<BoardItem>, BoardError> {
        let filter = IssueFilter {
            state: "open".into(),
            search: predicate.search(),
            limit: self.limit.unwrap_or(DEFAULT_ISSUE_LIMIT),
        };
        let issues = self
            .api
            .list_issues(&filter)
            .await
            .map_err(|e| BoardError::pagination(&e))?;

        let items: Vec<BoardItem> = issues
            .into_iter()
            .map(BoardItem::from)
            .filter(|item| !has_excluded_label(item, &predicate.label_excludes))
            .collect();
        tracing::debug!(matched = items.len(), "listed repository issues");
        Ok(items)
    }

    fn expected_value(&self, field_name: &str, value: &str) -> Expected {
        let data_type = self.ctx.schema.field(field_name).map(|f| f.data_type);
        match data_type {
            Some(FieldDataType::SingleSelect) => match self.ctx.resolve_value(field_name, value) {
                Ok(ResolvedValue::OptionId { id, .. }) => Expected::OptionId(id),
                Ok(_) | Err(_) => {
                    tracing::warn!(
                        field = field_name,
                        value,
                        "no matching option, comparing by name"
                    );
                    Expected::Name(value.to_lowercase())
                }
            },
            Some(FieldDataType::Number) => match parse_number_prefix(value) {
                Some(n) => Expected::Number(n),
                None => Expected::Name(value.to_lowercase()),
            },
            _ => Expected::Name(value.to_lowercase()),
        }
    }
}

fn has_excluded_label(item: &BoardItem, excludes: &[String]) -> bool {
    excludes.iter().any(|label| item.has_label(label))
}

fn matches_predicate(item: &BoardItem, predicate: &QueryPredicate, expected: &[(String, Expected)]) -> bool {
    if has_excluded_label(item, &predicate.label_excludes) {
        return false;
    }
    if predicate
        .field_excludes
        .iter()
        .any(|field| !item.field_value(field).is_empty())
    {
        return false;
    }
    expected
        .iter()
        .all(|(field, want)| value_matches(item.field_value(field), want))
}

fn value_matches(value: &FieldValue, want: &Expected) -> bool {
    match (value, want) {
        (FieldValue::SingleSelect { option_id, .. }, Expected::OptionId(id)) => option_id == id,
        (FieldValue::Number { number }, Expected::Number(n)) => number == n,
        (FieldValue::Absent, _) => false,
        (other, Expected::Name(name)) => other.display().to_lowercase() == *name,
        _ => false,
    }
}

/// Decode one item node. Returns `None` for non-issue content and for issues
/// that are not open.
pub fn decode_item(node: ItemNode) -> Option<BoardItem> {
    let content = node.content?;
    let (Some(issue_id), Some(number)) = (content.id, content.number) else {
        return None;
    };
    let state = content.state.unwrap_or_default();
    if !state.eq_ignore_ascii_case("OPEN") {
        return None;
    }

    let labels: BTreeSet<String> = content
        .labels
        .map(|c| c.nodes.into_iter().flatten().map(|l| l.name).collect())
        .unwrap_or_default();

    let mut field_values = BTreeMap::new();
    for value in node.field_values.into_iter().flat_map(|c| c.nodes).flatten() {
        let Some(field) = value.field.as_ref().and_then(|f| f.name.clone()) else {
            continue;
        };
        let decoded = decode_field_value(value);
        if decoded != FieldValue::Absent {
            field_values.insert(field, decoded);
        }
    }

    Some(BoardItem {
        item_id: node.id,
        database_id: node.database_id,
        issue_id,
        number,
        title: content.title.unwrap_or_default(),
        state,
        url: content.url,
        labels,
        field_values,
    })
}

/// Exactly one payload must be present; anything else is treated as no value.
pub fn decode_field_value(node: FieldValueNode) -> FieldValue {
    match (node.option_id, node.text, node.number) {
        (Some(option_id), None, None) => FieldValue::SingleSelect {
            option_id,
            name: node.name.unwrap_or_default(),
        },
        (None, Some(text), None) => FieldValue::Text { text },
        (None, None, Some(number)) => FieldValue::Number { number },
        _ => FieldValue::Absent,
    }
}

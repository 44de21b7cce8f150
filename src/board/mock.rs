//! In-memory board used by tests across the crate.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{AddedItem, BoardApi, FieldUpdate, IssueFilter, ItemNode, ItemPage, PageInfo};
use crate::model::field::{FieldDataType, FieldOption, FieldSchema};
use crate::model::item::{BoardItem, IssueSummary};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListFields,
    ListItems { after: Option<String> },
    AddItem { content_id: String },
    UpdateField {
        item_id: String,
        field_id: String,
        value: FieldUpdate,
    },
    AddLabels { number: u64, labels: Vec<String> },
    ListIssues { search: Option<String> },
}

pub struct MockBoard {
    pub fields: Vec<FieldSchema>,
    pub pages: Vec<Vec<ItemNode>>,
    pub issues: Vec<IssueSummary>,
    pub calls: Arc<Mutex<Vec<Call>>>,
    /// Issue numbers whose label additions fail.
    pub failing_labels: HashSet<u64>,
    /// Project item ids whose field updates fail.
    pub failing_items: HashSet<String>,
    /// Page index at which listing fails.
    pub failing_page: Option<usize>,
    /// content id -> item id for issues already on the board.
    pub existing: Mutex<HashMap<String, String>>,
}

impl MockBoard {
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self {
            fields,
            pages: Vec::new(),
            issues: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            failing_labels: HashSet::new(),
            failing_items: HashSet::new(),
            failing_page: None,
            existing: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_pages(mut self, pages: Vec<Vec<ItemNode>>) -> Self {
        self.pages = pages;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn field_updates(&self) -> Vec<(String, String, FieldUpdate)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::UpdateField {
                    item_id,
                    field_id,
                    value,
                } => Some((item_id, field_id, value)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BoardApi for MockBoard {
    async fn list_fields(&self) -> Result<Vec<FieldSchema>> {
        self.record(Call::ListFields);
        Ok(self.fields.clone())
    }

    async fn list_items(&self, _first: usize, after: Option<&str>) -> Result<ItemPage> {
        self.record(Call::ListItems {
            after: after.map(String::from),
        });
        let index = match after {
            None => 0,
            Some(cursor) => cursor
                .strip_prefix("cursor-")
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(usize::MAX),
        };
        if self.failing_page == Some(index) {
            anyhow::bail!("Mock pagination failure");
        }
        let nodes = self.pages.get(index).cloned().unwrap_or_default();
        let has_next_page = index + 1 < self.pages.len();
        Ok(ItemPage {
            nodes,
            page_info: PageInfo {
                has_next_page,
                end_cursor: has_next_page.then(|| format!("cursor-{}", index + 1)),
            },
        })
    }

    async fn add_item(&self, content_id: &str) -> Result<AddedItem> {
        self.record(Call::AddItem {
            content_id: content_id.to_string(),
        });
        let mut existing = self.existing.lock().unwrap();
        let next = existing.len() + 1;
        let item_id = existing
            .entry(content_id.to_string())
            .or_insert_with(|| format!("PVTI_new{next}"))
            .clone();
        Ok(AddedItem {
            item_id,
            database_id: Some(next as u64),
        })
    }

    async fn update_field(&self, item_id: &str, field_id: &str, value: &FieldUpdate) -> Result<()> {
        self.record(Call::UpdateField {
            item_id: item_id.to_string(),
            field_id: field_id.to_string(),
            value: value.clone(),
        });
        if self.failing_items.contains(item_id) {
            anyhow::bail!("Mock field failure");
        }
        Ok(())
    }

    async fn add_labels(&self, item: &BoardItem, labels: &[String]) -> Result<()> {
        self.record(Call::AddLabels {
            number: item.number,
            labels: labels.to_vec(),
        });
        if self.failing_labels.contains(&item.number) {
            anyhow::bail!("Mock label failure");
        }
        Ok(())
    }

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<IssueSummary>> {
        self.record(Call::ListIssues {
            search: filter.search.clone(),
        });
        // Honour `-label:"X"` qualifiers the way GitHub search does, before the limit.
        let excluded: Vec<String> = filter
            .search
            .iter()
            .flat_map(|s| s.split_whitespace())
            .filter_map(|t| t.strip_prefix("-label:"))
            .map(|l| l.trim_matches('"').to_lowercase())
            .collect();
        Ok(self
            .issues
            .iter()
            .filter(|i| {
                !i.labels
                    .iter()
                    .any(|l| excluded.contains(&l.name.to_lowercase()))
            })
            .take(filter.limit)
            .cloned()
            .collect())
    }
}

pub fn single_select(id: &str, name: &str, options: &[(&str, &str)]) -> FieldSchema {
    FieldSchema {
        id: id.to_string(),
        name: name.to_string(),
        data_type: FieldDataType::SingleSelect,
        options: options
            .iter()
            .map(|(id, name)| FieldOption {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect(),
    }
}

pub fn plain_field(id: &str, name: &str, data_type: FieldDataType) -> FieldSchema {
    FieldSchema {
        id: id.to_string(),
        name: name.to_string(),
        data_type,
        options: Vec::new(),
    }
}

/// Status, Priority, Estimate (number), Notes (text) and Due (date).
pub fn sample_fields() -> Vec<FieldSchema> {
    vec![
        single_select(
            "F_status",
            "Status",
            &[("s_backlog", "Backlog"), ("s_ready", "Ready"), ("s_done", "Done")],
        ),
        single_select(
            "F_priority",
            "Priority",
            &[("p_0", "P0"), ("p_1", "P1"), ("p_2", "P2")],
        ),
        plain_field("F_estimate", "Estimate", FieldDataType::Number),
        plain_field("F_notes", "Notes", FieldDataType::Text),
        plain_field("F_due", "Due", FieldDataType::Other),
    ]
}

/// Build an item node the way the board returns it. `values` are raw
/// field-value nodes, e.g. `json!({"optionId": "s_ready", "name": "Ready", "field": {"name": "Status"}})`.
pub fn item_node(number: u64, state: &str, labels: &[&str], values: Vec<Value>) -> ItemNode {
    let labels: Vec<Value> = labels.iter().map(|l| json!({ "name": l })).collect();
    serde_json::from_value(json!({
        "id": format!("PVTI_{number}"),
        "databaseId": number,
        "content": {
            "id": format!("I_{number}"),
            "number": number,
            "title": format!("Issue {number}"),
            "state": state,
            "url": format!("https://github.com/acme/widgets/issues/{number}"),
            "labels": { "nodes": labels },
        },
        "fieldValues": { "nodes": values },
    }))
    .unwrap()
}

pub fn select_value(field: &str, option_id: &str, name: &str) -> Value {
    json!({ "optionId": option_id, "name": name, "field": { "name": field } })
}

pub fn text_value(field: &str, text: &str) -> Value {
    json!({ "text": text, "field": { "name": field } })
}

pub fn number_value(field: &str, number: f64) -> Value {
    json!({ "number": number, "field": { "name": field } })
}

use serde::Serialize;
use std::collections::BTreeMap;

use super::item::BoardItem;

/// Everything triage will write for one item, decided before any write.
#[derive(Debug, Clone)]
pub struct IssueUpdatePlan {
    pub item: BoardItem,
    pub project_item_id: Option<String>,
    pub static_field_updates: BTreeMap<String, String>,
    pub static_labels_to_add: Vec<String>,
    /// `None` records an explicit skip.
    pub interactive_choices: BTreeMap<String, Option<String>>,
}

impl IssueUpdatePlan {
    pub fn new(
        item: BoardItem,
        field_updates: &BTreeMap<String, String>,
        labels: &[String],
    ) -> Self {
        let project_item_id = item.on_board().then(|| item.item_id.clone());
        Self {
            item,
            project_item_id,
            static_field_updates: field_updates.clone(),
            static_labels_to_add: labels.to_vec(),
            interactive_choices: BTreeMap::new(),
        }
    }

    /// Whether any field will be written, which needs the item on the board.
    pub fn has_field_writes(&self) -> bool {
        !self.static_field_updates.is_empty()
            || self.interactive_choices.values().any(Option::is_some)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemOutcome {
    pub number: u64,
    pub title: String,
    pub applied: Vec<String>,
    pub warnings: Vec<String>,
}

impl ItemOutcome {
    pub fn for_item(item: &BoardItem) -> Self {
        Self {
            number: item.number,
            title: item.title.clone(),
            ..Default::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TriageReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl TriageReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }
}

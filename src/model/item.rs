use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::field::FieldValue;

/// An issue as seen through the board, with its field values.
#[derive(Debug, Clone, Serialize)]
pub struct BoardItem {
    /// Project item id. Empty when the issue is not on the board yet.
    pub item_id: String,
    pub database_id: Option<u64>,
    pub issue_id: String,
    pub number: u64,
    pub title: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub labels: BTreeSet<String>,
    pub field_values: BTreeMap<String, FieldValue>,
}

impl BoardItem {
    pub fn on_board(&self) -> bool {
        !self.item_id.is_empty()
    }

    pub fn field_value(&self, field: &str) -> &FieldValue {
        self.field_values.get(field).unwrap_or(&FieldValue::Absent)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }
}

/// An issue returned by the repository listing, without board data.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueSummary {
    pub number: u64,
    pub title: String,
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub labels: Vec<IssueLabel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueLabel {
    pub name: String,
}

impl From<IssueSummary> for BoardItem {
    fn from(issue: IssueSummary) -> Self {
        BoardItem {
            item_id: String::new(),
            database_id: None,
            issue_id: issue.id,
            number: issue.number,
            title: issue.title,
            state: "OPEN".into(),
            url: Some(issue.url),
            labels: issue.labels.into_iter().map(|l| l.name).collect(),
            field_values: BTreeMap::new(),
        }
    }
}

pub mod github;

#[cfg(test)]
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::model::field::{FieldDataType, FieldOption, FieldSchema};
use crate::model::item::{BoardItem, IssueSummary};

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Outbound operations against a project board and its repository.
#[async_trait]
pub trait BoardApi: Send + Sync {
    async fn list_fields(&self) -> Result<Vec<FieldSchema>>;

    /// One page of the board's item connection.
    async fn list_items(&self, first: usize, after: Option<&str>) -> Result<ItemPage>;

    /// Add an issue to the board. Returns the existing item if it is already there.
    async fn add_item(&self, content_id: &str) -> Result<AddedItem>;

    async fn update_field(&self, item_id: &str, field_id: &str, value: &FieldUpdate) -> Result<()>;

    async fn add_labels(&self, item: &BoardItem, labels: &[String]) -> Result<()>;

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<IssueSummary>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    SingleSelect(String),
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedItem {
    #[serde(rename = "id")]
    pub item_id: String,
    pub database_id: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub state: String,
    pub search: Option<String>,
    pub limit: usize,
}

// Wire shapes of the item connection. Decoding into `BoardItem` happens in
// the fetcher so every implementation shares it.

#[derive(Debug, Clone, Deserialize)]
pub struct ItemPage {
    pub nodes: Vec<ItemNode>,
    #[serde(rename = "pageInfo")]
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemNode {
    pub id: String,
    pub database_id: Option<u64>,
    pub content: Option<ContentNode>,
    pub field_values: Option<Connection<FieldValueNode>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Connection<T> {
    #[serde(default)]
    pub nodes: Vec<Option<T>>,
}

/// Issue content. Drafts and pull requests arrive with these fields unset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentNode {
    pub id: Option<String>,
    pub number: Option<u64>,
    pub title: Option<String>,
    pub state: Option<String>,
    pub url: Option<String>,
    pub labels: Option<Connection<NameNode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NameNode {
    pub name: String,
}

/// A field value of unknown kind; the populated payload key decides it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValueNode {
    pub text: Option<String>,
    pub number: Option<f64>,
    pub option_id: Option<String>,
    pub name: Option<String>,
    pub field: Option<FieldRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldRef {
    pub name: Option<String>,
}

/// A field definition as listed by the board.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldNode {
    pub id: Option<String>,
    pub name: Option<String>,
    pub data_type: Option<FieldDataType>,
    pub options: Option<Vec<FieldOption>>,
}

impl FieldNode {
    pub fn into_schema(self) -> Option<FieldSchema> {
        Some(FieldSchema {
            id: self.id?,
            name: self.name?,
            data_type: self.data_type.unwrap_or(FieldDataType::Other),
            options: self.options.unwrap_or_default(),
        })
    }
}

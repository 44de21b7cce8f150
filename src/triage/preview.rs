use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::item::BoardItem;
use crate::resolve::ResolutionContext;

use super::ResolvedRequest;

/// What triage would do to one item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemPreview {
    pub number: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub changes: Vec<String>,
}

pub fn preview_items(
    ctx: &ResolutionContext<'_>,
    items: &[BoardItem],
    request: &ResolvedRequest,
) -> Vec<ItemPreview> {
    items
        .iter()
        .map(|item| ItemPreview {
            number: item.number,
            title: item.title.clone(),
            url: item.url.clone(),
            fields: item
                .field_values
                .iter()
                .map(|(field, value)| (field.clone(), ctx.describe_value(field, value)))
                .collect(),
            changes: describe_changes(ctx, item, request),
        })
        .collect()
}

fn describe_changes(ctx: &ResolutionContext<'_>, item: &BoardItem, request: &ResolvedRequest) -> Vec<String> {
    let mut changes = Vec::new();

    if !item.on_board() && (!request.field_updates.is_empty() || !request.interactive.is_empty()) {
        changes.push("add to board".to_string());
    }

    for label in &request.labels {
        if item.has_label(label) {
            changes.push(format!("add label {label} (already present)"));
        } else {
            changes.push(format!("add label {label}"));
        }
    }

    for (field, value) in &request.field_updates {
        let current = ctx.describe_value(field, item.field_value(field));
        match ctx.resolve_value(field, value) {
            Ok(resolved) => changes.push(format!("set {field}: {current} -> {resolved}")),
            Err(e) => changes.push(format!("cannot set {field}: {e}")),
        }
    }

    for field in &request.interactive {
        let current = ctx.describe_value(field, item.field_value(field));
        changes.push(format!("would prompt for {field} (current: {current})"));
    }

    changes
}

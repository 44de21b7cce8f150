use crate::board::BoardApi;
use crate::error::BoardError;
use crate::model::plan::{IssueUpdatePlan, ItemOutcome, TriageReport};
use crate::resolve::ResolutionContext;

use super::ensure_item_id;

/// Write every plan. A failure is recorded against its item and the run
/// moves on to the next field.
pub async fn apply_plans(
    api: &dyn BoardApi,
    ctx: &ResolutionContext<'_>,
    plans: Vec<IssueUpdatePlan>,
) -> TriageReport {
    let mut report = TriageReport::default();
    for mut plan in plans {
        let outcome = apply_plan(api, ctx, &mut plan).await;
        for warning in &outcome.warnings {
            tracing::warn!(issue = outcome.number, "{warning}");
        }
        report.outcomes.push(outcome);
    }
    report
}

async fn apply_plan(
    api: &dyn BoardApi,
    ctx: &ResolutionContext<'_>,
    plan: &mut IssueUpdatePlan,
) -> ItemOutcome {
    let mut outcome = ItemOutcome::for_item(&plan.item);

    // Label-only plans never touch the board.
    let item_id = if plan.has_field_writes() {
        match ensure_item_id(api, plan).await {
            Ok(id) => Some(id),
            Err(e) => {
                outcome.warnings.push(e.to_string());
                None
            }
        }
    } else {
        plan.project_item_id.clone()
    };

    if !plan.static_labels_to_add.is_empty() {
        match api.add_labels(&plan.item, &plan.static_labels_to_add).await {
            Ok(()) => outcome
                .applied
                .push(format!("added labels {}", plan.static_labels_to_add.join(", "))),
            Err(e) => outcome
                .warnings
                .push(BoardError::mutation(format!("add labels to #{}", plan.item.number), &e).to_string()),
        }
    }

    let chosen = plan
        .interactive_choices
        .iter()
        .filter_map(|(field, choice)| choice.as_ref().map(|value| (field, value)));
    let updates: Vec<(String, String)> = plan
        .static_field_updates
        .iter()
        .chain(chosen)
        .map(|(f, v)| (f.clone(), v.clone()))
        .collect();

    for (field, value) in updates {
        let Some(item_id) = item_id.as_deref() else {
            outcome
                .warnings
                .push(format!("skipped {field}: issue is not on the board"));
            continue;
        };
        match update_field(api, ctx, item_id, &field, &value).await {
            Ok(description) => outcome.applied.push(description),
            Err(e) => outcome.warnings.push(e.to_string()),
        }
    }

    outcome
}

async fn update_field(
    api: &dyn BoardApi,
    ctx: &ResolutionContext<'_>,
    item_id: &str,
    field_name: &str,
    value: &str,
) -> Result<String, BoardError> {
    let field = ctx.field(field_name)?;
    let resolved = ctx.resolve_value(&field.name, value)?;
    let description = format!("set {} to {}", field.name, resolved);
    api.update_field(item_id, &field.id, &resolved.into())
        .await
        .map_err(|e| BoardError::mutation(format!("set {}", field.name), &e))?;
    Ok(description)
}

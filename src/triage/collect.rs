use crate::board::BoardApi;
use crate::error::BoardError;
use crate::model::plan::IssueUpdatePlan;
use crate::resolve::ResolutionContext;

use super::ensure_item_id;
use super::prompt::{PromptRequest, Prompter};

/// Ask the operator about every interactive field of every plan.
///
/// Items are added to the board if needed, but no field is written. Closed
/// input aborts before anything has been changed.
pub async fn collect_choices(
    api: &dyn BoardApi,
    ctx: &ResolutionContext<'_>,
    plans: &mut [IssueUpdatePlan],
    fields: &[String],
    prompter: &mut dyn Prompter,
) -> Result<(), BoardError> {
    for plan in plans.iter_mut() {
        if let Err(e) = ensure_item_id(api, plan).await {
            tracing::warn!(issue = plan.item.number, error = %e, "could not add item to board");
        }

        for field_name in fields {
            let field = match ctx.field(field_name) {
                Ok(field) => field,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping interactive field");
                    continue;
                }
            };
            let request = PromptRequest {
                item: &plan.item,
                field,
                current: ctx.describe_value(&field.name, plan.item.field_value(&field.name)),
                aliases: ctx.aliases.aliases(&field.name),
            };
            let choice = prompter.choose(&request)?;
            tracing::debug!(issue = plan.item.number, field = %field.name, ?choice, "collected");
            plan.interactive_choices.insert(field.name.clone(), choice);
        }
    }
    Ok(())
}

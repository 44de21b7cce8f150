pub mod apply;
pub mod collect;
pub mod preview;
pub mod prompt;

use anyhow::{bail, Result};
use std::collections::BTreeMap;

use crate::board::BoardApi;
use crate::error::BoardError;
use crate::fetch::ItemFetcher;
use crate::model::plan::{IssueUpdatePlan, TriageReport};
use crate::query::{self, QueryPredicate};
use crate::resolve::ResolutionContext;

use self::preview::ItemPreview;
use self::prompt::Prompter;

/// A triage run as requested from the command line or a preset.
#[derive(Debug, Clone, Default)]
pub struct TriageRequest {
    pub query: String,
    /// Field key (logical or board name) to value.
    pub field_updates: BTreeMap<String, String>,
    pub labels: Vec<String>,
    pub interactive: Vec<String>,
    pub list_only: bool,
    pub limit: Option<usize>,
}

impl TriageRequest {
    /// Add a `label:name` or `field:value` apply.
    pub fn add_apply(&mut self, apply: &str) -> Result<()> {
        let Some((key, value)) = apply.split_once(':') else {
            bail!("Invalid apply '{apply}': expected field:value or label:name");
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            bail!("Invalid apply '{apply}': expected field:value or label:name");
        }
        if key.eq_ignore_ascii_case("label") {
            if !self.labels.iter().any(|l| l == value) {
                self.labels.push(value.to_string());
            }
        } else {
            self.field_updates.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    /// Field keys the run touches, for loading the schema up front.
    pub fn referenced_fields(&self) -> Vec<String> {
        let mut keys = query::referenced_keys(&self.query);
        keys.extend(self.field_updates.keys().cloned());
        keys.extend(self.interactive.iter().cloned());
        keys
    }
}

/// A request with field keys mapped to board field names.
#[derive(Debug, Clone, Default)]
pub struct ResolvedRequest {
    pub field_updates: BTreeMap<String, String>,
    pub labels: Vec<String>,
    pub interactive: Vec<String>,
    /// Keys that matched no board field.
    pub unknown_fields: Vec<String>,
}

impl ResolvedRequest {
    pub fn new(ctx: &ResolutionContext<'_>, request: &TriageRequest) -> Self {
        let mut resolved = ResolvedRequest {
            labels: request.labels.clone(),
            ..Default::default()
        };
        let known = |key: &str, unknown: &mut Vec<String>| -> Option<String> {
            let name = ctx
                .board_field_name(key)
                .filter(|name| ctx.schema.field(name).is_some());
            if name.is_none() {
                tracing::warn!(field = key, "field not found on board, skipping");
                unknown.push(key.to_string());
            }
            name
        };
        for (key, value) in &request.field_updates {
            if let Some(name) = known(key, &mut resolved.unknown_fields) {
                resolved.field_updates.insert(name, value.clone());
            }
        }
        for key in &request.interactive {
            if let Some(name) = known(key, &mut resolved.unknown_fields) {
                if !resolved.interactive.contains(&name) {
                    resolved.interactive.push(name);
                }
            }
        }
        resolved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Collecting,
    Applying,
    Done,
}

#[derive(Debug)]
pub enum TriageOutcome {
    Preview {
        predicate: QueryPredicate,
        items: Vec<ItemPreview>,
        unknown_fields: Vec<String>,
    },
    Applied {
        report: TriageReport,
        unknown_fields: Vec<String>,
    },
}

/// Runs a triage: compile, fetch, then collect choices and apply them.
pub struct TriageOrchestrator<'a> {
    api: &'a dyn BoardApi,
    ctx: ResolutionContext<'a>,
    phase: Phase,
}

impl<'a> TriageOrchestrator<'a> {
    pub fn new(api: &'a dyn BoardApi, ctx: ResolutionContext<'a>) -> Self {
        Self {
            api,
            ctx,
            phase: Phase::NotStarted,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "triage phase");
        self.phase = phase;
    }

    pub async fn run(
        &mut self,
        request: &TriageRequest,
        prompter: &mut dyn Prompter,
    ) -> Result<TriageOutcome> {
        let predicate = query::compile(&request.query, &self.ctx);
        let resolved = ResolvedRequest::new(&self.ctx, request);

        let items = ItemFetcher::new(self.api, self.ctx)
            .limit(request.limit)
            .fetch(&predicate)
            .await?;
        tracing::info!(items = items.len(), "matched items");

        if request.list_only {
            let items = preview::preview_items(&self.ctx, &items, &resolved);
            return Ok(TriageOutcome::Preview {
                predicate,
                items,
                unknown_fields: resolved.unknown_fields,
            });
        }

        let mut plans: Vec<IssueUpdatePlan> = items
            .into_iter()
            .map(|item| IssueUpdatePlan::new(item, &resolved.field_updates, &resolved.labels))
            .collect();

        if !resolved.interactive.is_empty() {
            self.enter(Phase::Collecting);
            collect::collect_choices(
                self.api,
                &self.ctx,
                &mut plans,
                &resolved.interactive,
                prompter,
            )
            .await?;
        }

        self.enter(Phase::Applying);
        let report = apply::apply_plans(self.api, &self.ctx, plans).await;
        self.enter(Phase::Done);

        Ok(TriageOutcome::Applied {
            report,
            unknown_fields: resolved.unknown_fields,
        })
    }
}

/// The plan's project item id, adding the issue to the board when missing.
pub(crate) async fn ensure_item_id(
    api: &dyn BoardApi,
    plan: &mut IssueUpdatePlan,
) -> Result<String, BoardError> {
    if let Some(id) = &plan.project_item_id {
        return Ok(id.clone());
    }
    let added = api
        .add_item(&plan.item.issue_id)
        .await
        .map_err(|e| BoardError::mutation(format!("add #{} to board", plan.item.number), &e))?;
    tracing::debug!(issue = plan.item.number, item = %added.item_id, "added to board");
    plan.item.item_id = added.item_id.clone();
    plan.item.database_id = added.database_id;
    plan.project_item_id = Some(added.item_id.clone());
    Ok(added.item_id)
}

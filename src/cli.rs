use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::board::github::GitHubBoard;
use crate::config::{self, LoadedConfig, TriagePreset};
use crate::error::BoardError;
use crate::fetch::ItemFetcher;
use crate::model::item::BoardItem;
use crate::model::plan::TriageReport;
use crate::query;
use crate::resolve::{FieldAliasMap, ResolutionContext, SchemaCache};
use crate::triage::preview::ItemPreview;
use crate::triage::prompt::LinePrompter;
use crate::triage::{TriageOrchestrator, TriageOutcome, TriageRequest};

/// Triage issues on a GitHub project board
#[derive(Parser, Debug)]
#[command(name = "gh-board", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: nearest .gh-board.toml)
    #[arg(long, global = true, env = "GH_BOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Match issues with a query and update their labels and fields
    Triage(TriageArgs),
    /// List board items matching a query
    Items(ItemsArgs),
    /// Show board fields, options and configured aliases
    Fields(FieldsArgs),
}

#[derive(Args, Debug, Default)]
pub struct TriageArgs {
    /// Named triage preset from the config
    pub preset: Option<String>,

    /// Query, e.g. "status:backlog -has:estimate -label:pm-tracked"
    #[arg(short, long)]
    pub query: Option<String>,

    /// field:value or label:name to apply (repeatable)
    #[arg(short, long = "apply")]
    pub apply: Vec<String>,

    /// Field to prompt for on each item (repeatable)
    #[arg(short, long = "interactive")]
    pub interactive: Vec<String>,

    /// Only show matching items and what would change
    #[arg(long)]
    pub list: bool,

    /// Stop after this many matching items
    #[arg(long)]
    pub limit: Option<usize>,

    /// Re-read the board schema instead of the cache
    #[arg(long)]
    pub refresh: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct ItemsArgs {
    /// Query, e.g. "status:ready"
    #[arg(default_value = "")]
    pub query: String,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long)]
    pub refresh: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct FieldsArgs {
    #[arg(long)]
    pub refresh: bool,

    #[arg(long)]
    pub json: bool,
}

pub async fn execute(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Triage(args) => handle_triage(config_path, args).await,
        Commands::Items(args) => handle_items(config_path, args).await,
        Commands::Fields(args) => handle_fields(config_path, args).await,
    }
}

/// Everything a command needs to talk to the board.
struct Session {
    loaded: LoadedConfig,
    board: GitHubBoard,
    schema: SchemaCache,
    aliases: FieldAliasMap,
}

impl Session {
    async fn open(loaded: LoadedConfig, refresh: bool, keys: &[String]) -> Result<Self> {
        let board = GitHubBoard::connect(loaded.board()?).await?;
        let aliases = FieldAliasMap::new(&loaded.config.fields);

        let cache_path = loaded.cache_path();
        let persisted = config::load_schema_cache(&cache_path)?;
        let mut schema = SchemaCache::load(&board, persisted.as_ref(), refresh).await?;

        let names: Vec<String> = keys
            .iter()
            .map(|k| {
                aliases
                    .board_field_for_key(k)
                    .map(String::from)
                    .unwrap_or_else(|| k.clone())
            })
            .collect();
        for name in &names {
            if let Err(e) = schema.get_field(&board, name).await {
                match e.downcast_ref::<BoardError>() {
                    Some(BoardError::SchemaNotFound { .. }) => {
                        tracing::debug!(field = %name, "not a board field")
                    }
                    _ => return Err(e),
                }
            }
        }

        if schema.is_dirty() {
            match config::save_schema_cache(&cache_path, &schema.to_cache_file()) {
                Ok(()) => tracing::debug!(path = %cache_path.display(), "saved schema cache"),
                Err(e) => tracing::warn!(error = %e, "could not save schema cache"),
            }
        }

        Ok(Self {
            loaded,
            board,
            schema,
            aliases,
        })
    }

    fn ctx(&self) -> ResolutionContext<'_> {
        ResolutionContext::new(&self.schema, &self.aliases)
    }
}

/// Merge a preset with command-line flags. Flags add to the preset; a
/// command-line query replaces the preset's.
pub fn build_request(preset: Option<&TriagePreset>, args: &TriageArgs) -> Result<TriageRequest> {
    let mut request = TriageRequest {
        list_only: args.list,
        limit: args.limit,
        ..Default::default()
    };
    if let Some(preset) = preset {
        request.query = preset.query.clone();
        request.labels = preset.labels.clone();
        request.field_updates = preset.fields.clone();
        request.interactive = preset.interactive.clone();
    }
    if let Some(query) = &args.query {
        request.query = query.clone();
    }
    for apply in &args.apply {
        request.add_apply(apply)?;
    }
    for field in &args.interactive {
        if !request.interactive.contains(field) {
            request.interactive.push(field.clone());
        }
    }
    if request.query.trim().is_empty() {
        bail!("No query given. Pass --query or name a triage preset");
    }
    Ok(request)
}

async fn handle_triage(config_path: Option<&Path>, args: TriageArgs) -> Result<()> {
    let loaded = config::load_config(config_path)?;
    let preset = match &args.preset {
        Some(name) => Some(
            loaded
                .config
                .triage
                .get(name)
                .with_context(|| format!("No triage preset named '{name}'"))?,
        ),
        None => None,
    };
    let request = build_request(preset, &args)?;

    let session = Session::open(loaded, args.refresh, &request.referenced_fields()).await?;
    tracing::debug!(config = ?session.loaded.path, "session ready");

    let mut orchestrator = TriageOrchestrator::new(&session.board, session.ctx());
    let mut prompter = LinePrompter::stdio();
    let outcome = orchestrator.run(&request, &mut prompter).await?;

    match outcome {
        TriageOutcome::Preview {
            predicate,
            items,
            unknown_fields,
        } => {
            tracing::debug!(?predicate, "compiled query");
            print_unknown(&unknown_fields);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                print_preview(&items);
            }
        }
        TriageOutcome::Applied {
            report,
            unknown_fields,
        } => {
            print_unknown(&unknown_fields);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
    }
    Ok(())
}

async fn handle_items(config_path: Option<&Path>, args: ItemsArgs) -> Result<()> {
    let keys = query::referenced_keys(&args.query);
    let loaded = config::load_config(config_path)?;
    let session = Session::open(loaded, args.refresh, &keys).await?;
    let ctx = session.ctx();

    let predicate = query::compile(&args.query, &ctx);
    let items = ItemFetcher::new(&session.board, ctx)
        .limit(args.limit)
        .fetch(&predicate)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("No matching items.");
        return Ok(());
    }
    for item in &items {
        print_item(&ctx, item);
    }
    println!("\n{} item(s)", items.len());
    Ok(())
}

async fn handle_fields(config_path: Option<&Path>, args: FieldsArgs) -> Result<()> {
    let loaded = config::load_config(config_path)?;
    let session = Session::open(loaded, args.refresh, &[]).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(session.schema.fields())?);
        return Ok(());
    }

    if let Some(at) = session.schema.fetched_at() {
        println!("Schema fetched {}", at.format("%Y-%m-%d %H:%M UTC"));
    }
    for field in session.schema.fields() {
        println!("{} ({})  {}", field.name, field.data_type, field.id);
        let aliases = session.aliases.aliases(&field.name);
        for option in &field.options {
            let names: Vec<&str> = aliases
                .iter()
                .filter(|(_, o)| *o == option.name)
                .map(|(a, _)| *a)
                .collect();
            if names.is_empty() {
                println!("    {}  {}", option.name, option.id);
            } else {
                println!("    {}  {}  [{}]", option.name, option.id, names.join(", "));
            }
        }
    }

    // Mappings that point at fields the board does not have.
    for (key, field) in session.aliases.keys().zip(session.aliases.board_fields()) {
        if session.schema.field(field).is_none() {
            println!("warning: config key '{key}' maps to unknown field '{field}'");
        }
    }
    Ok(())
}

fn print_unknown(fields: &[String]) {
    for field in fields {
        eprintln!("warning: field '{field}' not found on board, skipped");
    }
}

fn print_item(ctx: &ResolutionContext<'_>, item: &BoardItem) {
    println!("#{:<6} {}", item.number, item.title);
    for (field, value) in &item.field_values {
        println!("         {field}: {}", ctx.describe_value(field, value));
    }
}

fn print_preview(items: &[ItemPreview]) {
    if items.is_empty() {
        println!("No matching items.");
        return;
    }
    for item in items {
        println!("#{:<6} {}", item.number, item.title);
        for (field, value) in &item.fields {
            println!("         {field}: {value}");
        }
        for change in &item.changes {
            println!("         -> {change}");
        }
    }
    println!("\n{} item(s) would be triaged", items.len());
}

fn print_report(report: &TriageReport) {
    for outcome in &report.outcomes {
        let mark = if outcome.succeeded() { "ok" } else { "!!" };
        println!("{mark} #{:<6} {}", outcome.number, outcome.title);
        for applied in &outcome.applied {
            println!("         {applied}");
        }
        for warning in &outcome.warnings {
            eprintln!("warning: #{}: {warning}", outcome.number);
        }
    }
    println!(
        "\nUpdated {}/{} item(s) without errors",
        report.successes(),
        report.total()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn preset() -> TriagePreset {
        TriagePreset {
            query: "-label:pm-tracked".into(),
            labels: vec!["pm-tracked".into()],
            fields: BTreeMap::from([("status".to_string(), "Backlog".to_string())]),
            interactive: vec!["priority".into()],
        }
    }

    #[test]
    fn parses_triage_flags() {
        let cli = Cli::try_parse_from([
            "gh-board",
            "-v",
            "triage",
            "untracked",
            "-q",
            "status:ready",
            "-a",
            "label:bug",
            "-a",
            "priority:p1",
            "-i",
            "estimate",
            "--list",
            "--limit",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Commands::Triage(args) = cli.command else {
            panic!("expected triage");
        };
        assert_eq!(args.preset.as_deref(), Some("untracked"));
        assert_eq!(args.query.as_deref(), Some("status:ready"));
        assert_eq!(args.apply, vec!["label:bug", "priority:p1"]);
        assert_eq!(args.interactive, vec!["estimate"]);
        assert!(args.list);
        assert_eq!(args.limit, Some(5));
    }

    #[test]
    fn items_query_defaults_to_empty() {
        let cli = Cli::try_parse_from(["gh-board", "items", "--json"]).unwrap();
        let Commands::Items(args) = cli.command else {
            panic!("expected items");
        };
        assert_eq!(args.query, "");
        assert!(args.json);
    }

    #[test]
    fn flags_extend_preset() {
        let args = TriageArgs {
            apply: vec!["label:needs-triage".into(), "status:Ready".into()],
            interactive: vec!["priority".into(), "estimate".into()],
            ..Default::default()
        };
        let request = build_request(Some(&preset()), &args).unwrap();
        assert_eq!(request.query, "-label:pm-tracked");
        assert_eq!(request.labels, vec!["pm-tracked", "needs-triage"]);
        assert_eq!(request.field_updates["status"], "Ready");
        assert_eq!(request.interactive, vec!["priority", "estimate"]);
    }

    #[test]
    fn query_flag_replaces_preset_query() {
        let args = TriageArgs {
            query: Some("status:backlog".into()),
            list: true,
            ..Default::default()
        };
        let request = build_request(Some(&preset()), &args).unwrap();
        assert_eq!(request.query, "status:backlog");
        assert!(request.list_only);
    }

    #[test]
    fn query_is_required() {
        let err = build_request(None, &TriageArgs::default()).unwrap_err();
        assert!(err.to_string().contains("No query"));
    }

    #[test]
    fn bad_apply_is_rejected() {
        let args = TriageArgs {
            query: Some("status:ready".into()),
            apply: vec!["oops".into()],
            ..Default::default()
        };
        assert!(build_request(None, &args).is_err());
    }
}

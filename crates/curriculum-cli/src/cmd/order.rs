use crate::cmd::{http_client, load_config, runtime, ScopeArgs};
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use curriculum_client::{CommitOutcome, OrderingEngine};
use curriculum_core::types::{OrderableItem, OrderedScope};
use std::path::Path;

#[derive(Subcommand)]
pub enum OrderSubcommand {
    /// List the items of a scope in order
    Show {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Move one item to a new position and save
    Move {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Item (or section) id to move
        item: String,
        /// New 1-based position; values past the end move to the end
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        to: u64,
    },

    /// Save an explicit order; every id in the scope must be listed once
    Set {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Ids in their new order
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

pub fn run(root: &Path, subcmd: OrderSubcommand, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let engine = OrderingEngine::new(http_client(&config)?);
    let rt = runtime()?;

    rt.block_on(async move {
        match subcmd {
            OrderSubcommand::Show { scope } => {
                let scope = scope.scope();
                let items = engine
                    .open(&scope)
                    .await
                    .with_context(|| format!("failed to load {scope}"))?;
                print_scope(OrderedScope::new(scope, items), json)
            }
            OrderSubcommand::Move { scope, item, to } => {
                let scope = scope.scope();
                engine
                    .open(&scope)
                    .await
                    .with_context(|| format!("failed to load {scope}"))?;
                let outcome = engine
                    .move_item(&scope, &item, position_index(to))
                    .await
                    .with_context(|| format!("failed to move '{item}'"))?;
                report(&engine, OrderedScope::new(scope, Vec::new()), outcome, json)
            }
            OrderSubcommand::Set { scope, ids } => {
                let scope = scope.scope();
                engine
                    .open(&scope)
                    .await
                    .with_context(|| format!("failed to load {scope}"))?;
                let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
                engine.set_order(&scope, &refs)?;
                let outcome = engine
                    .commit(&scope)
                    .await
                    .context("failed to save order")?;
                report(&engine, OrderedScope::new(scope, Vec::new()), outcome, json)
            }
        }
    })
}

/// 0-based index for a 1-based `--to`; positions past the end clamp later.
fn position_index(to: u64) -> usize {
    usize::try_from(to - 1).unwrap_or(usize::MAX)
}

fn report(
    engine: &OrderingEngine,
    mut scope: OrderedScope,
    outcome: CommitOutcome,
    json: bool,
) -> anyhow::Result<()> {
    scope.items = engine.snapshot(&scope.id)?;
    if !json {
        match outcome {
            CommitOutcome::Unchanged => println!("Order unchanged; nothing saved."),
            _ => println!("Saved order for {}.", scope.id),
        }
    }
    print_scope(scope, json)
}

fn print_scope(scope: OrderedScope, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&scope);
    }
    if scope.items.is_empty() {
        println!("{} is empty.", scope.id);
        return Ok(());
    }
    let rows = scope.items.iter().map(row).collect();
    print_table(&["POS", "ID", "KIND"], rows);
    Ok(())
}

fn row(item: &OrderableItem) -> Vec<String> {
    vec![
        item.order.to_string(),
        item.id.clone(),
        item.kind.to_string(),
    ]
}

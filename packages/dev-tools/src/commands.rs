//! Subcommand implementations
//!
//! Each command runs one engine operation and returns the JSON value to print.

use clap::Args;
use serde_json::{json, Value};
use std::sync::Arc;
use syllabus_core::models::{CreateNodeInput, NodeUpdate, ReorderItem, TreeInstance};
use syllabus_core::operations::{into_forest, ReorderOutcome, ReorderQueue};
use syllabus_core::services::HierarchyService;

#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Only the subtree below this node
    #[arg(long, conflicts_with = "published")]
    pub id: Option<String>,

    /// Only published level-1 and level-2 nodes
    #[arg(long)]
    pub published: bool,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long, default_value_t = 1)]
    pub level: i64,

    #[arg(long)]
    pub parent: Option<String>,

    #[arg(long)]
    pub color: Option<String>,

    /// Question count (chapters only)
    #[arg(long)]
    pub questions: Option<i64>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, conflicts_with = "clear_color")]
    pub color: Option<String>,

    #[arg(long)]
    pub clear_color: bool,

    #[arg(long)]
    pub order: Option<i64>,
}

pub async fn tree(service: &HierarchyService, args: TreeArgs) -> anyhow::Result<Value> {
    if args.published {
        return Ok(serde_json::to_value(service.find_published().await?)?);
    }
    match args.id {
        Some(id) => Ok(serde_json::to_value(service.find_one(&id).await?)?),
        None => Ok(serde_json::to_value(service.find_all().await?)?),
    }
}

pub async fn level(service: &HierarchyService, level: i64) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(service.find_by_level(level).await?)?)
}

pub async fn children(service: &HierarchyService, parent_id: &str) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(service.find_by_parent(parent_id).await?)?)
}

pub async fn stats(service: &HierarchyService) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(service.get_hierarchy_stats().await?)?)
}

pub async fn create(service: &HierarchyService, args: CreateArgs) -> anyhow::Result<Value> {
    let input = CreateNodeInput {
        name: args.name,
        level: args.level,
        parent_id: args.parent,
        color: args.color,
        question_count: args.questions,
        ..Default::default()
    };
    Ok(serde_json::to_value(service.create(input).await?)?)
}

pub async fn update(service: &HierarchyService, args: UpdateArgs) -> anyhow::Result<Value> {
    let color = if args.clear_color {
        Some(None)
    } else {
        args.color.map(Some)
    };
    let update = NodeUpdate {
        name: args.name,
        color,
        order: args.order,
        ..Default::default()
    };
    Ok(serde_json::to_value(service.update(&args.id, update).await?)?)
}

pub async fn questions(service: &HierarchyService, id: &str, count: i64) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(
        service.update_question_count(id, count).await?,
    )?)
}

pub async fn publish(service: &HierarchyService, id: &str) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(service.publish(id).await?)?)
}

pub async fn unpublish(service: &HierarchyService, id: &str) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(service.unpublish(id).await?)?)
}

pub async fn delete(service: &HierarchyService, id: &str) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(service.delete(id).await?)?)
}

/// Parse `id=order` pairs
fn parse_reorder_items(items: &[String]) -> anyhow::Result<Vec<ReorderItem>> {
    items
        .iter()
        .map(|item| {
            let (id, order) = item
                .rsplit_once('=')
                .ok_or_else(|| anyhow::anyhow!("Expected ID=ORDER, got '{}'", item))?;
            let order = order
                .parse::<i64>()
                .map_err(|e| anyhow::anyhow!("Invalid order in '{}': {}", item, e))?;
            Ok(ReorderItem::new(id, order))
        })
        .collect()
}

pub async fn reorder(service: &HierarchyService, items: &[String]) -> anyhow::Result<Value> {
    let items = parse_reorder_items(items)?;
    Ok(serde_json::to_value(service.reorder(items).await?)?)
}

pub async fn move_item(
    service: HierarchyService,
    active_id: &str,
    over_id: &str,
    retries: usize,
) -> anyhow::Result<Value> {
    let service = Arc::new(service);
    let snapshot = into_forest(service.find_all().await?);
    let queue = ReorderQueue::new(service, retries);

    Ok(match queue.move_item(&snapshot, active_id, over_id).await? {
        ReorderOutcome::Persisted { tree } => json!({
            "status": "persisted",
            "tree": tree,
        }),
        ReorderOutcome::Reconciled { tree, error } => {
            tracing::warn!("Move was not saved: {}", error);
            json!({
                "status": "reconciled",
                "error": error.to_string(),
                "kind": error.kind(),
                "tree": tree,
            })
        }
    })
}

/// Names per level for the sample trees; the last level gets question counts
const QUESTION_BANK_SAMPLE: &[&[&str]] = &[
    &["2024"],
    &["Physics", "Chemistry"],
    &["Part A"],
    &["Mechanics"],
    &["Kinematics", "Dynamics"],
];

const PREVIOUS_PAPERS_SAMPLE: &[&[&str]] = &[
    &["JEE Main"],
    &["2023", "2024"],
    &["Physics"],
    &["Section A"],
    &["Kinematics", "Optics"],
];

fn sample_levels(tree: TreeInstance) -> &'static [&'static [&'static str]] {
    match tree {
        TreeInstance::QuestionBank => QUESTION_BANK_SAMPLE,
        TreeInstance::PreviousPapers => PREVIOUS_PAPERS_SAMPLE,
    }
}

pub async fn seed(service: &HierarchyService) -> anyhow::Result<Value> {
    let config = service.config();
    let tree = config.key.parse::<TreeInstance>()?;
    let levels = sample_levels(tree);

    let mut parents: Vec<Option<String>> = vec![None];
    let mut created = 0usize;

    for (index, names) in levels.iter().enumerate() {
        let level = index as i64 + 1;
        let mut next = Vec::new();
        for parent_id in &parents {
            for (position, name) in names.iter().enumerate() {
                let question_count = if level == i64::from(config.question_level()) {
                    Some(5 * (position as i64 + 1))
                } else {
                    None
                };
                let node = service
                    .create(CreateNodeInput {
                        name: name.to_string(),
                        level,
                        parent_id: parent_id.clone(),
                        question_count,
                        ..Default::default()
                    })
                    .await?;
                created += 1;
                next.push(Some(node.id));
            }
        }
        parents = next;
    }

    tracing::info!("Seeded {} nodes into {}", created, config.key);
    Ok(json!({
        "tree": config.key,
        "created": created,
        "stats": service.get_hierarchy_stats().await?,
    }))
}

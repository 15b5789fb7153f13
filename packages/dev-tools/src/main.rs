//! Syllabus admin CLI
//!
//! Thin command-line front end over the hierarchy engine, printing JSON.
//! Useful for inspecting a local database and seeding sample trees.
//!
//! # Usage
//!
//! ```bash
//! # Seed a sample question bank and print it
//! cargo run --bin syllabus-admin -- seed
//! cargo run --bin syllabus-admin -- tree
//!
//! # Work on the previous-papers tree in a scratch database
//! cargo run --bin syllabus-admin -- --db /tmp/papers.db --tree previous-papers stats
//! ```
//!
//! Configuration comes from `SYLLABUS_DB_PATH`, `SYLLABUS_TREE` and
//! `SYLLABUS_REORDER_RETRIES`; `--db` and `--tree` override them.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use syllabus_core::config::AppConfig;
use syllabus_core::db::DatabaseService;
use syllabus_core::logging::init_tracing;
use syllabus_core::models::TreeInstance;
use syllabus_core::services::HierarchyServices;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "syllabus-admin")]
#[command(about = "Syllabus - curriculum hierarchy administration", long_about = None)]
struct Cli {
    /// Database file (overrides SYLLABUS_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Tree instance: question-bank or previous-papers (overrides SYLLABUS_TREE)
    #[arg(long, global = true)]
    tree: Option<TreeInstance>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the full nested tree, one subtree, or the published view
    Tree(commands::TreeArgs),
    /// List the nodes of one level with parents and children
    Level { level: i64 },
    /// List the direct children of a node
    Children { parent_id: String },
    /// Per-level node counts and question totals
    Stats,
    /// Create a node
    Create(commands::CreateArgs),
    /// Rename, recolor or reposition a node
    Update(commands::UpdateArgs),
    /// Set the question count of a chapter
    Questions { id: String, count: i64 },
    /// Publish one node (its parent must be published)
    Publish { id: String },
    /// Unpublish a node and its whole subtree
    Unpublish { id: String },
    /// Apply explicit orders as one batch, e.g. `reorder ID1=2 ID2=1`
    Reorder {
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Move a node onto a sibling's position
    Move { active_id: String, over_id: String },
    /// Delete a node without children
    Delete { id: String },
    /// Insert a small sample tree
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("syllabus_admin=info,syllabus_core=warn");

    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    if let Some(tree) = cli.tree {
        config.default_tree = tree;
    }

    tracing::debug!(
        "Opening {} ({})",
        config.database_path.display(),
        config.default_tree
    );
    let db = Arc::new(DatabaseService::new(config.database_path.clone()).await?);
    let services = HierarchyServices::with_database(db);
    let service = services
        .for_instance(config.default_tree)
        .with_client("syllabus-admin");

    let output = match cli.command {
        Commands::Tree(args) => commands::tree(&service, args).await?,
        Commands::Level { level } => commands::level(&service, level).await?,
        Commands::Children { parent_id } => commands::children(&service, &parent_id).await?,
        Commands::Stats => commands::stats(&service).await?,
        Commands::Create(args) => commands::create(&service, args).await?,
        Commands::Update(args) => commands::update(&service, args).await?,
        Commands::Questions { id, count } => commands::questions(&service, &id, count).await?,
        Commands::Publish { id } => commands::publish(&service, &id).await?,
        Commands::Unpublish { id } => commands::unpublish(&service, &id).await?,
        Commands::Reorder { items } => commands::reorder(&service, &items).await?,
        Commands::Move { active_id, over_id } => {
            commands::move_item(service, &active_id, &over_id, config.reorder_retries).await?
        }
        Commands::Delete { id } => commands::delete(&service, &id).await?,
        Commands::Seed => commands::seed(&service).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

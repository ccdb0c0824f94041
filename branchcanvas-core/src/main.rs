use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use branchcanvas::canvas::{Forest, Position};
use branchcanvas::config::AppConfig;
use branchcanvas::database::migrations::Migrator;
use branchcanvas::database::{
    establish_connection, get_database_url, migrate_database, MigrateDirection,
};
use branchcanvas::services::generation::{AspectRatio, ImageGenerator, UnconfiguredGenerator};
use branchcanvas::services::SendMessage;
use branchcanvas::AppContext;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,

    /// Config file (defaults to ./branchcanvas.toml when present)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Database path or sqlite URL
    #[clap(long, global = true)]
    database: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
    Project {
        #[clap(subcommand)]
        command: ProjectCommands,
    },
    /// Print a project's nodes with their positions
    Tree { project: String },
    /// Lay out a project and store the new positions
    Layout { project: String },
    /// Send a prompt and store the reply
    Send {
        project: String,
        prompt: String,
        #[clap(long)]
        parent: Option<String>,
        /// Image file to upload with the prompt
        #[clap(long)]
        image: Option<PathBuf>,
        #[clap(long, default_value = "1:1")]
        aspect_ratio: String,
        /// Do not send the newest image as editing context
        #[clap(long)]
        no_context: bool,
    },
    Regenerate { project: String, node: String },
    Remove { project: String, node: String },
    Move {
        project: String,
        node: String,
        #[clap(allow_hyphen_values = true)]
        x: f64,
        #[clap(allow_hyphen_values = true)]
        y: f64,
    },
    /// Print connection curves as SVG path data
    Connections { project: String },
    /// Show credit balance and history
    Credits {
        user: Option<String>,
        /// Add credits before printing
        #[clap(long)]
        grant: Option<i64>,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    Init,
    Migrate {
        #[clap(subcommand)]
        direction: MigrateDirection,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    List,
    Create { title: Option<String> },
    Rename { id: String, title: String },
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_level.as_deref());

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = Some(database);
    }

    match cli.command {
        Commands::Db { command } => match command {
            DbCommands::Init => {
                migrate_database(config.database.as_deref(), MigrateDirection::Up).await?;
                info!("Database initialized");
            }
            DbCommands::Migrate { direction } => {
                migrate_database(config.database.as_deref(), direction).await?;
            }
        },
        command => run(command, config).await?,
    }

    Ok(())
}

async fn run(command: Commands, config: AppConfig) -> Result<()> {
    let database_url = get_database_url(config.database.as_deref());
    let db = establish_connection(&database_url).await?;
    Migrator::up(&db, None).await?;

    let context = AppContext::new(db, build_generator(&config), config.user_id.clone());

    match command {
        Commands::Db { .. } => {}
        Commands::Project { command } => match command {
            ProjectCommands::List => {
                context.bootstrap(None).await?;
                for summary in context.list_projects().await {
                    let marker = if summary.is_current { "*" } else { " " };
                    println!(
                        "{} {}  {}  {}",
                        marker,
                        summary.id,
                        summary.last_modified.to_rfc3339(),
                        summary.title
                    );
                }
            }
            ProjectCommands::Create { title } => {
                let summary = context.create_project(title.as_deref()).await?;
                println!("{}", summary.id);
            }
            ProjectCommands::Rename { id, title } => {
                context.bootstrap(Some(&id)).await?;
                let summary = context.rename_project(&id, &title).await?;
                println!("{}  {}", summary.id, summary.title);
            }
            ProjectCommands::Delete { id } => {
                context.bootstrap(Some(&id)).await?;
                let next = context.delete_project(&id).await?;
                if let Some(next) = next {
                    println!("Current project: {}", next);
                }
            }
        },
        Commands::Tree { project } => {
            context.bootstrap(Some(&project)).await?;
            print_forest(&context.forest(&project).await?);
        }
        Commands::Layout { project } => {
            context.bootstrap(Some(&project)).await?;
            let outcome = context.auto_layout(&project).await?;
            for failure in &outcome.failed {
                warn!("Could not move {}: {}", failure.node_id, failure.message);
            }
            println!(
                "Moved {} nodes ({} failed)",
                outcome.updated.len(),
                outcome.failed.len()
            );
        }
        Commands::Send {
            project,
            prompt,
            parent,
            image,
            aspect_ratio,
            no_context,
        } => {
            context.bootstrap(Some(&project)).await?;
            let ratio: AspectRatio = aspect_ratio.parse().map_err(anyhow::Error::msg)?;

            let mut message = SendMessage::new(&project, prompt).with_aspect_ratio(ratio);
            if let Some(parent) = parent {
                message = message.with_parent(parent);
            }
            if let Some(path) = image {
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read image {}", path.display()))?;
                message = message.with_upload(STANDARD.encode(bytes));
            }

            let outcome = context.send_message(message, !no_context).await?;
            println!("user  {}", outcome.user_node.id);
            println!("model {}  {}", outcome.reply.id, outcome.reply.text);
            if let Some(error) = outcome.error {
                warn!("Generation failed: {}", error);
            }
        }
        Commands::Regenerate { project, node } => {
            context.bootstrap(Some(&project)).await?;
            let outcome = context.regenerate(&project, &node).await?;
            println!("user  {}", outcome.user_node.id);
            println!("model {}  {}", outcome.reply.id, outcome.reply.text);
        }
        Commands::Remove { project, node } => {
            context.bootstrap(Some(&project)).await?;
            context.remove_node(&project, &node).await?;
            println!("Removed {}", node);
        }
        Commands::Move {
            project,
            node,
            x,
            y,
        } => {
            context.bootstrap(Some(&project)).await?;
            let moved = context
                .move_node(&project, &node, Position::new(x, y))
                .await?;
            println!("{}  ({}, {})", moved.id, moved.position.x, moved.position.y);
        }
        Commands::Connections { project } => {
            context.bootstrap(Some(&project)).await?;
            for connection in context.connections(&project).await? {
                println!(
                    "{} -> {}  {}",
                    connection.parent_id,
                    connection.child_id,
                    connection.svg_path()
                );
            }
        }
        Commands::Credits { user, grant } => {
            let user = user.unwrap_or_else(|| config.user_id.clone());
            let billing = context.billing_service();
            billing.ensure_profile(&user).await?;
            if let Some(amount) = grant {
                billing.grant_credits(&user, amount, "Manual Grant").await?;
            }

            println!("Balance: {}", billing.balance(&user).await?);
            for entry in billing.history(&user).await? {
                println!(
                    "{}  {:>6}  {}",
                    entry.created_at.to_rfc3339(),
                    entry.amount,
                    entry.source
                );
            }
        }
    }

    Ok(())
}

fn build_generator(config: &AppConfig) -> Arc<dyn ImageGenerator> {
    #[cfg(feature = "gemini")]
    {
        use branchcanvas::services::generation::GeminiClient;
        match GeminiClient::new(&config.gemini) {
            Ok(client) => return Arc::new(client),
            Err(e) => warn!("Image generation disabled: {}", e),
        }
    }
    #[cfg(not(feature = "gemini"))]
    let _ = config;

    Arc::new(UnconfiguredGenerator::new("GEMINI_API_KEY"))
}

fn print_forest(forest: &Forest) {
    fn walk(forest: &Forest, id: &str, depth: usize, seen: &mut Vec<String>) {
        if seen.iter().any(|s| s == id) {
            return;
        }
        seen.push(id.to_string());
        if let Some(node) = forest.get(id) {
            let image = if node.has_image() { " [image]" } else { "" };
            println!(
                "{}{} {} ({}, {}) {}{}",
                "  ".repeat(depth),
                node.role,
                node.id,
                node.position.x,
                node.position.y,
                node.text,
                image
            );
            for child in forest.children(id) {
                walk(forest, child, depth + 1, seen);
            }
        }
    }

    let mut seen = Vec::new();
    for root in forest.roots() {
        walk(forest, &root.id, 0, &mut seen);
    }
}

fn setup_logging(log_level: Option<&str>) {
    let log_level = match log_level.map(|level| level.to_lowercase()) {
        Some(level) if level == "debug" => "debug",
        Some(level) if level == "trace" => "trace",
        Some(level) if level == "warn" => "warn",
        Some(level) if level == "error" => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .without_time()
        .init();
}

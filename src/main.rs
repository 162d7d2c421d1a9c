use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use product_versions::cloning::ClonePolicy;
use product_versions::config::Config;
use product_versions::db::Database;
use product_versions::models::*;
use product_versions::{render, version_key::VersionKey};

#[derive(Parser)]
#[command(name = "pver")]
#[command(about = "Product versions in numeral-aware order")]
struct Cli {
    /// SQLite database path (defaults to $PVER_DATABASE or the data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage products
    #[command(subcommand)]
    Product(ProductCommand),
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Manage product versions
    #[command(subcommand)]
    Version(VersionCommand),
    /// Add a member to a version's own team
    Team { version_id: Uuid, user_id: Uuid },
    /// Create environments from CATEGORY=ELEMENT pairs and attach them to a version
    Env {
        version_id: Uuid,
        /// e.g. OS=Linux OS=Windows Browser=Firefox
        #[arg(required = true)]
        elements: Vec<String>,
    },
    /// Record a test run against a version
    Run { version_id: Uuid, name: String },
    /// Add a test case version to a version
    Case { version_id: Uuid, name: String },
    /// Sort version strings without touching the database
    Sort {
        #[arg(required = true)]
        versions: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ProductCommand {
    Add {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    List,
    /// Show a product with its versions in order
    Show { id: Uuid },
    /// Add a user to the product team
    Team { id: Uuid, user_id: Uuid },
}

#[derive(Subcommand)]
enum UserCommand {
    Add { username: String },
}

#[derive(Subcommand)]
enum VersionCommand {
    Add {
        product_id: Uuid,
        version: String,
        #[arg(short, long)]
        codename: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Keep a team separate from the product's
        #[arg(long)]
        own_team: bool,
    },
    Edit {
        id: Uuid,
        #[arg(long)]
        version: Option<String>,
        #[arg(short, long)]
        codename: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        own_team: Option<bool>,
    },
    /// Clone with environments and team; runs and cases stay behind
    Clone {
        id: Uuid,
        /// Copy only these associations (environments, team)
        #[arg(long = "copy", value_delimiter = ',')]
        copy: Vec<Association>,
    },
    List { product_id: Uuid },
    Show { id: Uuid },
    /// Recompute the order of a product's versions
    Reorder { product_id: Uuid },
}

/// Initialize tracing on stderr so stdout carries only command output.
fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text(value));
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env()?.with_database(cli.db.clone());
    init_tracing(&config.log_filter);

    // Sorting needs no database
    if let Commands::Sort { versions } = &cli.command {
        let mut sorted = versions.clone();
        sorted.sort_by_cached_key(|v| VersionKey::parse(v));
        return print(cli.json, &sorted, |s| {
            s.iter().map(|v| format!("{}\n", v)).collect()
        });
    }

    let db = Database::open(config.database_path.clone()).with_context(|| {
        format!("Failed to open database {}", config.database_path.display())
    })?;
    db.migrate().context("Failed to run migrations")?;

    let json = cli.json;
    match cli.command {
        Commands::Product(command) => match command {
            ProductCommand::Add { name, description } => {
                let product = db.create_product(CreateProductInput { name, description })?;
                print(json, &product, |p| format!("{}\t{}\n", p.id, p.name))?;
            }
            ProductCommand::List => {
                let products = db.get_all_products()?;
                print(json, &products, |ps| {
                    ps.iter().map(|p| format!("{}\t{}\n", p.id, p.name)).collect()
                })?;
            }
            ProductCommand::Show { id } => {
                let product = db
                    .get_product_with_versions(id)?
                    .with_context(|| format!("Product not found: {}", id))?;
                print(json, &product, render::render_product)?;
            }
            ProductCommand::Team { id, user_id } => {
                db.add_product_team_member(id, user_id)?;
                let team = db.get_product_team(id)?;
                print(json, &team, |us| render_users(us))?;
            }
        },
        Commands::User(UserCommand::Add { username }) => {
            let user = db.create_user(CreateUserInput { username })?;
            print(json, &user, |u| format!("{}\t{}\n", u.id, u.username))?;
        }
        Commands::Version(command) => match command {
            VersionCommand::Add {
                product_id,
                version,
                codename,
                description,
                own_team,
            } => {
                let version = db.create_version(
                    product_id,
                    CreateVersionInput {
                        version,
                        codename,
                        description,
                        has_team: own_team,
                    },
                )?;
                print(json, &version, |v| render::render_versions(std::slice::from_ref(v)))?;
            }
            VersionCommand::Edit {
                id,
                version,
                codename,
                description,
                own_team,
            } => {
                let version = db
                    .update_version(
                        id,
                        UpdateVersionInput {
                            version,
                            codename,
                            description,
                            has_team: own_team,
                        },
                    )?
                    .with_context(|| format!("Product version not found: {}", id))?;
                print(json, &version, |v| render::render_versions(std::slice::from_ref(v)))?;
            }
            VersionCommand::Clone { id, copy } => {
                let clone = if copy.is_empty() {
                    db.clone_version(id)?
                } else {
                    let policy = ClonePolicy {
                        associations: copy,
                        ..ClonePolicy::product_version()
                    };
                    db.clone_version_with(id, &policy)?
                };
                print(json, &clone, |v| render::render_versions(std::slice::from_ref(v)))?;
            }
            VersionCommand::List { product_id } => {
                let versions = db.get_versions_by_product(product_id)?;
                print(json, &versions, |vs| render::render_versions(vs))?;
            }
            VersionCommand::Show { id } => {
                let detail = db
                    .get_version_detail(id)?
                    .with_context(|| format!("Product version not found: {}", id))?;
                print(json, &detail, render::render_detail)?;
            }
            VersionCommand::Reorder { product_id } => {
                let versions = db.reorder_product(product_id)?;
                print(json, &versions, |vs| render::render_versions(vs))?;
            }
        },
        Commands::Team { version_id, user_id } => {
            db.add_version_team_member(version_id, user_id)?;
            let team = db.get_version_own_team(version_id)?;
            print(json, &team, |us| render_users(us))?;
        }
        Commands::Env {
            version_id,
            elements,
        } => {
            let categories = parse_categories(&elements)?;
            let environments = db.attach_environment_matrix(version_id, &categories)?;
            print(json, &environments, |envs| {
                envs.iter()
                    .map(|e| format!("{}\t{}\n", e.id, e.elements.join(", ")))
                    .collect()
            })?;
        }
        Commands::Run { version_id, name } => {
            let run = db.create_run(version_id, CreateRunInput { name })?;
            print(json, &run, |r| format!("{}\t{}\n", r.id, r.name))?;
        }
        Commands::Case { version_id, name } => {
            let case = db.create_case_version(version_id, CreateCaseVersionInput { name })?;
            print(json, &case, |c| format!("{}\t{}\n", c.id, c.name))?;
        }
        Commands::Sort { .. } => unreachable!("handled before opening the database"),
    }

    Ok(())
}

fn render_users(users: &[User]) -> String {
    users
        .iter()
        .map(|u| format!("{}\t{}\n", u.id, u.username))
        .collect()
}

/// Group CATEGORY=ELEMENT arguments by category, keeping element order.
fn parse_categories(pairs: &[String]) -> Result<BTreeMap<String, Vec<String>>> {
    let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pair in pairs {
        let (category, element) = pair
            .split_once('=')
            .with_context(|| format!("Expected CATEGORY=ELEMENT, got '{}'", pair))?;
        categories
            .entry(category.trim().to_string())
            .or_default()
            .push(element.trim().to_string());
    }
    Ok(categories)
}

//! Bindery CTL - Admin Command Line Interface
//!
//! This binary provides administrative commands over a Bindery catalog store.

use anyhow::{Context, Result};
use bindery_common::{Config, ParsedSeries, Role, hash_id};
use bindery_store::{ImageThumbnailer, PauseController, Store};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "bindery-ctl")]
#[command(about = "Bindery catalog store admin CLI")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/bindery/bindery.toml")]
    config: String,

    /// Database file, overrides the config file
    #[arg(short, long, env = "BINDERY_DB")]
    db: Option<PathBuf>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database and a default administrator if there are no users
    Init,
    /// Merge a JSON manifest of parsed series into the catalog
    Populate {
        /// Path of the manifest produced by the library scanner
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// List the catalog
    Catalog,
    /// List the entries of a series
    Entries {
        /// Series title
        series: String,
    },
    /// Report items that no longer match the library
    Missing {
        /// Delete the reported items
        #[arg(long)]
        delete: bool,
    },
    /// Generate missing thumbnails
    Thumbnails {
        /// Regenerate every thumbnail
        #[arg(long)]
        force: bool,
    },
    /// User operations
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
    /// Download records
    Downloads {
        /// Remove downloads that reached a final state
        #[arg(long)]
        clear_finished: bool,
    },
    /// Print every namespace of the store
    Dump,
}

#[derive(Subcommand, Debug)]
enum UserCommands {
    /// List users
    List,
    /// Create a user
    Add {
        name: String,
        password: String,
        #[arg(long)]
        admin: bool,
    },
    /// Delete a user
    Delete { name: String },
    /// Rename a user
    Rename { name: String, new_name: String },
    /// Change a user's password
    Passwd { name: String, password: String },
    /// Change a user's role (admin or standard)
    Role { name: String, role: String },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load config file if it exists
    let config = if Path::new(&args.config).exists() {
        let config_str = std::fs::read_to_string(&args.config)?;
        Config::from_toml(&config_str).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to parse config file: {e}");
            Config::default()
        })
    } else {
        Config::default()
    };

    // CLI takes precedence
    let db_path = args.db.unwrap_or_else(|| config.store.path.clone());
    let log_level = args.log_level.unwrap_or_else(|| config.logging.level.clone());
    let json = args.json || config.logging.json;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let store = Store::open(&db_path)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?
        .with_thumbnailer(Arc::new(ImageThumbnailer::new(&config.thumbnails)));
    info!(path = %db_path.display(), "opened store");
    let pause = PauseController::new();

    match args.command {
        Commands::Init => match store.ensure_default_user(&config.store.default_admin)? {
            Some((name, password)) => {
                println!("Created administrator");
                println!("  Username: {name}");
                println!("  Password: {password}");
            }
            None => println!("Users already exist, nothing to do"),
        },
        Commands::Populate { manifest } => {
            let data = std::fs::read(&manifest)
                .with_context(|| format!("failed to read {}", manifest.display()))?;
            let parsed: Vec<ParsedSeries> = serde_json::from_slice(&data)?;
            if let Err(e) = store.populate_catalog(&parsed, &pause) {
                warn!(error = %e, "populate finished with errors");
            }
            println!("Catalog now holds {} series", store.catalog()?.len());
        }
        Commands::Catalog => {
            let catalog = store.catalog()?;
            println!("Catalog");
            println!("=======");
            if catalog.is_empty() {
                println!("No series found");
            } else {
                println!("{:<6} {:<40} {:>8} {:>8}  TAGS", "ORDER", "TITLE", "ENTRIES", "PAGES");
                println!("{}", "-".repeat(80));
                for series in catalog {
                    println!(
                        "{:<6} {:<40} {:>8} {:>8}  {}",
                        series.order,
                        series.title,
                        series.entries,
                        series.total_pages,
                        series.tags.join(", ")
                    );
                }
            }
        }
        Commands::Entries { series } => {
            let sid = hash_id(&series);
            let entries = store.entries(&sid)?;
            println!("{series}");
            println!("{}", "=".repeat(series.len()));
            println!("{:<6} {:<40} {:>6}  PATH", "ORDER", "TITLE", "PAGES");
            println!("{}", "-".repeat(80));
            for entry in entries {
                println!(
                    "{:<6} {:<40} {:>6}  {}",
                    entry.order,
                    entry.title,
                    entry.pages,
                    entry.path.display()
                );
            }
        }
        Commands::Missing { delete } => {
            let items = store.missing_items(&pause)?;
            if items.is_empty() {
                println!("Nothing missing");
            } else {
                println!("{:<10} {:<40} PATH", "TYPE", "TITLE");
                println!("{}", "-".repeat(80));
                for item in &items {
                    println!("{:<10} {:<40} {}", item.kind.to_string(), item.title, item.path);
                }
                if delete {
                    store.delete_missing_items(&pause)?;
                    println!();
                    println!("Deleted {} missing items", items.len());
                }
            }
        }
        Commands::Thumbnails { force } => {
            if let Err(e) = store.generate_thumbnails(force, &pause) {
                warn!(error = %e, "thumbnail generation finished with errors");
            }
            println!("Thumbnails generated");
        }
        Commands::User { action } => handle_user(&store, action)?,
        Commands::Downloads { clear_finished } => {
            if clear_finished {
                let removed = store.clear_finished_downloads()?;
                println!("Removed {removed} finished downloads");
            }
            println!("{:<6} {:<30} {:<10} {:<20} PROGRESS", "ID", "SERIES", "CHAPTER", "STATUS");
            println!("{}", "-".repeat(80));
            for (id, download) in store.downloads()? {
                println!(
                    "{:<6} {:<30} {:<10} {:<20} {}/{}",
                    id,
                    download.series,
                    download.chapter.as_deref().unwrap_or("-"),
                    download.status.to_string(),
                    download.current_page,
                    download.total_pages
                );
            }
        }
        Commands::Dump => print!("{}", store.dump()?),
    }

    Ok(())
}

fn handle_user(store: &Store, action: UserCommands) -> Result<()> {
    match action {
        UserCommands::List => {
            let users = store.users(true)?;
            println!("Users");
            println!("=====");
            if users.is_empty() {
                println!("No users found");
            } else {
                println!("{:<42} {:<30} {:<10}", "USER ID", "NAME", "ROLE");
                println!("{}", "-".repeat(84));
                for user in users {
                    println!("{:<42} {:<30} {:<10}", user.hash, user.name, user.role.to_string());
                }
            }
        }
        UserCommands::Add {
            name,
            password,
            admin,
        } => {
            let role = if admin { Role::Admin } else { Role::Standard };
            let user = store.create_user(&name, &password, role)?;
            println!("User created successfully!");
            println!("  User ID: {}", user.hash);
            println!("  Role:    {role}");
        }
        UserCommands::Delete { name } => {
            store.delete_user(&hash_id(&name))?;
            println!("User {name} deleted");
        }
        UserCommands::Rename { name, new_name } => {
            let uid = store.rename_user(&hash_id(&name), &new_name)?;
            println!("User {name} renamed to {new_name} ({uid})");
        }
        UserCommands::Passwd { name, password } => {
            store.change_password(&hash_id(&name), &password)?;
            println!("Password changed for {name}");
        }
        UserCommands::Role { name, role } => {
            let role: Role = role.parse()?;
            store.change_user_type(&hash_id(&name), role)?;
            println!("{name} is now {role}");
        }
    }
    Ok(())
}

//! # Change Monitor CLI (`cmon`)
//!
//! ## Usage
//!
//! ```bash
//! cmon --config ./config/cmon.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cmon init` | Create the SQLite database and run schema migrations |
//! | `cmon serve` | Run the scheduler until Ctrl-C |
//! | `cmon run <hours>` | Run one bucket's batches once |
//! | `cmon endpoint add\|list\|update\|delete\|run` | Manage monitored endpoints |
//! | `cmon repo add\|list\|update\|delete\|run` | Manage monitored repositories |
//! | `cmon diff list\|show` | Inspect recorded repository diffs |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use change_monitor::app::Monitor;
use change_monitor::config::{self, Config};
use change_monitor::manage::{self, EndpointSettings, RepositorySettings};
use change_monitor::{db, migrate};

/// Change Monitor: alerts when watched web content or repository files change.
#[derive(Parser)]
#[command(name = "cmon", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cmon.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Start the interval scheduler and run until interrupted.
    Serve,

    /// Run the endpoint and repository batches for one bucket, once.
    Run {
        /// Schedule bucket in hours.
        hours: u32,
    },

    /// Manage monitored endpoints.
    Endpoint {
        #[command(subcommand)]
        action: EndpointAction,
    },

    /// Manage monitored repositories.
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },

    /// Inspect recorded repository diffs.
    Diff {
        #[command(subcommand)]
        action: DiffAction,
    },
}

#[derive(Subcommand)]
enum EndpointAction {
    /// Register an endpoint and record its first state.
    Add {
        url: String,
        /// Extraction profile: `html` or `js`.
        #[arg(long)]
        profile: String,
        /// Selector passed to the html extractor.
        #[arg(long)]
        selector: Option<String>,
        /// Schedule bucket in hours.
        #[arg(long)]
        schedule: Option<u32>,
    },
    List,
    /// Change selector, profile, schedule or the deleted flag.
    Update {
        url: String,
        #[arg(long)]
        selector: Option<String>,
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        schedule: Option<u32>,
        #[arg(long)]
        deleted: Option<bool>,
    },
    /// Soft-delete an endpoint.
    Delete {
        url: String,
        /// Remove the row instead.
        #[arg(long)]
        purge: bool,
    },
    /// Run one cycle for an endpoint now.
    Run { url: String },
}

#[derive(Subcommand)]
enum RepoAction {
    /// Register a repository to track.
    Add {
        url: String,
        /// Local clone directory. Defaults to `<repositories.root>/<name>`.
        #[arg(long)]
        directory: Option<String>,
        /// JSON array of watched path substrings, e.g. '["README.md"]'.
        #[arg(long)]
        watch: String,
        #[arg(long)]
        remote: Option<String>,
        #[arg(long)]
        schedule: Option<u32>,
    },
    List,
    Update {
        url: String,
        #[arg(long)]
        directory: Option<String>,
        #[arg(long)]
        watch: Option<String>,
        #[arg(long)]
        remote: Option<String>,
        #[arg(long)]
        schedule: Option<u32>,
        #[arg(long)]
        deleted: Option<bool>,
    },
    /// Soft-delete a repository.
    Delete { url: String },
    /// Pull and diff one repository now.
    Run { url: String },
}

#[derive(Subcommand)]
enum DiffAction {
    /// List diffs, newest first.
    List,
    /// Print one diff with its body.
    Show { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("change_monitor=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Serve => serve(&cfg).await?,
        Commands::Run { hours } => {
            let monitor = Monitor::from_config(&cfg).await?;
            let (endpoints, repositories) = monitor.run_bucket(hours).await?;
            if endpoints.is_clean() {
                println!("Running crawler on {} endpoint(s).", endpoints.processed);
            } else {
                for e in &endpoints.errors {
                    println!("{}", e);
                }
            }
            println!("Pulled {} repository(ies).", repositories.processed);
        }
        Commands::Endpoint { action } => endpoint_command(&cfg, action).await?,
        Commands::Repo { action } => repo_command(&cfg, action).await?,
        Commands::Diff { action } => diff_command(&cfg, action).await?,
    }

    Ok(())
}

async fn serve(cfg: &Config) -> anyhow::Result<()> {
    let monitor = Monitor::from_config(cfg).await?;
    let handle = monitor.scheduler().start();
    println!(
        "Scheduler running {} task(s). Press Ctrl-C to stop.",
        handle.task_count()
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    tracing::info!("shutdown requested");
    handle.shutdown().await;
    Ok(())
}

async fn endpoint_command(cfg: &Config, action: EndpointAction) -> anyhow::Result<()> {
    let monitor = Monitor::from_config(cfg).await?;
    let store = monitor.store.as_ref();

    match action {
        EndpointAction::Add {
            url,
            profile,
            selector,
            schedule,
        } => {
            manage::add_endpoint(store, &url, &profile, selector.as_deref(), schedule).await?;
            monitor.endpoints.run_url(&url).await?;
            println!("Done: {}", url);
        }
        EndpointAction::List => {
            let endpoints = store.get_all_endpoints().await?;
            if endpoints.is_empty() {
                println!("No endpoints.");
            }
            for e in endpoints {
                println!(
                    "{}\tprofile={}\tschedule={}h\tstatus={}\t{}",
                    e.url,
                    e.profile,
                    e.schedule_hours,
                    e.status_code,
                    if e.deleted { "deleted" } else { "active" }
                );
            }
        }
        EndpointAction::Update {
            url,
            selector,
            profile,
            schedule,
            deleted,
        } => {
            let settings = EndpointSettings {
                selector,
                profile,
                schedule_hours: schedule,
                deleted,
            };
            manage::update_endpoint(store, &url, &settings).await?;
            println!("Updated: {}", url);
        }
        EndpointAction::Delete { url, purge } => {
            if purge {
                let rows = store.delete_endpoint(&url).await?;
                println!("Rows affected: {}", rows);
            } else {
                manage::soft_delete_endpoint(store, &url).await?;
                println!("Deleted: {}", url);
            }
        }
        EndpointAction::Run { url } => {
            monitor.endpoints.run_url(&url).await?;
            println!("Done: {}", url);
        }
    }
    Ok(())
}

async fn repo_command(cfg: &Config, action: RepoAction) -> anyhow::Result<()> {
    let monitor = Monitor::from_config(cfg).await?;
    let store = monitor.store.as_ref();

    match action {
        RepoAction::Add {
            url,
            directory,
            watch,
            remote,
            schedule,
        } => {
            let repo = manage::add_repository(
                store,
                &cfg.repositories.root,
                &url,
                directory.as_deref(),
                &watch,
                remote.as_deref(),
                schedule,
            )
            .await?;
            println!("Added: {} -> {}", repo.url, repo.directory);
            // The first scheduled pull diffs against this checkout. A failed
            // clone is retried by that cycle.
            if let Err(e) = monitor.repositories.prepare_checkout(&repo.url).await {
                tracing::warn!(url = %repo.url, error = %e, "initial clone failed");
            }
        }
        RepoAction::List => {
            let repositories = store.get_all_repositories().await?;
            if repositories.is_empty() {
                println!("No repositories.");
            }
            for r in repositories {
                println!(
                    "{}\tdir={}\tremote={}\twatch={}\tschedule={}h\t{}",
                    r.url,
                    r.directory,
                    r.remote,
                    r.watched_files,
                    r.schedule_hours,
                    if r.deleted { "deleted" } else { "active" }
                );
            }
        }
        RepoAction::Update {
            url,
            directory,
            watch,
            remote,
            schedule,
            deleted,
        } => {
            let settings = RepositorySettings {
                directory,
                watch,
                remote,
                schedule_hours: schedule,
                deleted,
            };
            manage::update_repository(store, &url, &settings).await?;
            println!("Updated: {}", url);
        }
        RepoAction::Delete { url } => {
            manage::soft_delete_repository(store, &url).await?;
            println!("Deleted: {}", url);
        }
        RepoAction::Run { url } => match monitor.repositories.run_url(&url).await? {
            Some(diff) => println!("{}", monitor.repositories.alert_message(&url, &diff.id)),
            None => println!("No changes: {}", url),
        },
    }
    Ok(())
}

async fn diff_command(cfg: &Config, action: DiffAction) -> anyhow::Result<()> {
    let monitor = Monitor::from_config(cfg).await?;

    match action {
        DiffAction::List => {
            let diffs = monitor.store.get_all_diffs().await?;
            if diffs.is_empty() {
                println!("No diffs.");
            }
            for d in diffs {
                println!(
                    "{}\t{}\t{}\t{}",
                    d.id,
                    d.created_at.format("%Y-%m-%d %H:%M:%S"),
                    d.url,
                    d.commit
                );
            }
        }
        DiffAction::Show { id } => {
            let diff = monitor
                .store
                .get_diff(&id)
                .await?
                .with_context(|| format!("diff not found: {}", id))?;
            println!("repo:    {}", diff.url);
            println!("commit:  {}", diff.commit);
            println!("created: {}", diff.created_at.to_rfc3339());
            println!();
            print!("{}", diff.body);
        }
    }
    Ok(())
}

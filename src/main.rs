//! # Codebase Assistant CLI (`cba`)
//!
//! ## Usage
//!
//! ```bash
//! cba --config ./config/cba.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cba init` | Create the vector store and registry |
//! | `cba project create\|list\|show\|delete` | Manage projects |
//! | `cba ingest folder\|repo\|files` | Ingest sources into a project |
//! | `cba reembed <id>` | Re-ingest a project's recorded root path |
//! | `cba ask "<question>"` | Retrieval-augmented answer |
//! | `cba search "<query>"` | Retrieval-only previews |
//! | `cba files\|documents\|chunks <id>` | Browse stored chunks |
//! | `cba stats <id>` | Chunk count for a project |
//! | `cba sweep` | Delete chunks of unregistered projects |
//! | `cba serve` | Start the HTTP API |
//!
//! Structured results are printed as pretty JSON on stdout. Logs go to
//! stderr and are filtered with `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use codebase_assistant::config::{self, Config};
use codebase_assistant::context::AppContext;
use codebase_assistant::embedding::DisabledProvider;
use codebase_assistant::llm::DisabledCompletion;
use codebase_assistant::registry::NewProject;
use codebase_assistant::sqlite_store::SqliteVectorDb;
use codebase_assistant::{projects, retrieval, server};

/// Codebase Assistant: ask natural-language questions about private codebases.
#[derive(Parser)]
#[command(name = "cba", version)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/cba.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vector store and an empty registry. Idempotent.
    Init,

    /// Manage projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Ingest sources into a project.
    Ingest {
        #[command(subcommand)]
        action: IngestAction,
    },

    /// Re-ingest a project's recorded root path.
    Reembed {
        project_id: String,
        /// `replace` deletes existing chunks first; `append` keeps them.
        #[arg(long, default_value = "replace")]
        strategy: String,
    },

    /// Answer a question from retrieved chunks.
    Ask {
        question: String,
        /// Restrict retrieval to one project.
        #[arg(long)]
        project: Option<String>,
        /// Number of chunks to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the full response (answer and matches) as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Retrieval-only search with short previews.
    Search {
        query: String,
        #[arg(long)]
        project: Option<String>,
    },

    /// List a project's files with chunk counts.
    Files {
        project_id: String,
        /// Glob over `rel_path`, e.g. `src/**/*.rs`.
        #[arg(long)]
        pattern: Option<String>,
    },

    /// List a project's documents with chunk counts.
    Documents { project_id: String },

    /// Print stored chunks, ordered by file then index.
    Chunks {
        project_id: String,
        #[arg(long)]
        rel_path: Option<String>,
        #[arg(long, default_value_t = 200)]
        limit: usize,
    },

    /// Chunk count for one project.
    Stats { project_id: String },

    /// Delete chunks whose project is no longer registered.
    Sweep,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Register a project. Needs `--repo-url` or `--root-path`.
    Create {
        name: String,
        #[arg(long)]
        repo_url: Option<String>,
        #[arg(long)]
        root_path: Option<String>,
        #[arg(long)]
        branch: Option<String>,
    },
    List,
    Show {
        project_id: String,
    },
    /// Delete a project and all of its chunks.
    Delete {
        project_id: String,
    },
}

#[derive(Subcommand)]
enum IngestAction {
    /// Walk a local folder.
    Folder {
        project_id: String,
        path: PathBuf,
        /// Only include files with these suffixes (repeatable), e.g. `--ext .py`.
        #[arg(long = "ext")]
        extensions: Vec<String>,
    },
    /// Clone or update a git repository, then walk it.
    Repo {
        project_id: String,
        repo_url: String,
        /// Local checkout directory.
        #[arg(long)]
        dest: PathBuf,
        #[arg(long)]
        branch: Option<String>,
    },
    /// Upsert individual files.
    Files {
        project_id: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load(path: &std::path::Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load(&cli.config)?;

    // Init must work before any provider credentials are configured.
    if let Commands::Init = cli.command {
        let db = SqliteVectorDb::open(&cfg.store.path, &cfg.store.collection).await?;
        let ctx = AppContext::new(
            cfg,
            Arc::new(db),
            Arc::new(DisabledProvider),
            Arc::new(DisabledCompletion),
        );
        ctx.registry.ensure_exists().await?;
        println!("Initialized store at {}", ctx.config.store.path.display());
        println!("Registry at {}", ctx.registry.path().display());
        return Ok(());
    }

    let ctx = AppContext::from_config(cfg).await?;

    match cli.command {
        Commands::Init => {}
        Commands::Project { action } => match action {
            ProjectAction::Create {
                name,
                repo_url,
                root_path,
                branch,
            } => {
                let req = NewProject {
                    project_name: name,
                    repo_url,
                    root_path,
                    branch,
                };
                print_json(&projects::create_project(&ctx, req).await?)?;
            }
            ProjectAction::List => print_json(&projects::list_projects(&ctx).await?)?,
            ProjectAction::Show { project_id } => {
                print_json(&projects::show_project(&ctx, &project_id).await?)?
            }
            ProjectAction::Delete { project_id } => {
                print_json(&projects::delete_project(&ctx, &project_id).await?)?
            }
        },
        Commands::Ingest { action } => match action {
            IngestAction::Folder {
                project_id,
                path,
                extensions,
            } => {
                let exts = (!extensions.is_empty()).then_some(extensions);
                let result =
                    projects::ingest_folder(&ctx, &project_id, &path, exts.as_deref()).await?;
                print_json(&result)?;
            }
            IngestAction::Repo {
                project_id,
                repo_url,
                dest,
                branch,
            } => {
                let result =
                    projects::ingest_repo(&ctx, &project_id, &repo_url, branch.as_deref(), &dest)
                        .await?;
                print_json(&result)?;
            }
            IngestAction::Files { project_id, paths } => {
                print_json(&projects::upsert_files(&ctx, &project_id, &paths).await?)?
            }
        },
        Commands::Reembed {
            project_id,
            strategy,
        } => print_json(&projects::reembed(&ctx, &project_id, &strategy).await?)?,
        Commands::Ask {
            question,
            project,
            top_k,
            json,
        } => {
            let top_k = top_k.unwrap_or(ctx.config.retrieval.top_k);
            let response = retrieval::ask(&ctx, &question, project.as_deref(), top_k).await?;
            if json {
                print_json(&response)?;
            } else {
                println!("{}", response.answer);
                if !response.matches.is_empty() {
                    println!();
                    println!("Sources:");
                    for m in &response.matches {
                        println!(
                            "  {} #{} ({})",
                            m.metadata.rel_path, m.metadata.chunk_idx, m.metadata.project_id
                        );
                    }
                }
            }
        }
        Commands::Search { query, project } => {
            print_json(&retrieval::search(&ctx, &query, project.as_deref()).await?)?
        }
        Commands::Files {
            project_id,
            pattern,
        } => {
            ctx.registry.require(&project_id).await?;
            print_json(&ctx.store.list_files(&project_id, pattern.as_deref()).await?)?;
        }
        Commands::Documents { project_id } => {
            ctx.registry.require(&project_id).await?;
            print_json(&ctx.store.list_documents(&project_id).await?)?;
        }
        Commands::Chunks {
            project_id,
            rel_path,
            limit,
        } => {
            ctx.registry.require(&project_id).await?;
            print_json(
                &ctx.store
                    .get_chunks(&project_id, rel_path.as_deref(), limit)
                    .await?,
            )?;
        }
        Commands::Stats { project_id } => {
            ctx.registry.require(&project_id).await?;
            print_json(&ctx.store.stats(&project_id).await?)?;
        }
        Commands::Sweep => print_json(&projects::sweep_orphans(&ctx).await?)?,
        Commands::Serve => server::run_server(ctx).await?,
    }

    Ok(())
}

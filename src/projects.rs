//! Project-scoped operations.
//!
//! Each function resolves the project in the registry first (a missing
//! project is an input error raised before any side effect), then delegates
//! to the ingestion orchestrator or the vector store adapter. The CLI and
//! the HTTP API are thin layers over this module.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::info;

use codebase_assistant_core::filter::Filter;
use codebase_assistant_core::models::Project;

use crate::context::AppContext;
use crate::error::{AssistantError, Result};
use crate::ingest::{self, IngestResult, ReembedResult, ReembedStrategy, UpsertFilesResult};
use crate::metadata::ProjectSource;
use crate::registry::NewProject;

/// A project record together with its live chunk count.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub status: String,
    pub project_id: String,
    pub deleted_chunks: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepResult {
    /// Orphaned project id -> chunks deleted.
    pub deleted: BTreeMap<String, usize>,
}

fn source_for(project: &Project) -> ProjectSource {
    ProjectSource::new(&project.project_id, &project.project_name)
        .with_repo(project.repo_url.clone(), project.branch.clone())
}

pub async fn create_project(ctx: &AppContext, req: NewProject) -> Result<Project> {
    let project = ctx.registry.create(req).await?;
    info!(project_id = %project.project_id, name = %project.project_name, "project created");
    Ok(project)
}

pub async fn list_projects(ctx: &AppContext) -> Result<Vec<ProjectSummary>> {
    let mut out = Vec::new();
    for project in ctx.registry.list().await {
        let chunk_count = ctx.store.stats(&project.project_id).await?.chunk_count;
        out.push(ProjectSummary {
            project,
            chunk_count,
        });
    }
    Ok(out)
}

pub async fn show_project(ctx: &AppContext, project_id: &str) -> Result<ProjectSummary> {
    let project = ctx.registry.require(project_id).await?;
    let chunk_count = ctx.store.stats(project_id).await?.chunk_count;
    Ok(ProjectSummary {
        project,
        chunk_count,
    })
}

/// Delete a project's chunks, then its registry record.
pub async fn delete_project(ctx: &AppContext, project_id: &str) -> Result<DeleteResult> {
    ctx.registry.require(project_id).await?;
    let deleted_chunks = ctx.store.delete_where(&Filter::project(project_id)).await?;
    ctx.registry.remove(project_id).await?;
    info!(project_id, deleted_chunks, "project deleted");
    Ok(DeleteResult {
        status: "deleted".to_string(),
        project_id: project_id.to_string(),
        deleted_chunks,
    })
}

pub async fn ingest_folder(
    ctx: &AppContext,
    project_id: &str,
    folder: &Path,
    extensions: Option<&[String]>,
) -> Result<IngestResult> {
    let project = ctx.registry.require(project_id).await?;
    ingest::ingest_folder(ctx, folder, &source_for(&project), extensions).await
}

/// Sync and ingest a repository, then record it as the project's source.
pub async fn ingest_repo(
    ctx: &AppContext,
    project_id: &str,
    repo_url: &str,
    branch: Option<&str>,
    dest_dir: &Path,
) -> Result<IngestResult> {
    let project = ctx.registry.require(project_id).await?;
    let result = ingest::ingest_repository(
        ctx,
        repo_url,
        dest_dir,
        branch,
        project_id,
        &project.project_name,
    )
    .await?;

    ctx.registry
        .update_source(
            project_id,
            Some(repo_url.to_string()),
            Some(dest_dir.to_string_lossy().to_string()),
            branch.map(str::to_string),
        )
        .await?;
    Ok(result)
}

pub async fn upsert_files(
    ctx: &AppContext,
    project_id: &str,
    files: &[PathBuf],
) -> Result<UpsertFilesResult> {
    let project = ctx.registry.require(project_id).await?;
    ingest::upsert_files(ctx, files, &source_for(&project)).await
}

/// Save uploaded contents under the uploads directory, then upsert them.
/// Only the final path component of each name is kept; two parts with
/// the same final component are rejected before anything is written.
pub async fn upload_files(
    ctx: &AppContext,
    project_id: &str,
    uploads: Vec<(String, Vec<u8>)>,
) -> Result<UpsertFilesResult> {
    let project = ctx.registry.require(project_id).await?;

    let mut named = Vec::with_capacity(uploads.len());
    let mut seen = HashSet::new();
    for (name, bytes) in uploads {
        let file_name = Path::new(&name)
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| AssistantError::InvalidInput(format!("invalid file name: '{}'", name)))?;
        if !seen.insert(file_name.clone()) {
            return Err(AssistantError::InvalidInput(format!(
                "duplicate file name in upload: '{}'",
                file_name.to_string_lossy()
            )));
        }
        named.push((file_name, bytes));
    }

    let dir = &ctx.config.ingest.uploads_dir;
    tokio::fs::create_dir_all(dir).await?;

    let mut saved = Vec::with_capacity(named.len());
    for (file_name, bytes) in named {
        let dest = dir.join(file_name);
        tokio::fs::write(&dest, bytes).await?;
        saved.push(dest);
    }

    ingest::upsert_files(ctx, &saved, &source_for(&project)).await
}

pub async fn reembed(ctx: &AppContext, project_id: &str, strategy: &str) -> Result<ReembedResult> {
    let project = ctx.registry.require(project_id).await?;
    let strategy: ReembedStrategy = strategy.parse()?;
    ingest::reembed(ctx, &project, strategy).await
}

/// Delete chunks whose `project_id` has no registry record.
pub async fn sweep_orphans(ctx: &AppContext) -> Result<SweepResult> {
    let known: Vec<String> = ctx
        .registry
        .list()
        .await
        .into_iter()
        .map(|p| p.project_id)
        .collect();

    let mut result = SweepResult::default();
    for project_id in ctx.store.project_ids().await? {
        if known.contains(&project_id) {
            continue;
        }
        let n = ctx.store.delete_where(&Filter::project(&project_id)).await?;
        info!(project_id = %project_id, deleted = n, "swept orphaned chunks");
        result.deleted.insert(project_id, n);
    }
    Ok(result)
}

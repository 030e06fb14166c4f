//! Ingestion orchestration.
//!
//! Three entry points feed the vector store: a recursive folder walk, a
//! git repository (sync then walk), and an explicit file list. All of them
//! run each file through the metadata builder and upsert its chunks as one
//! batch. Per-file failures are logged and skipped; only a missing root
//! folder or an unavailable vector store aborts the job.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use codebase_assistant_core::filter::Filter;
use codebase_assistant_core::models::Project;

use crate::context::AppContext;
use crate::error::{AssistantError, Result};
use crate::git;
use crate::metadata::{build_chunks, ProjectSource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestResult {
    pub project_id: String,
    pub files_ingested: usize,
    pub chunks_upserted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertFilesResult {
    pub project_id: String,
    pub files_upserted: usize,
    pub chunks_upserted: usize,
}

/// Outcome of ingesting one file.
enum FileOutcome {
    Upserted(usize),
    Empty,
    Skipped,
}

async fn ingest_file(
    ctx: &AppContext,
    path: &Path,
    base_dir: &Path,
    source: &ProjectSource,
) -> Result<FileOutcome> {
    let chunks = match build_chunks(path, base_dir, source, ctx.config.chunking.max_length) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %format!("{:#}", e), "skipping unreadable file");
            return Ok(FileOutcome::Skipped);
        }
    };
    if chunks.is_empty() {
        debug!(path = %path.display(), "no content, skipping");
        return Ok(FileOutcome::Empty);
    }

    match ctx.store.replace_file(&chunks).await {
        Ok(counts) => {
            debug!(path = %path.display(), chunks = counts.ids, "upserted");
            Ok(FileOutcome::Upserted(counts.ids))
        }
        Err(AssistantError::Embedding(e)) => {
            warn!(path = %path.display(), error = %format!("{:#}", e), "embedding failed, skipping file");
            Ok(FileOutcome::Skipped)
        }
        Err(e) => Err(e),
    }
}

fn is_ignored(entry: &DirEntry, ignore_dirs: &[String]) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && ignore_dirs
            .iter()
            .any(|d| entry.file_name().to_string_lossy() == d.as_str())
}

fn matches_extensions(path: &Path, extensions: Option<&[String]>) -> bool {
    match extensions {
        Some(exts) if !exts.is_empty() => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            exts.iter().any(|e| name.ends_with(e.as_str()))
        }
        _ => true,
    }
}

/// Walk `folder` and upsert every included file. `rel_path`s are relative
/// to `folder`.
pub async fn ingest_folder(
    ctx: &AppContext,
    folder: &Path,
    source: &ProjectSource,
    extensions: Option<&[String]>,
) -> Result<IngestResult> {
    if !folder.is_dir() {
        return Err(AssistantError::InvalidInput(format!(
            "Folder not found: {}",
            folder.display()
        )));
    }

    let ignore_dirs = &ctx.config.ingest.ignore_dirs;
    let walker = WalkDir::new(folder)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored(e, ignore_dirs));

    let mut files_ingested = 0;
    let mut chunks_upserted = 0;
    let mut skipped = 0;

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "walk error, skipping entry");
                skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() || !matches_extensions(entry.path(), extensions) {
            continue;
        }

        match ingest_file(ctx, entry.path(), folder, source).await? {
            FileOutcome::Upserted(n) => {
                files_ingested += 1;
                chunks_upserted += n;
            }
            FileOutcome::Skipped => skipped += 1,
            FileOutcome::Empty => {}
        }
    }

    info!(
        project_id = source.project_id(),
        folder = %folder.display(),
        files_ingested,
        chunks_upserted,
        skipped,
        "folder ingested"
    );

    Ok(IngestResult {
        project_id: source.project_id().to_string(),
        files_ingested,
        chunks_upserted,
    })
}

/// Clone or update `repo_url` in `dest_dir` (best-effort), then walk it.
pub async fn ingest_repository(
    ctx: &AppContext,
    repo_url: &str,
    dest_dir: &Path,
    branch: Option<&str>,
    project_id: &str,
    project_name: &str,
) -> Result<IngestResult> {
    let timeout = Duration::from_secs(ctx.config.git.timeout_secs);
    git::sync_repository(repo_url, dest_dir, branch, timeout).await;

    let source = ProjectSource::new(project_id, project_name)
        .with_repo(Some(repo_url.to_string()), branch.map(str::to_string));
    ingest_folder(ctx, dest_dir, &source, None).await
}

/// Upsert an explicit list of files. `rel_path`s are relative to the
/// current working directory.
pub async fn upsert_files(
    ctx: &AppContext,
    files: &[PathBuf],
    source: &ProjectSource,
) -> Result<UpsertFilesResult> {
    let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut files_upserted = 0;
    let mut chunks_upserted = 0;
    for path in files {
        if let FileOutcome::Upserted(n) = ingest_file(ctx, path, &base, source).await? {
            files_upserted += 1;
            chunks_upserted += n;
        }
    }

    info!(
        project_id = source.project_id(),
        files_upserted,
        chunks_upserted,
        "files upserted"
    );

    Ok(UpsertFilesResult {
        project_id: source.project_id().to_string(),
        files_upserted,
        chunks_upserted,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReembedStrategy {
    /// Delete the project's chunks, then re-ingest.
    Replace,
    /// Re-ingest over the existing chunks.
    Append,
}

impl std::str::FromStr for ReembedStrategy {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "replace" => Ok(ReembedStrategy::Replace),
            "append" => Ok(ReembedStrategy::Append),
            _ => Err(AssistantError::InvalidInput(
                "strategy must be 'replace' or 'append'".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReembedResult {
    pub status: String,
    pub deleted_chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub ingest: Option<IngestResult>,
}

/// Re-walk a project's recorded `root_path`. Without a usable root path the
/// call is a no-op that explains itself (after the `replace` delete).
pub async fn reembed(
    ctx: &AppContext,
    project: &Project,
    strategy: ReembedStrategy,
) -> Result<ReembedResult> {
    let deleted_chunks = match strategy {
        ReembedStrategy::Replace => {
            ctx.store
                .delete_where(&Filter::project(&project.project_id))
                .await?
        }
        ReembedStrategy::Append => 0,
    };

    let root = project
        .root_path
        .as_deref()
        .map(Path::new)
        .filter(|p| p.is_dir());
    let Some(root) = root else {
        return Ok(ReembedResult {
            status: "ok".to_string(),
            deleted_chunks,
            message: Some(
                "No root_path on record, nothing to re-embed. Use ingest-folder or ingest-repo."
                    .to_string(),
            ),
            ingest: None,
        });
    };

    let source = ProjectSource::new(&project.project_id, &project.project_name)
        .with_repo(project.repo_url.clone(), project.branch.clone());
    let ingest = ingest_folder(ctx, root, &source, None).await?;

    Ok(ReembedResult {
        status: "ok".to_string(),
        deleted_chunks,
        message: None,
        ingest: Some(ingest),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_filter() {
        let exts = vec![".py".to_string(), ".rs".to_string()];
        assert!(matches_extensions(Path::new("/x/a.py"), Some(exts.as_slice())));
        assert!(!matches_extensions(Path::new("/x/a.md"), Some(exts.as_slice())));
        assert!(matches_extensions(Path::new("/x/a.md"), None));
        assert!(matches_extensions(Path::new("/x/a.md"), Some(&[][..])));
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "replace".parse::<ReembedStrategy>().unwrap(),
            ReembedStrategy::Replace
        );
        assert_eq!(
            "append".parse::<ReembedStrategy>().unwrap(),
            ReembedStrategy::Append
        );
        assert_eq!(
            "merge".parse::<ReembedStrategy>().unwrap_err().code(),
            "bad_request"
        );
    }
}

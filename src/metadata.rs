//! Chunk metadata builder.
//!
//! Turns one file on disk into its ordered [`Chunk`] sequence: resolves the
//! absolute and relative paths, reads size and modification time, derives
//! the stable per-file `doc_id`, decodes the content permissively, runs the
//! chunker, and stamps every chunk with its project provenance.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use codebase_assistant_core::chunk::chunk_text;
use codebase_assistant_core::models::{
    Chunk, ChunkMetadata, DEFAULT_PROJECT_ID, DEFAULT_PROJECT_NAME,
};

/// Project provenance stamped onto every chunk of a file.
#[derive(Debug, Clone, Default)]
pub struct ProjectSource {
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub repo_url: Option<String>,
    pub branch: Option<String>,
}

impl ProjectSource {
    pub fn new(project_id: &str, project_name: &str) -> Self {
        Self {
            project_id: Some(project_id.to_string()),
            project_name: Some(project_name.to_string()),
            repo_url: None,
            branch: None,
        }
    }

    pub fn with_repo(mut self, repo_url: Option<String>, branch: Option<String>) -> Self {
        self.repo_url = repo_url;
        self.branch = branch;
        self
    }

    pub fn project_id(&self) -> &str {
        non_empty(self.project_id.as_deref()).unwrap_or(DEFAULT_PROJECT_ID)
    }

    pub fn project_name(&self) -> &str {
        non_empty(self.project_name.as_deref()).unwrap_or(DEFAULT_PROJECT_NAME)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

/// Stable per-file id: UUIDv5 over the URL namespace and the absolute path.
pub fn doc_id_for(abs_path: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, abs_path.as_bytes()).to_string()
}

/// Build the chunks for `file_path`, with `rel_path` computed against
/// `base_dir`. Fails only when the file cannot be stat'ed or read.
pub fn build_chunks(
    file_path: &Path,
    base_dir: &Path,
    source: &ProjectSource,
    max_length: usize,
) -> Result<Vec<Chunk>> {
    let abs = std::path::absolute(file_path)
        .with_context(|| format!("Failed to resolve path: {}", file_path.display()))?;
    let abs_path = abs.to_string_lossy().to_string();
    let rel_path = relative_path(&abs, base_dir).unwrap_or_else(|| abs_path.clone());

    let fs_meta = std::fs::metadata(&abs)
        .with_context(|| format!("Failed to stat file: {}", abs.display()))?;
    let mtime = fs_meta
        .modified()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
        .unwrap_or_default();

    let bytes =
        std::fs::read(&abs).with_context(|| format!("Failed to read file: {}", abs.display()))?;
    let text = String::from_utf8_lossy(&bytes);

    let doc_id = doc_id_for(&abs_path);
    let source_name = abs
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let filetype = abs
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let project_id = source.project_id();

    let chunks = chunk_text(&text, max_length)
        .into_iter()
        .enumerate()
        .map(|(idx, text)| Chunk {
            id: Chunk::make_id(project_id, &rel_path, idx),
            text,
            metadata: ChunkMetadata {
                doc_id: doc_id.clone(),
                source: source_name.clone(),
                chunk_idx: idx,
                project_id: project_id.to_string(),
                project_name: source.project_name().to_string(),
                repo_url: non_empty(source.repo_url.as_deref()).map(str::to_string),
                branch: non_empty(source.branch.as_deref()).map(str::to_string),
                abs_path: abs_path.clone(),
                rel_path: rel_path.clone(),
                filetype: filetype.clone(),
                size_bytes: fs_meta.len(),
                mtime: mtime.clone(),
            },
        })
        .collect();

    Ok(chunks)
}

/// `abs` expressed relative to `base`, `/`-separated, using `..` where
/// needed. `None` when the two share no root (e.g. different drives).
pub fn relative_path(abs: &Path, base: &Path) -> Option<String> {
    let base = std::path::absolute(base).ok()?;
    let target: Vec<Component> = abs.components().collect();
    let start: Vec<Component> = base.components().collect();

    match (target.first(), start.first()) {
        (Some(a), Some(b)) if a == b => {}
        _ => return None,
    }

    let common = target
        .iter()
        .zip(start.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..start.len() {
        rel.push("..");
    }
    for c in &target[common..] {
        rel.push(c.as_os_str());
    }

    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        Some(".".to_string())
    } else {
        Some(parts.join("/"))
    }
}

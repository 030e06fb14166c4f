//! Project registry: a JSON document listing every [`Project`].
//!
//! The file is read whole and rewritten whole on each mutation. Mutations
//! are serialised through an async mutex so concurrent requests in one
//! process cannot clobber each other. A missing or unparseable file reads
//! as an empty registry.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use codebase_assistant_core::models::Project;

use crate::error::{AssistantError, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    projects: Vec<Project>,
}

pub struct ProjectRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

/// Fields accepted when creating a project.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProject {
    pub project_name: String,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub root_path: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

fn blank(s: &Option<String>) -> bool {
    s.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl ProjectRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Vec<Project> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str::<RegistryFile>(&raw) {
            Ok(file) => file.projects,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "registry unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    async fn save(&self, projects: Vec<Project>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let body = serde_json::to_string_pretty(&RegistryFile { projects })
            .context("Failed to serialize project registry")
            .map_err(AssistantError::Internal)?;

        // Write-then-rename so a crash never leaves a truncated registry.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Write an empty registry if none exists yet.
    pub async fn ensure_exists(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(());
        }
        self.save(Vec::new()).await
    }

    pub async fn list(&self) -> Vec<Project> {
        self.load().await
    }

    pub async fn get(&self, project_id: &str) -> Option<Project> {
        self.load()
            .await
            .into_iter()
            .find(|p| p.project_id == project_id)
    }

    /// Like [`get`](Self::get) but a missing project is an error.
    pub async fn require(&self, project_id: &str) -> Result<Project> {
        self.get(project_id)
            .await
            .ok_or_else(|| AssistantError::ProjectNotFound(project_id.to_string()))
    }

    /// Register a new project. At least one of `repo_url`/`root_path` is
    /// required.
    pub async fn create(&self, req: NewProject) -> Result<Project> {
        if req.project_name.trim().is_empty() {
            return Err(AssistantError::InvalidInput(
                "project_name must not be empty".to_string(),
            ));
        }
        if blank(&req.repo_url) && blank(&req.root_path) {
            return Err(AssistantError::InvalidInput(
                "Provide either repo_url or root_path.".to_string(),
            ));
        }

        let hex = Uuid::new_v4().simple().to_string();
        let project = Project {
            project_id: format!("proj_{}", &hex[..8]),
            project_name: req.project_name,
            repo_url: req.repo_url.filter(|s| !s.is_empty()),
            root_path: req.root_path.filter(|s| !s.is_empty()),
            branch: req.branch.filter(|s| !s.is_empty()),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let _guard = self.write_lock.lock().await;
        let mut projects = self.load().await;
        projects.push(project.clone());
        self.save(projects).await?;
        Ok(project)
    }

    /// Record where a project's source lives after a repository ingest.
    pub async fn update_source(
        &self,
        project_id: &str,
        repo_url: Option<String>,
        root_path: Option<String>,
        branch: Option<String>,
    ) -> Result<Project> {
        let _guard = self.write_lock.lock().await;
        let mut projects = self.load().await;
        let project = projects
            .iter_mut()
            .find(|p| p.project_id == project_id)
            .ok_or_else(|| AssistantError::ProjectNotFound(project_id.to_string()))?;
        project.repo_url = repo_url;
        project.root_path = root_path;
        project.branch = branch;
        let updated = project.clone();
        self.save(projects).await?;
        Ok(updated)
    }

    /// Remove a project record. Returns whether it existed.
    pub async fn remove(&self, project_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut projects = self.load().await;
        let before = projects.len();
        projects.retain(|p| p.project_id != project_id);
        if projects.len() == before {
            return Ok(false);
        }
        self.save(projects).await?;
        Ok(true)
    }
}

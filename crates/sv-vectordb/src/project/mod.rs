//! Project directory store: one directory per project with a `_project.json`
//! marker and a `collections/` subdirectory.

use std::path::PathBuf;

use sv_core::error::{ResourceKind, Result, VdbError};
use sv_core::types::{Metadata, Project, ProjectId};
use tokio::fs;
use tracing::info;

use crate::store::{create_new_json, read_json, StoreLayout, PROJECT_META_FILE};

pub struct ProjectDirectory {
    layout: StoreLayout,
}

impl ProjectDirectory {
    /// Open the store rooted at `base`, creating the directory if needed.
    pub async fn open(base: impl Into<PathBuf>) -> Result<Self> {
        let layout = StoreLayout::new(base);
        fs::create_dir_all(layout.base()).await?;
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Create a project. `Conflict` if its `_project.json` already exists.
    pub async fn create_project(
        &self,
        project_id: &ProjectId,
        metadata: Metadata,
    ) -> Result<Project> {
        let meta_path = self.layout.project_meta(project_id);
        if fs::try_exists(&meta_path).await? {
            return Err(VdbError::conflict(ResourceKind::Project, project_id.as_str()));
        }
        fs::create_dir_all(self.layout.collections_dir(project_id)).await?;

        let project = Project::new(project_id.clone(), metadata);
        if !create_new_json(&meta_path, &project).await? {
            return Err(VdbError::conflict(ResourceKind::Project, project_id.as_str()));
        }
        info!(project = %project_id, "created project");
        Ok(project)
    }

    pub async fn project_exists(&self, project_id: &ProjectId) -> bool {
        fs::try_exists(self.layout.project_meta(project_id))
            .await
            .unwrap_or(false)
    }

    pub async fn get_project(&self, project_id: &ProjectId) -> Result<Project> {
        read_json(&self.layout.project_meta(project_id))
            .await?
            .ok_or_else(|| VdbError::not_found(ResourceKind::Project, project_id.as_str()))
    }

    pub async fn get_project_metadata(&self, project_id: &ProjectId) -> Result<Metadata> {
        Ok(self.get_project(project_id).await?.metadata)
    }

    /// Ids of every directory under the base that holds a `_project.json`, sorted.
    pub async fn list_projects(&self) -> Result<Vec<String>> {
        let mut projects = Vec::new();
        let mut entries = fs::read_dir(self.layout.base()).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if !fs::try_exists(entry.path().join(PROJECT_META_FILE)).await? {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                projects.push(name.to_string());
            }
        }
        projects.sort();
        Ok(projects)
    }
}

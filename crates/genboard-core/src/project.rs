//! Projects and the persistence record written through the storage port.

use crate::object::CanvasObject;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Current wall-clock time in unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A saved canvas project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub objects: Vec<CanvasObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_id: Option<String>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            objects: Vec::new(),
            thumbnail: None,
            created_at: now,
            updated_at: now,
            brand_id: None,
        }
    }
}

/// The opaque blob persisted through the key-value port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRecord {
    pub projects: Vec<Project>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_project_id: Option<String>,
    #[serde(default)]
    pub current_project_name: String,
    /// Live objects of the current (possibly unsaved) canvas.
    #[serde(default)]
    pub objects: Vec<CanvasObject>,
}

/// Project bookkeeping for one client session.
///
/// Missing or invalid references fall back to a blank canvas instead of
/// surfacing errors.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    projects: Vec<Project>,
    current_project_id: Option<String>,
    current_project_name: String,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            projects: Vec::new(),
            current_project_id: None,
            current_project_name: "Untitled".to_string(),
        }
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn current_project_id(&self) -> Option<&str> {
        self.current_project_id.as_deref()
    }

    pub fn current_project_name(&self) -> &str {
        &self.current_project_name
    }

    pub fn set_current_project_name(&mut self, name: impl Into<String>) {
        self.current_project_name = name.into();
    }

    /// Save the live canvas into the current project, creating the project
    /// on first save. Returns the project id.
    pub fn save_current_project(&mut self, objects: &[CanvasObject]) -> String {
        let now = now_millis();
        if let Some(project) = self
            .current_project_id
            .as_ref()
            .and_then(|id| self.projects.iter_mut().find(|p| &p.id == id))
        {
            project.objects = objects.to_vec();
            project.name = self.current_project_name.clone();
            project.updated_at = now;
            return project.id.clone();
        }

        let mut project = Project::new(self.current_project_name.clone());
        project.objects = objects.to_vec();
        let id = project.id.clone();
        self.projects.push(project);
        self.current_project_id = Some(id.clone());
        id
    }

    /// Switch to a project, returning its objects for the canvas.
    /// An unknown id resets to a blank untitled canvas.
    pub fn open_project(&mut self, id: &str) -> Vec<CanvasObject> {
        match self.projects.iter().find(|p| p.id == id) {
            Some(project) => {
                self.current_project_id = Some(project.id.clone());
                self.current_project_name = project.name.clone();
                project.objects.clone()
            }
            None => {
                log::warn!("open_project: unknown project {id}, resetting to blank");
                self.new_project("Untitled");
                Vec::new()
            }
        }
    }

    /// Start a fresh unsaved project.
    pub fn new_project(&mut self, name: impl Into<String>) {
        self.current_project_id = None;
        self.current_project_name = name.into();
    }

    /// Delete a saved project. Resets to blank if it was current.
    pub fn delete_project(&mut self, id: &str) {
        self.projects.retain(|p| p.id != id);
        if self.current_project_id.as_deref() == Some(id) {
            self.new_project("Untitled");
        }
    }

    /// Snapshot the workspace plus the live canvas for persistence.
    pub fn to_record(&self, objects: &[CanvasObject]) -> WorkspaceRecord {
        WorkspaceRecord {
            projects: self.projects.clone(),
            current_project_id: self.current_project_id.clone(),
            current_project_name: self.current_project_name.clone(),
            objects: objects.to_vec(),
        }
    }

    /// Restore from a persisted record; the returned objects are the live
    /// canvas contents.
    pub fn from_record(record: WorkspaceRecord) -> (Self, Vec<CanvasObject>) {
        let workspace = Self {
            projects: record.projects,
            current_project_id: record.current_project_id,
            current_project_name: if record.current_project_name.is_empty() {
                "Untitled".to_string()
            } else {
                record.current_project_name
            },
        };
        (workspace, record.objects)
    }
}

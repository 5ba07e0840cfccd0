//! Durable workflow registry — workflows.json, rewritten wholesale on
//! every mutation, before the call returns. A crash right after a
//! successful call can never lose the change.

use std::path::{Path, PathBuf};

use hookwire_core::{Error, Result, Workflow, WorkflowDraft};

/// File-backed list of workflow definitions.
pub struct WorkflowRegistry {
    path: PathBuf,
    workflows: Vec<Workflow>,
}

impl WorkflowRegistry {
    /// Open the registry at the given directory, loading any existing
    /// workflow file.
    pub fn open(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        let path = dir.join("workflows.json");
        let workflows = if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse workflows.json: {e}");
                    Vec::new()
                }),
                Err(e) => {
                    tracing::warn!("Failed to read workflows.json: {e}");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        Self { path, workflows }
    }

    /// Register a new workflow. Enabled by default; persisted before
    /// returning. Scheduling is the caller's follow-up.
    pub fn add(&mut self, draft: WorkflowDraft) -> Result<Workflow> {
        let workflow = Workflow::from_draft(draft);
        self.workflows.push(workflow.clone());
        self.save()?;
        tracing::info!("Workflow added: {} ({})", workflow.id, workflow.target);
        Ok(workflow)
    }

    /// Defensive copy of all workflows, creation order.
    pub fn list(&self) -> Vec<Workflow> {
        self.workflows.clone()
    }

    pub fn get(&self, id: &str) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.id == id)
    }

    /// Flip the enabled flag. Idempotent: already in the requested
    /// state returns the workflow unchanged without touching disk.
    /// Returns None for an unknown id.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<Option<Workflow>> {
        let Some(idx) = self.workflows.iter().position(|w| w.id == id) else {
            return Ok(None);
        };
        if self.workflows[idx].enabled == enabled {
            return Ok(Some(self.workflows[idx].clone()));
        }
        self.workflows[idx].enabled = enabled;
        self.save()?;
        Ok(Some(self.workflows[idx].clone()))
    }

    /// Delete a workflow. Returns false for an unknown id.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let len = self.workflows.len();
        self.workflows.retain(|w| w.id != id);
        if self.workflows.len() == len {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// All workflows currently enabled, for scheduler restore.
    pub fn enabled(&self) -> Vec<Workflow> {
        self.workflows.iter().filter(|w| w.enabled).cloned().collect()
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.workflows)
            .map_err(|e| Error::Store(format!("Serialize workflows: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| Error::Store(format!("Write workflows: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Store(format!("Commit workflows: {e}")))?;
        Ok(())
    }
}

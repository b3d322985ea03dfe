use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::db::Repository;
use crate::error::Result;
use crate::models::{InterestProfile, RescoreState};

/// Versioned interest profile backed by a YAML file. Saving through
/// the store is what arms the rescore coordinator.
pub struct InterestStore {
    path: PathBuf,
}

impl InterestStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Missing or empty file reads as the default empty profile.
    pub fn load(&self) -> Result<InterestProfile> {
        if !self.path.exists() {
            return Ok(InterestProfile::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(InterestProfile::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Write the profile; a structural change (topic name added or
    /// removed) sets the durable rescore flag. Weight-only or
    /// keyword-only edits do not; the rank formula handles those live.
    pub async fn save(&self, repo: &Repository, profile: &InterestProfile) -> Result<()> {
        let old = self.load()?;
        let structural_change = old.topic_names() != profile.topic_names();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_yaml::to_string(profile)?)?;

        if structural_change {
            repo.set_rescore_state(RescoreState::PendingRescore, Utc::now())
                .await?;
            tracing::info!("Interest topics changed structurally, rescore flagged");
        }
        Ok(())
    }
}

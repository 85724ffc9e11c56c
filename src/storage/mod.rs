//! Prompt persistence: staging directory layout and promotion.
//!
//! Every saved plan becomes two files under a per-identifier directory:
//! the rendered markdown document and a JSON metadata sidecar. Promotion
//! copies (never moves) both into the project-management tree, so the
//! staged copies remain the source of truth for later re-promotion.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use crate::domain::{PlanMetadata, StructuredPlan};

/// Errors raised by prompt storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The resolved identifier sanitized down to an empty string.
    #[error("story id '{0}' sanitized to an empty string")]
    InvalidIdentifier(String),

    /// A document exists but its metadata sidecar is missing.
    #[error("metadata file not found alongside prompt: {0}")]
    MissingMetadata(PathBuf),
}

/// Location of a persisted plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPrompt {
    pub story_id: String,
    pub prompt_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Writes plans to a staging root and promotes them on request.
///
/// The output root is fixed at construction; storage holds no other state.
pub struct PromptStorage {
    output_root: PathBuf,
    filename_pattern: String,
    metadata_filename: String,
}

impl PromptStorage {
    pub fn new(
        output_root: impl Into<PathBuf>,
        filename_pattern: impl Into<String>,
        metadata_filename: impl Into<String>,
    ) -> Self {
        Self {
            output_root: output_root.into(),
            filename_pattern: filename_pattern.into(),
            metadata_filename: metadata_filename.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Persist a plan under its resolved identifier.
    ///
    /// Identifier priority: explicit `story_id`, then the plan's own
    /// suggestion, then a timestamp-derived generated id. The result is
    /// uppercased and sanitized before use as a directory name.
    pub fn save(&self, plan: &StructuredPlan, story_id: Option<&str>) -> Result<SavedPrompt> {
        let raw_id = story_id
            .map(str::to_string)
            .or_else(|| plan.suggested_story_id.clone())
            .unwrap_or_else(|| generate_story_id(plan.work_type.as_str()))
            .to_uppercase();
        let safe_id = sanitize_story_id(&raw_id);
        if safe_id.is_empty() {
            return Err(StorageError::InvalidIdentifier(raw_id).into());
        }

        let story_dir = self.output_root.join(&safe_id);
        std::fs::create_dir_all(&story_dir)
            .with_context(|| format!("failed to create story directory {}", story_dir.display()))?;

        let filename = self
            .filename_pattern
            .replace("{story_id}", &safe_id)
            .replace("{work_type}", &slugify(plan.work_type.as_str()));
        let prompt_path = story_dir.join(filename);
        std::fs::write(&prompt_path, plan.to_markdown())
            .with_context(|| format!("failed to write prompt {}", prompt_path.display()))?;

        let metadata = PlanMetadata::from_plan(&safe_id, plan);
        let metadata_path = story_dir.join(&self.metadata_filename);
        let metadata_json =
            serde_json::to_string_pretty(&metadata).context("failed to serialize metadata")?;
        std::fs::write(&metadata_path, metadata_json)
            .with_context(|| format!("failed to write metadata {}", metadata_path.display()))?;

        debug!(story_id = %safe_id, path = %prompt_path.display(), "prompt saved");

        Ok(SavedPrompt {
            story_id: safe_id,
            prompt_path,
            metadata_path,
        })
    }

    /// Copy a saved prompt into the project-management tree.
    ///
    /// Layout is fixed: `<root>/user-story-prompts/<STORY_ID>/`. A plain
    /// text README note is written when a title is supplied. The staged
    /// originals are left untouched.
    pub fn relocate_to_project_management(
        &self,
        saved: &SavedPrompt,
        project_management_root: &Path,
        story_title: Option<&str>,
    ) -> Result<PathBuf> {
        let dest_dir = project_management_root
            .join("user-story-prompts")
            .join(&saved.story_id);
        std::fs::create_dir_all(&dest_dir).with_context(|| {
            format!("failed to create destination {}", dest_dir.display())
        })?;

        if let Some(title) = story_title {
            let note = format!("{}\n", title.trim());
            std::fs::write(dest_dir.join("README.txt"), note)
                .context("failed to write README.txt")?;
        }

        let dest_prompt = dest_dir.join(file_name(&saved.prompt_path)?);
        let dest_metadata = dest_dir.join(file_name(&saved.metadata_path)?);
        std::fs::copy(&saved.prompt_path, &dest_prompt).with_context(|| {
            format!("failed to copy prompt into {}", dest_prompt.display())
        })?;
        std::fs::copy(&saved.metadata_path, &dest_metadata).with_context(|| {
            format!("failed to copy metadata into {}", dest_metadata.display())
        })?;

        debug!(story_id = %saved.story_id, dest = %dest_prompt.display(), "prompt promoted");

        Ok(dest_prompt)
    }

    /// Reconstruct a `SavedPrompt` from an existing document path.
    ///
    /// Used to re-promote a previously staged document without re-running
    /// the pipeline. The identifier is the parent directory name and the
    /// metadata sidecar must exist beside the document.
    pub fn load_saved_prompt(&self, prompt_path: &Path) -> Result<SavedPrompt> {
        let prompt_path = prompt_path
            .canonicalize()
            .with_context(|| format!("prompt not found: {}", prompt_path.display()))?;
        let parent = prompt_path
            .parent()
            .context("prompt path has no parent directory")?;
        let metadata_path = parent.join(&self.metadata_filename);
        if !metadata_path.exists() {
            return Err(StorageError::MissingMetadata(metadata_path).into());
        }
        let story_id = parent
            .file_name()
            .context("prompt directory has no name")?
            .to_string_lossy()
            .to_string();
        Ok(SavedPrompt {
            story_id,
            prompt_path,
            metadata_path,
        })
    }
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name()
        .with_context(|| format!("path has no file name: {}", path.display()))
}

/// Replace each run of characters outside `[a-zA-Z0-9_.-]` with a single
/// hyphen and trim leading/trailing hyphens. Idempotent.
pub fn sanitize_story_id(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_run = false;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('-');
            in_run = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// Lowercased, hyphenated slug used for `{work_type}` filename substitution.
fn slugify(value: &str) -> String {
    let lowered = value.trim().to_lowercase().replace(' ', "-");
    sanitize_story_id(&lowered)
}

/// Timestamp-derived fallback identifier: `US-<WORKTYPE>-<YYYYmmdd-HHMMSS>`.
fn generate_story_id(work_type: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    let base = slugify(if work_type.is_empty() { "FEATURE" } else { work_type }).to_uppercase();
    format!("US-{}-{}", base, timestamp)
}

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Session file storage
//!
//! Organizes run outputs on disk under a session/pipeline tree and hands out
//! timestamped output paths so tools never clobber each other's files.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{ToolflowError, ToolflowResult};

/// Session-scoped file layout for pipeline outputs
///
/// `<root>/sessions/<session>/pipelines/<pipeline>/<step>/<timestamped file>`
pub struct FileStore {
    root: PathBuf,
    session_id: String,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, session_id: &str) -> Self {
        Self {
            root: root.into(),
            session_id: sanitize(session_id),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_dir(&self) -> PathBuf {
        self.root.join("sessions").join(&self.session_id)
    }

    pub fn pipeline_dir(&self, pipeline_name: &str) -> PathBuf {
        self.session_dir()
            .join("pipelines")
            .join(sanitize(pipeline_name))
    }

    pub fn step_dir(&self, pipeline_name: &str, step_name: &str) -> PathBuf {
        self.pipeline_dir(pipeline_name).join(sanitize(step_name))
    }

    /// A fresh output path for a step, timestamped to the second
    pub fn generate_output_path(
        &self,
        pipeline_name: &str,
        step_name: &str,
        file_name: &str,
        extension: &str,
    ) -> ToolflowResult<PathBuf> {
        let dir = self.step_dir(pipeline_name, step_name);
        fs::create_dir_all(&dir).map_err(|e| ToolflowError::FileWriteError {
            path: dir.clone(),
            error: e.to_string(),
        })?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        Ok(dir.join(format!("{}_{stamp}.{extension}", sanitize(file_name))))
    }

    /// Copy an existing file into the step's directory
    pub fn save_file(
        &self,
        pipeline_name: &str,
        step_name: &str,
        source: &Path,
    ) -> ToolflowResult<PathBuf> {
        if !source.is_file() {
            return Err(ToolflowError::FileReadError {
                path: source.to_path_buf(),
                error: "not a file".to_string(),
            });
        }

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        let ext = source.extension().and_then(|e| e.to_str()).unwrap_or("bin");
        let dest = self.generate_output_path(pipeline_name, step_name, stem, ext)?;

        fs::copy(source, &dest).map_err(|e| ToolflowError::FileWriteError {
            path: dest.clone(),
            error: e.to_string(),
        })?;
        debug!(from = %source.display(), to = %dest.display(), "stored file");
        Ok(dest)
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

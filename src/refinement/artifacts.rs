// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Iteration artifacts
//!
//! Copies image outputs of each refinement iteration into a stable on-disk
//! layout so intermediate attempts survive the run:
//!
//! `<root>/sessions/<session>/pipelines/<pipeline>/<step>/iteration_<n>/`
//!
//! with a `metadata.json` sidecar per iteration and a `final/` sibling
//! holding the accepted iteration's files.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::{ToolflowError, ToolflowResult};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif"];

/// Persists per-iteration outputs under a session/pipeline directory tree
pub struct ArtifactManager {
    root: PathBuf,
    session_id: String,
    pipeline_name: String,
}

impl ArtifactManager {
    pub fn new(root: impl Into<PathBuf>, session_id: &str, pipeline_name: &str) -> Self {
        Self {
            root: root.into(),
            session_id: sanitize_name(session_id),
            pipeline_name: sanitize_name(pipeline_name),
        }
    }

    /// Directory for one step's artifacts
    pub fn step_dir(&self, step_name: &str) -> PathBuf {
        self.root
            .join("sessions")
            .join(&self.session_id)
            .join("pipelines")
            .join(&self.pipeline_name)
            .join(sanitize_name(step_name))
    }

    /// Directory for one iteration of one step
    pub fn iteration_dir(&self, step_name: &str, iteration: u32) -> PathBuf {
        self.step_dir(step_name).join(format!("iteration_{iteration}"))
    }

    /// Copy any image-file outputs of an iteration into its directory
    ///
    /// Output values that are strings pointing at existing files with an
    /// image extension are copied; everything else is left alone. Returns the
    /// destination paths of the copies. Individual copy failures are logged
    /// and skipped so one unreadable file does not abort the run.
    pub fn save_iteration_outputs(
        &self,
        step_name: &str,
        iteration: u32,
        outputs: &HashMap<String, Value>,
    ) -> ToolflowResult<Vec<PathBuf>> {
        let dir = self.iteration_dir(step_name, iteration);
        fs::create_dir_all(&dir).map_err(|e| ToolflowError::FileWriteError {
            path: dir.clone(),
            error: e.to_string(),
        })?;

        let mut saved = Vec::new();
        for (name, value) in outputs {
            let Some(source) = image_file_path(value) else {
                continue;
            };
            let ext = source
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("png");
            let dest = dir.join(format!("{}.{ext}", sanitize_name(name)));

            match fs::copy(&source, &dest) {
                Ok(_) => {
                    debug!(from = %source.display(), to = %dest.display(), "saved artifact");
                    saved.push(dest);
                }
                Err(e) => {
                    warn!(from = %source.display(), error = %e, "failed to copy artifact");
                }
            }
        }
        Ok(saved)
    }

    /// Write the iteration's metadata sidecar
    pub fn save_metadata(
        &self,
        step_name: &str,
        iteration: u32,
        metadata: &Value,
    ) -> ToolflowResult<PathBuf> {
        let dir = self.iteration_dir(step_name, iteration);
        fs::create_dir_all(&dir).map_err(|e| ToolflowError::FileWriteError {
            path: dir.clone(),
            error: e.to_string(),
        })?;

        let path = dir.join("metadata.json");
        let content = serde_json::to_string_pretty(metadata)?;
        fs::write(&path, content).map_err(|e| ToolflowError::FileWriteError {
            path: path.clone(),
            error: e.to_string(),
        })?;
        Ok(path)
    }

    /// Copy the accepted iteration's files into the step's `final/` directory
    ///
    /// Also writes `iteration_info.txt` recording which iteration won and
    /// how many were tried.
    pub fn mark_final(
        &self,
        step_name: &str,
        accepted_iteration: u32,
        total_iterations: u32,
    ) -> ToolflowResult<PathBuf> {
        let source_dir = self.iteration_dir(step_name, accepted_iteration);
        let final_dir = self.step_dir(step_name).join("final");
        fs::create_dir_all(&final_dir).map_err(|e| ToolflowError::FileWriteError {
            path: final_dir.clone(),
            error: e.to_string(),
        })?;

        if source_dir.is_dir() {
            for entry in fs::read_dir(&source_dir).map_err(|e| ToolflowError::FileReadError {
                path: source_dir.clone(),
                error: e.to_string(),
            })? {
                let Ok(entry) = entry else { continue };
                let from = entry.path();
                if !from.is_file() {
                    continue;
                }
                let to = final_dir.join(entry.file_name());
                if let Err(e) = fs::copy(&from, &to) {
                    warn!(from = %from.display(), error = %e, "failed to copy final artifact");
                }
            }
        }

        let info = format!(
            "accepted_iteration: {accepted_iteration}\ntotal_iterations: {total_iterations}\n"
        );
        let info_path = final_dir.join("iteration_info.txt");
        fs::write(&info_path, info).map_err(|e| ToolflowError::FileWriteError {
            path: info_path.clone(),
            error: e.to_string(),
        })?;

        Ok(final_dir)
    }

    /// Metadata payload for one iteration, written once its verdict is known
    pub fn iteration_metadata(
        inputs: &HashMap<String, Value>,
        outputs: &HashMap<String, Value>,
        accepted: bool,
        notes: &str,
        duration_secs: f64,
        error: Option<&str>,
        decision: Option<&str>,
    ) -> Value {
        json!({
            "inputs": inputs,
            "outputs": outputs,
            "accepted": accepted,
            "notes": notes,
            "duration_secs": duration_secs,
            "error": error,
            "decision": decision,
            "saved_at": chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Replace anything outside `[A-Za-z0-9._-]` with underscores
fn sanitize_name(name: &str) -> String {
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

/// A string value naming an existing image file, if that is what it is
fn image_file_path(value: &Value) -> Option<PathBuf> {
    let s = value.as_str()?;
    let path = PathBuf::from(s);
    let ext = path.extension()?.to_str()?.to_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) && path.is_file() {
        Some(path)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"fake image bytes").unwrap();
        path
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Find Contours!"), "Find_Contours_");
        assert_eq!(sanitize_name("safe-name_1.png"), "safe-name_1.png");
        assert_eq!(sanitize_name(""), "unnamed");
    }

    #[test]
    fn test_iteration_layout() {
        let tmp = TempDir::new().unwrap();
        let manager = ArtifactManager::new(tmp.path(), "sess1", "count cells");

        let dir = manager.iteration_dir("Threshold Step", 2);
        let expected = tmp
            .path()
            .join("sessions/sess1/pipelines/count_cells/Threshold_Step/iteration_2");
        assert_eq!(dir, expected);
    }

    #[test]
    fn test_save_iteration_outputs_copies_images_only() {
        let tmp = TempDir::new().unwrap();
        let mask = touch(tmp.path(), "mask.png");
        let manager = ArtifactManager::new(tmp.path().join("artifacts"), "s", "p");

        let outputs = HashMap::from([
            ("mask".to_string(), json!(mask.to_str().unwrap())),
            ("object_count".to_string(), json!(12)),
            ("notes".to_string(), json!("not a file")),
        ]);

        let saved = manager.save_iteration_outputs("Threshold", 1, &outputs).unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].ends_with("iteration_1/mask.png"));
        assert!(saved[0].is_file());
    }

    #[test]
    fn test_missing_source_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let manager = ArtifactManager::new(tmp.path(), "s", "p");

        let outputs = HashMap::from([
            ("mask".to_string(), json!("/nonexistent/mask.png")),
        ]);

        let saved = manager.save_iteration_outputs("Threshold", 1, &outputs).unwrap();
        assert!(saved.is_empty());
    }

    #[test]
    fn test_metadata_sidecar_written() {
        let tmp = TempDir::new().unwrap();
        let manager = ArtifactManager::new(tmp.path(), "s", "p");

        let metadata = ArtifactManager::iteration_metadata(
            &HashMap::new(),
            &HashMap::from([("mask".to_string(), json!("m.png"))]),
            true,
            "looks fine",
            0.42,
            None,
            Some("accept"),
        );
        let path = manager.save_metadata("Threshold", 1, &metadata).unwrap();

        let parsed: Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["accepted"], json!(true));
        assert_eq!(parsed["outputs"]["mask"], json!("m.png"));
        assert_eq!(parsed["decision"], json!("accept"));
        assert_eq!(parsed["error"], Value::Null);
        assert!((parsed["duration_secs"].as_f64().unwrap() - 0.42).abs() < 1e-9);
    }

    #[test]
    fn test_mark_final_copies_accepted_iteration() {
        let tmp = TempDir::new().unwrap();
        let mask = touch(tmp.path(), "mask.png");
        let manager = ArtifactManager::new(tmp.path().join("artifacts"), "s", "p");

        let outputs = HashMap::from([("mask".to_string(), json!(mask.to_str().unwrap()))]);
        manager.save_iteration_outputs("Threshold", 2, &outputs).unwrap();

        let final_dir = manager.mark_final("Threshold", 2, 3).unwrap();
        assert!(final_dir.join("mask.png").is_file());

        let info = fs::read_to_string(final_dir.join("iteration_info.txt")).unwrap();
        assert!(info.contains("accepted_iteration: 2"));
        assert!(info.contains("total_iterations: 3"));
    }
}

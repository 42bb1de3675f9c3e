// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Whole-file JSON documents on local disk.
//!
//! Each save replaces the previous document entirely: the new content is
//! written to a sibling temp file and renamed over the target, so readers
//! see either the old document or the new one, never a partial write.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Typed JSON document stored at a fixed path.
#[derive(Debug)]
pub struct JsonStore<T> {
    path: PathBuf,
    _doc: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonStore<T> {
    fn clone(&self) -> Self {
        Self::new(self.path.clone())
    }
}

impl<T> JsonStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _doc: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: Serialize + DeserializeOwned> JsonStore<T> {
    /// Replace the stored document.
    pub async fn save(&self, doc: &T) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(doc).map_err(StoreError::Encode)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(self.path.clone(), e))?;
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| StoreError::Io(tmp.clone(), e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Io(self.path.clone(), e))?;

        tracing::debug!(path = %self.path.display(), bytes = body.len(), "Saved document");
        Ok(())
    }

    /// Load the stored document.
    pub async fn load(&self) -> Result<T, StoreError> {
        let body = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::Missing(self.path.clone()))
            }
            Err(e) => return Err(StoreError::Io(self.path.clone(), e)),
        };

        serde_json::from_slice(&body).map_err(|e| StoreError::Decode(self.path.clone(), e))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Document store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No document at {}", .0.display())]
    Missing(PathBuf),

    #[error("I/O error on {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Invalid JSON in {}: {}", .0.display(), .1)]
    Decode(PathBuf, #[source] serde_json::Error),

    #[error("Failed to encode document: {0}")]
    Encode(#[source] serde_json::Error),
}

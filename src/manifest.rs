//! CUTS `manifest.json` data model.
//!
//! The manifest is produced by the storyboard editor and treated as
//! read-only input here. Only the fields the render pipeline consumes are
//! modeled; unknown fields are ignored.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub bgm: Option<MediaRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Row {
    /// Display number. The editor writes an integer, but older project
    /// files carry strings or omit it entirely.
    #[serde(default)]
    pub no: Option<serde_json::Value>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub visual: Option<MediaRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaRef {
    #[serde(default)]
    pub file: Option<String>,
}

impl Row {
    /// Display ordinal, falling back to `index + 1` when `no` is absent
    /// or non-numeric.
    pub fn ordinal(&self, index: usize) -> u32 {
        match &self.no {
            Some(serde_json::Value::Number(n)) => {
                n.as_u64().map(|v| v as u32).unwrap_or(index as u32 + 1)
            }
            Some(serde_json::Value::String(s)) => {
                s.trim().parse().unwrap_or(index as u32 + 1)
            }
            _ => index as u32 + 1,
        }
    }
}

impl Manifest {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;
        Ok(manifest)
    }
}

use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::RwLock,
};

use serde::{Deserialize, Serialize};

use crate::{Result, StemPlayerError};

pub const DEFAULT_BPM: f64 = 120.0;

fn usable_bpm(bpm: f64) -> bool {
    bpm.is_finite() && bpm > 0.0
}

/// Resources referenced by a single stem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StemConfig {
    /// Audio resource, relative to the manifest.
    pub audio: String,
    /// Optional event-track resource driving note cues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub midi: Option<String>,
    /// Renderer hints passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<serde_json::Value>,
}

/// Declarative description of a song split into stems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
    pub stems: BTreeMap<String, StemConfig>,
}

impl Manifest {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Tempo declared by the manifest, or `fallback` when absent or invalid.
    /// An unusable fallback resolves to [`DEFAULT_BPM`].
    pub fn bpm_or(&self, fallback: f64) -> f64 {
        match self.bpm {
            Some(bpm) if usable_bpm(bpm) => bpm,
            _ if usable_bpm(fallback) => fallback,
            _ => DEFAULT_BPM,
        }
    }
}

/// Retrieves raw bytes for a named resource.
///
/// Loads run on worker threads, hence the `Send + Sync` bound.
pub trait ResourceResolver: Send + Sync {
    fn fetch(&self, resource: &str) -> Result<Vec<u8>>;
}

/// Resolves resources against the local filesystem, optionally under a root.
#[derive(Debug, Default, Clone)]
pub struct FsResolver {
    root: Option<PathBuf>,
}

impl FsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

impl ResourceResolver for FsResolver {
    fn fetch(&self, resource: &str) -> Result<Vec<u8>> {
        let path = match &self.root {
            Some(root) => root.join(resource.trim_start_matches('/')),
            None => PathBuf::from(resource),
        };
        std::fs::read(&path).map_err(|err| StemPlayerError::fetch(resource, err))
    }
}

/// In-memory resource table, handy for embedding and for tests.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    resources: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, resource: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut resources) = self.resources.write() {
            resources.insert(resource.into(), bytes.into());
        }
    }

    pub fn with(self, resource: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(resource, bytes);
        self
    }
}

impl ResourceResolver for MemoryResolver {
    fn fetch(&self, resource: &str) -> Result<Vec<u8>> {
        let resources = self
            .resources
            .read()
            .map_err(|_| StemPlayerError::msg("resource table has been poisoned"))?;
        resources
            .get(resource)
            .cloned()
            .ok_or_else(|| StemPlayerError::fetch(resource, "not found"))
    }
}

/// Directory part of a manifest path, including the trailing `/`.
pub fn base_path(manifest: &str) -> &str {
    match manifest.rfind('/') {
        Some(index) => &manifest[..=index],
        None => "",
    }
}

/// Resolves a manifest entry relative to the manifest's own location.
pub fn resolve_relative(manifest: &str, entry: &str) -> String {
    if entry.starts_with('/') || entry.contains("://") {
        entry.to_string()
    } else {
        format!("{}{}", base_path(manifest), entry)
    }
}

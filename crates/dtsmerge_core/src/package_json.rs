use dashmap::DashMap;
use log::{debug, trace};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

pub const PACKAGE_JSON: &str = "package.json";

/// The subset of package.json this tool reads.
///
/// Map-valued fields keep their declaration order (`serde_json` is built with
/// `preserve_order`), which conditional matching depends on.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub types: Option<String>,
    #[serde(default)]
    pub typings: Option<String>,
    #[serde(default)]
    pub exports: Option<Value>,
    #[serde(default)]
    pub imports: Option<Value>,
    #[serde(default)]
    pub dependencies: Option<Map<String, Value>>,
    #[serde(default)]
    pub peer_dependencies: Option<Map<String, Value>>,
    #[serde(default)]
    pub optional_dependencies: Option<Map<String, Value>>,
    #[serde(default)]
    pub dev_dependencies: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Failed to parse {}: {message}", .path.display())]
pub struct PackageJsonError {
    pub path: PathBuf,
    pub message: String,
}

/// Reads and parses a package.json. A missing file is `Ok(None)`; unreadable
/// or malformed JSON is an error naming the path and the parser message.
pub fn read_package_json(path: &Path) -> Result<Option<PackageJson>, PackageJsonError> {
    trace!("Reading package.json at {}", path.display());
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(PackageJsonError { path: path.to_path_buf(), message: e.to_string() });
        }
    };

    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| PackageJsonError { path: path.to_path_buf(), message: e.to_string() })
}

/// Parsed package.json files keyed by their directory.
///
/// One cache lives for exactly one build; the filesystem is assumed stable
/// while it is alive, so entries are never invalidated.
#[derive(Debug, Default)]
pub struct PackageJsonCache {
    by_dir: DashMap<PathBuf, Option<Arc<PackageJson>>>,
}

impl PackageJsonCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The package.json directly inside `dir`, if any.
    pub fn get(&self, dir: &Path) -> Result<Option<Arc<PackageJson>>, PackageJsonError> {
        if let Some(cached) = self.by_dir.get(dir) {
            trace!("Cache hit for package.json in {}", dir.display());
            return Ok(cached.clone());
        }

        let parsed = read_package_json(&dir.join(PACKAGE_JSON))?.map(Arc::new);
        let entry = self.by_dir.entry(dir.to_path_buf()).or_insert(parsed);
        Ok(entry.clone())
    }

    /// Searches `start_dir` and its ancestors for the nearest package.json.
    pub fn find_nearest(
        &self,
        start_dir: &Path,
    ) -> Result<Option<(PathBuf, Arc<PackageJson>)>, PackageJsonError> {
        trace!("Searching for package.json upward from {}", start_dir.display());
        for dir in start_dir.ancestors() {
            if let Some(pkg) = self.get(dir)? {
                debug!("Found package.json in {}", dir.display());
                return Ok(Some((dir.to_path_buf(), pkg)));
            }
        }
        Ok(None)
    }

    pub fn len(&self) -> usize {
        self.by_dir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_dir.is_empty()
    }
}

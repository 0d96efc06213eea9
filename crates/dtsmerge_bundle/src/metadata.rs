//! package.json metadata for the package being bundled.
//!
//! Computes the packages to externalize from the dependency fields and the
//! declaration entry points declared through `types`, `typings` and
//! `exports`.

use anyhow::Result;
use log::{debug, trace};
use oxc_syntax::identifier::is_identifier_name;
use serde_json::{Map, Value};
use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use dtsmerge_core::{
    PackageJson, PackageJsonCache, PackageJsonError, get_original_package_name, is_dts,
    list_package_files, normalize,
};

use crate::types::{DependencyField, ExternalizationReason};

const TYPES_PREFIX: &str = "@types/";

const RESERVED_WORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

pub struct PackageMetadata {
    dir: PathBuf,
    manifest: Arc<PackageJson>,
    files: OnceLock<Vec<PathBuf>>,
}

impl PackageMetadata {
    /// Loads the package.json directly inside `dir`. Malformed JSON is fatal.
    pub fn load(dir: &Path, cache: &PackageJsonCache) -> Result<Option<Self>, PackageJsonError> {
        let Some(manifest) = cache.get(dir)? else {
            debug!("No package.json in {}", dir.display());
            return Ok(None);
        };
        debug!("Loaded package.json for {:?} in {}", manifest.name, dir.display());
        Ok(Some(Self { dir: dir.to_path_buf(), manifest, files: OnceLock::new() }))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &PackageJson {
        &self.manifest
    }

    /// Every package named by a dependency field, tagged with the first field
    /// (in scan order) that declares it.
    pub fn get_externals(&self) -> Vec<(String, ExternalizationReason)> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut externals = Vec::new();

        for field in DependencyField::SCAN_ORDER {
            let Some(deps) = self.dependency_field(field) else {
                continue;
            };
            for name in deps.keys() {
                if seen.insert(name.as_str()) {
                    trace!("Externalizing '{}' by {}", name, field.as_str());
                    externals
                        .push((name.clone(), ExternalizationReason::ByDependencyField(field)));
                }
            }
        }

        debug!("Found {} externals in package.json", externals.len());
        externals
    }

    /// Declaration entry points as (absolute path, field label), deduplicated
    /// by path with the first label kept.
    pub fn get_dts_entry_points(&self) -> Result<Vec<(PathBuf, String)>> {
        let mut entries: Vec<(PathBuf, String)> = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut add = |path: PathBuf, label: &str| {
            if seen.insert(path.clone()) {
                trace!("Entry point {} from {}", path.display(), label);
                entries.push((path, label.to_string()));
            }
        };

        for (label, field) in [("types", &self.manifest.types), ("typings", &self.manifest.typings)]
        {
            if let Some(field) = field {
                let path = normalize(&self.dir.join(field));
                if is_dts(&path) {
                    add(path, label);
                }
            }
        }

        if let Some(exports) = &self.manifest.exports {
            for (subpath, label) in collect_export_paths(exports) {
                match subpath.split_once('*') {
                    Some((prefix, suffix)) => {
                        for file in self.match_export_pattern(prefix, suffix)? {
                            add(file, &label);
                        }
                    }
                    None => {
                        let path = normalize(&self.dir.join(&subpath));
                        if is_dts(&path) {
                            add(path, &label);
                        }
                    }
                }
            }
        }

        debug!("Found {} declaration entry points in package.json", entries.len());
        Ok(entries)
    }

    /// For public packages: original package name -> `@types/...` devDependency.
    pub fn dev_type_packages(&self) -> BTreeMap<String, String> {
        if self.manifest.private {
            return BTreeMap::new();
        }
        let Some(dev_deps) = &self.manifest.dev_dependencies else {
            return BTreeMap::new();
        };

        dev_deps
            .keys()
            .filter(|name| name.starts_with(TYPES_PREFIX))
            .map(|name| (get_original_package_name(name), name.clone()))
            .collect()
    }

    fn dependency_field(&self, field: DependencyField) -> Option<&Map<String, Value>> {
        match field {
            DependencyField::Dependencies => self.manifest.dependencies.as_ref(),
            DependencyField::PeerDependencies => self.manifest.peer_dependencies.as_ref(),
            DependencyField::OptionalDependencies => self.manifest.optional_dependencies.as_ref(),
        }
    }

    /// Declaration files whose package-relative path matches `prefix*suffix`.
    fn match_export_pattern(&self, prefix: &str, suffix: &str) -> Result<Vec<PathBuf>> {
        let prefix = prefix.strip_prefix("./").unwrap_or(prefix);
        let matches = self
            .package_files()?
            .iter()
            .filter(|file| {
                let Ok(rel) = file.strip_prefix(&self.dir) else {
                    return false;
                };
                let rel = rel.to_string_lossy();
                rel.len() >= prefix.len() + suffix.len()
                    && rel.starts_with(prefix)
                    && rel.ends_with(suffix)
            })
            .filter(|file| is_dts(file))
            .map(|file| normalize(file))
            .collect::<Vec<_>>();

        trace!("Pattern '{}*{}' matched {} files", prefix, suffix, matches.len());
        Ok(matches)
    }

    fn package_files(&self) -> Result<&[PathBuf]> {
        if let Some(files) = self.files.get() {
            return Ok(files);
        }
        let files = list_package_files(&self.dir)?;
        Ok(self.files.get_or_init(|| files))
    }
}

/// Every string leaf of an `exports` value with its property-path label,
/// e.g. (`./dist/sub.d.ts`, `exports["./sub"].types`).
pub fn collect_export_paths(exports: &Value) -> Vec<(String, String)> {
    let mut paths = Vec::new();
    walk_exports(exports, "exports".to_string(), &mut paths);
    paths
}

fn walk_exports(value: &Value, label: String, paths: &mut Vec<(String, String)>) {
    match value {
        Value::String(subpath) => paths.push((subpath.clone(), label)),
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                walk_exports(item, format!("{label}[{idx}]"), paths);
            }
        }
        Value::Object(obj) => {
            for (key, item) in obj {
                walk_exports(item, format!("{label}{}", property_accessor(key)), paths);
            }
        }
        _ => {}
    }
}

fn property_accessor(key: &str) -> String {
    if is_identifier_name(key) && !RESERVED_WORDS.contains(&key) {
        format!(".{key}")
    } else {
        format!("[{}]", Value::from(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, path: &str, content: &str) -> PathBuf {
        let file_path = dir.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    fn load(root: &Path, manifest: Value) -> PackageMetadata {
        create_test_file(root, "package.json", &manifest.to_string());
        PackageMetadata::load(root, &PackageJsonCache::new()).unwrap().unwrap()
    }

    fn reason(field: DependencyField) -> ExternalizationReason {
        ExternalizationReason::ByDependencyField(field)
    }

    #[test]
    fn test_load_missing_package_json() {
        let temp_dir = TempDir::new().unwrap();
        let result = PackageMetadata::load(temp_dir.path(), &PackageJsonCache::new()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_load_malformed_package_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_test_file(temp_dir.path(), "package.json", "{ not json");
        let err = PackageMetadata::load(temp_dir.path(), &PackageJsonCache::new())
            .err()
            .unwrap();
        assert_eq!(err.path, path);
    }

    #[test]
    fn test_get_externals_first_field_wins() {
        let temp_dir = TempDir::new().unwrap();
        let meta = load(
            temp_dir.path(),
            json!({
                "dependencies": { "a": "*", "b": "*" },
                "peerDependencies": { "b": "*", "c": "*" },
                "optionalDependencies": { "c": "*", "d": "*", "a": "*" }
            }),
        );

        let externals = meta.get_externals();
        assert_eq!(
            externals,
            vec![
                ("a".to_string(), reason(DependencyField::Dependencies)),
                ("b".to_string(), reason(DependencyField::Dependencies)),
                ("c".to_string(), reason(DependencyField::PeerDependencies)),
                ("d".to_string(), reason(DependencyField::OptionalDependencies)),
            ]
        );
    }

    #[test]
    fn test_get_externals_empty() {
        let temp_dir = TempDir::new().unwrap();
        let meta = load(temp_dir.path(), json!({ "name": "pkg" }));
        assert!(meta.get_externals().is_empty());
    }

    #[test]
    fn test_collect_export_paths_labels() {
        let exports = json!({
            ".": { "types": "./dist/index.d.ts", "import": "./dist/index.mjs" },
            "./sub": ["./dist/sub.d.ts", { "default": "./dist/sub.js" }],
            "./package.json": "./package.json"
        });

        let paths = collect_export_paths(&exports);
        assert_eq!(
            paths,
            vec![
                ("./dist/index.d.ts".to_string(), "exports[\".\"].types".to_string()),
                ("./dist/index.mjs".to_string(), "exports[\".\"][\"import\"]".to_string()),
                ("./dist/sub.d.ts".to_string(), "exports[\"./sub\"][0]".to_string()),
                ("./dist/sub.js".to_string(), "exports[\"./sub\"][1][\"default\"]".to_string()),
                ("./package.json".to_string(), "exports[\"./package.json\"]".to_string()),
            ]
        );
    }

    #[test]
    fn test_collect_export_paths_string() {
        assert_eq!(
            collect_export_paths(&json!("./index.d.ts")),
            vec![("./index.d.ts".to_string(), "exports".to_string())]
        );
        assert!(collect_export_paths(&json!(null)).is_empty());
    }

    #[test]
    fn test_get_dts_entry_points_types_and_exports() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let meta = load(
            &root,
            json!({
                "types": "./dist/index.d.ts",
                "typings": "./dist/index.js",
                "exports": {
                    ".": { "types": "./dist/index.d.ts", "default": "./dist/index.js" },
                    "./utils": { "types": "./dist/utils.d.cts" }
                }
            }),
        );

        let entries = meta.get_dts_entry_points().unwrap();
        assert_eq!(
            entries,
            vec![
                (root.join("dist/index.d.ts"), "types".to_string()),
                (root.join("dist/utils.d.cts"), "exports[\"./utils\"].types".to_string()),
            ]
        );
    }

    #[test]
    fn test_get_dts_entry_points_glob() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        create_test_file(&root, "dist/features/a.d.ts", "");
        create_test_file(&root, "dist/features/b.d.ts", "");
        create_test_file(&root, "dist/features/b.js", "");
        create_test_file(&root, "dist/other/c.d.ts", "");
        let meta = load(
            &root,
            json!({
                "exports": {
                    "./features/*": { "types": "./dist/features/*.d.ts" },
                    "./all/*": "./dist/*"
                }
            }),
        );

        let entries = meta.get_dts_entry_points().unwrap();
        let label = "exports[\"./features/*\"].types".to_string();
        let all = "exports[\"./all/*\"]".to_string();
        assert_eq!(
            entries,
            vec![
                (root.join("dist/features/a.d.ts"), label.clone()),
                (root.join("dist/features/b.d.ts"), label),
                (root.join("dist/other/c.d.ts"), all),
            ]
        );
    }

    #[test]
    fn test_get_dts_entry_points_missing_file_kept() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let meta = load(&root, json!({ "types": "dist/missing.d.ts" }));

        let entries = meta.get_dts_entry_points().unwrap();
        assert_eq!(entries, vec![(root.join("dist/missing.d.ts"), "types".to_string())]);
    }

    #[test]
    fn test_dev_type_packages() {
        let temp_dir = TempDir::new().unwrap();
        let meta = load(
            temp_dir.path(),
            json!({
                "dependencies": { "foo": "*" },
                "devDependencies": {
                    "@types/foo": "*",
                    "@types/scope__bar": "*",
                    "typescript": "*"
                }
            }),
        );

        let dev_types = meta.dev_type_packages();
        assert_eq!(dev_types.len(), 2);
        assert_eq!(dev_types.get("foo").map(String::as_str), Some("@types/foo"));
        assert_eq!(dev_types.get("@scope/bar").map(String::as_str), Some("@types/scope__bar"));
    }

    #[test]
    fn test_dev_type_packages_private() {
        let temp_dir = TempDir::new().unwrap();
        let meta = load(
            temp_dir.path(),
            json!({ "private": true, "devDependencies": { "@types/foo": "*" } }),
        );
        assert!(meta.dev_type_packages().is_empty());
    }
}

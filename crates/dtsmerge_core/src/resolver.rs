use anyhow::Result;
use dashmap::DashMap;
use log::{debug, trace};
use path_clean::clean;
use std::path::{Path, PathBuf};

use crate::{
    constants::{INDEX_FILES, JS_TO_DTS_EXTENSIONS, RESOLVE_EXTENSIONS, TYPE_CONDITIONS, is_dts},
    exports::resolve_exports,
    package_json::PackageJsonCache,
    specifier::{is_path_like, split_package_subpath, types_package_name},
};

/// Cache of default resolutions keyed by (importer directory, specifier).
pub type ResolveCache = DashMap<(PathBuf, String), Option<PathBuf>>;

/// Default path/extension/node_modules resolution for declaration files.
///
/// Relative and absolute specifiers are probed on disk; bare specifiers are
/// looked up in `node_modules` directories from the importer upward, falling
/// back to the matching `@types/` package. Dependency manifests are read
/// through `packages`, the build's package.json cache.
pub fn resolve(
    cwd: &Path,
    from_file: Option<&Path>,
    request: &str,
    cache: &ResolveCache,
    packages: &PackageJsonCache,
) -> Result<Option<PathBuf>> {
    let base = from_file.and_then(Path::parent).unwrap_or(cwd);
    let key = (base.to_path_buf(), request.to_string());
    if let Some(v) = cache.get(&key) {
        trace!("Cache hit for resolve: '{}' from {}", request, base.display());
        return Ok(v.clone());
    }
    trace!("Resolving: '{}' from {}", request, base.display());

    let resolved = if is_path_like(request) {
        trace!("Resolving as path: '{}'", request);
        let result = resolve_file(&base.join(request));
        if result.is_none() {
            trace!("Failed to resolve path '{}'", request);
        }
        result
    } else {
        trace!("Resolving as node_modules package: '{}'", request);
        let result = resolve_node_module_from_dir(base, request, packages);
        if result.is_none() {
            trace!("Failed to resolve node_modules package '{}'", request);
        }
        result
    };

    cache.insert(key, resolved.clone());
    if let Some(path) = &resolved {
        debug!("Resolved '{}' from {} to {}", request, base.display(), path.display());
    }
    Ok(resolved)
}

/// Absolute, normalized form of `path`. Existing paths are canonicalized,
/// anything else is cleaned lexically.
pub fn normalize(path: &Path) -> PathBuf {
    path.canonicalize()
        .unwrap_or_else(|_| PathBuf::from(clean(path.to_string_lossy().to_string())))
}

/// Probes `p` as a declaration file: the exact path, the declaration
/// counterpart of a `.js`-style path, appended declaration extensions, then
/// directory index files.
pub fn resolve_file(p: &Path) -> Option<PathBuf> {
    if p.is_file() && is_dts(p) {
        return Some(normalize(p));
    }

    let display = p.to_string_lossy();
    for (js_ext, dts_ext) in JS_TO_DTS_EXTENSIONS {
        if let Some(stem) = display.strip_suffix(js_ext) {
            let candidate = PathBuf::from(format!("{stem}{dts_ext}"));
            if candidate.is_file() {
                return Some(normalize(&candidate));
            }
        }
    }

    if p.is_file() {
        return Some(normalize(p));
    }

    for ext in RESOLVE_EXTENSIONS {
        let candidate = PathBuf::from(format!("{display}{ext}"));
        if candidate.is_file() {
            return Some(normalize(&candidate));
        }
    }

    for index_file in INDEX_FILES {
        let candidate = p.join(index_file);
        if candidate.is_file() {
            return Some(normalize(&candidate));
        }
    }

    None
}

fn resolve_node_module_from_dir(
    start_dir: &Path,
    request: &str,
    packages: &PackageJsonCache,
) -> Option<PathBuf> {
    let (name, subpath) = split_package_subpath(request)?;
    trace!("Walking up from {:?} to find node_modules for '{}'", start_dir, name);

    let types_name = types_package_name(name);
    for package in [name, types_name.as_str()] {
        for dir in start_dir.ancestors() {
            let pkg_dir = dir.join("node_modules").join(package);
            if let Some(resolved) = resolve_node_module(&pkg_dir, subpath.as_deref(), packages) {
                return Some(resolved);
            }
        }
    }

    None
}

fn resolve_node_module(
    pkg_dir: &Path,
    subpath: Option<&str>,
    packages: &PackageJsonCache,
) -> Option<PathBuf> {
    if !pkg_dir.is_dir() {
        return None;
    }
    trace!("Checking node_modules at: {:?}", pkg_dir);

    let manifest = match packages.get(pkg_dir) {
        Ok(manifest) => manifest.unwrap_or_default(),
        Err(e) => {
            debug!("Ignoring unreadable dependency manifest: {}", e);
            Default::default()
        }
    };

    // A package with `exports` only exposes what the map lists
    if let Some(exports) = &manifest.exports {
        return resolve_exports(exports, subpath, TYPE_CONDITIONS)
            .iter()
            .find_map(|candidate| resolve_file(&pkg_dir.join(candidate)));
    }

    if let Some(subpath) = subpath {
        return resolve_file(&pkg_dir.join(subpath));
    }

    [&manifest.types, &manifest.typings]
        .into_iter()
        .flatten()
        .find_map(|field| resolve_file(&pkg_dir.join(field)))
        .or_else(|| {
            INDEX_FILES.iter().map(|index| pkg_dir.join(index)).find(|p| p.is_file())
        })
        .map(|p| normalize(&p))
}

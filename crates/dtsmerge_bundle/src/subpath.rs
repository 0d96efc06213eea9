use log::{debug, trace};
use std::path::Path;

use dtsmerge_core::{PackageJsonCache, TYPE_CONDITIONS, resolve_imports};

use crate::hooks::{Delegate, HookResult, ResolveHook};

/// Resolves `#`-prefixed specifiers through the `imports` map of the nearest
/// package.json above the importer. Every failure declines instead of
/// failing the build; the specifier then ends up external.
pub struct SubpathImportResolver<'a> {
    packages: &'a PackageJsonCache,
}

impl<'a> SubpathImportResolver<'a> {
    pub fn new(packages: &'a PackageJsonCache) -> Self {
        Self { packages }
    }
}

impl ResolveHook for SubpathImportResolver<'_> {
    fn name(&self) -> &'static str {
        "subpath-imports"
    }

    fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&Path>,
        next: &Delegate<'_>,
    ) -> HookResult {
        if !specifier.starts_with('#') {
            return Ok(None);
        }
        let Some(dir) = importer.and_then(Path::parent) else {
            return Ok(None);
        };

        let (pkg_root, manifest) = match self.packages.find_nearest(dir) {
            Ok(Some(found)) => found,
            Ok(None) => {
                trace!("No package.json above {} for '{}'", dir.display(), specifier);
                return Ok(None);
            }
            Err(e) => {
                debug!("Skipping '{}': {}", specifier, e);
                return Ok(None);
            }
        };
        let Some(imports) = &manifest.imports else {
            trace!("{} has no imports map", pkg_root.display());
            return Ok(None);
        };
        let Some(target) = resolve_imports(imports, specifier, TYPE_CONDITIONS).into_iter().next()
        else {
            trace!("No imports entry matches '{}'", specifier);
            return Ok(None);
        };

        let target = pkg_root.join(target);
        trace!("Mapped '{}' to {}", specifier, target.display());
        match next.resolve(&target.to_string_lossy(), importer) {
            Ok(resolved) => Ok(resolved),
            Err(e) => {
                debug!("Failed to resolve '{}' via {}: {}", specifier, target.display(), e);
                Ok(None)
            }
        }
    }
}

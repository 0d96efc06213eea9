use anyhow::anyhow;
use log::{debug, info, warn};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use dtsmerge_core::{ModuleId, PackageJsonCache, is_path_like, normalize, package_name};

use crate::{
    chain::ImportChainTracker,
    classifier::ExternalizationClassifier,
    config::Config,
    entry_points::{EntryInputs, validate_entry_points},
    error::{BuildError, ResolveError},
    graph::{ModuleGraph, common_output_dir},
    hooks::{DefaultResolver, ResolveHook},
    metadata::PackageMetadata,
    subpath::SubpathImportResolver,
    types::{BuildOutput, ExternalEntry, ExternalizationReason, OutputReport},
};

/// Runs one build. Every cache and provenance map lives inside this call and
/// is dropped when it returns.
pub fn run_build(cfg: &Config) -> Result<BuildOutput, BuildError> {
    info!("Starting declaration build");
    let cwd = cfg.cwd()?;

    let packages = Arc::new(PackageJsonCache::new());
    let metadata = PackageMetadata::load(cwd, &packages)?;

    let inputs = if !cfg.inputs.is_empty() {
        debug!("Using {} explicit inputs", cfg.inputs.len());
        EntryInputs::Paths(cfg.input_paths()?)
    } else if let Some(metadata) = &metadata {
        debug!("Collecting entry points from package.json");
        EntryInputs::Labeled(metadata.get_dts_entry_points()?)
    } else {
        warn!("No inputs given and no package.json in {}", cwd.display());
        EntryInputs::Paths(vec![])
    };

    let entry_points = validate_entry_points(inputs);
    for invalid in entry_points.iter().filter(|e| !e.is_valid()) {
        warn!("Skipping entry point {}: {:?}", invalid.path.display(), invalid.error);
    }
    let entries: Vec<ModuleId> =
        entry_points.iter().filter(|e| e.is_valid()).map(|e| e.path.clone()).collect();
    if entries.is_empty() {
        return Err(BuildError::NoInputFiles(entry_points));
    }
    info!("Building {} entry points", entries.len());

    let output_dir = common_output_dir(&entries)
        .ok_or_else(|| anyhow!("Entry points have no common directory"))?;
    debug!("Output directory: {}", output_dir.display());

    let classifier = ExternalizationClassifier::new();
    if let Some(metadata) = &metadata {
        for (name, reason) in metadata.get_externals() {
            classifier.add_external(name, reason);
        }
    }
    for name in &cfg.external {
        let name = package_name(name).unwrap_or(name.as_str());
        if !classifier.add_external(name, ExternalizationReason::ByCliFlag) {
            debug!("'{}' is already external", name);
        }
    }

    let tracker = ImportChainTracker::new();
    let subpaths = SubpathImportResolver::new(&packages);
    let hooks: Vec<&dyn ResolveHook> = vec![&tracker as &dyn ResolveHook, &classifier, &subpaths];
    let graph = ModuleGraph::new(DefaultResolver::with_packages(cwd, Arc::clone(&packages)), hooks);

    let chunks = match graph.build(&entries, &output_dir) {
        Ok(chunks) => chunks,
        Err(ResolveError::Unresolved { specifier, importer }) => {
            let id = failing_id(cwd, &specifier, importer.as_deref());
            let chain = tracker.chain_to(&id, importer.as_deref());
            return Err(BuildError::UnresolvedImport { specifier, importer, id, chain });
        }
        Err(ResolveError::Other(e)) => return Err(BuildError::Other(e)),
    };

    let mut outputs = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let mut owners = BTreeMap::new();
        for module in &chunk.modules {
            if let Some(specifier) = classifier.get_package_entry_point(module)? {
                owners.insert(module.clone(), specifier);
            }
        }
        outputs.push(OutputReport {
            file_name: chunk.file_name,
            entry: chunk.entry,
            modules: chunk.modules,
            imports: chunk.imports,
            packages: owners,
        });
    }

    let dev_types = metadata.as_ref().map(PackageMetadata::dev_type_packages).unwrap_or_default();
    let externals: Vec<ExternalEntry> = classifier
        .used_externals()
        .into_iter()
        .map(|(name, reason)| {
            let dev_types_package = dev_types.get(&name).cloned();
            ExternalEntry { name, reason, dev_types_package }
        })
        .collect();
    info!("Built {} outputs with {} externals", outputs.len(), externals.len());

    Ok(BuildOutput { output_dir, entry_points, outputs, externals })
}

/// The module that failed to load: the missing file for path imports, the
/// specifier itself otherwise.
fn failing_id(cwd: &Path, specifier: &str, importer: Option<&Path>) -> PathBuf {
    if is_path_like(specifier) {
        let base = importer.and_then(Path::parent).unwrap_or(cwd);
        normalize(&base.join(specifier))
    } else {
        PathBuf::from(specifier)
    }
}

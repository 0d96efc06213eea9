use dashmap::{DashMap, DashSet};
use log::{trace, warn};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use dtsmerge_core::ModuleId;

use crate::hooks::{Delegate, HookResult, ResolveHook};

/// Records the first importer of every resolved specifier, bundled or
/// external, so a failed resolution can be traced back to an entry point.
#[derive(Debug, Default)]
pub struct ImportChainTracker {
    parents: DashMap<PathBuf, ModuleId>,
    entries: DashSet<ModuleId>,
}

impl ImportChainTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, child: PathBuf, parent: &Path) {
        if child == parent || self.entries.contains(&child) {
            return;
        }
        self.parents.entry(child).or_insert_with(|| parent.to_path_buf());
    }

    pub fn parent_of(&self, id: &Path) -> Option<ModuleId> {
        self.parents.get(id).map(|p| p.clone())
    }

    /// The import chain from an entry point to `failing`, which was imported
    /// by `importer`. Entry point first, `failing` last.
    pub fn chain_to(&self, failing: &Path, importer: Option<&Path>) -> Vec<PathBuf> {
        let mut chain = vec![failing.to_path_buf()];
        let mut visited: HashSet<PathBuf> = HashSet::from([failing.to_path_buf()]);
        let mut current = importer.map(Path::to_path_buf);

        while let Some(node) = current {
            if !visited.insert(node.clone()) {
                warn!("Import chain revisits {}, stopping", node.display());
                break;
            }
            current = self.parent_of(&node);
            chain.push(node);
        }

        chain.reverse();
        chain
    }
}

impl ResolveHook for ImportChainTracker {
    fn name(&self) -> &'static str {
        "import-chain"
    }

    fn build_start(&self, entries: &[ModuleId]) {
        for entry in entries {
            self.entries.insert(entry.clone());
        }
    }

    fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&Path>,
        next: &Delegate<'_>,
    ) -> HookResult {
        let resolved = next.resolve(specifier, importer)?;
        if let (Some(resolved), Some(importer)) = (&resolved, importer) {
            trace!("Tracking '{}' imported by {}", specifier, importer.display());
            self.record(resolved.key(), importer);
        }
        Ok(resolved)
    }
}

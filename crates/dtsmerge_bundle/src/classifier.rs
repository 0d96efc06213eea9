//! Decides, for every import, whether it is bundled or left external, and
//! remembers which bare import first brought each bundled module in.

use anyhow::{Result, bail};
use dashmap::{DashMap, DashSet};
use log::{debug, trace};
use std::{collections::HashSet, path::Path};

use dtsmerge_core::{ModuleId, package_name};

use crate::{
    error::ResolveError,
    hooks::{Delegate, HookResult, ResolveHook, Resolved},
    types::ExternalizationReason,
};

#[derive(Debug, Default)]
pub struct ExternalizationClassifier {
    /// Package name -> why it is external. First writer wins.
    externals: DashMap<String, ExternalizationReason>,
    /// Externals that were actually imported
    used: DashSet<String>,
    /// Module -> bare specifier it was first reached through
    bare_specifiers: DashMap<ModuleId, String>,
    /// Module -> the importer that first resolved it
    importers: DashMap<ModuleId, ModuleId>,
    entries: DashSet<ModuleId>,
}

impl ExternalizationClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` as external unless it already is. Returns whether it was inserted.
    pub fn add_external(&self, name: impl Into<String>, reason: ExternalizationReason) -> bool {
        let mut inserted = false;
        self.externals.entry(name.into()).or_insert_with(|| {
            inserted = true;
            reason
        });
        inserted
    }

    pub fn is_external(&self, name: &str) -> bool {
        self.externals.contains_key(name)
    }

    pub fn reason(&self, name: &str) -> Option<ExternalizationReason> {
        self.externals.get(name).map(|r| *r)
    }

    /// Externals that were imported during the walk, sorted by package name.
    pub fn used_externals(&self) -> Vec<(String, ExternalizationReason)> {
        let mut used: Vec<(String, ExternalizationReason)> = self
            .used
            .iter()
            .filter_map(|name| self.reason(name.key()).map(|reason| (name.key().clone(), reason)))
            .collect();
        used.sort_by(|a, b| a.0.cmp(&b.0));
        used
    }

    pub fn bare_specifier(&self, id: &Path) -> Option<String> {
        self.bare_specifiers.get(id).map(|s| s.clone())
    }

    pub fn importer_of(&self, id: &Path) -> Option<ModuleId> {
        self.importers.get(id).map(|p| p.clone())
    }

    /// Walks importer edges up from `id` to the first module reached through a
    /// bare import and returns that specifier. `None` means `id` only has
    /// local ancestry.
    pub fn get_package_entry_point(&self, id: &Path) -> Result<Option<String>> {
        let mut visited: HashSet<ModuleId> = HashSet::new();
        let mut current = id.to_path_buf();

        loop {
            if let Some(specifier) = self.bare_specifier(&current) {
                trace!("{} belongs to '{}'", id.display(), specifier);
                return Ok(Some(specifier));
            }
            if !visited.insert(current.clone()) {
                bail!("Import cycle in importer edges at {}", current.display());
            }
            match self.importer_of(&current) {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }

    fn record_resolution(
        &self,
        id: &ModuleId,
        specifier: &str,
        is_bare: bool,
        importer: Option<&Path>,
    ) {
        if is_bare {
            self.bare_specifiers.entry(id.clone()).or_insert_with(|| specifier.to_string());
        }
        let Some(importer) = importer else {
            return;
        };
        if id.as_path() == importer || self.entries.contains(id) {
            return;
        }
        self.importers.entry(id.clone()).or_insert_with(|| importer.to_path_buf());
    }
}

impl ResolveHook for ExternalizationClassifier {
    fn name(&self) -> &'static str {
        "externalize"
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
        let package = package_name(specifier);

        if let Some(name) = package
            && self.is_external(name)
        {
            trace!("'{}' is external ({})", specifier, name);
            self.used.insert(name.to_string());
            return Ok(Some(Resolved::External(specifier.to_string())));
        }

        match next.resolve(specifier, importer)? {
            Some(Resolved::Module(id)) => {
                self.record_resolution(&id, specifier, package.is_some(), importer);
                Ok(Some(Resolved::Module(id)))
            }
            Some(external) => Ok(Some(external)),
            None => match package {
                Some(name) => {
                    debug!("Could not resolve '{}', leaving '{}' external", specifier, name);
                    self.add_external(name, ExternalizationReason::BecauseUnresolvable);
                    self.used.insert(name.to_string());
                    Ok(Some(Resolved::External(specifier.to_string())))
                }
                None => Err(ResolveError::Unresolved {
                    specifier: specifier.to_string(),
                    importer: importer.map(Path::to_path_buf),
                }),
            },
        }
    }
}

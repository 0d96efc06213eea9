//! Resolution-hook contract between the graph walk and the resolvers.
//!
//! Hooks run in order for every (specifier, importer) pair. A hook either
//! answers, or declines with `Ok(None)` so the next hook is asked. A hook can
//! also ask the rest of the chain first through its [`Delegate`], which skips
//! the hook itself and ends in [`DefaultResolver`].

use anyhow::Result;
use log::trace;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use dtsmerge_core::{ModuleId, PackageJsonCache, ResolveCache, resolve};

use crate::error::ResolveError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A file to bundle
    Module(ModuleId),
    /// An import left as-is in the output
    External(String),
}

impl Resolved {
    /// Graph key of the outcome: the module path, or the external specifier.
    pub fn key(&self) -> PathBuf {
        match self {
            Resolved::Module(id) => id.clone(),
            Resolved::External(specifier) => PathBuf::from(specifier),
        }
    }
}

pub type HookResult = Result<Option<Resolved>, ResolveError>;

pub trait ResolveHook: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called once with the entry modules before the walk starts.
    fn build_start(&self, _entries: &[ModuleId]) {}

    fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&Path>,
        next: &Delegate<'_>,
    ) -> HookResult;
}

/// Path, extension and node_modules resolution used when every hook declines.
#[derive(Debug)]
pub struct DefaultResolver {
    cwd: PathBuf,
    cache: ResolveCache,
    packages: Arc<PackageJsonCache>,
}

impl DefaultResolver {
    pub fn new(cwd: &Path) -> Self {
        Self::with_packages(cwd, Arc::new(PackageJsonCache::new()))
    }

    /// Shares the build's package.json cache with the other resolvers.
    pub fn with_packages(cwd: &Path, packages: Arc<PackageJsonCache>) -> Self {
        Self { cwd: cwd.to_path_buf(), cache: ResolveCache::new(), packages }
    }

    pub fn resolve(&self, specifier: &str, importer: Option<&Path>) -> Result<Option<ModuleId>> {
        resolve(&self.cwd, importer, specifier, &self.cache, &self.packages)
    }
}

/// The remaining hooks after the current one, plus the default resolver.
pub struct Delegate<'a> {
    hooks: &'a [&'a dyn ResolveHook],
    fallback: &'a DefaultResolver,
}

impl<'a> Delegate<'a> {
    pub fn new(hooks: &'a [&'a dyn ResolveHook], fallback: &'a DefaultResolver) -> Self {
        Self { hooks, fallback }
    }

    pub fn resolve(&self, specifier: &str, importer: Option<&Path>) -> HookResult {
        for (idx, hook) in self.hooks.iter().enumerate() {
            let next = Delegate { hooks: &self.hooks[idx + 1..], fallback: self.fallback };
            if let Some(resolved) = hook.resolve_id(specifier, importer, &next)? {
                trace!("Hook '{}' resolved '{}' to {:?}", hook.name(), specifier, resolved);
                return Ok(Some(resolved));
            }
        }

        Ok(self.fallback.resolve(specifier, importer)?.map(Resolved::Module))
    }
}

use std::path::PathBuf;
use thiserror::Error;

use dtsmerge_core::{ModuleId, PackageJsonError};

use crate::types::EntryPoint;

/// Failure raised from inside the resolution hook chain.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Could not resolve \"{specifier}\"{}", imported_by(.importer))]
    Unresolved { specifier: String, importer: Option<ModuleId> },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] PackageJsonError),

    /// Carries every per-entry result so the warnings can be shown first.
    #[error("No input files")]
    NoInputFiles(Vec<EntryPoint>),

    #[error("Could not resolve \"{specifier}\"{}", imported_by(.importer))]
    UnresolvedImport {
        specifier: String,
        importer: Option<ModuleId>,
        /// The module that failed to load: the missing path, or the bare specifier
        id: PathBuf,
        /// Entry point first, failing module last
        chain: Vec<PathBuf>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn imported_by(importer: &Option<ModuleId>) -> String {
    importer.as_ref().map(|p| format!(" from {}", p.display())).unwrap_or_default()
}

use log::{debug, trace};
use rayon::prelude::*;
use std::{collections::HashSet, path::PathBuf};

use dtsmerge_core::{is_dts, normalize};

use crate::types::{EntryPoint, EntryPointError};

/// Candidate entry points, either given explicitly or discovered from package.json.
#[derive(Debug, Clone)]
pub enum EntryInputs {
    /// Absolute paths in the order given
    Paths(Vec<PathBuf>),
    /// (absolute path, package.json field label)
    Labeled(Vec<(PathBuf, String)>),
}

/// Checks every candidate concurrently and returns one result per distinct
/// path, in input order. Candidates naming the same file keep the first
/// occurrence. Invalid candidates carry the reason they were skipped;
/// deciding whether enough valid entries remain is left to the caller.
pub fn validate_entry_points(inputs: EntryInputs) -> Vec<EntryPoint> {
    let candidates: Vec<(PathBuf, Option<String>)> = match inputs {
        EntryInputs::Paths(paths) => paths.into_iter().map(|path| (path, None)).collect(),
        EntryInputs::Labeled(entries) => {
            entries.into_iter().map(|(path, label)| (path, Some(label))).collect()
        }
    };
    debug!("Validating {} entry point candidates", candidates.len());

    let mut results: Vec<EntryPoint> = candidates
        .into_par_iter()
        .map(|(path, source)| {
            let error = if !is_dts(&path) {
                Some(EntryPointError::NotDeclaration)
            } else if !path.is_file() {
                Some(EntryPointError::NotFound)
            } else {
                None
            };
            trace!("Entry point {}: {:?}", path.display(), error);

            EntryPoint { path: normalize(&path), source, error }
        })
        .collect();

    let mut seen = HashSet::new();
    results.retain(|entry| {
        let first = seen.insert(entry.path.clone());
        if !first {
            debug!("Skipping duplicate entry point {}", entry.path.display());
        }
        first
    });
    results
}

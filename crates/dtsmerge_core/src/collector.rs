use anyhow::Result;
use ignore::WalkBuilder;
use log::{debug, trace};
use std::path::{Path, PathBuf};

/// Every file under a package root, skipping `node_modules` and VCS
/// directories. Gitignored files are kept: build output such as `dist/` is
/// usually ignored but is exactly what `exports` points at.
pub fn list_package_files(root: &Path) -> Result<Vec<PathBuf>> {
    debug!("Listing package files under: {}", root.display());
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .ignore(false)
        .git_ignore(false)
        .git_exclude(false)
        .git_global(false)
        .parents(false)
        .filter_entry(|dent| {
            let name = dent.file_name();
            name != "node_modules" && name != ".git"
        })
        .build();

    let mut files: Vec<PathBuf> = Vec::new();
    for res in walker {
        let dent = res?;
        if !dent.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        trace!("Found package file: {}", dent.path().display());
        files.push(dent.into_path());
    }

    files.sort();
    debug!("Listed {} package files", files.len());
    Ok(files)
}

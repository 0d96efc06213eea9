//! Core utilities for dtsmerge.
//!
//! This crate provides the filesystem-facing building blocks shared by the
//! bundler, including:
//! - Extracting import specifiers from declaration files
//! - Reading package.json files through a per-build cache
//! - Matching conditional `exports` / `imports` maps
//! - Default module resolution (relative paths, node_modules, `@types`)
//! - Listing the files of a package

mod collector;
mod constants;
mod exports;
mod package_json;
mod parser;
mod resolver;
mod specifier;
mod types;

// Re-export public API
pub use collector::list_package_files;
pub use constants::{
    DTS_EXTENSIONS, INDEX_FILES, JS_TO_DTS_EXTENSIONS, RESOLVE_EXTENSIONS, TYPE_CONDITIONS,
    is_dts,
};
pub use exports::{resolve_exports, resolve_imports, resolve_subpath_map, resolve_target};
pub use package_json::{
    PACKAGE_JSON, PackageJson, PackageJsonCache, PackageJsonError, read_package_json,
};
pub use parser::imports_for;
pub use resolver::{ResolveCache, normalize, resolve, resolve_file};
pub use specifier::{
    get_original_package_name, is_bare, is_path_like, package_name, split_package_subpath,
    types_package_name,
};
pub use types::{ModuleId, SpecKind, Specifier};

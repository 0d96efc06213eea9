//! Module resolution and externalization for TypeScript declaration bundles.
//!
//! While the module graph is walked from one or more `.d.ts` entry points,
//! every import is classified as bundled, external, or an internal `#`
//! subpath alias. The build keeps enough provenance to attribute each
//! bundled file to the package that introduced it, and to print the import
//! chain that led to an unresolved module.
//!
//! # Examples
//!
//! ```no_run
//! use dtsmerge_bundle::{Config, print_error, print_report, run_build};
//! use std::io::{BufWriter, Write};
//! use std::path::PathBuf;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut cfg = Config {
//!     inputs: vec![PathBuf::from("dist/index.d.ts")],
//!     cwd: Some(PathBuf::from("/path/to/package")),
//!     external: vec!["react".to_string()],
//!     json: false,
//! };
//! cfg.initialize()?;
//!
//! let base = std::env::current_dir()?;
//! let mut stdout = BufWriter::new(std::io::stdout());
//! match run_build(&cfg) {
//!     Ok(output) => print_report(&mut stdout, &output, &base)?,
//!     Err(e) => print_error(&mut stdout, &e, &base)?,
//! }
//! stdout.flush()?;
//! # Ok(())
//! # }
//! ```

mod build;
mod chain;
mod classifier;
mod config;
mod entry_points;
mod error;
mod graph;
mod hooks;
mod metadata;
mod reporter;
mod subpath;
mod types;

// Re-export public API
pub use build::run_build;
pub use chain::ImportChainTracker;
pub use classifier::ExternalizationClassifier;
pub use config::Config;
pub use entry_points::{EntryInputs, validate_entry_points};
pub use error::{BuildError, ResolveError};
pub use graph::{ModuleGraph, OutputChunk, common_output_dir};
pub use hooks::{DefaultResolver, Delegate, HookResult, ResolveHook, Resolved};
pub use metadata::{PackageMetadata, collect_export_paths};
pub use reporter::{print_error, print_report};
pub use subpath::SubpathImportResolver;
pub use types::{
    BuildOutput, DependencyField, EntryPoint, EntryPointError, ExternalEntry,
    ExternalizationReason, OutputReport,
};

use serde::{Serialize, Serializer};
use std::{collections::BTreeMap, fmt, path::PathBuf};

use dtsmerge_core::ModuleId;

/// package.json dependency fields that externalize a package, in scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyField {
    Dependencies,
    PeerDependencies,
    OptionalDependencies,
}

impl DependencyField {
    pub const SCAN_ORDER: [DependencyField; 3] =
        [Self::Dependencies, Self::PeerDependencies, Self::OptionalDependencies];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::PeerDependencies => "peerDependencies",
            Self::OptionalDependencies => "optionalDependencies",
        }
    }
}

/// Why a package is left as an external import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalizationReason {
    ByDependencyField(DependencyField),
    ByCliFlag,
    BecauseUnresolvable,
}

impl fmt::Display for ExternalizationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByDependencyField(field) => write!(f, "by package.json {}", field.as_str()),
            Self::ByCliFlag => write!(f, "by --external flag"),
            Self::BecauseUnresolvable => write!(f, "because unresolvable"),
        }
    }
}

impl Serialize for ExternalizationReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPointError {
    NotDeclaration,
    NotFound,
}

impl fmt::Display for EntryPointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDeclaration => write!(f, "Ignoring non-d.ts input"),
            Self::NotFound => write!(f, "File not found"),
        }
    }
}

impl Serialize for EntryPointError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPoint {
    pub path: PathBuf,
    /// The package.json field that produced this entry, e.g. `exports["./sub"]`
    pub source: Option<String>,
    pub error: Option<EntryPointError>,
}

impl EntryPoint {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEntry {
    pub name: String,
    pub reason: ExternalizationReason,
    /// `@types/...` devDependency that should move to dependencies
    pub dev_types_package: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputReport {
    pub file_name: String,
    pub entry: ModuleId,
    pub modules: Vec<ModuleId>,
    /// Outgoing import specifiers of each bundled module, in source order
    pub imports: BTreeMap<ModuleId, Vec<String>>,
    /// Bundled module -> bare specifier of the package it came from.
    /// Local files have no entry.
    pub packages: BTreeMap<ModuleId, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutput {
    pub output_dir: PathBuf,
    pub entry_points: Vec<EntryPoint>,
    pub outputs: Vec<OutputReport>,
    pub externals: Vec<ExternalEntry>,
}

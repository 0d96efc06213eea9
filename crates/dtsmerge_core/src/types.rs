use std::path::PathBuf;

/// Absolute, normalized filesystem path of a module in the graph
pub type ModuleId = PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier {
    pub request: String,
    pub kind: SpecKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecKind {
    /// `import ... from '...'`, including `import type` and side-effect imports
    Import,
    /// `export ... from '...'` and `export * from '...'`
    ReExport,
    /// `import("...")` in a type position, including `typeof import("...")`
    ImportType,
    /// `import x = require("...")`
    ImportEquals,
}

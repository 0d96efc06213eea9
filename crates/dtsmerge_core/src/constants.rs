//! Constants for declaration-file recognition and resolution.
//!
//! Declaration files are recognized only by their exact, case-sensitive
//! compound extension. A `.ts` file is source, not a declaration, and is
//! never picked up as an entry point.

use std::path::Path;

/// Compound extensions that mark a declaration file
pub const DTS_EXTENSIONS: &[&str] = &[
    ".d.ts",  // TypeScript declaration
    ".d.cts", // CommonJS declaration
    ".d.mts", // ES module declaration
];

/// Extensions appended when probing an extensionless import (in priority order)
pub const RESOLVE_EXTENSIONS: &[&str] = &[".d.ts", ".d.mts", ".d.cts"];

/// Runtime extensions that are rewritten to their declaration counterpart,
/// e.g. `./utils.js` -> `./utils.d.ts`
pub const JS_TO_DTS_EXTENSIONS: &[(&str, &str)] =
    &[(".js", ".d.ts"), (".mjs", ".d.mts"), (".cjs", ".d.cts")];

/// Index file names to try when resolving directory imports
pub const INDEX_FILES: &[&str] = &["index.d.ts", "index.d.mts", "index.d.cts"];

/// Conditions honoured when matching `exports` and `imports` targets.
/// `default` always matches and does not need to be listed.
pub const TYPE_CONDITIONS: &[&str] = &["types", "import"];

pub fn is_dts(path: impl AsRef<Path>) -> bool {
    let name = path.as_ref().to_string_lossy();
    DTS_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

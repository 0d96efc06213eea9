//! Helpers for classifying import specifiers and extracting package names.

const TYPES_SCOPE: &str = "@types/";

/// Relative (`./`, `../`, `.`, `..`) or absolute specifiers name a file, not a package.
pub fn is_path_like(request: &str) -> bool {
    request == "."
        || request == ".."
        || request.starts_with("./")
        || request.starts_with("../")
        || request.starts_with('/')
}

pub fn is_bare(request: &str) -> bool {
    !request.is_empty() && !is_path_like(request)
}

/// Leading package-name segment of a bare specifier.
///
/// `lodash/fp` -> `lodash`, `@scope/pkg/sub` -> `@scope/pkg`. A scoped
/// specifier without a name segment (`@scope`) is returned whole.
pub fn package_name(request: &str) -> Option<&str> {
    if !is_bare(request) {
        return None;
    }

    let mut separators = request.match_indices('/').map(|(idx, _)| idx);
    let end = if request.starts_with('@') {
        separators.nth(1)
    } else {
        separators.next()
    };

    Some(end.map_or(request, |idx| &request[..idx]))
}

/// Splits a bare specifier into its package name and `./`-prefixed subpath.
///
/// `@scope/pkg/sub/file` -> (`@scope/pkg`, `Some("./sub/file")`)
pub fn split_package_subpath(request: &str) -> Option<(&str, Option<String>)> {
    let name = package_name(request)?;
    let rest = &request[name.len()..];
    let subpath = rest.strip_prefix('/').filter(|s| !s.is_empty()).map(|s| format!("./{s}"));
    Some((name, subpath))
}

/// Maps a DefinitelyTyped package back to the package it describes.
///
/// `@types/foo` -> `foo`, `@types/foo__bar` -> `@foo/bar`
pub fn get_original_package_name(types_package: &str) -> String {
    let name = types_package.strip_prefix(TYPES_SCOPE).unwrap_or(types_package);
    match name.split_once("__") {
        Some((scope, rest)) => format!("@{scope}/{rest}"),
        None => name.to_string(),
    }
}

/// Inverse of [`get_original_package_name`]: `@foo/bar` -> `@types/foo__bar`
pub fn types_package_name(package: &str) -> String {
    match package.strip_prefix('@').and_then(|p| p.split_once('/')) {
        Some((scope, name)) => format!("{TYPES_SCOPE}{scope}__{name}"),
        None => format!("{TYPES_SCOPE}{package}"),
    }
}

use std::{
    io::{self, Write},
    path::{Component, Path, PathBuf},
};

use colored::Colorize;
use log::{debug, trace};

use crate::{
    error::BuildError,
    types::{BuildOutput, EntryPoint, ExternalEntry, OutputReport},
};

/// Show `path` relative to `base` when they share a root
fn display_path(path: &Path, base: &Path) -> String {
    match make_relative(path, base) {
        Some(rel) => {
            trace!("Relativized {} to {}", path.display(), rel.display());
            rel.to_string_lossy().to_string()
        }
        None => path.to_string_lossy().to_string(),
    }
}

/// Create a relative path from `base` to `target`
fn make_relative(target: &Path, base: &Path) -> Option<PathBuf> {
    let mut target_components = target.components();
    let mut base_components = base.components();

    let mut common_prefix_len = 0;
    let mut target_parts = Vec::new();
    let mut base_parts = Vec::new();

    loop {
        match (target_components.next(), base_components.next()) {
            (Some(t), Some(b)) if t == b => common_prefix_len += 1,
            (Some(t), Some(b)) => {
                target_parts.push(t);
                base_parts.push(b);
                break;
            }
            (Some(t), None) => {
                target_parts.push(t);
                break;
            }
            (None, Some(b)) => {
                base_parts.push(b);
                break;
            }
            (None, None) => return Some(PathBuf::from(".")),
        }
    }

    target_parts.extend(target_components);
    base_parts.extend(base_components);

    if common_prefix_len == 0 && target.components().next() != base.components().next() {
        return None;
    }

    let mut result = PathBuf::new();
    for _ in &base_parts {
        result.push("..");
    }
    for component in target_parts {
        match component {
            Component::Normal(p) => result.push(p),
            Component::ParentDir => result.push(".."),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    if result.as_os_str().is_empty() { Some(PathBuf::from(".")) } else { Some(result) }
}

fn print_entry_points<W: Write>(
    writer: &mut W,
    entry_points: &[EntryPoint],
    base: &Path,
) -> io::Result<()> {
    writeln!(writer, "{}", "Entry points".bold())?;
    for entry in entry_points {
        let path = display_path(&entry.path, base);
        match (&entry.error, &entry.source) {
            (Some(error), _) => {
                writeln!(writer, "  {} {} {}", "⚠".yellow().bold(), path, error.to_string().yellow())?
            }
            (None, Some(source)) => {
                writeln!(writer, "  {} {} {}", "✓".green(), path.blue(), source.dimmed())?
            }
            (None, None) => writeln!(writer, "  {} {}", "✓".green(), path.blue())?,
        }
    }
    writeln!(writer)
}

fn print_output<W: Write>(writer: &mut W, output: &OutputReport, base: &Path) -> io::Result<()> {
    writeln!(
        writer,
        "{} ({} modules)",
        output.file_name.bright_white().bold(),
        output.modules.len().to_string().cyan()
    )?;

    let bundled: Vec<_> = output.modules.iter().filter(|m| **m != output.entry).collect();
    for (idx, module) in bundled.iter().enumerate() {
        let prefix = if idx == bundled.len() - 1 { "└──" } else { "├──" };
        let path = display_path(module, base);
        match output.packages.get(*module) {
            Some(package) => writeln!(writer, "{}  {} {}", prefix.dimmed(), path, package.magenta())?,
            None => writeln!(writer, "{}  {}", prefix.dimmed(), path)?,
        }
    }
    writeln!(writer)
}

fn print_externals<W: Write>(writer: &mut W, externals: &[ExternalEntry]) -> io::Result<()> {
    if externals.is_empty() {
        return Ok(());
    }
    writeln!(writer, "{}", "Externals".bold())?;
    for external in externals {
        writeln!(writer, "  {} {}", external.name.magenta(), external.reason.to_string().dimmed())?;
    }
    for external in externals {
        if let Some(dev_types) = &external.dev_types_package {
            writeln!(
                writer,
                "{} {} should not be in devDependencies if {} is externalized",
                "⚠".yellow().bold(),
                dev_types.yellow(),
                external.name
            )?;
        }
    }
    writeln!(writer)
}

pub fn print_report<W: Write>(writer: &mut W, output: &BuildOutput, base: &Path) -> io::Result<()> {
    debug!("Printing report for {} outputs", output.outputs.len());
    print_entry_points(writer, &output.entry_points, base)?;

    writeln!(
        writer,
        "{} {}",
        "Outputs in".bold(),
        display_path(&output.output_dir, base).blue()
    )?;
    for report in &output.outputs {
        print_output(writer, report, base)?;
    }

    print_externals(writer, &output.externals)?;
    writer.flush()
}

pub fn print_error<W: Write>(writer: &mut W, error: &BuildError, base: &Path) -> io::Result<()> {
    debug!("Printing build error: {}", error);
    match error {
        BuildError::NoInputFiles(entry_points) => {
            if !entry_points.is_empty() {
                print_entry_points(writer, entry_points, base)?;
            }
            writeln!(writer, "{} {}", "✗".red().bold(), error)?;
        }
        BuildError::UnresolvedImport { specifier, importer, chain, .. } => {
            let from = importer
                .as_ref()
                .map(|p| format!(" from {}", display_path(p, base)))
                .unwrap_or_default();
            writeln!(
                writer,
                "{} Could not resolve \"{}\"{}",
                "✗".red().bold(),
                specifier.red(),
                from
            )?;
            print_chain(writer, chain, base)?;
        }
        BuildError::Other(e) => writeln!(writer, "{} {:#}", "✗".red().bold(), e)?,
        BuildError::Config(_) => writeln!(writer, "{} {}", "✗".red().bold(), error)?,
    }
    writer.flush()
}

/// Import chain as a tree, entry point at the top.
fn print_chain<W: Write>(writer: &mut W, chain: &[PathBuf], base: &Path) -> io::Result<()> {
    for (depth, node) in chain.iter().enumerate() {
        let path = display_path(node, base);
        let is_failing = depth == chain.len() - 1;
        let path = if is_failing { path.red().to_string() } else { path };
        if depth == 0 {
            writeln!(writer, "  {}", path)?;
        } else {
            writeln!(writer, "  {}{} {}", "    ".repeat(depth - 1), "└──".dimmed(), path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DependencyField, EntryPointError, ExternalizationReason};
    use std::collections::BTreeMap;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        colored::control::set_override(false);
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_make_relative_child_dir() {
        let target = Path::new("/project/dist/sub/index.d.ts");
        let base = Path::new("/project");
        assert_eq!(make_relative(target, base), Some(PathBuf::from("dist/sub/index.d.ts")));
    }

    #[test]
    fn test_make_relative_parent_and_sibling() {
        assert_eq!(
            make_relative(Path::new("/project/index.d.ts"), Path::new("/project/apps/web")),
            Some(PathBuf::from("../../index.d.ts"))
        );
        assert_eq!(
            make_relative(Path::new("/project/apps/web/a.d.ts"), Path::new("/project/apps/api")),
            Some(PathBuf::from("../web/a.d.ts"))
        );
    }

    #[test]
    fn test_make_relative_same_path() {
        let path = Path::new("/project/dist");
        assert_eq!(make_relative(path, path), Some(PathBuf::from(".")));
    }

    #[test]
    fn test_display_path_keeps_bare_specifiers() {
        assert_eq!(display_path(Path::new("lodash"), Path::new("/project")), "lodash");
    }

    #[test]
    fn test_print_report() {
        let base = Path::new("/pkg");
        let entry = PathBuf::from("/pkg/dist/index.d.ts");
        let local = PathBuf::from("/pkg/dist/local.d.ts");
        let dep = PathBuf::from("/pkg/node_modules/dep/index.d.ts");
        let output = BuildOutput {
            output_dir: PathBuf::from("/pkg/dist"),
            entry_points: vec![
                EntryPoint { path: entry.clone(), source: Some("types".to_string()), error: None },
                EntryPoint {
                    path: PathBuf::from("/pkg/src/index.ts"),
                    source: None,
                    error: Some(EntryPointError::NotDeclaration),
                },
            ],
            outputs: vec![OutputReport {
                file_name: "index.d.ts".to_string(),
                entry: entry.clone(),
                modules: vec![entry.clone(), local.clone(), dep.clone()],
                imports: BTreeMap::from([
                    (entry, vec!["./local".to_string(), "dep".to_string()]),
                    (local, vec![]),
                    (dep.clone(), vec![]),
                ]),
                packages: BTreeMap::from([(dep, "dep".to_string())]),
            }],
            externals: vec![ExternalEntry {
                name: "foo".to_string(),
                reason: ExternalizationReason::ByDependencyField(DependencyField::Dependencies),
                dev_types_package: Some("@types/foo".to_string()),
            }],
        };

        let text = render(|out| print_report(out, &output, base));

        assert!(text.contains("✓ dist/index.d.ts types"));
        assert!(text.contains("⚠ src/index.ts Ignoring non-d.ts input"));
        assert!(text.contains("Outputs in dist"));
        assert!(text.contains("index.d.ts (3 modules)"));
        assert!(text.contains("├──  dist/local.d.ts\n"));
        assert!(text.contains("└──  node_modules/dep/index.d.ts dep"));
        assert!(text.contains("foo by package.json dependencies"));
        assert!(text.contains("@types/foo should not be in devDependencies if foo is externalized"));
    }

    #[test]
    fn test_print_unresolved_chain() {
        let base = Path::new("/pkg");
        let entry = PathBuf::from("/pkg/dist/entry.d.ts");
        let a = PathBuf::from("/pkg/dist/a.d.ts");
        let error = BuildError::UnresolvedImport {
            specifier: "./missing".to_string(),
            importer: Some(a.clone()),
            id: PathBuf::from("/pkg/dist/missing"),
            chain: vec![entry, a, PathBuf::from("/pkg/dist/missing")],
        };

        let text = render(|out| print_error(out, &error, base));
        assert_eq!(
            text,
            "✗ Could not resolve \"./missing\" from dist/a.d.ts\n  dist/entry.d.ts\n  └── dist/a.d.ts\n      └── dist/missing\n"
        );
    }

    #[test]
    fn test_print_no_input_files() {
        let error = BuildError::NoInputFiles(vec![EntryPoint {
            path: PathBuf::from("/pkg/dist/missing.d.ts"),
            source: None,
            error: Some(EntryPointError::NotFound),
        }]);

        let text = render(|out| print_error(out, &error, Path::new("/pkg")));
        assert!(text.contains("⚠ dist/missing.d.ts File not found"));
        assert!(text.ends_with("✗ No input files\n"));
    }
}

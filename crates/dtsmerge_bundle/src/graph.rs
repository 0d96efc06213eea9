//! A minimal module-graph walk that drives the resolution hooks the way a
//! bundler does: every import of every reached module is resolved once,
//! importer first, and the bundled modules are grouped per entry point.

use anyhow::Result;
use dashmap::DashMap;
use log::{debug, trace};
use rayon::prelude::*;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::{Path, PathBuf},
};

use dtsmerge_core::{ModuleId, Specifier, imports_for, is_dts};

use crate::{
    error::ResolveError,
    hooks::{DefaultResolver, Delegate, ResolveHook, Resolved},
};

/// One output file: an entry point and every module bundled into it.
#[derive(Debug, Clone)]
pub struct OutputChunk {
    /// Output path relative to the output directory
    pub file_name: String,
    pub entry: ModuleId,
    /// Contributing modules, entry first, in discovery order
    pub modules: Vec<ModuleId>,
    /// Outgoing import specifiers of each contributing module
    pub imports: BTreeMap<ModuleId, Vec<String>>,
}

pub struct ModuleGraph<'a> {
    hooks: Vec<&'a dyn ResolveHook>,
    fallback: DefaultResolver,
    import_cache: DashMap<PathBuf, Vec<Specifier>>,
}

impl<'a> ModuleGraph<'a> {
    pub fn new(fallback: DefaultResolver, hooks: Vec<&'a dyn ResolveHook>) -> Self {
        Self { hooks, fallback, import_cache: DashMap::new() }
    }

    /// Walks the graph breadth-first from `entries`. Imports of one level are
    /// extracted in parallel and resolved in order, so every first-writer
    /// map in the hooks sees the same sequence on every run.
    pub fn build(
        &self,
        entries: &[ModuleId],
        output_dir: &Path,
    ) -> Result<Vec<OutputChunk>, ResolveError> {
        for hook in &self.hooks {
            trace!("build_start: {}", hook.name());
            hook.build_start(entries);
        }
        let delegate = Delegate::new(&self.hooks, &self.fallback);

        let mut visited: HashSet<ModuleId> = HashSet::new();
        let mut level: Vec<ModuleId> =
            entries.iter().filter(|e| visited.insert((*e).clone())).cloned().collect();
        let mut children: HashMap<ModuleId, Vec<ModuleId>> = HashMap::new();
        let mut imports: HashMap<ModuleId, Vec<String>> = HashMap::new();

        while !level.is_empty() {
            debug!("Extracting imports of {} modules", level.len());
            let parsed: Vec<(ModuleId, Vec<Specifier>)> = level
                .par_iter()
                .map(|module| {
                    let specs =
                        if is_dts(module) { imports_for(module, &self.import_cache)? } else { vec![] };
                    Ok((module.clone(), specs))
                })
                .collect::<Result<_>>()?;

            let mut next_level = Vec::new();
            for (module, specs) in parsed {
                let mut module_children = Vec::new();
                for spec in &specs {
                    trace!("Resolving {:?} '{}' in {}", spec.kind, spec.request, module.display());
                    match delegate.resolve(&spec.request, Some(&module))? {
                        Some(Resolved::Module(id)) => {
                            if visited.insert(id.clone()) {
                                next_level.push(id.clone());
                            }
                            module_children.push(id);
                        }
                        Some(Resolved::External(name)) => {
                            trace!("'{}' stays external in {}", name, module.display());
                        }
                        None => {
                            return Err(ResolveError::Unresolved {
                                specifier: spec.request.clone(),
                                importer: Some(module.clone()),
                            });
                        }
                    }
                }
                imports.insert(module.clone(), specs.into_iter().map(|s| s.request).collect());
                children.insert(module, module_children);
            }
            level = next_level;
        }
        debug!("Module graph has {} modules", visited.len());

        Ok(entries.iter().map(|entry| chunk_for(entry, output_dir, &children, &imports)).collect())
    }
}

fn chunk_for(
    entry: &ModuleId,
    output_dir: &Path,
    children: &HashMap<ModuleId, Vec<ModuleId>>,
    imports: &HashMap<ModuleId, Vec<String>>,
) -> OutputChunk {
    let mut seen: HashSet<&ModuleId> = HashSet::new();
    let mut modules = Vec::new();
    let mut stack = vec![entry];

    while let Some(module) = stack.pop() {
        if !seen.insert(module) {
            continue;
        }
        modules.push(module.clone());
        if let Some(next) = children.get(module) {
            stack.extend(next.iter().rev());
        }
    }

    let imports = modules
        .iter()
        .filter_map(|m| imports.get(m).map(|specs| (m.clone(), specs.clone())))
        .collect();
    let file_name = entry
        .strip_prefix(output_dir)
        .unwrap_or(entry.as_path())
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    OutputChunk { file_name, entry: entry.clone(), modules, imports }
}

/// Deepest directory containing every entry.
pub fn common_output_dir(entries: &[ModuleId]) -> Option<PathBuf> {
    let (first, rest) = entries.split_first()?;
    let mut dir = first.parent()?.to_path_buf();
    for entry in rest {
        while !entry.starts_with(&dir) {
            dir = dir.parent()?.to_path_buf();
        }
    }
    Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookResult;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, path: &str, content: &str) -> PathBuf {
        let file_path = dir.join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    struct ExternalizeBare;

    impl ResolveHook for ExternalizeBare {
        fn name(&self) -> &'static str {
            "externalize-bare"
        }

        fn resolve_id(
            &self,
            specifier: &str,
            _importer: Option<&Path>,
            _next: &Delegate<'_>,
        ) -> HookResult {
            if dtsmerge_core::is_bare(specifier) {
                return Ok(Some(Resolved::External(specifier.to_string())));
            }
            Ok(None)
        }
    }

    #[test]
    fn test_build_single_entry() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let entry = create_test_file(
            &root,
            "dist/entry.d.ts",
            "import { A } from './a';\nexport * from './b.js';\nexport declare const x: A;",
        );
        let a = create_test_file(&root, "dist/a.d.ts", "import { C } from './c';\nexport type A = C;");
        let b = create_test_file(&root, "dist/b.d.ts", "export declare const b: number;");
        let c = create_test_file(&root, "dist/c.d.ts", "export type C = string;");

        let graph = ModuleGraph::new(DefaultResolver::new(&root), vec![]);
        let chunks = graph.build(&[entry.clone()], &root.join("dist")).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].file_name, "entry.d.ts");
        assert_eq!(chunks[0].modules, vec![entry.clone(), a.clone(), c, b]);
        assert_eq!(chunks[0].imports[&entry], vec!["./a", "./b.js"]);
    }

    #[test]
    fn test_build_circular_imports() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let entry = create_test_file(&root, "entry.d.ts", "import './a';");
        let a = create_test_file(&root, "a.d.ts", "import './entry';");

        let graph = ModuleGraph::new(DefaultResolver::new(&root), vec![]);
        let chunks = graph.build(&[entry.clone()], &root).unwrap();
        assert_eq!(chunks[0].modules, vec![entry, a]);
    }

    #[test]
    fn test_build_multiple_entries_share_modules() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let index = create_test_file(&root, "dist/index.d.ts", "import './shared';");
        let sub = create_test_file(&root, "dist/sub/index.d.ts", "import '../shared';");
        let shared = create_test_file(&root, "dist/shared.d.ts", "");

        let graph = ModuleGraph::new(DefaultResolver::new(&root), vec![]);
        let chunks = graph.build(&[index.clone(), sub.clone()], &root.join("dist")).unwrap();

        assert_eq!(chunks[0].file_name, "index.d.ts");
        assert_eq!(chunks[0].modules, vec![index, shared.clone()]);
        assert_eq!(chunks[1].file_name, "sub/index.d.ts");
        assert_eq!(chunks[1].modules, vec![sub, shared]);
    }

    #[test]
    fn test_build_externals_are_not_walked() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let entry = create_test_file(&root, "entry.d.ts", "import { get } from 'lodash';");
        create_test_file(&root, "node_modules/lodash/index.d.ts", "");

        let hook = ExternalizeBare;
        let hooks: Vec<&dyn ResolveHook> = vec![&hook as &dyn ResolveHook];
        let graph = ModuleGraph::new(DefaultResolver::new(&root), hooks);
        let chunks = graph.build(&[entry.clone()], &root).unwrap();

        assert_eq!(chunks[0].modules, vec![entry.clone()]);
        assert_eq!(chunks[0].imports[&entry], vec!["lodash"]);
    }

    #[test]
    fn test_build_unresolved_import() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let entry = create_test_file(&root, "entry.d.ts", "import './missing';");

        let graph = ModuleGraph::new(DefaultResolver::new(&root), vec![]);
        let err = graph.build(&[entry.clone()], &root).unwrap_err();
        match err {
            ResolveError::Unresolved { specifier, importer } => {
                assert_eq!(specifier, "./missing");
                assert_eq!(importer, Some(entry));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_common_output_dir() {
        assert_eq!(common_output_dir(&[]), None);
        assert_eq!(
            common_output_dir(&[PathBuf::from("/pkg/dist/index.d.ts")]),
            Some(PathBuf::from("/pkg/dist"))
        );
        assert_eq!(
            common_output_dir(&[
                PathBuf::from("/pkg/dist/index.d.ts"),
                PathBuf::from("/pkg/dist/sub/index.d.ts"),
                PathBuf::from("/pkg/types/extra.d.ts"),
            ]),
            Some(PathBuf::from("/pkg"))
        );
    }
}

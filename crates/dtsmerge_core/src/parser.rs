use anyhow::{Context, Result};
use dashmap::DashMap;
use log::{debug, trace};
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_parser::{Parser as OxcParser, ParserReturn};
use oxc_span::SourceType;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::types::{SpecKind, Specifier};

/// Module specifiers referenced by a declaration file, in source order.
///
/// Type-only imports are kept: in a declaration file every import is a type
/// import, and all of them contribute to the bundle.
pub fn imports_for(
    file: &Path,
    cache: &DashMap<PathBuf, Vec<Specifier>>,
) -> Result<Vec<Specifier>> {
    let file_buf = file.to_path_buf();
    if let Some(v) = cache.get(&file_buf) {
        trace!("Cache hit for imports: {}", file.display());
        return Ok(v.clone());
    }
    trace!("Parsing file for imports: {}", file.display());
    let src =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let specs = extract_specifiers(&src);
    debug!("Found {} import specifiers in {}", specs.len(), file.display());
    cache.insert(file_buf, specs.clone());
    Ok(specs)
}

fn extract_specifiers(src: &str) -> Vec<Specifier> {
    let allocator = Allocator::default();
    let ParserReturn { program, errors, .. } =
        OxcParser::new(&allocator, src, declaration_source_type()).parse();
    if !errors.is_empty() {
        debug!("Parser reported {} recoverable errors", errors.len());
    }

    let mut collector = SpecifierCollector::default();
    collector.statements(&program.body);
    collector.specs
}

/// Walks statements and type positions of a declaration file. Besides module
/// statements this picks up `import("...")` types and `import x = require("...")`,
/// both of which tsc emits into `.d.ts` output.
#[derive(Default)]
struct SpecifierCollector {
    specs: Vec<Specifier>,
}

impl SpecifierCollector {
    fn push(&mut self, request: &str, kind: SpecKind) {
        trace!("Found {:?} specifier: '{}'", kind, request);
        self.specs.push(Specifier { request: request.to_string(), kind });
    }

    fn statements(&mut self, body: &[Statement<'_>]) {
        for stmt in body {
            self.statement(stmt);
        }
    }

    fn statement(&mut self, stmt: &Statement<'_>) {
        match stmt {
            Statement::ImportDeclaration(decl) => self.push(&decl.source.value, SpecKind::Import),
            Statement::ExportNamedDeclaration(decl) => {
                if let Some(source) = &decl.source {
                    self.push(&source.value, SpecKind::ReExport);
                }
                if let Some(declaration) = &decl.declaration {
                    self.declaration(declaration);
                }
            }
            Statement::ExportAllDeclaration(decl) => {
                self.push(&decl.source.value, SpecKind::ReExport)
            }
            Statement::ExportDefaultDeclaration(decl) => match &decl.declaration {
                ExportDefaultDeclarationKind::FunctionDeclaration(func) => self.function(func),
                ExportDefaultDeclarationKind::ClassDeclaration(class) => self.class(class),
                ExportDefaultDeclarationKind::TSInterfaceDeclaration(iface) => {
                    self.interface(iface)
                }
                _ => {}
            },
            _ => {
                if let Some(declaration) = stmt.as_declaration() {
                    self.declaration(declaration);
                }
            }
        }
    }

    fn declaration(&mut self, decl: &Declaration<'_>) {
        match decl {
            Declaration::VariableDeclaration(var) => {
                for declarator in &var.declarations {
                    self.annotation(declarator.id.type_annotation.as_deref());
                }
            }
            Declaration::FunctionDeclaration(func) => self.function(func),
            Declaration::ClassDeclaration(class) => self.class(class),
            Declaration::TSTypeAliasDeclaration(alias) => {
                self.type_parameters(alias.type_parameters.as_deref());
                self.ts_type(&alias.type_annotation);
            }
            Declaration::TSInterfaceDeclaration(iface) => self.interface(iface),
            Declaration::TSModuleDeclaration(module) => self.module(module),
            Declaration::TSImportEqualsDeclaration(decl) => {
                if let TSModuleReference::ExternalModuleReference(reference) =
                    &decl.module_reference
                {
                    self.push(&reference.expression.value, SpecKind::ImportEquals);
                }
            }
            Declaration::TSEnumDeclaration(_) => {}
        }
    }

    fn module(&mut self, module: &TSModuleDeclaration<'_>) {
        match &module.body {
            Some(TSModuleDeclarationBody::TSModuleBlock(block)) => self.statements(&block.body),
            Some(TSModuleDeclarationBody::TSModuleDeclaration(inner)) => self.module(inner),
            None => {}
        }
    }

    fn function(&mut self, func: &Function<'_>) {
        self.type_parameters(func.type_parameters.as_deref());
        if let Some(this_param) = &func.this_param {
            self.annotation(this_param.type_annotation.as_deref());
        }
        self.parameters(&func.params);
        self.annotation(func.return_type.as_deref());
    }

    fn class(&mut self, class: &Class<'_>) {
        self.type_parameters(class.type_parameters.as_deref());
        self.type_arguments(class.super_type_arguments.as_deref());
        for implements in &class.implements {
            self.type_arguments(implements.type_arguments.as_deref());
        }
        for element in &class.body.body {
            match element {
                ClassElement::MethodDefinition(method) => self.function(&method.value),
                ClassElement::PropertyDefinition(prop) => {
                    self.annotation(prop.type_annotation.as_deref())
                }
                ClassElement::AccessorProperty(prop) => {
                    self.annotation(prop.type_annotation.as_deref())
                }
                ClassElement::TSIndexSignature(index) => self.index_signature(index),
                ClassElement::StaticBlock(_) => {}
            }
        }
    }

    fn interface(&mut self, iface: &TSInterfaceDeclaration<'_>) {
        self.type_parameters(iface.type_parameters.as_deref());
        for heritage in &iface.extends {
            self.type_arguments(heritage.type_arguments.as_deref());
        }
        self.signatures(&iface.body.body);
    }

    fn signatures(&mut self, members: &[TSSignature<'_>]) {
        for member in members {
            match member {
                TSSignature::TSIndexSignature(index) => self.index_signature(index),
                TSSignature::TSPropertySignature(prop) => {
                    self.annotation(prop.type_annotation.as_deref())
                }
                TSSignature::TSCallSignatureDeclaration(call) => {
                    self.type_parameters(call.type_parameters.as_deref());
                    self.parameters(&call.params);
                    self.annotation(call.return_type.as_deref());
                }
                TSSignature::TSConstructSignatureDeclaration(ctor) => {
                    self.type_parameters(ctor.type_parameters.as_deref());
                    self.parameters(&ctor.params);
                    self.annotation(ctor.return_type.as_deref());
                }
                TSSignature::TSMethodSignature(method) => {
                    self.type_parameters(method.type_parameters.as_deref());
                    self.parameters(&method.params);
                    self.annotation(method.return_type.as_deref());
                }
            }
        }
    }

    fn index_signature(&mut self, index: &TSIndexSignature<'_>) {
        for param in &index.parameters {
            self.ts_type(&param.type_annotation.type_annotation);
        }
        self.ts_type(&index.type_annotation.type_annotation);
    }

    fn parameters(&mut self, params: &FormalParameters<'_>) {
        for param in &params.items {
            self.annotation(param.pattern.type_annotation.as_deref());
        }
        if let Some(rest) = &params.rest {
            self.annotation(rest.argument.type_annotation.as_deref());
        }
    }

    fn type_parameters(&mut self, params: Option<&TSTypeParameterDeclaration<'_>>) {
        for param in params.into_iter().flat_map(|p| p.params.iter()) {
            self.type_parameter(param);
        }
    }

    fn type_parameter(&mut self, param: &TSTypeParameter<'_>) {
        if let Some(constraint) = &param.constraint {
            self.ts_type(constraint);
        }
        if let Some(default) = &param.default {
            self.ts_type(default);
        }
    }

    fn type_arguments(&mut self, args: Option<&TSTypeParameterInstantiation<'_>>) {
        for ty in args.into_iter().flat_map(|a| a.params.iter()) {
            self.ts_type(ty);
        }
    }

    fn annotation(&mut self, annotation: Option<&TSTypeAnnotation<'_>>) {
        if let Some(annotation) = annotation {
            self.ts_type(&annotation.type_annotation);
        }
    }

    fn import_type(&mut self, import: &TSImportType<'_>) {
        if let TSType::TSLiteralType(literal) = &import.argument
            && let TSLiteral::StringLiteral(source) = &literal.literal
        {
            self.push(&source.value, SpecKind::ImportType);
        }
        self.type_arguments(import.type_arguments.as_deref());
    }

    fn tuple_element(&mut self, element: &TSTupleElement<'_>) {
        match element {
            TSTupleElement::TSOptionalType(ty) => self.ts_type(&ty.type_annotation),
            TSTupleElement::TSRestType(ty) => self.ts_type(&ty.type_annotation),
            other => {
                if let Some(ty) = other.as_ts_type() {
                    self.ts_type(ty);
                }
            }
        }
    }

    fn ts_type(&mut self, ty: &TSType<'_>) {
        match ty {
            TSType::TSImportType(import) => self.import_type(import),
            TSType::TSTypeQuery(query) => {
                if let TSTypeQueryExprName::TSImportType(import) = &query.expr_name {
                    self.import_type(import);
                }
                self.type_arguments(query.type_arguments.as_deref());
            }
            TSType::TSTypeReference(reference) => {
                self.type_arguments(reference.type_arguments.as_deref())
            }
            TSType::TSArrayType(array) => self.ts_type(&array.element_type),
            TSType::TSUnionType(union_type) => union_type.types.iter().for_each(|t| self.ts_type(t)),
            TSType::TSIntersectionType(inter) => inter.types.iter().for_each(|t| self.ts_type(t)),
            TSType::TSTupleType(tuple) => {
                tuple.element_types.iter().for_each(|e| self.tuple_element(e))
            }
            TSType::TSNamedTupleMember(member) => self.tuple_element(&member.element_type),
            TSType::TSTypeLiteral(literal) => self.signatures(&literal.members),
            TSType::TSFunctionType(func) => {
                self.type_parameters(func.type_parameters.as_deref());
                self.parameters(&func.params);
                self.ts_type(&func.return_type.type_annotation);
            }
            TSType::TSConstructorType(ctor) => {
                self.type_parameters(ctor.type_parameters.as_deref());
                self.parameters(&ctor.params);
                self.ts_type(&ctor.return_type.type_annotation);
            }
            TSType::TSConditionalType(cond) => {
                self.ts_type(&cond.check_type);
                self.ts_type(&cond.extends_type);
                self.ts_type(&cond.true_type);
                self.ts_type(&cond.false_type);
            }
            TSType::TSIndexedAccessType(access) => {
                self.ts_type(&access.object_type);
                self.ts_type(&access.index_type);
            }
            TSType::TSMappedType(mapped) => {
                self.type_parameter(&mapped.type_parameter);
                if let Some(name_type) = &mapped.name_type {
                    self.ts_type(name_type);
                }
                if let Some(value_type) = &mapped.type_annotation {
                    self.ts_type(value_type);
                }
            }
            TSType::TSInferType(infer) => self.type_parameter(&infer.type_parameter),
            TSType::TSTypeOperatorType(op) => self.ts_type(&op.type_annotation),
            TSType::TSParenthesizedType(inner) => self.ts_type(&inner.type_annotation),
            TSType::TSTemplateLiteralType(template) => {
                template.types.iter().for_each(|t| self.ts_type(t))
            }
            TSType::TSTypePredicate(predicate) => {
                self.annotation(predicate.type_annotation.as_deref())
            }
            _ => {}
        }
    }
}

fn declaration_source_type() -> SourceType {
    SourceType::default()
        .with_typescript(true)
        .with_typescript_definition(true)
        .with_module(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let file_path = dir.join(name);
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    fn requests(specs: &[Specifier]) -> Vec<&str> {
        specs.iter().map(|s| s.request.as_str()).collect()
    }

    #[test]
    fn test_named_import() {
        let specs = extract_specifiers("import { Foo } from './foo';\nexport declare const x: Foo;");
        assert_eq!(specs, vec![Specifier { request: "./foo".into(), kind: SpecKind::Import }]);
    }

    #[test]
    fn test_type_only_import_kept() {
        let specs = extract_specifiers("import type { Foo } from './types';");
        assert_eq!(requests(&specs), vec!["./types"]);
    }

    #[test]
    fn test_side_effect_and_namespace_imports() {
        let specs = extract_specifiers("import './augment';\nimport * as ns from 'lodash';");
        assert_eq!(requests(&specs), vec!["./augment", "lodash"]);
    }

    #[test]
    fn test_re_exports() {
        let specs = extract_specifiers(
            "export * from './a';\nexport { b } from './b';\nexport type { C } from '@scope/c';",
        );
        assert_eq!(requests(&specs), vec!["./a", "./b", "@scope/c"]);
        assert!(specs.iter().all(|s| s.kind == SpecKind::ReExport));
    }

    #[test]
    fn test_local_exports_ignored() {
        let specs = extract_specifiers(
            "declare const a: number;\nexport { a };\nexport declare function f(): void;",
        );
        assert!(specs.is_empty());
    }

    #[test]
    fn test_subpath_import() {
        let specs = extract_specifiers("import { util } from '#internal/util';");
        assert_eq!(requests(&specs), vec!["#internal/util"]);
    }

    #[test]
    fn test_import_types_in_annotations() {
        let specs = extract_specifiers(
            "export declare const a: import('./a').A;\n\
             export declare function f(x: import('./b').B): Promise<import('lodash').X>;\n\
             export type T = { key: typeof import('./c') } | [import('./d').D];\n\
             export interface I extends Base<import('./e').E> {\n\
               method<K extends import('./f').F>(): void;\n\
             }\n\
             declare class C {\n\
               prop: import('./g').G;\n\
             }\n\
             export {};",
        );
        assert_eq!(
            requests(&specs),
            vec!["./a", "./b", "lodash", "./c", "./d", "./e", "./f", "./g"]
        );
        assert!(specs.iter().all(|s| s.kind == SpecKind::ImportType));
    }

    #[test]
    fn test_import_equals_require() {
        let specs = extract_specifiers("import fs = require('./req');\nexport = fs;");
        assert_eq!(
            specs,
            vec![Specifier { request: "./req".into(), kind: SpecKind::ImportEquals }]
        );
    }

    #[test]
    fn test_import_types_inside_namespace() {
        let specs = extract_specifiers(
            "export declare namespace NS {\n  const value: import('./inner').V;\n}",
        );
        assert_eq!(requests(&specs), vec!["./inner"]);
    }

    #[test]
    fn test_mixed_forms_in_source_order() {
        let specs = extract_specifiers(
            "import { A } from './a';\nexport declare const b: import('./b').B;\nexport * from './c';",
        );
        let kinds: Vec<SpecKind> = specs.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SpecKind::Import, SpecKind::ImportType, SpecKind::ReExport]);
    }

    #[test]
    fn test_imports_for_cache() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DashMap::new();
        let file = create_test_file(temp_dir.path(), "index.d.ts", "import { a } from './a';");

        let first = imports_for(&file, &cache).unwrap();
        let second = imports_for(&file, &cache).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_imports_for_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DashMap::new();
        let result = imports_for(&temp_dir.path().join("missing.d.ts"), &cache);
        assert!(result.is_err());
    }
}

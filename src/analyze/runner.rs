//! Scan orchestration across files.
//!
//! Per-file analysis is embarrassingly parallel: configuration is
//! shared read-only, every other piece of state is file-local, and a
//! failing file is converted into an `AnalysisError` without aborting
//! the batch.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use log::warn;
use rayon::prelude::*;

use crate::analysis::{AnalyzerRegistry, Declaration, FileFacts, LanguageAnalyzer, Span};
use crate::config::CddConfig;
use crate::icp::{resolve_limit, resolve_weights, ScanContext};

use super::builder::build_class;
use super::types::{AnalysisError, AnalysisResult, Severity};

/// Executes the analysis pipeline over a set of files.
pub struct Runner<'a> {
    base_dir: PathBuf,
    config: CddConfig,
    registry: &'a AnalyzerRegistry,
}

impl<'a> Runner<'a> {
    pub fn new(
        base_dir: impl AsRef<Path>,
        config: CddConfig,
        registry: &'a AnalyzerRegistry,
    ) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            config,
            registry,
        }
    }

    /// The configuration in effect, auto-detected packages included
    /// once `run` has executed.
    pub fn config(&self) -> &CddConfig {
        &self.config
    }

    /// Analyze all files and return one result per file, sorted by
    /// path for deterministic output.
    pub fn run(&mut self, files: &[PathBuf]) -> Vec<AnalysisResult> {
        if self.config.internal_coupling.auto_detect {
            let detected = self.collect_declared_packages(files);
            let packages = &mut self.config.internal_coupling.packages;
            for package in detected {
                if !packages.contains(&package) {
                    packages.push(package);
                }
            }
        }

        let progress = ProgressBar::new(files.len() as u64);
        let mut results: Vec<AnalysisResult> = files
            .par_iter()
            .map(|path| {
                let result = self.analyze_file(path);
                progress.inc(1);
                result
            })
            .collect();
        progress.finish_and_clear();

        results.sort_by(|a, b| a.path.cmp(&b.path));
        results
    }

    /// Pre-pass for `internal_coupling.auto_detect`: every package
    /// declared in the analyzed tree is treated as internal.
    fn collect_declared_packages(&self, files: &[PathBuf]) -> Vec<String> {
        let packages: BTreeSet<String> = files
            .par_iter()
            .filter_map(|path| {
                let analyzer = self.registry.for_path(path)?;
                let source = fs::read(path).ok()?;
                let parsed = analyzer.parse(path, &source).ok()?;
                let facts = analyzer.extract_facts(&parsed).ok()?;
                facts.package
            })
            .collect();
        packages.into_iter().collect()
    }

    fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.base_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }

    /// Analyze a single file. Failures yield a result with zero
    /// classes and one error.
    pub fn analyze_file(&self, path: &Path) -> AnalysisResult {
        let rel_path = self.relative_path(path);

        let analyzer = match self.registry.for_path(path) {
            Some(analyzer) => analyzer,
            None => return AnalysisResult::empty(rel_path),
        };

        let source = match fs::read(path) {
            Ok(source) => source,
            Err(err) => {
                warn!("failed to read {}: {}", path.display(), err);
                return AnalysisResult::from_error(rel_path, format!("failed to read file: {err}"));
            }
        };

        let parsed = match analyzer.parse(path, &source) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("failed to parse {}: {}", path.display(), err);
                return AnalysisResult::from_error(rel_path, err.to_string());
            }
        };

        let mut facts = match analyzer.extract_facts(&parsed) {
            Ok(facts) => facts,
            Err(err) => {
                warn!("failed to analyze {}: {}", path.display(), err);
                return AnalysisResult::from_error(rel_path, err.to_string());
            }
        };
        facts.path = rel_path.clone();

        let mut errors = Vec::new();
        if facts.has_parse_errors {
            errors.push(AnalysisError {
                file: rel_path.clone(),
                message: "source contains syntax errors; analysis may be incomplete".to_string(),
                severity: Severity::Warning,
            });
        }

        let classes = self.build_classes(path, analyzer, &parsed, &facts);
        let total_icp = classes.iter().map(|c| c.total_icp).sum();

        AnalysisResult {
            path: rel_path,
            classes,
            total_icp,
            errors,
        }
    }

    fn build_classes(
        &self,
        path: &Path,
        analyzer: &dyn LanguageAnalyzer,
        parsed: &crate::analysis::ParsedFile,
        facts: &FileFacts,
    ) -> Vec<super::types::ClassAnalysis> {
        let language = analyzer.language_id();
        let weights = resolve_weights(&self.config, path, language);
        let icp_limit = resolve_limit(&self.config, path, language);
        let ctx = ScanContext {
            weights: &weights,
            coupling: &self.config.internal_coupling,
        };
        let syntax = analyzer.comment_syntax();
        let method_sloc_limit = self.config.sloc.method_limit;
        let source_str = parsed.source_str();
        let package = facts.package.as_deref();

        let types: Vec<&Declaration> = facts.types().collect();
        let callables: Vec<&Declaration> = facts.callables().collect();

        let mut classes = Vec::new();
        for decl in &types {
            let members = member_callables(decl, &types, &callables);
            let instances = analyzer.scan_type(parsed, facts, Some(decl), &ctx);
            classes.push(build_class(
                &decl.name,
                package,
                &decl.span,
                &members,
                instances,
                source_str,
                syntax,
                icp_limit,
                method_sloc_limit,
            ));
        }

        // callables outside every type are attributed to a synthetic
        // per-file class, so their ICP is not dropped
        let top_level: Vec<&Declaration> = callables
            .iter()
            .copied()
            .filter(|c| !types.iter().any(|t| t.span.contains(&c.span)))
            .filter(|c| {
                !callables
                    .iter()
                    .any(|k| k.span != c.span && k.span.contains(&c.span))
            })
            .collect();
        if !top_level.is_empty() {
            if let Some(name) = analyzer.synthetic_type_name(path) {
                let instances = analyzer.scan_type(parsed, facts, None, &ctx);
                let span = envelope(&top_level);
                classes.push(build_class(
                    &name,
                    package,
                    &span,
                    &top_level,
                    instances,
                    source_str,
                    syntax,
                    icp_limit,
                    method_sloc_limit,
                ));
            }
        }

        classes
    }
}

/// A type's own callables: contained in its span, not in a nested
/// type's span, and not nested inside another callable (local
/// functions attribute to their enclosing method).
fn member_callables<'d>(
    type_decl: &Declaration,
    types: &[&'d Declaration],
    callables: &[&'d Declaration],
) -> Vec<&'d Declaration> {
    callables
        .iter()
        .copied()
        .filter(|c| type_decl.span.contains(&c.span) && c.span != type_decl.span)
        .filter(|c| {
            !types.iter().any(|t| {
                t.span != type_decl.span
                    && type_decl.span.contains(&t.span)
                    && t.span.contains(&c.span)
            })
        })
        .filter(|c| {
            !callables.iter().any(|k| {
                k.span != c.span && k.span.contains(&c.span) && type_decl.span.contains(&k.span)
            })
        })
        .collect()
}

/// Smallest span covering all of `declarations`.
fn envelope(declarations: &[&Declaration]) -> Span {
    let mut span = declarations[0].span.clone();
    for decl in &declarations[1..] {
        if decl.span.start_byte < span.start_byte {
            span.start_byte = decl.span.start_byte;
            span.start_line = decl.span.start_line;
            span.start_col = decl.span.start_col;
        }
        if decl.span.end_byte > span.end_byte {
            span.end_byte = decl.span.end_byte;
            span.end_line = decl.span.end_line;
            span.end_col = decl.span.end_col;
        }
    }
    span
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn run_over(dir: &TempDir, files: Vec<PathBuf>) -> Vec<AnalysisResult> {
        let registry = AnalyzerRegistry::new();
        let mut runner = Runner::new(dir.path(), CddConfig::default(), &registry);
        runner.run(&files)
    }

    #[test]
    fn test_analyzes_java_and_kotlin_together() {
        let dir = TempDir::new().unwrap();
        let java = write(
            &dir,
            "Simple.java",
            "public class Simple {\n    int f(int x) {\n        if (x > 0) { return 1; }\n        return 0;\n    }\n}\n",
        );
        let kotlin = write(
            &dir,
            "simple.kt",
            "class Simple {\n    fun f(x: Int): Int {\n        if (x > 0) { return 1 }\n        return 0\n    }\n}\n",
        );

        let results = run_over(&dir, vec![java, kotlin]);
        assert_eq!(results.len(), 2);
        // sorted by path
        assert_eq!(results[0].path, "Simple.java");
        assert_eq!(results[1].path, "simple.kt");
        for result in &results {
            assert_eq!(result.classes.len(), 1);
            // if + condition
            assert_eq!(result.total_icp, 2.0);
            let class = &result.classes[0];
            assert_eq!(class.methods.len(), 1);
            assert_eq!(class.methods[0].total_icp, 2.0);
        }
    }

    #[test]
    fn test_auto_detect_marks_declared_packages_internal() {
        let dir = TempDir::new().unwrap();
        let service = write(
            &dir,
            "Service.java",
            "package com.acme.app;\n\nimport com.acme.data.Store;\n\npublic class Service {\n    Store store = new Store();\n}\n",
        );
        let store = write(
            &dir,
            "Store.java",
            "package com.acme.data;\n\npublic class Store {\n}\n",
        );

        let results = run_over(&dir, vec![service, store]);
        let service_result = results.iter().find(|r| r.path == "Service.java").unwrap();
        let class = &service_result.classes[0];
        assert_eq!(
            class.instance_count(crate::icp::IcpType::InternalCoupling),
            1
        );
        assert_eq!(
            class.instance_count(crate::icp::IcpType::ExternalCoupling),
            0
        );
    }

    #[test]
    fn test_kotlin_top_level_functions_get_synthetic_class() {
        let dir = TempDir::new().unwrap();
        let util = write(
            &dir,
            "math_utils.kt",
            "fun clamp(x: Int): Int {\n    if (x > 100) { return 100 }\n    return x\n}\n",
        );

        let results = run_over(&dir, vec![util]);
        assert_eq!(results[0].classes.len(), 1);
        let class = &results[0].classes[0];
        assert_eq!(class.name, "Math_utilsKt");
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.methods[0].name, "clamp");
        assert_eq!(class.methods[0].total_icp, 2.0);
    }

    #[test]
    fn test_syntax_errors_are_isolated() {
        let dir = TempDir::new().unwrap();
        let broken = write(&dir, "Broken.java", "public class {{{{ nope\n");
        let fine = write(
            &dir,
            "Fine.java",
            "public class Fine {\n    void ok() {}\n}\n",
        );

        let results = run_over(&dir, vec![broken, fine]);
        assert_eq!(results.len(), 2);
        let broken_result = results.iter().find(|r| r.path == "Broken.java").unwrap();
        assert!(!broken_result.errors.is_empty());
        let fine_result = results.iter().find(|r| r.path == "Fine.java").unwrap();
        assert!(fine_result.errors.is_empty());
        assert_eq!(fine_result.classes.len(), 1);
    }

    #[test]
    fn test_nested_types_produce_separate_classes() {
        let dir = TempDir::new().unwrap();
        let file = write(
            &dir,
            "Outer.java",
            r#"
public class Outer {
    void a() {
        if (x > 0) { y(); }
    }

    static class Inner {
        void b() {
            while (true) { z(); }
        }
    }
}
"#,
        );

        let results = run_over(&dir, vec![file]);
        let classes = &results[0].classes;
        assert_eq!(classes.len(), 2);

        let outer = classes.iter().find(|c| c.name == "Outer").unwrap();
        let inner = classes.iter().find(|c| c.name == "Inner").unwrap();
        // Outer's method list does not absorb Inner's methods
        assert_eq!(outer.methods.len(), 1);
        assert_eq!(outer.methods[0].name, "a");
        assert_eq!(inner.methods.len(), 1);
        assert_eq!(inner.methods[0].name, "b");
        // and Outer's ICP does not include Inner's loop
        assert_eq!(outer.total_icp, 2.0);
        assert_eq!(inner.total_icp, 2.0);
    }

    #[test]
    fn test_method_over_sloc_limit() {
        let dir = TempDir::new().unwrap();
        let mut body = String::from("public class Long {\n    void big() {\n");
        for i in 0..40 {
            body.push_str(&format!("        int v{} = {};\n", i, i));
        }
        body.push_str("    }\n}\n");
        let file = write(&dir, "Long.java", &body);

        let results = run_over(&dir, vec![file]);
        let class = &results[0].classes[0];
        assert!(class.methods[0].is_over_sloc_limit);
        assert!(class.methods[0].sloc.code_only > 30);
    }
}

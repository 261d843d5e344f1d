//! Kotlin facade using tree-sitter.
//!
//! On top of the constructs shared with Java, Kotlin contributes
//! `when` as the multi-way branch and two null-safety operators (elvis
//! and safe-call), each scored as a branch plus a condition. Top-level
//! callables are attributed to a synthetic `<FileStem>Kt` type,
//! mirroring the JVM facade class name.

use std::path::Path;

use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::analysis::{
    Declaration, DeclarationKind, FileFacts, Import, LanguageAnalyzer, ParsedFile, Span,
};
use crate::icp::{Coupling, CouplingResolver, IcpInstance, IcpType, ResolvedWeights, ScanContext};

const DECLARATION_QUERY: &str = r#"
; Class and interface declarations
(class_declaration
  (type_identifier) @type_name
) @type

; Object declarations
(object_declaration
  (type_identifier) @object_name
) @object

; Function declarations
(function_declaration
  (simple_identifier) @function_name
) @function
"#;

/// Tree-sitter query for the package header.
const PACKAGE_QUERY: &str = r#"
(package_header
  (identifier) @package_name
)
"#;

/// Tree-sitter query for imports. The header text is parsed
/// afterwards; that covers wildcard and aliased forms uniformly.
const IMPORT_QUERY: &str = r#"
(import_header) @import
"#;

pub struct KotlinAnalyzer {
    language: Language,
}

impl KotlinAnalyzer {
    pub fn new() -> Self {
        // `tree-sitter-kotlin` binds its `language()` against a newer
        // tree-sitter runtime than the one this crate uses elsewhere.
        // Both expose `Language` as a single `*const TSLanguage` FFI
        // pointer with an identical ABI, so bridge the grammar pointer
        // into our runtime's `Language` type. Purely version plumbing;
        // the underlying grammar is unchanged.
        let language: Language =
            unsafe { std::mem::transmute(tree_sitter_kotlin::language()) };
        Self { language }
    }

    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(self.language)?;
        Ok(parser)
    }

    fn extract_declarations(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<Declaration>> {
        let query = Query::new(self.language, DECLARATION_QUERY)?;
        let mut cursor = QueryCursor::new();
        let matches = cursor.matches(&query, parsed.tree.root_node(), parsed.source.as_slice());

        let mut declarations = Vec::new();
        let mut seen_positions = std::collections::HashSet::new();

        for m in matches {
            let mut name = String::new();
            let mut kind = DeclarationKind::Class;
            let mut decl_node = None;

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize].as_str();
                match capture_name {
                    "type_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Class;
                    }
                    "object_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Object;
                    }
                    "function_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Function;
                    }
                    "type" | "object" | "function" => {
                        decl_node = Some(capture.node);
                    }
                    _ => {}
                }
            }

            if name.is_empty() {
                continue;
            }
            if let Some(node) = decl_node {
                let pos_key = (node.start_byte(), name.clone());
                if !seen_positions.insert(pos_key) {
                    continue;
                }
                if kind == DeclarationKind::Class && declares_interface(node) {
                    kind = DeclarationKind::Interface;
                }
                declarations.push(Declaration {
                    name,
                    kind,
                    span: Span::from_node(node),
                });
            }
        }

        declarations.sort_by_key(|d| (d.span.start_byte, d.name.clone()));
        Ok(declarations)
    }

    fn extract_package(&self, parsed: &ParsedFile) -> Option<String> {
        let query = Query::new(self.language, PACKAGE_QUERY).ok()?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), parsed.source.as_slice());

        matches.next().and_then(|m| {
            m.captures
                .first()
                .map(|capture| parsed.node_text(capture.node).to_string())
        })
    }

    fn extract_imports(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<Import>> {
        let query = Query::new(self.language, IMPORT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let matches = cursor.matches(&query, parsed.tree.root_node(), parsed.source.as_slice());

        let mut imports = Vec::new();
        let mut seen_paths = std::collections::HashSet::new();

        for m in matches {
            for capture in m.captures {
                let node = capture.node;
                if let Some(import) = parse_import_text(parsed.node_text(node), node) {
                    if seen_paths.insert(import.path.clone()) {
                        imports.push(import);
                    }
                }
            }
        }

        imports.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(imports)
    }
}

/// Whether a class declaration node uses the `interface` keyword.
fn declares_interface(node: Node) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == "interface");
    found
}

/// Parse `import a.b.C[.*][ as D]` into its path and wildcard flag.
fn parse_import_text(text: &str, node: Node) -> Option<Import> {
    let rest = text.trim().strip_prefix("import")?.trim();
    let rest = match rest.split_once(" as ") {
        Some((path, _alias)) => path.trim_end(),
        None => rest,
    };
    let rest = rest.trim_end_matches(';').trim_end();
    if rest.is_empty() {
        return None;
    }
    let (path, wildcard) = match rest.strip_suffix(".*") {
        Some(base) => (base, true),
        None => (rest, false),
    };
    Some(Import {
        path: path.to_string(),
        wildcard,
        span: Span::from_node(node),
    })
}

/// Synthetic class name for a file's top-level declarations, the way
/// the JVM facade names it: `string_utils.kt` -> `String_utilsKt`.
fn file_class_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("File");
    let mut chars = stem.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::from("File"),
    };
    format!("{}Kt", capitalized)
}

impl Default for KotlinAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for KotlinAnalyzer {
    fn language_id(&self) -> &'static str {
        "kotlin"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["kt", "kts"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse Kotlin source: {}", path.display()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<FileFacts> {
        let package = self.extract_package(parsed);
        let declarations = self.extract_declarations(parsed)?;
        let imports = self.extract_imports(parsed)?;

        Ok(FileFacts {
            path: parsed.path.clone(),
            language: self.language_id().to_string(),
            package,
            declarations,
            imports,
            has_parse_errors: parsed.tree.root_node().has_error(),
        })
    }

    fn scan_type(
        &self,
        parsed: &ParsedFile,
        facts: &FileFacts,
        type_decl: Option<&Declaration>,
        ctx: &ScanContext<'_>,
    ) -> Vec<IcpInstance> {
        let root = parsed.tree.root_node();
        let start = type_decl
            .and_then(|decl| super::node_for_span(root, &decl.span))
            .unwrap_or(root);
        let class_name = match type_decl {
            Some(decl) => decl.name.clone(),
            None => file_class_name(Path::new(&parsed.path)),
        };

        let mut scan = KotlinScan {
            parsed,
            weights: ctx.weights,
            resolver: CouplingResolver::new(ctx.coupling, facts, &class_name),
            instances: Vec::new(),
        };
        scan.walk(start, start);
        scan.instances
    }

    fn synthetic_type_name(&self, path: &Path) -> Option<String> {
        Some(file_class_name(path))
    }
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(kind, "class_declaration" | "object_declaration")
}

/// One ICP walk over a class subtree or the file's top level.
struct KotlinScan<'a> {
    parsed: &'a ParsedFile,
    weights: &'a ResolvedWeights,
    resolver: CouplingResolver<'a>,
    instances: Vec<IcpInstance>,
}

impl<'a> KotlinScan<'a> {
    fn walk(&mut self, node: Node<'a>, scan_root: Node<'a>) {
        // nested types are scanned by their own pass
        if node.id() != scan_root.id() && is_type_declaration(node.kind()) {
            return;
        }
        self.visit(node);
        let mut cursor = node.walk();
        let children: Vec<Node<'a>> = node.children(&mut cursor).collect();
        for child in children {
            self.walk(child, scan_root);
        }
    }

    fn visit(&mut self, node: Node<'a>) {
        let parsed = self.parsed;
        match node.kind() {
            "if_expression" => {
                self.emit(IcpType::CodeBranch, node, "if expression");
                if let Some(condition) = condition_of(node) {
                    self.emit_condition(condition, "if condition");
                }
                if let Some(alternative) = else_body(node) {
                    // an else-if chain counts through the chained if
                    if !self.is_chained_if(alternative) {
                        self.emit(IcpType::CodeBranch, alternative, "else branch");
                    }
                }
            }
            "when_expression" => {
                self.emit(IcpType::CodeBranch, node, "when expression");
                let mut cursor = node.walk();
                let children: Vec<Node<'a>> = node.children(&mut cursor).collect();
                for child in children {
                    match child.kind() {
                        "when_subject" => self.emit_condition(child, "when subject"),
                        "when_entry" => {
                            if when_entry_has_test(child) {
                                self.emit(IcpType::CodeBranch, child, "when arm");
                            } else {
                                self.emit(IcpType::CodeBranch, child, "else arm");
                            }
                        }
                        _ => {}
                    }
                }
            }
            "for_statement" => {
                // Kotlin's for is always for-each: no boolean test
                self.emit(IcpType::CodeBranch, node, "for loop");
            }
            "while_statement" => {
                self.emit(IcpType::CodeBranch, node, "while loop");
                if let Some(condition) = condition_of(node) {
                    self.emit_condition(condition, "while condition");
                }
            }
            "do_while_statement" => {
                self.emit(IcpType::CodeBranch, node, "do-while loop");
                if let Some(condition) = last_expression_child(node) {
                    self.emit_condition(condition, "do-while condition");
                }
            }
            "elvis_expression" => {
                self.emit(IcpType::CodeBranch, node, "elvis operator");
                self.emit(IcpType::Condition, node, "elvis null test");
            }
            "navigation_suffix" => {
                if parsed.node_text(node).starts_with("?.") {
                    self.emit(IcpType::CodeBranch, node, "safe call");
                    self.emit(IcpType::Condition, node, "safe-call null test");
                }
            }
            "try_expression" => {
                self.emit(IcpType::ExceptionHandling, node, "try block");
            }
            "catch_block" => {
                self.emit(IcpType::ExceptionHandling, node, "catch clause");
            }
            "finally_block" => {
                self.emit(IcpType::ExceptionHandling, node, "finally block");
            }
            "type_identifier" => {
                let name = parsed.node_text(node).to_string();
                self.candidate(node, &name);
            }
            "call_expression" | "navigation_expression" => {
                // a capitalized callee or receiver names a type
                if let Some(target) = node.child(0) {
                    if target.kind() == "simple_identifier" {
                        let name = parsed.node_text(target).to_string();
                        if name.chars().next().map(char::is_uppercase).unwrap_or(false) {
                            self.candidate(target, &name);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn is_chained_if(&self, body: Node<'a>) -> bool {
        if body.kind() == "if_expression" {
            return true;
        }
        // an unbraced `else if` arrives wrapped in a control structure body
        if body.kind() == "control_structure_body"
            && !self.parsed.node_text(body).trim_start().starts_with('{')
        {
            let mut cursor = body.walk();
            let named: Vec<Node<'a>> = body.named_children(&mut cursor).collect();
            return named.len() == 1 && named[0].kind() == "if_expression";
        }
        false
    }

    /// Emit the CONDITION for a test expression, plus one CONDITION per
    /// logical operator found in a secondary walk of its subtree.
    fn emit_condition(&mut self, condition: Node<'a>, description: &str) {
        self.emit(IcpType::Condition, condition, description);
        self.count_logical_operators(condition);
    }

    fn count_logical_operators(&mut self, node: Node<'a>) {
        match node.kind() {
            "conjunction_expression" => {
                self.emit(IcpType::Condition, node, "logical && operator");
            }
            "disjunction_expression" => {
                self.emit(IcpType::Condition, node, "logical || operator");
            }
            _ => {}
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'a>> = node.children(&mut cursor).collect();
        for child in children {
            self.count_logical_operators(child);
        }
    }

    fn candidate(&mut self, node: Node<'a>, name: &str) {
        match self.resolver.resolve(name) {
            Some(Coupling::Internal) => self.emit_owned(
                IcpType::InternalCoupling,
                node,
                format!("reference to project type `{}`", name),
            ),
            Some(Coupling::External) => self.emit_owned(
                IcpType::ExternalCoupling,
                node,
                format!("reference to external type `{}`", name),
            ),
            None => {}
        }
    }

    fn emit(&mut self, icp_type: IcpType, node: Node<'a>, description: &str) {
        self.emit_owned(icp_type, node, description.to_string());
    }

    fn emit_owned(&mut self, icp_type: IcpType, node: Node<'a>, description: String) {
        let position = node.start_position();
        self.instances.push(IcpInstance::new(
            icp_type,
            position.row + 1,
            position.column + 1,
            description,
            self.weights.weight_of(icp_type),
        ));
    }
}

/// The controlling expression of an `if`/`while`: the condition field
/// when the grammar names it, otherwise the first non-body named child.
fn condition_of(node: Node) -> Option<Node> {
    if let Some(condition) = node.child_by_field_name("condition") {
        return Some(condition);
    }
    let mut cursor = node.walk();
    let named: Vec<Node> = node.named_children(&mut cursor).collect();
    named
        .into_iter()
        .find(|c| !matches!(c.kind(), "control_structure_body" | "if_expression"))
}

/// The trailing test of a do-while.
fn last_expression_child(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let named: Vec<Node> = node.named_children(&mut cursor).collect();
    named
        .into_iter()
        .rev()
        .find(|c| c.kind() != "control_structure_body")
}

fn else_body(node: Node) -> Option<Node> {
    if let Some(alternative) = node.child_by_field_name("alternative") {
        return Some(alternative);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    let mut saw_else = false;
    for child in children {
        if saw_else && child.is_named() {
            return Some(child);
        }
        if child.kind() == "else" {
            saw_else = true;
        }
    }
    None
}

/// Whether a when entry carries a test (as opposed to `else ->`).
fn when_entry_has_test(entry: Node) -> bool {
    let mut cursor = entry.walk();
    let found = entry
        .named_children(&mut cursor)
        .any(|c| c.kind() == "when_condition");
    found
}

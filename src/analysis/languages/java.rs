//! Java facade using tree-sitter.

use std::path::Path;

use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::analysis::{
    Declaration, DeclarationKind, FileFacts, Import, LanguageAnalyzer, ParsedFile, Span,
};
use crate::icp::{Coupling, CouplingResolver, IcpInstance, IcpType, ResolvedWeights, ScanContext};

const DECLARATION_QUERY: &str = r#"
; Method declarations
(method_declaration
  name: (identifier) @method_name
) @method

; Constructor declarations
(constructor_declaration
  name: (identifier) @constructor_name
) @constructor

; Class declarations
(class_declaration
  name: (identifier) @class_name
) @class

; Interface declarations
(interface_declaration
  name: (identifier) @interface_name
) @interface

; Enum declarations
(enum_declaration
  name: (identifier) @enum_name
) @enum
"#;

/// Tree-sitter query for package declaration. The package name is a
/// bare identifier for single-segment packages.
const PACKAGE_QUERY: &str = r#"
(package_declaration
  (scoped_identifier) @package_name
)
(package_declaration
  (identifier) @package_name
)
"#;

/// Tree-sitter query for imports. The declaration text is parsed
/// afterwards; that covers static and wildcard forms uniformly.
const IMPORT_QUERY: &str = r#"
(import_declaration) @import
"#;

pub struct JavaAnalyzer {
    language: Language,
}

impl JavaAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_java::language(),
        }
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
                    "method_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Method;
                    }
                    "constructor_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Constructor;
                    }
                    "class_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Class;
                    }
                    "interface_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Interface;
                    }
                    "enum_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Enum;
                    }
                    "method" | "constructor" | "class" | "interface" | "enum" => {
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

/// Parse `import [static] a.b.C[.*];` into its path and wildcard flag.
fn parse_import_text(text: &str, node: Node) -> Option<Import> {
    let mut rest = text.trim().strip_prefix("import")?.trim_start();
    if let Some(after_static) = rest.strip_prefix("static ") {
        rest = after_static.trim_start();
    }
    let rest = rest.trim_end().trim_end_matches(';').trim_end();
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

impl Default for JavaAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for JavaAnalyzer {
    fn language_id(&self) -> &'static str {
        "java"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse Java source: {}", path.display()))?;

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
        let class_name = type_decl.map(|d| d.name.as_str()).unwrap_or("");

        let mut scan = JavaScan {
            parsed,
            weights: ctx.weights,
            resolver: CouplingResolver::new(ctx.coupling, facts, class_name),
            instances: Vec::new(),
        };
        scan.walk(start, start);
        scan.instances
    }
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "annotation_type_declaration"
    )
}

/// One ICP walk over a class subtree.
struct JavaScan<'a> {
    parsed: &'a ParsedFile,
    weights: &'a ResolvedWeights,
    resolver: CouplingResolver<'a>,
    instances: Vec<IcpInstance>,
}

impl<'a> JavaScan<'a> {
    fn walk(&mut self, node: Node<'a>, scan_root: Node<'a>) {
        // nested types are scanned by their own pass
        if node.id() != scan_root.id() && is_type_declaration(node.kind()) {
            return;
        }
        self.visit(node);
        // a qualified name counts as one reference, not one per segment
        if node.kind() == "scoped_type_identifier" {
            return;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'a>> = node.children(&mut cursor).collect();
        for child in children {
            self.walk(child, scan_root);
        }
    }

    fn visit(&mut self, node: Node<'a>) {
        let parsed = self.parsed;
        match node.kind() {
            "if_statement" => {
                self.emit(IcpType::CodeBranch, node, "if statement");
                if let Some(condition) = node.child_by_field_name("condition") {
                    self.emit_condition(condition, "if condition");
                }
                if let Some(alternative) = node.child_by_field_name("alternative") {
                    // an else-if chain counts through the chained if
                    if alternative.kind() != "if_statement" {
                        self.emit(IcpType::CodeBranch, alternative, "else branch");
                    }
                }
            }
            "switch_expression" => {
                self.emit(IcpType::CodeBranch, node, "switch statement");
                if let Some(condition) = node.child_by_field_name("condition") {
                    self.emit_condition(condition, "switch subject");
                }
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    let arms: Vec<Node<'a>> = body.children(&mut cursor).collect();
                    for arm in arms {
                        if !matches!(arm.kind(), "switch_block_statement_group" | "switch_rule") {
                            continue;
                        }
                        if self.arm_is_default(arm) {
                            self.emit(IcpType::CodeBranch, arm, "default arm");
                        } else {
                            self.emit(IcpType::CodeBranch, arm, "case arm");
                        }
                    }
                }
            }
            "for_statement" => {
                self.emit(IcpType::CodeBranch, node, "for loop");
                if let Some(condition) = node.child_by_field_name("condition") {
                    self.emit_condition(condition, "for condition");
                }
            }
            "enhanced_for_statement" => {
                // for-each has no boolean test
                self.emit(IcpType::CodeBranch, node, "for-each loop");
            }
            "while_statement" => {
                self.emit(IcpType::CodeBranch, node, "while loop");
                if let Some(condition) = node.child_by_field_name("condition") {
                    self.emit_condition(condition, "while condition");
                }
            }
            "do_statement" => {
                self.emit(IcpType::CodeBranch, node, "do-while loop");
                if let Some(condition) = node.child_by_field_name("condition") {
                    self.emit_condition(condition, "do-while condition");
                }
            }
            "ternary_expression" => {
                self.emit(IcpType::CodeBranch, node, "ternary operator");
                if let Some(condition) = node.child_by_field_name("condition") {
                    self.emit_condition(condition, "ternary condition");
                }
            }
            "try_statement" | "try_with_resources_statement" => {
                self.emit(IcpType::ExceptionHandling, node, "try block");
            }
            "catch_clause" => {
                self.emit(IcpType::ExceptionHandling, node, "catch clause");
            }
            "finally_clause" => {
                self.emit(IcpType::ExceptionHandling, node, "finally block");
            }
            "type_identifier" | "scoped_type_identifier" => {
                let name = parsed.node_text(node).to_string();
                self.candidate(node, &name);
            }
            "method_invocation" => {
                // a capitalized receiver is a static call on a type
                if let Some(object) = node.child_by_field_name("object") {
                    if object.kind() == "identifier" {
                        let name = parsed.node_text(object).to_string();
                        if name.chars().next().map(char::is_uppercase).unwrap_or(false) {
                            self.candidate(object, &name);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn arm_is_default(&self, arm: Node<'a>) -> bool {
        let parsed = self.parsed;
        let mut cursor = arm.walk();
        let is_default = arm
            .children(&mut cursor)
            .filter(|c| c.kind() == "switch_label")
            .any(|label| parsed.node_text(label).trim_start().starts_with("default"));
        is_default
    }

    /// Emit the CONDITION for a test expression, plus one CONDITION per
    /// logical operator found in a secondary walk of its subtree.
    fn emit_condition(&mut self, condition: Node<'a>, description: &str) {
        self.emit(IcpType::Condition, condition, description);
        self.count_logical_operators(condition);
    }

    fn count_logical_operators(&mut self, node: Node<'a>) {
        if node.kind() == "binary_expression" {
            if let Some(operator) = node.child_by_field_name("operator") {
                let op = self.parsed.node_text(operator).to_string();
                if op == "&&" || op == "||" {
                    self.emit_owned(
                        IcpType::Condition,
                        operator,
                        format!("logical {} operator", op),
                    );
                }
            }
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

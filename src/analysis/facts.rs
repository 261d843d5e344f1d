//! Fact structures extracted from the syntax facade.

use std::fmt;

/// Source location span with byte offsets and line/column positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// Start column (1-indexed).
    pub start_col: usize,
    /// End line (1-indexed).
    pub end_line: usize,
    /// End column (1-indexed).
    pub end_col: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: start.row + 1, // tree-sitter is 0-indexed
            start_col: start.column + 1,
            end_line: end.row + 1,
            end_col: end.column + 1,
        }
    }

    /// Whether `other` lies within this span (byte offsets, inclusive).
    pub fn contains(&self, other: &Span) -> bool {
        self.start_byte <= other.start_byte && other.end_byte <= self.end_byte
    }

    /// Whether a 1-based line number falls inside the span.
    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    /// Number of lines covered.
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// Kind of declaration reported by a facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Class,
    Interface,
    Enum,
    Object,
    Method,
    Constructor,
    Function,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Class => "class",
            DeclarationKind::Interface => "interface",
            DeclarationKind::Enum => "enum",
            DeclarationKind::Object => "object",
            DeclarationKind::Method => "method",
            DeclarationKind::Constructor => "constructor",
            DeclarationKind::Function => "function",
        }
    }

    /// Whether this declares a type.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            DeclarationKind::Class
                | DeclarationKind::Interface
                | DeclarationKind::Enum
                | DeclarationKind::Object
        )
    }

    /// Whether this declares a callable.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            DeclarationKind::Method | DeclarationKind::Constructor | DeclarationKind::Function
        )
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declaration extracted from source code.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// Span of the entire declaration, signature included.
    pub span: Span,
}

/// An import declaration.
#[derive(Debug, Clone)]
pub struct Import {
    /// The imported path, without a trailing `.*`.
    pub path: String,
    /// Whether this is a wildcard (on-demand) import.
    pub wildcard: bool,
    pub span: Span,
}

/// All facts extracted from a single file.
#[derive(Debug, Clone)]
pub struct FileFacts {
    /// File path, relative to the analysis root once the runner has
    /// seen it.
    pub path: String,
    /// Language identifier (lower-cased).
    pub language: String,
    /// Package/namespace declared by the file.
    pub package: Option<String>,
    /// All declarations, ordered by source position.
    pub declarations: Vec<Declaration>,
    /// All imports in the file.
    pub imports: Vec<Import>,
    /// Whether the parse tree contains error nodes.
    pub has_parse_errors: bool,
}

impl FileFacts {
    pub fn empty(path: &str, language: &str) -> Self {
        Self {
            path: path.to_string(),
            language: language.to_string(),
            package: None,
            declarations: Vec::new(),
            imports: Vec::new(),
            has_parse_errors: false,
        }
    }

    /// Declared types, in source order.
    pub fn types(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(|d| d.kind.is_type())
    }

    /// Declared callables, in source order.
    pub fn callables(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(|d| d.kind.is_callable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start_byte: usize, end_byte: usize) -> Span {
        Span {
            start_byte,
            end_byte,
            start_line: 1,
            start_col: 1,
            end_line: 1,
            end_col: 1,
        }
    }

    #[test]
    fn test_span_containment() {
        let outer = span(0, 100);
        let inner = span(10, 50);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.contains(&outer));
    }

    #[test]
    fn test_contains_line() {
        let s = Span {
            start_line: 3,
            end_line: 7,
            ..Span::default()
        };
        assert!(!s.contains_line(2));
        assert!(s.contains_line(3));
        assert!(s.contains_line(7));
        assert!(!s.contains_line(8));
    }

    #[test]
    fn test_kind_predicates() {
        assert!(DeclarationKind::Class.is_type());
        assert!(DeclarationKind::Object.is_type());
        assert!(!DeclarationKind::Method.is_type());
        assert!(DeclarationKind::Method.is_callable());
        assert!(DeclarationKind::Function.is_callable());
        assert!(!DeclarationKind::Enum.is_callable());
    }
}

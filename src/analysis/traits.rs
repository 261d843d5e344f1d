//! Core traits for the language facades.

use std::path::Path;

use crate::icp::{IcpInstance, ScanContext};
use crate::sloc::{CommentSyntax, C_LIKE};

use super::{Declaration, FileFacts};

/// Holds a parsed tree-sitter tree and associated metadata.
///
/// Kept separate from `FileFacts` so the tree can be reused for the
/// ICP walk without re-parsing.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// The file path (for error reporting).
    pub path: String,
}

impl ParsedFile {
    /// Get the source code as a string slice.
    pub fn source_str(&self) -> &str {
        std::str::from_utf8(&self.source).unwrap_or("")
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }
}

/// Language-specific facade trait.
///
/// Each analyzed language implements this trait to provide parsing,
/// fact extraction, and the language's ICP tree walk.
///
/// # Thread Safety
///
/// tree_sitter::Parser is not Sync, so implementations create parsers
/// per call rather than caching them.
pub trait LanguageAnalyzer: Send + Sync {
    /// Returns the language identifier (e.g., "java", "kotlin").
    ///
    /// This doubles as the language key in configuration lookups.
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this analyzer handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Comment markers for the SLOC classifier.
    fn comment_syntax(&self) -> &'static CommentSyntax {
        &C_LIKE
    }

    /// Parse a source file into a tree-sitter tree.
    ///
    /// Returns an error if parsing fails completely. Partial parse
    /// errors are still returned as a valid tree with ERROR nodes.
    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile>;

    /// Extract declarations, imports, and the package from a parsed
    /// file.
    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<FileFacts>;

    /// Run the ICP tree walk over one declared type's subtree.
    ///
    /// With `type_decl = None` the walk covers the file's top-level
    /// code instead, skipping every declared type (used for languages
    /// that allow callables outside any type). Nested type
    /// declarations are always skipped; each type is scanned exactly
    /// once, by its own call.
    fn scan_type(
        &self,
        parsed: &ParsedFile,
        facts: &FileFacts,
        type_decl: Option<&Declaration>,
        ctx: &ScanContext<'_>,
    ) -> Vec<IcpInstance>;

    /// Name of the synthetic type that owns top-level callables, if
    /// the language has them.
    fn synthetic_type_name(&self, _path: &Path) -> Option<String> {
        None
    }

    /// Check if this analyzer handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}

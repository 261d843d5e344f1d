//! Language facade implementations and the analyzer registry.

mod java;
mod kotlin;

pub use java::JavaAnalyzer;
pub use kotlin::KotlinAnalyzer;

use std::path::Path;

use tree_sitter::Node;

use super::{LanguageAnalyzer, Span};

/// Find the node covering exactly `span`, used to re-locate a declared
/// type before scanning its subtree.
pub(crate) fn node_for_span<'tree>(node: Node<'tree>, span: &Span) -> Option<Node<'tree>> {
    if node.start_byte() == span.start_byte && node.end_byte() == span.end_byte {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'tree>> = node.children(&mut cursor).collect();
    for child in children {
        if child.start_byte() <= span.start_byte && span.end_byte <= child.end_byte() {
            if let Some(found) = node_for_span(child, span) {
                return Some(found);
            }
        }
    }
    None
}

/// The closed set of language analyzers, one field per supported
/// language.
///
/// Constructed once at startup and passed by reference into the
/// pipeline; keeping it a plain value (rather than process-wide
/// statics) avoids test-ordering hazards and allows concurrent use.
pub struct AnalyzerRegistry {
    java: JavaAnalyzer,
    kotlin: KotlinAnalyzer,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self {
            java: JavaAnalyzer::new(),
            kotlin: KotlinAnalyzer::new(),
        }
    }

    /// Get the analyzer for a file extension.
    pub fn for_extension(&self, ext: &str) -> Option<&dyn LanguageAnalyzer> {
        match ext {
            "java" => Some(&self.java),
            "kt" | "kts" => Some(&self.kotlin),
            _ => None,
        }
    }

    /// Get the analyzer for a path, by its extension.
    pub fn for_path(&self, path: &Path) -> Option<&dyn LanguageAnalyzer> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        self.for_extension(ext)
    }

    /// All registered analyzers.
    pub fn analyzers(&self) -> [&dyn LanguageAnalyzer; 2] {
        [&self.java, &self.kotlin]
    }

    /// Every file extension with an analyzer.
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        self.analyzers()
            .iter()
            .flat_map(|a| a.file_extensions().iter().copied())
            .collect()
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_by_extension() {
        let registry = AnalyzerRegistry::new();
        assert_eq!(
            registry.for_extension("java").map(|a| a.language_id()),
            Some("java")
        );
        assert_eq!(
            registry.for_extension("kt").map(|a| a.language_id()),
            Some("kotlin")
        );
        assert_eq!(
            registry.for_extension("kts").map(|a| a.language_id()),
            Some("kotlin")
        );
        assert!(registry.for_extension("rb").is_none());
    }

    #[test]
    fn test_dispatch_by_path() {
        let registry = AnalyzerRegistry::new();
        assert!(registry.for_path(Path::new("src/Main.java")).is_some());
        assert!(registry.for_path(Path::new("build.gradle")).is_none());
        assert!(registry.for_path(Path::new("no_extension")).is_none());
    }

    #[test]
    fn test_supported_extensions() {
        let registry = AnalyzerRegistry::new();
        let extensions = registry.supported_extensions();
        assert!(extensions.contains(&"java"));
        assert!(extensions.contains(&"kt"));
    }
}

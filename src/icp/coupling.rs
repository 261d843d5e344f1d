//! Internal/external coupling heuristic.
//!
//! Classifies a referenced name as project-internal or external from
//! names alone: there is no classpath or semantic resolution, so both
//! false positives and false negatives are possible. The rules, in
//! order:
//!
//! 1. the class under analysis never couples to itself;
//! 2. a name qualified under a configured internal package prefix is
//!    internal;
//! 3. an unqualified type-looking name (leading uppercase) is internal
//!    when it is declared in the same file, when the file's own package
//!    is internal, or when an internal wildcard import is in scope -
//!    unless a wildcard import from a non-internal package makes the
//!    origin ambiguous, in which case the reference stays external;
//! 4. everything else is external, except built-in names.
//!
//! Each distinct resolved name is reported once per analyzed class.

use std::collections::HashSet;

use crate::analysis::FileFacts;
use crate::config::InternalCouplingConfig;

/// Names that never count as coupling: primitives, common collections,
/// stock exception types, and ubiquitous utility entry points.
static BUILTIN_NAMES: phf::Set<&'static str> = phf::phf_set! {
    // primitives and boxes
    "String", "Object", "Integer", "Int", "Long", "Short", "Byte",
    "Double", "Float", "Boolean", "Char", "Character", "Void", "Number",
    "Any", "Unit", "Nothing", "CharSequence",
    // collections
    "List", "Set", "Map", "Collection", "Iterable", "Iterator",
    "ArrayList", "LinkedList", "HashMap", "HashSet", "TreeMap", "TreeSet",
    "MutableList", "MutableSet", "MutableMap", "Array", "Pair", "Triple",
    "Optional", "Stream", "Sequence", "IntArray", "LongArray", "ShortArray",
    "ByteArray", "DoubleArray", "FloatArray", "BooleanArray", "CharArray",
    "IntRange", "LongRange", "CharRange",
    // common utilities
    "StringBuilder", "StringBuffer", "Math", "System", "Objects",
    "Arrays", "Collections", "Thread", "Class",
    // throwables
    "Throwable", "Exception", "RuntimeException", "Error",
    "IllegalArgumentException", "IllegalStateException",
    "NullPointerException", "IndexOutOfBoundsException",
    "UnsupportedOperationException", "IOException",
    // annotations
    "Override", "Deprecated", "SuppressWarnings", "FunctionalInterface",
    // top-level calls
    "println", "print", "printf", "require", "requireNotNull", "check",
    "checkNotNull", "error", "TODO", "listOf", "mutableListOf", "mapOf",
    "mutableMapOf", "setOf", "mutableSetOf", "arrayOf", "emptyList",
    "emptyMap", "emptySet", "lazy", "let", "run", "apply", "also", "with",
    "format", "valueOf",
};

/// How a candidate name was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coupling {
    Internal,
    External,
}

/// Per-class coupling resolver.
///
/// Holds the "already seen" set, so each distinct resolved name yields
/// at most one coupling per class; create a fresh resolver for every
/// class scan.
pub struct CouplingResolver<'a> {
    config: &'a InternalCouplingConfig,
    facts: &'a FileFacts,
    class_simple: String,
    class_qualified: String,
    package_is_internal: bool,
    has_internal_wildcard: bool,
    has_external_wildcard: bool,
    seen: HashSet<String>,
}

impl<'a> CouplingResolver<'a> {
    pub fn new(config: &'a InternalCouplingConfig, facts: &'a FileFacts, class_name: &str) -> Self {
        let class_qualified = match &facts.package {
            Some(package) => format!("{}.{}", package, class_name),
            None => class_name.to_string(),
        };
        let package_is_internal = facts
            .package
            .as_deref()
            .map(|package| is_under_prefix(package, &config.packages))
            .unwrap_or(false);
        let mut has_internal_wildcard = false;
        let mut has_external_wildcard = false;
        for import in facts.imports.iter().filter(|i| i.wildcard) {
            if is_under_prefix(&import.path, &config.packages) {
                has_internal_wildcard = true;
            } else {
                has_external_wildcard = true;
            }
        }

        Self {
            config,
            facts,
            class_simple: class_name.to_string(),
            class_qualified,
            package_is_internal,
            has_internal_wildcard,
            has_external_wildcard,
            seen: HashSet::new(),
        }
    }

    /// Classify a candidate name.
    ///
    /// Returns `None` for self-references, built-ins, and names already
    /// reported for this class (first occurrence wins).
    pub fn resolve(&mut self, name: &str) -> Option<Coupling> {
        if name == self.class_simple || name == self.class_qualified {
            return None;
        }
        let simple = name.rsplit('.').next().unwrap_or(name);
        if BUILTIN_NAMES.contains(simple) {
            return None;
        }

        let qualified = self.qualify(name);
        let coupling = if is_under_prefix(&qualified, &self.config.packages) {
            Coupling::Internal
        } else if !name.contains('.') && starts_uppercase(name) {
            if self.declared_in_file(name) {
                Coupling::Internal
            } else if self.package_is_internal && !self.has_external_wildcard {
                Coupling::Internal
            } else if self.has_internal_wildcard && !self.has_external_wildcard {
                Coupling::Internal
            } else {
                Coupling::External
            }
        } else {
            Coupling::External
        };

        if !self.seen.insert(qualified) {
            return None;
        }
        Some(coupling)
    }

    /// Expand a simple name through the file's explicit imports.
    fn qualify(&self, name: &str) -> String {
        if name.contains('.') {
            return name.to_string();
        }
        for import in self.facts.imports.iter().filter(|i| !i.wildcard) {
            if import.path.rsplit('.').next() == Some(name) {
                return import.path.clone();
            }
        }
        name.to_string()
    }

    fn declared_in_file(&self, name: &str) -> bool {
        self.facts
            .declarations
            .iter()
            .any(|d| d.kind.is_type() && d.name == name)
    }
}

/// Whether `name` equals a prefix or sits under one (`prefix.`).
fn is_under_prefix(name: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| {
        name == prefix
            || (name.len() > prefix.len()
                && name.starts_with(prefix.as_str())
                && name.as_bytes()[prefix.len()] == b'.')
    })
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().map(char::is_uppercase).unwrap_or(false)
}

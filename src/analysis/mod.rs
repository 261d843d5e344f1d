//! AST-backed syntax facades.
//!
//! This module provides a language-agnostic interface for extracting
//! "facts" from source code using tree-sitter - declared types and
//! callables with their spans, imports, and the file's package - plus
//! the per-language ICP tree walks that consume those trees.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ Source Files │────▶│ LanguageAnalyzer │────▶│ FileFacts    │
//! └──────────────┘     │ (Java, Kotlin)   │     │ IcpInstances │
//!                      └──────────────────┘     └──────────────┘
//! ```
//!
//! Analyzer dispatch goes through [`AnalyzerRegistry`], an explicit
//! value constructed at startup and passed by reference - there is no
//! process-wide registry state.

mod facts;
mod languages;
mod traits;

pub use facts::{Declaration, DeclarationKind, FileFacts, Import, Span};
pub use languages::{AnalyzerRegistry, JavaAnalyzer, KotlinAnalyzer};
pub use traits::{LanguageAnalyzer, ParsedFile};

//! Result types for per-file analysis.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::icp::{IcpInstance, IcpType};
use crate::sloc::SlocMetrics;

/// Severity levels for analysis errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A per-file analysis failure.
///
/// Failures are isolated: the file contributes zero classes, the rest
/// of the batch continues.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisError {
    pub file: String,
    pub message: String,
    pub severity: Severity,
}

/// Group instances by construct category.
pub fn breakdown_by_type(
    instances: impl IntoIterator<Item = IcpInstance>,
) -> BTreeMap<IcpType, Vec<IcpInstance>> {
    let mut breakdown: BTreeMap<IcpType, Vec<IcpInstance>> = BTreeMap::new();
    for instance in instances {
        breakdown.entry(instance.icp_type).or_default().push(instance);
    }
    breakdown
}

/// ICP and SLOC figures for one method.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodAnalysis {
    pub name: String,
    pub class_name: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Sum of the weights of every instance attributed to this method.
    pub total_icp: f64,
    pub breakdown: BTreeMap<IcpType, Vec<IcpInstance>>,
    pub sloc: SlocMetrics,
    pub is_over_sloc_limit: bool,
}

/// ICP and SLOC figures for one declared type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAnalysis {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    /// Sum of the weights of every instance in the class, methods
    /// included.
    pub total_icp: f64,
    pub breakdown: BTreeMap<IcpType, Vec<IcpInstance>>,
    pub methods: Vec<MethodAnalysis>,
    pub is_over_limit: bool,
    /// The resolved ICP ceiling; omitted when unbounded.
    #[serde(skip_serializing_if = "limit_is_unbounded")]
    pub icp_limit: f64,
    pub sloc: SlocMetrics,
}

fn limit_is_unbounded(limit: &f64) -> bool {
    limit.is_infinite()
}

impl ClassAnalysis {
    /// The class name qualified by its package.
    pub fn qualified_name(&self) -> String {
        match &self.package {
            Some(package) => format!("{}.{}", package, self.name),
            None => self.name.clone(),
        }
    }

    /// Number of instances of a given category, methods included.
    pub fn instance_count(&self, icp_type: IcpType) -> usize {
        self.breakdown.get(&icp_type).map(Vec::len).unwrap_or(0)
    }
}

/// Everything known about one analyzed file.
///
/// Created once per file, immutable afterwards, consumed by the
/// aggregator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub path: String,
    pub classes: Vec<ClassAnalysis>,
    pub total_icp: f64,
    pub errors: Vec<AnalysisError>,
}

impl AnalysisResult {
    /// A result with no classes and no errors.
    pub fn empty(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            classes: Vec::new(),
            total_icp: 0.0,
            errors: Vec::new(),
        }
    }

    /// A failed file: zero classes, one error, severity Error.
    pub fn from_error(path: impl Into<String>, message: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            errors: vec![AnalysisError {
                file: path.clone(),
                message: message.into(),
                severity: Severity::Error,
            }],
            ..Self::empty(path)
        }
    }

    pub fn has_errors(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakdown_by_type_groups_instances() {
        let instances = vec![
            IcpInstance::new(IcpType::CodeBranch, 1, 1, "if", 1.0),
            IcpInstance::new(IcpType::Condition, 1, 5, "cond", 1.0),
            IcpInstance::new(IcpType::CodeBranch, 3, 1, "while", 1.0),
        ];
        let breakdown = breakdown_by_type(instances);
        assert_eq!(breakdown[&IcpType::CodeBranch].len(), 2);
        assert_eq!(breakdown[&IcpType::Condition].len(), 1);
        assert!(!breakdown.contains_key(&IcpType::ExceptionHandling));
    }

    #[test]
    fn test_from_error_contributes_zero_icp() {
        let result = AnalysisResult::from_error("Broken.java", "parse failure");
        assert!(result.classes.is_empty());
        assert_eq!(result.total_icp, 0.0);
        assert!(result.has_errors());
    }
}

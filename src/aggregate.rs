//! Cross-file aggregation.
//!
//! A pure, single-pass reducer over per-file results. Everything here
//! is recomputed in full on every call; there is no incremental state.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analyze::{AnalysisResult, ClassAnalysis};
use crate::icp::IcpType;

/// A class referenced from the aggregate lists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRef {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub name: String,
    pub total_icp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icp_limit: Option<f64>,
}

impl ClassRef {
    fn new(file: &str, class: &ClassAnalysis) -> Self {
        Self {
            file: file.to_string(),
            package: class.package.clone(),
            name: class.name.clone(),
            total_icp: class.total_icp,
            icp_limit: if class.icp_limit.is_finite() {
                Some(class.icp_limit)
            } else {
                None
            },
        }
    }
}

/// A method over the SLOC limit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodRef {
    pub file: String,
    pub class_name: String,
    pub name: String,
    pub code_lines: usize,
}

/// Project-wide line statistics.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlocStatistics {
    pub total_lines: usize,
    pub code_lines: usize,
    pub comment_lines: usize,
    pub blank_lines: usize,
    pub average_class_code_lines: f64,
    pub average_method_code_lines: f64,
}

/// The project-wide report payload.
///
/// Derived and read-only; serializes directly to the JSON report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedAnalysis {
    pub total_files: usize,
    pub total_classes: usize,
    pub total_icp: f64,
    /// Mean ICP per class.
    pub average_icp: f64,
    pub classes_over_limit: Vec<ClassRef>,
    /// Instance counts (not weights) per construct category.
    pub icp_distribution: BTreeMap<IcpType, usize>,
    /// Top 10 classes by ICP, descending.
    pub largest_classes: Vec<ClassRef>,
    pub sloc: SlocStatistics,
    /// Pearson correlation between class ICP and class code lines.
    pub icp_sloc_correlation: f64,
    pub methods_over_sloc_limit: Vec<MethodRef>,
    pub suggestions: Vec<String>,
}

/// Reduce per-file results into project statistics.
pub fn aggregate(results: &[AnalysisResult]) -> AggregatedAnalysis {
    let mut total_classes = 0usize;
    let mut total_icp = 0.0f64;
    let mut classes_over_limit = Vec::new();
    let mut icp_distribution: BTreeMap<IcpType, usize> = BTreeMap::new();
    let mut all_classes: Vec<ClassRef> = Vec::new();
    let mut methods_over_sloc_limit = Vec::new();
    let mut sloc = SlocStatistics::default();
    let mut method_code_lines = 0usize;
    let mut method_count = 0usize;
    let mut icp_sloc_pairs: Vec<(f64, f64)> = Vec::new();

    for result in results {
        total_icp += result.total_icp;
        for class in &result.classes {
            total_classes += 1;
            all_classes.push(ClassRef::new(&result.path, class));
            if class.is_over_limit {
                classes_over_limit.push(ClassRef::new(&result.path, class));
            }
            for (icp_type, instances) in &class.breakdown {
                *icp_distribution.entry(*icp_type).or_insert(0) += instances.len();
            }
            sloc.total_lines += class.sloc.total;
            sloc.code_lines += class.sloc.code_only;
            sloc.comment_lines += class.sloc.comments;
            sloc.blank_lines += class.sloc.blank_lines;
            icp_sloc_pairs.push((class.sloc.code_only as f64, class.total_icp));
            for method in &class.methods {
                method_count += 1;
                method_code_lines += method.sloc.code_only;
                if method.is_over_sloc_limit {
                    methods_over_sloc_limit.push(MethodRef {
                        file: result.path.clone(),
                        class_name: class.name.clone(),
                        name: method.name.clone(),
                        code_lines: method.sloc.code_only,
                    });
                }
            }
        }
    }

    if total_classes > 0 {
        sloc.average_class_code_lines = sloc.code_lines as f64 / total_classes as f64;
    }
    if method_count > 0 {
        sloc.average_method_code_lines = method_code_lines as f64 / method_count as f64;
    }

    let average_icp = if total_classes > 0 {
        total_icp / total_classes as f64
    } else {
        0.0
    };

    let mut largest_classes = all_classes;
    largest_classes.sort_by(|a, b| {
        b.total_icp
            .partial_cmp(&a.total_icp)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (&a.file, &a.name).cmp(&(&b.file, &b.name)))
    });
    largest_classes.truncate(10);

    let suggestions = build_suggestions(results, &classes_over_limit, &methods_over_sloc_limit);

    AggregatedAnalysis {
        total_files: results.len(),
        total_classes,
        total_icp,
        average_icp,
        classes_over_limit,
        icp_distribution,
        largest_classes,
        sloc,
        icp_sloc_correlation: pearson(&icp_sloc_pairs),
        methods_over_sloc_limit,
        suggestions,
    }
}

/// Pearson correlation coefficient; 0.0 when undefined (fewer than two
/// samples, or zero variance on either axis).
fn pearson(pairs: &[(f64, f64)]) -> f64 {
    let n = pairs.len() as f64;
    if pairs.len() < 2 {
        return 0.0;
    }
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    let mut variance_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
    }
    if variance_x == 0.0 || variance_y == 0.0 {
        return 0.0;
    }
    covariance / (variance_x.sqrt() * variance_y.sqrt())
}

/// Refactoring hint for the dominant construct category of a class.
fn dominant_hint(class: &ClassAnalysis) -> &'static str {
    let dominant = class
        .breakdown
        .iter()
        .map(|(icp_type, instances)| {
            let weight: f64 = instances.iter().map(|i| i.weight).sum();
            (*icp_type, weight)
        })
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(icp_type, _)| icp_type);

    match dominant {
        Some(IcpType::CodeBranch) => "split branch-heavy methods into smaller functions",
        Some(IcpType::Condition) => "extract compound boolean conditions into named predicates",
        Some(IcpType::ExceptionHandling) => "consolidate exception handling in fewer places",
        Some(IcpType::InternalCoupling) => "reduce collaborators or introduce a facade",
        Some(IcpType::ExternalCoupling) => "wrap external dependencies behind project interfaces",
        None => "split the class by responsibility",
    }
}

fn build_suggestions(
    results: &[AnalysisResult],
    classes_over_limit: &[ClassRef],
    methods_over_sloc_limit: &[MethodRef],
) -> Vec<String> {
    let mut suggestions = Vec::new();

    // worst offenders first
    let mut over_limit: Vec<&ClassRef> = classes_over_limit.iter().collect();
    over_limit.sort_by(|a, b| {
        b.total_icp
            .partial_cmp(&a.total_icp)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (&a.file, &a.name).cmp(&(&b.file, &b.name)))
    });
    for class_ref in over_limit {
        let hint = results
            .iter()
            .find(|r| r.path == class_ref.file)
            .and_then(|r| r.classes.iter().find(|c| c.name == class_ref.name))
            .map(dominant_hint)
            .unwrap_or("split the class by responsibility");
        let limit = class_ref
            .icp_limit
            .map(|l| format!("{:.1}", l))
            .unwrap_or_else(|| "unbounded".to_string());
        suggestions.push(format!(
            "{}: class {} has ICP {:.1} (limit {}); {}",
            class_ref.file, class_ref.name, class_ref.total_icp, limit, hint
        ));
    }

    for method_ref in methods_over_sloc_limit {
        suggestions.push(format!(
            "{}: method {}.{} spans {} code lines; extract smaller functions",
            method_ref.file, method_ref.class_name, method_ref.name, method_ref.code_lines
        ));
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{breakdown_by_type, MethodAnalysis};
    use crate::icp::IcpInstance;
    use crate::sloc::SlocMetrics;

    fn class_with(name: &str, icp: f64, code_lines: usize, limit: f64) -> ClassAnalysis {
        let instances = vec![IcpInstance::new(IcpType::CodeBranch, 1, 1, "if", icp)];
        ClassAnalysis {
            name: name.to_string(),
            package: None,
            start_line: 1,
            end_line: code_lines,
            total_icp: icp,
            breakdown: breakdown_by_type(instances),
            methods: Vec::new(),
            is_over_limit: icp > limit,
            icp_limit: limit,
            sloc: SlocMetrics {
                total: code_lines,
                code_only: code_lines,
                with_comments: code_lines,
                comments: 0,
                blank_lines: 0,
            },
        }
    }

    fn result_with(path: &str, classes: Vec<ClassAnalysis>) -> AnalysisResult {
        let total_icp = classes.iter().map(|c| c.total_icp).sum();
        AnalysisResult {
            path: path.to_string(),
            classes,
            total_icp,
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_totals_and_over_limit() {
        let results = vec![
            result_with("A.java", vec![class_with("A", 5.0, 20, 10.0)]),
            result_with("B.java", vec![class_with("B", 15.0, 40, 10.0)]),
        ];
        let aggregated = aggregate(&results);

        assert_eq!(aggregated.total_files, 2);
        assert_eq!(aggregated.total_classes, 2);
        assert_eq!(aggregated.total_icp, 20.0);
        assert_eq!(aggregated.average_icp, 10.0);
        assert_eq!(aggregated.classes_over_limit.len(), 1);
        assert_eq!(aggregated.classes_over_limit[0].name, "B");
    }

    #[test]
    fn test_perfectly_linear_correlation() {
        let pairs = [(20, 2.0), (40, 4.0), (60, 6.0), (80, 8.0), (100, 10.0)];
        let results: Vec<AnalysisResult> = pairs
            .iter()
            .enumerate()
            .map(|(i, (sloc, icp))| {
                result_with(
                    &format!("C{}.java", i),
                    vec![class_with(&format!("C{}", i), *icp, *sloc, 100.0)],
                )
            })
            .collect();

        let aggregated = aggregate(&results);
        assert!((aggregated.icp_sloc_correlation - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input_yields_zeroes() {
        let aggregated = aggregate(&[]);
        assert_eq!(aggregated.total_files, 0);
        assert_eq!(aggregated.total_classes, 0);
        assert_eq!(aggregated.total_icp, 0.0);
        assert_eq!(aggregated.average_icp, 0.0);
        assert_eq!(aggregated.icp_sloc_correlation, 0.0);
        assert!(aggregated.classes_over_limit.is_empty());
        assert!(aggregated.largest_classes.is_empty());
        assert!(aggregated.suggestions.is_empty());
        assert_eq!(aggregated.sloc.average_class_code_lines, 0.0);
    }

    #[test]
    fn test_distribution_counts_instances_not_weights() {
        let instances = vec![
            IcpInstance::new(IcpType::CodeBranch, 1, 1, "if", 2.5),
            IcpInstance::new(IcpType::CodeBranch, 2, 1, "while", 2.5),
            IcpInstance::new(IcpType::Condition, 1, 5, "cond", 0.5),
        ];
        let class = ClassAnalysis {
            name: "C".to_string(),
            package: None,
            start_line: 1,
            end_line: 10,
            total_icp: 5.5,
            breakdown: breakdown_by_type(instances),
            methods: Vec::new(),
            is_over_limit: false,
            icp_limit: 12.0,
            sloc: SlocMetrics::default(),
        };
        let aggregated = aggregate(&[result_with("C.java", vec![class])]);

        assert_eq!(aggregated.icp_distribution[&IcpType::CodeBranch], 2);
        assert_eq!(aggregated.icp_distribution[&IcpType::Condition], 1);
    }

    #[test]
    fn test_largest_classes_capped_at_ten() {
        let results: Vec<AnalysisResult> = (0..15)
            .map(|i| {
                result_with(
                    &format!("C{}.java", i),
                    vec![class_with(&format!("C{}", i), i as f64, 10, 1000.0)],
                )
            })
            .collect();
        let aggregated = aggregate(&results);

        assert_eq!(aggregated.largest_classes.len(), 10);
        assert_eq!(aggregated.largest_classes[0].total_icp, 14.0);
        assert!(aggregated
            .largest_classes
            .windows(2)
            .all(|w| w[0].total_icp >= w[1].total_icp));
    }

    #[test]
    fn test_zero_variance_correlation_is_zero() {
        let results = vec![
            result_with("A.java", vec![class_with("A", 5.0, 20, 100.0)]),
            result_with("B.java", vec![class_with("B", 5.0, 40, 100.0)]),
        ];
        let aggregated = aggregate(&results);
        assert_eq!(aggregated.icp_sloc_correlation, 0.0);
    }

    #[test]
    fn test_suggestions_for_violations() {
        let mut class = class_with("Big", 20.0, 50, 10.0);
        class.methods.push(MethodAnalysis {
            name: "huge".to_string(),
            class_name: "Big".to_string(),
            start_line: 2,
            end_line: 45,
            total_icp: 20.0,
            breakdown: BTreeMap::new(),
            sloc: SlocMetrics {
                total: 44,
                code_only: 40,
                with_comments: 40,
                comments: 0,
                blank_lines: 4,
            },
            is_over_sloc_limit: true,
        });
        let aggregated = aggregate(&[result_with("Big.java", vec![class])]);

        assert_eq!(aggregated.suggestions.len(), 2);
        assert!(aggregated.suggestions[0].contains("class Big"));
        assert!(aggregated.suggestions[0].contains("20.0"));
        assert!(aggregated.suggestions[1].contains("Big.huge"));
        assert_eq!(aggregated.methods_over_sloc_limit.len(), 1);
    }
}

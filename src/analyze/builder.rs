//! Assembly of per-class and per-method analyses.
//!
//! The scanner emits a flat instance list per class; this module
//! partitions it across the class's methods by line containment,
//! attaches SLOC figures, and applies the resolved limits.

use crate::analysis::{Declaration, Span};
use crate::icp::IcpInstance;
use crate::sloc::{self, CommentSyntax};

use super::types::{breakdown_by_type, ClassAnalysis, MethodAnalysis};

/// Build the analysis record for one declared type.
///
/// `members` are the type's own callables (no callables of nested
/// types, no local functions). Instances are attributed to the
/// innermost member whose line range contains them; anything outside
/// every member stays at class level.
#[allow(clippy::too_many_arguments)]
pub fn build_class(
    name: &str,
    package: Option<&str>,
    span: &Span,
    members: &[&Declaration],
    instances: Vec<IcpInstance>,
    source: &str,
    syntax: &CommentSyntax,
    icp_limit: f64,
    method_sloc_limit: usize,
) -> ClassAnalysis {
    let total_icp: f64 = instances.iter().map(|i| i.weight).sum();
    let breakdown = breakdown_by_type(instances.iter().cloned());

    let mut per_method: Vec<Vec<IcpInstance>> = vec![Vec::new(); members.len()];
    for instance in instances {
        let owner = members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.span.contains_line(instance.line))
            .min_by_key(|(_, m)| m.span.line_count());
        if let Some((index, _)) = owner {
            per_method[index].push(instance);
        }
        // instances outside every member belong to the class only
    }

    let methods = members
        .iter()
        .zip(per_method)
        .map(|(member, method_instances)| {
            let method_total: f64 = method_instances.iter().map(|i| i.weight).sum();
            let method_sloc = sloc::classify(
                source,
                member.span.start_line,
                member.span.end_line,
                syntax,
            );
            MethodAnalysis {
                name: member.name.clone(),
                class_name: name.to_string(),
                start_line: member.span.start_line,
                end_line: member.span.end_line,
                total_icp: method_total,
                breakdown: breakdown_by_type(method_instances),
                is_over_sloc_limit: method_sloc.code_only > method_sloc_limit,
                sloc: method_sloc,
            }
        })
        .collect();

    let class_sloc = sloc::classify(source, span.start_line, span.end_line, syntax);

    ClassAnalysis {
        name: name.to_string(),
        package: package.map(str::to_string),
        start_line: span.start_line,
        end_line: span.end_line,
        total_icp,
        breakdown,
        methods,
        is_over_limit: total_icp > icp_limit,
        icp_limit,
        sloc: class_sloc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::DeclarationKind;
    use crate::icp::IcpType;
    use crate::sloc::C_LIKE;

    fn member(name: &str, start_line: usize, end_line: usize) -> Declaration {
        Declaration {
            name: name.to_string(),
            kind: DeclarationKind::Method,
            span: Span {
                start_byte: start_line * 100,
                end_byte: end_line * 100,
                start_line,
                start_col: 1,
                end_line,
                end_col: 1,
            },
        }
    }

    fn instance(icp_type: IcpType, line: usize, weight: f64) -> IcpInstance {
        IcpInstance::new(icp_type, line, 1, "test", weight)
    }

    const SOURCE: &str = "class C {\n  void a() {\n    x();\n  }\n  void b() {\n    y();\n  }\n}\n";

    fn class_span() -> Span {
        Span {
            start_byte: 0,
            end_byte: SOURCE.len(),
            start_line: 1,
            start_col: 1,
            end_line: 8,
            end_col: 1,
        }
    }

    #[test]
    fn test_instances_partition_by_line() {
        let a = member("a", 2, 4);
        let b = member("b", 5, 7);
        let members = vec![&a, &b];
        let instances = vec![
            instance(IcpType::CodeBranch, 3, 1.0),
            instance(IcpType::CodeBranch, 6, 1.0),
            instance(IcpType::InternalCoupling, 1, 1.0), // class level
        ];

        let class = build_class(
            "C",
            Some("com.acme"),
            &class_span(),
            &members,
            instances,
            SOURCE,
            &C_LIKE,
            12.0,
            30,
        );

        assert_eq!(class.total_icp, 3.0);
        assert_eq!(class.methods.len(), 2);
        assert_eq!(class.methods[0].total_icp, 1.0);
        assert_eq!(class.methods[1].total_icp, 1.0);
        // class breakdown covers everything
        let breakdown_total: f64 = class
            .breakdown
            .values()
            .flat_map(|v| v.iter())
            .map(|i| i.weight)
            .sum();
        assert_eq!(breakdown_total, class.total_icp);
    }

    #[test]
    fn test_innermost_member_wins() {
        // a nested range: the smaller member owns the shared lines
        let outer = member("outer", 2, 7);
        let inner = member("inner", 3, 4);
        let members = vec![&outer, &inner];
        let instances = vec![
            instance(IcpType::CodeBranch, 3, 1.0),
            instance(IcpType::CodeBranch, 6, 1.0),
        ];

        let class = build_class(
            "C", None, &class_span(), &members, instances, SOURCE, &C_LIKE, 12.0, 30,
        );
        assert_eq!(class.methods[1].total_icp, 1.0); // inner
        assert_eq!(class.methods[0].total_icp, 1.0); // outer keeps the rest
    }

    #[test]
    fn test_over_limit_flags() {
        let class = build_class(
            "C",
            None,
            &class_span(),
            &[],
            vec![
                instance(IcpType::CodeBranch, 2, 7.0),
                instance(IcpType::Condition, 2, 6.0),
            ],
            SOURCE,
            &C_LIKE,
            12.0,
            30,
        );
        assert!(class.is_over_limit); // 13.0 > 12.0

        let class = build_class(
            "C",
            None,
            &class_span(),
            &[],
            vec![instance(IcpType::CodeBranch, 2, 12.0)],
            SOURCE,
            &C_LIKE,
            12.0,
            30,
        );
        assert!(!class.is_over_limit); // equal is not over
    }

    #[test]
    fn test_method_sloc_limit_flag() {
        let a = member("a", 2, 4);
        let members = vec![&a];
        let class = build_class(
            "C", None, &class_span(), &members, Vec::new(), SOURCE, &C_LIKE, 12.0, 2,
        );
        // method body spans 3 code lines, limit 2
        assert!(class.methods[0].is_over_sloc_limit);

        let class = build_class(
            "C", None, &class_span(), &members, Vec::new(), SOURCE, &C_LIKE, 12.0, 3,
        );
        assert!(!class.methods[0].is_over_sloc_limit);
    }

    #[test]
    fn test_unbounded_limit_never_flags() {
        let class = build_class(
            "C",
            None,
            &class_span(),
            &[],
            vec![instance(IcpType::CodeBranch, 2, 1000.0)],
            SOURCE,
            &C_LIKE,
            f64::INFINITY,
            30,
        );
        assert!(!class.is_over_limit);
    }
}

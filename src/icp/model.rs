//! Core scoring types: construct categories and scored instances.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Categories of scored constructs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IcpType {
    /// A construct that introduces a branch in control flow.
    CodeBranch,
    /// A boolean-producing test expression or logical operator.
    Condition,
    /// A try block, catch clause, or finally block.
    ExceptionHandling,
    /// A reference to a type or call target within the project.
    InternalCoupling,
    /// A reference to a type or call target outside the project.
    ExternalCoupling,
}

impl IcpType {
    pub const ALL: [IcpType; 5] = [
        IcpType::CodeBranch,
        IcpType::Condition,
        IcpType::ExceptionHandling,
        IcpType::InternalCoupling,
        IcpType::ExternalCoupling,
    ];

    /// Metric key used in configuration lookups.
    pub fn key(&self) -> &'static str {
        match self {
            IcpType::CodeBranch => "code_branch",
            IcpType::Condition => "condition",
            IcpType::ExceptionHandling => "exception_handling",
            IcpType::InternalCoupling => "internal_coupling",
            IcpType::ExternalCoupling => "external_coupling",
        }
    }

    /// Weight applied when configuration does not override it.
    pub fn default_weight(&self) -> f64 {
        match self {
            IcpType::ExternalCoupling => 0.5,
            _ => 1.0,
        }
    }
}

impl fmt::Display for IcpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// One scored construct occurrence.
///
/// The weight is resolved from configuration when the instance is
/// created and never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcpInstance {
    #[serde(rename = "type")]
    pub icp_type: IcpType,
    pub line: usize,
    pub column: usize,
    pub description: String,
    pub weight: f64,
}

impl IcpInstance {
    pub fn new(
        icp_type: IcpType,
        line: usize,
        column: usize,
        description: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            icp_type,
            line,
            column,
            description: description.into(),
            weight,
        }
    }
}

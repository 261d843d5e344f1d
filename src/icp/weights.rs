//! Weight and limit resolution against configuration.
//!
//! Weights and limits are configured per language as an ordered list of
//! (file pattern, value) pairs. Patterns are regular expressions tried
//! in configuration order against the file's base name and its full
//! path; the first match wins. A malformed pattern is skipped, not
//! fatal.

use std::collections::HashMap;
use std::path::Path;

use log::warn;
use regex::Regex;

use super::IcpType;
use crate::config::CddConfig;

/// Limit returned when no pattern matches: effectively unbounded.
pub const UNLIMITED: f64 = f64::INFINITY;

/// Per-construct weights resolved for one file.
#[derive(Debug, Clone, Default)]
pub struct ResolvedWeights {
    map: HashMap<String, f64>,
}

impl ResolvedWeights {
    /// No configured weights; every construct falls back to its
    /// built-in default.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_map(map: HashMap<String, f64>) -> Self {
        Self { map }
    }

    /// Weight for a construct, falling back to its built-in default.
    pub fn weight_of(&self, icp_type: IcpType) -> f64 {
        self.map
            .get(icp_type.key())
            .copied()
            .unwrap_or_else(|| icp_type.default_weight())
    }
}

fn pattern_matches(pattern: &str, path: &Path) -> bool {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(err) => {
            warn!("skipping malformed file pattern {:?}: {}", pattern, err);
            return false;
        }
    };
    let base_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    re.is_match(base_name) || re.is_match(&path.to_string_lossy())
}

/// Resolve the per-construct weight table for a file.
pub fn resolve_weights(config: &CddConfig, path: &Path, language: &str) -> ResolvedWeights {
    if let Some(patterns) = config.metrics.get(language) {
        for (pattern, weights) in patterns.iter() {
            if pattern_matches(pattern, path) {
                return ResolvedWeights::from_map(weights.clone());
            }
        }
    }
    ResolvedWeights::empty()
}

/// Resolve the per-class ICP ceiling for a file.
pub fn resolve_limit(config: &CddConfig, path: &Path, language: &str) -> f64 {
    if let Some(patterns) = config.icp_limits.get(language) {
        for (pattern, limit) in patterns.iter() {
            if pattern_matches(pattern, path) {
                return *limit;
            }
        }
    }
    UNLIMITED
}

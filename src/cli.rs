//! Command-line interface for cddcheck.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::warn;
use walkdir::WalkDir;

use crate::aggregate;
use crate::analysis::AnalyzerRegistry;
use crate::analyze::{AnalysisError, Runner};
use crate::config::{self, CddConfig, PatternMap, CATCH_ALL, SUPPORTED_LANGUAGES};
use crate::report::{self, ReportFormat};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_VIOLATIONS: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Default configuration file names to search for.
const DEFAULT_CONFIG_NAMES: &[&str] = &["cdd.yaml", "cdd.yml", ".cdd.yaml"];

/// Complexity budget analyzer for Java and Kotlin.
///
/// Cddcheck scores every class and method with Intrinsic Cognitive
/// Points (ICP) - a weighted count of branches, conditions, exception
/// handling, and coupling - and reports classes that exceed their
/// configured budget.
#[derive(Parser)]
#[command(name = "cddcheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a source tree and report complexity scores
    #[command(visible_alias = "check")]
    Analyze(AnalyzeArgs),
    /// Create a starter configuration file
    Init(InitArgs),
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Path to analyze (file or directory)
    pub path: PathBuf,

    /// Path to configuration file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: console, json, xml, or markdown
    #[arg(short, long)]
    pub format: Option<String>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the per-class ICP limit for every language and pattern
    #[arg(long)]
    pub icp_limit: Option<f64>,

    /// Override the per-method SLOC limit
    #[arg(long)]
    pub sloc_limit: Option<usize>,

    /// Additional include patterns (glob or regex)
    #[arg(long)]
    pub include: Vec<String>,

    /// Additional exclude patterns (glob or regex)
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Treat every package declared in the tree as internal
    #[arg(long)]
    pub auto_detect_packages: bool,

    /// Exit non-zero when any class is over its ICP limit
    #[arg(long)]
    pub fail_on_violations: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "cdd.yaml")]
    pub output: PathBuf,
}

/// Starter configuration written by `cddcheck init`.
const INIT_TEMPLATE: &str = include_str!("templates/cdd.yaml");

/// Discover a configuration file in the current directory.
fn discover_config() -> Option<PathBuf> {
    DEFAULT_CONFIG_NAMES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

/// A single include/exclude pattern: glob first, regex fallback.
enum PathMatcher {
    Glob(globset::GlobMatcher),
    Regex(regex::Regex),
}

impl PathMatcher {
    fn new(pattern: &str) -> Option<Self> {
        if let Ok(glob) = globset::Glob::new(pattern) {
            return Some(PathMatcher::Glob(glob.compile_matcher()));
        }
        match regex::Regex::new(pattern) {
            Ok(re) => Some(PathMatcher::Regex(re)),
            Err(_) => {
                warn!("skipping pattern {:?}: neither a valid glob nor a valid regex", pattern);
                None
            }
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            PathMatcher::Glob(glob) => glob.is_match(path),
            PathMatcher::Regex(re) => re.is_match(path),
        }
    }
}

/// Compiled include/exclude filter.
struct PathFilter {
    include: Vec<PathMatcher>,
    exclude: Vec<PathMatcher>,
}

impl PathFilter {
    fn new(config: &CddConfig) -> Self {
        Self {
            include: config
                .include
                .iter()
                .filter_map(|p| PathMatcher::new(p))
                .collect(),
            exclude: config
                .exclude
                .iter()
                .filter_map(|p| PathMatcher::new(p))
                .collect(),
        }
    }

    fn accepts(&self, path: &str) -> bool {
        if !self.include.is_empty() && !self.include.iter().any(|m| m.matches(path)) {
            return false;
        }
        !self.exclude.iter().any(|m| m.matches(path))
    }
}

/// Collect the files to analyze under `root`.
fn collect_files(root: &Path, registry: &AnalyzerRegistry, filter: &PathFilter) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            // the root itself is exempt from name-based pruning
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            // skip hidden and build directories
            if e.file_type().is_dir()
                && (name.starts_with('.') || name == "build" || name == "target" || name == "out")
            {
                return false;
            }
            true
        })
        .flatten()
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if registry.for_path(path).is_none() {
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();
        if filter.accepts(&rel) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files
}

/// Fold CLI overrides into the loaded configuration.
fn apply_overrides(config: &mut CddConfig, args: &AnalyzeArgs) -> Result<(), String> {
    if let Some(limit) = args.icp_limit {
        if limit < 0.0 {
            return Err(format!("--icp-limit must be >= 0, got {limit}"));
        }
        for language in SUPPORTED_LANGUAGES {
            config.icp_limits.insert(
                language.to_string(),
                PatternMap::from_iter([(CATCH_ALL.to_string(), limit)]),
            );
        }
    }
    if let Some(limit) = args.sloc_limit {
        config.sloc.method_limit = limit;
    }
    config.include.extend(args.include.iter().cloned());
    config.exclude.extend(args.exclude.iter().cloned());
    if args.auto_detect_packages {
        config.internal_coupling.auto_detect = true;
    }
    if let Some(format) = &args.format {
        config.reporting.format = format
            .parse::<ReportFormat>()
            .map_err(|err| err.to_string())?;
    }
    if let Some(output) = &args.output {
        config.reporting.output_file = Some(output.clone());
    }
    Ok(())
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    // Load configuration; absent or invalid documents fall back to
    // defaults, only CLI misuse is fatal.
    let mut config = match &args.config {
        Some(path) => config::load(path),
        None => match discover_config() {
            Some(path) => config::load(&path),
            None => CddConfig::default(),
        },
    };
    if let Err(message) = apply_overrides(&mut config, args) {
        eprintln!("Error: {}", message);
        return Ok(EXIT_ERROR);
    }

    let root = match args.path.canonicalize() {
        Ok(path) => path,
        Err(err) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, err);
            return Ok(EXIT_ERROR);
        }
    };

    let registry = AnalyzerRegistry::new();
    let (base_dir, files) = if root.is_dir() {
        let filter = PathFilter::new(&config);
        (root.clone(), collect_files(&root, &registry, &filter))
    } else {
        let base = root.parent().map(Path::to_path_buf).unwrap_or_default();
        (base, vec![root.clone()])
    };

    if files.is_empty() {
        eprintln!("Warning: no files to analyze under {}", root.display());
    }

    let format = config.reporting.format;
    let output_file = config.reporting.output_file.clone();

    let mut runner = Runner::new(&base_dir, config, &registry);
    let results = runner.run(&files);

    let aggregated = aggregate::aggregate(&results);
    let errors: Vec<AnalysisError> = results
        .iter()
        .flat_map(|r| r.errors.iter().cloned())
        .collect();

    report::write_report(format, &aggregated, &errors, output_file.as_deref())?;

    if args.fail_on_violations && !aggregated.classes_over_limit.is_empty() {
        return Ok(EXIT_VIOLATIONS);
    }
    Ok(EXIT_SUCCESS)
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(&args.output, INIT_TEMPLATE)?;

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to set your budgets", args.output.display());
    println!(
        "  2. Run: cddcheck analyze . --config {}",
        args.output.display()
    );

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_filters_by_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("A.java"), "class A {}").unwrap();
        fs::write(dir.path().join("b.kt"), "class B").unwrap();
        fs::write(dir.path().join("c.rb"), "class C; end").unwrap();
        fs::create_dir(dir.path().join("build")).unwrap();
        fs::write(dir.path().join("build/Gen.java"), "class Gen {}").unwrap();

        let registry = AnalyzerRegistry::new();
        let filter = PathFilter::new(&CddConfig::default());
        let files = collect_files(dir.path(), &registry, &filter);

        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["A.java", "b.kt"]);
    }

    #[test]
    fn test_exclude_patterns() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("generated")).unwrap();
        fs::write(dir.path().join("A.java"), "class A {}").unwrap();
        fs::write(dir.path().join("generated/B.java"), "class B {}").unwrap();

        let mut config = CddConfig::default();
        config.exclude.push("generated/**".to_string());

        let registry = AnalyzerRegistry::new();
        let filter = PathFilter::new(&config);
        let files = collect_files(dir.path(), &registry, &filter);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("A.java"));
    }

    #[test]
    fn test_include_patterns_limit_scan() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("A.java"), "class A {}").unwrap();
        fs::write(dir.path().join("b.kt"), "class B").unwrap();

        let mut config = CddConfig::default();
        config.include.push("*.java".to_string());

        let registry = AnalyzerRegistry::new();
        let filter = PathFilter::new(&config);
        let files = collect_files(dir.path(), &registry, &filter);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("A.java"));
    }

    #[test]
    fn test_icp_limit_override() {
        let mut config = CddConfig::default();
        let args = AnalyzeArgs {
            path: PathBuf::from("."),
            config: None,
            format: None,
            output: None,
            icp_limit: Some(5.0),
            sloc_limit: Some(10),
            include: Vec::new(),
            exclude: Vec::new(),
            auto_detect_packages: false,
            fail_on_violations: false,
        };
        apply_overrides(&mut config, &args).unwrap();

        for language in SUPPORTED_LANGUAGES {
            assert_eq!(config.icp_limits[language].get(CATCH_ALL), Some(&5.0));
        }
        assert_eq!(config.sloc.method_limit, 10);
    }

    #[test]
    fn test_invalid_format_is_rejected() {
        let mut config = CddConfig::default();
        let args = AnalyzeArgs {
            path: PathBuf::from("."),
            config: None,
            format: Some("sarif".to_string()),
            output: None,
            icp_limit: None,
            sloc_limit: None,
            include: Vec::new(),
            exclude: Vec::new(),
            auto_detect_packages: false,
            fail_on_violations: false,
        };
        assert!(apply_overrides(&mut config, &args).is_err());
    }

    #[test]
    fn test_init_template_is_valid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cdd.yaml");
        fs::write(&path, INIT_TEMPLATE).unwrap();
        let config = config::try_load(&path).unwrap();
        assert!(config.validate().is_ok());
    }
}

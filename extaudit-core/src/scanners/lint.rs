//! Heuristic lint of script and markup files
//!
//! Scripts are checked for unbalanced braces, dangerous calls, unresolved
//! relative imports and deprecated APIs. Markup is checked for missing
//! referenced assets and inline script blocks. Both feed an informational
//! file dependency graph.

use super::ExtensionScanner;
use crate::models::{Finding, FindingCategory, Severity};
use crate::CoreConfig;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use regex::{Regex, RegexBuilder};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// (name, pattern, message); matched case-insensitively
const DANGEROUS_PATTERNS: [(&str, &str, &str); 8] = [
    ("eval", r"\beval\s*\(", "eval() usage is dangerous and disallowed in store"),
    ("new_function", r"\bnew\s+Function\s*\(", "new Function() is dangerous"),
    ("innerHTML", r"\.innerHTML\s*=", "innerHTML with untrusted data is XSS risk"),
    ("document.write", r"\bdocument\.write\s*\(", "document.write breaks async content"),
    ("setTimeout_string", r#"setTimeout\s*\(\s*["']"#, "setTimeout with string code is dangerous"),
    ("setInterval_string", r#"setInterval\s*\(\s*["']"#, "setInterval with string code is dangerous"),
    ("remote_code", r#"fetch\s*\(\s*["'][^"']*\?code="#, "Remote code loading detected"),
    (
        "chrome_api_override",
        r"var\s+chrome\s*=|let\s+chrome\s*=|const\s+chrome\s*=",
        "Do not override chrome API object",
    ),
];

const DEPRECATED_APIS: [(&str, &str); 5] = [
    ("webRequest", "Replaced by declarativeNetRequest (Chrome 102+)"),
    ("tabs.executeScript", "Replaced by chrome.scripting.executeScript (MV3)"),
    ("tabs.insertCSS", "Replaced by chrome.scripting.insertCSS (MV3)"),
    ("tabs.removeCSS", "Replaced by chrome.scripting.removeCSS (MV3)"),
    ("background.page", "MV2 only, use service_worker in MV3"),
];

lazy_static::lazy_static! {
    static ref DANGEROUS: Vec<(&'static str, Regex, &'static str)> = DANGEROUS_PATTERNS
        .iter()
        .map(|(name, pattern, message)| {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("dangerous pattern");
            (*name, regex, *message)
        })
        .collect();
    static ref DEPRECATED: Vec<(&'static str, Regex, &'static str)> = DEPRECATED_APIS
        .iter()
        .map(|(api, message)| {
            let regex = Regex::new(&format!(r"\b{}\b", regex::escape(api))).expect("deprecated pattern");
            (*api, regex, *message)
        })
        .collect();
    static ref IMPORTS: [Regex; 2] = [
        Regex::new(r#"import\s+[^;]*?\s+from\s+["']([^"']+)["']"#).expect("import pattern"),
        Regex::new(r#"require\s*\(\s*["']([^"']+)["']\s*\)"#).expect("require pattern"),
    ];
    static ref SCRIPT_SRC: Regex =
        Regex::new(r#"(?i)<script[^>]*src=["']([^"']+)["']"#).expect("script src pattern");
    static ref LINK_HREF: Regex =
        Regex::new(r#"(?i)<link[^>]*href=["']([^"']+)["']"#).expect("link href pattern");
    static ref IMG_SRC: Regex =
        Regex::new(r#"(?i)<(?:img|icon)[^>]*(?:src|href)=["']([^"']+)["']"#).expect("img pattern");
    static ref INLINE_SCRIPT: Regex =
        Regex::new(r"(?i)<script[^>]*>([^<]+)</script>").expect("inline script pattern");
}

/// Informational graph of file -> referenced module/asset
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
    files: BTreeSet<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(index) = self.nodes.get(name) {
            return *index;
        }
        let index = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), index);
        index
    }

    /// Register a scanned file, even one without outgoing references
    pub fn add_file(&mut self, file: &str) {
        self.node(file);
        self.files.insert(file.to_string());
    }

    pub fn add_dependency(&mut self, from: &str, to: &str) {
        let from = self.node(from);
        let to = self.node(to);
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, ());
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Direct references of `file`, sorted
    pub fn dependencies_of(&self, file: &str) -> BTreeSet<String> {
        self.nodes
            .get(file)
            .map(|index| {
                self.graph
                    .edges(*index)
                    .map(|edge| self.graph[edge.target()].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Scanned file -> its references
    pub fn to_adjacency(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.files
            .iter()
            .map(|file| (file.clone(), self.dependencies_of(file)))
            .collect()
    }
}

impl Serialize for DependencyGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_adjacency().serialize(serializer)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LintSummary {
    pub total_issues: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub files_with_issues: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LintReport {
    pub issues: Vec<Finding>,
    pub summary: LintSummary,
    pub dependencies: DependencyGraph,
}

impl LintReport {
    pub fn by_severity(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.issues.iter().filter(move |f| f.severity == severity)
    }

    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.issues.iter().filter(move |f| f.code == code)
    }
}

pub struct LintEngine {
    root: PathBuf,
    config: CoreConfig,
}

impl LintEngine {
    pub fn new(root: impl AsRef<Path>, config: CoreConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }

    fn lint_script(&self, path: &Path, content: &str, graph: &mut DependencyGraph) -> Vec<Finding> {
        let file = self.relative(path);
        graph.add_file(&file);
        let mut issues = Vec::new();

        let balance = count(content, '{') - count(content, '}');
        if balance != 0 {
            issues.push(
                Finding::error(
                    FindingCategory::Lint,
                    "brace-mismatch",
                    format!("Mismatched braces: {balance:+}"),
                )
                .with_location(format!("{file}:1")),
            );
        }

        for (name, regex, message) in DANGEROUS.iter() {
            for m in regex.find_iter(content) {
                issues.push(
                    Finding::error(FindingCategory::Security, format!("security-{name}"), *message)
                        .with_location(format!("{file}:{}", line_of(content, m.start()))),
                );
            }
        }

        let parent = path.parent().unwrap_or(&self.root);
        for regex in IMPORTS.iter() {
            for captures in regex.captures_iter(content) {
                let (Some(whole), Some(module)) = (captures.get(0), captures.get(1)) else {
                    continue;
                };
                let module = module.as_str();
                graph.add_dependency(&file, module);

                if !module.starts_with('.') {
                    continue;
                }
                if !resolves(parent, module) {
                    issues.push(
                        Finding::error(
                            FindingCategory::Dependency,
                            "module-not-found",
                            format!("Module not found: {module}"),
                        )
                        .with_location(format!("{file}:{}", line_of(content, whole.start()))),
                    );
                }
            }
        }

        for (api, regex, message) in DEPRECATED.iter() {
            for m in regex.find_iter(content) {
                issues.push(
                    Finding::warning(
                        FindingCategory::Api,
                        format!("deprecated-{}", api.replace('.', "-")),
                        format!("Deprecated API: {api} - {message}"),
                    )
                    .with_location(format!("{file}:{}", line_of(content, m.start()))),
                );
            }
        }

        issues
    }

    fn lint_markup(&self, path: &Path, content: &str, graph: &mut DependencyGraph) -> Vec<Finding> {
        let file = self.relative(path);
        graph.add_file(&file);
        let parent = path.parent().unwrap_or(&self.root);
        let mut issues = Vec::new();

        let mut reference_check =
            |regex: &Regex, severity: Severity, code: &str, label: &str, track: bool| {
                for captures in regex.captures_iter(content) {
                    let (Some(whole), Some(reference)) = (captures.get(0), captures.get(1)) else {
                        continue;
                    };
                    let reference = reference.as_str();
                    if track {
                        graph.add_dependency(&file, reference);
                    }
                    if is_remote(reference) || resolves(parent, reference) {
                        continue;
                    }
                    issues.push(
                        Finding::new(
                            severity,
                            FindingCategory::Dependency,
                            code,
                            format!("{label} not found: {reference}"),
                        )
                        .with_location(format!("{file}:{}", line_of(content, whole.start()))),
                    );
                }
            };

        reference_check(&*SCRIPT_SRC, Severity::Error, "script-not-found", "Script file", true);
        reference_check(&*LINK_HREF, Severity::Error, "css-not-found", "Stylesheet", true);
        reference_check(&*IMG_SRC, Severity::Warning, "file-not-found", "File reference", false);

        for captures in INLINE_SCRIPT.captures_iter(content) {
            let (Some(whole), Some(code)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let code = code.as_str().trim();
            if !code.is_empty() && !code.starts_with("//") {
                issues.push(
                    Finding::warning(
                        FindingCategory::Security,
                        "inline-script",
                        "Inline script detected - causes store rejection",
                    )
                    .with_location(format!("{file}:{}", line_of(content, whole.start()))),
                );
            }
        }

        issues
    }
}

impl ExtensionScanner for LintEngine {
    type Report = LintReport;

    fn scanner_name(&self) -> &'static str {
        "lint"
    }

    fn extension_root(&self) -> &Path {
        &self.root
    }

    fn config(&self) -> &CoreConfig {
        &self.config
    }

    fn scan(&self) -> LintReport {
        let mut graph = DependencyGraph::new();
        let mut issues = Vec::new();

        for path in self.source_files(&["js"]) {
            if let Some(content) = self.read_source(&path) {
                issues.extend(self.lint_script(&path, &content, &mut graph));
            }
        }
        for path in self.source_files(&["html"]) {
            if let Some(content) = self.read_source(&path) {
                issues.extend(self.lint_markup(&path, &content, &mut graph));
            }
        }

        let summary = summarize(&issues);
        LintReport {
            issues,
            summary,
            dependencies: graph,
        }
    }
}

fn summarize(issues: &[Finding]) -> LintSummary {
    let of = |severity: Severity| issues.iter().filter(|f| f.severity == severity).count();
    let files: BTreeSet<&str> = issues
        .iter()
        .filter_map(|f| f.location.as_deref())
        .map(|location| location.rsplit_once(':').map_or(location, |(file, _)| file))
        .collect();

    LintSummary {
        total_issues: issues.len(),
        errors: of(Severity::Error),
        warnings: of(Severity::Warning),
        infos: of(Severity::Info),
        files_with_issues: files.len(),
    }
}

#[allow(clippy::cast_possible_wrap)]
fn count(content: &str, ch: char) -> i64 {
    content.matches(ch).count() as i64
}

fn line_of(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("http") || reference.starts_with("data:") || reference.starts_with("//")
}

/// Resolve `reference` against `dir`, also trying a `.js` suffix. References
/// that climb out of the extension are treated as unresolved.
fn resolves(dir: &Path, reference: &str) -> bool {
    let reference = reference.split(['?', '#']).next().unwrap_or(reference);
    let candidate = extaudit_utils::normalize_path(&dir.join(reference));
    candidate.exists() || candidate.with_extension("js").exists()
}

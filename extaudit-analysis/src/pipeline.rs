//! Six-stage extension check pipeline
//!
//! Stages always run in order and all six always run. Each stage executes
//! behind a failure boundary: an error or a panic inside a stage becomes a
//! single error on that stage and the pipeline moves on. Stages 4 and 5 fan
//! out per browser through the [`BrowserAutomation`] collaborator, each
//! session bounded by its own timeout and joined before the stage completes.

use crate::automation::{BrowserAutomation, LaunchRequest, StaticLoadCheck};
use crate::runtime::run_runtime_checks;
use chrono::{DateTime, Utc};
use extaudit_core::models::finding::partition_messages;
use extaudit_core::scanners::{
    collect_all_files, ApiCompatibilityChecker, ApiUsageScanner, DependencyScanner, ExtensionScanner,
    LintEngine, NetworkScanner, SizeScanner, StoreComplianceScanner,
};
use extaudit_core::{BrowserKind, CoreConfig, Error, Finding, ManifestStore, Result, RuleEngine, Store};
use extaudit_utils::logging::{get_logger, init_logging, LoggerConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Browsers checked when the caller names none
pub const DEFAULT_BROWSERS: [BrowserKind; 3] =
    [BrowserKind::Chrome, BrowserKind::Firefox, BrowserKind::Edge];

/// Pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Browser the stage-2 rule validation runs against
    pub reference_browser: BrowserKind,
    pub stores: Vec<Store>,
    pub headless: bool,
    /// Upper bound for each per-browser automation session
    pub automation_timeout_secs: u64,
    pub check_policy_urls: bool,
    /// Subscriber installed when a pipeline or bulk run is created
    pub logging: Option<LoggerConfig>,
    pub core: CoreConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reference_browser: BrowserKind::Chrome,
            stores: Store::ALL.to_vec(),
            headless: true,
            automation_timeout_secs: 60,
            check_policy_urls: true,
            logging: None,
            core: CoreConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML/JSON/YAML file, keeping defaults for absent keys
    pub fn load(path: &Path) -> Result<Self> {
        Ok(extaudit_utils::ConfigBuilder::<Self>::new()
            .load_file(path)?
            .build())
    }

    pub fn automation_timeout(&self) -> Duration {
        Duration::from_secs(self.automation_timeout_secs)
    }

    /// Install the configured subscriber, if any. Returns whether this call
    /// installed it; an already-installed subscriber is kept.
    pub fn install_logging(&self) -> bool {
        let Some(logging) = &self.logging else {
            return false;
        };
        match init_logging(logging) {
            Ok(()) => true,
            Err(e) => {
                get_logger("extaudit.pipeline").debug(&format!("Keeping existing subscriber: {e}"));
                false
            }
        }
    }
}

/// The six logical stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    StaticFiles,
    ManifestValidation,
    Lint,
    BrowserLoad,
    RuntimeBehavior,
    Compatibility,
}

impl Stage {
    pub const ALL: [Self; 6] = [
        Self::StaticFiles,
        Self::ManifestValidation,
        Self::Lint,
        Self::BrowserLoad,
        Self::RuntimeBehavior,
        Self::Compatibility,
    ];

    pub const fn id(self) -> u8 {
        match self {
            Self::StaticFiles => 1,
            Self::ManifestValidation => 2,
            Self::Lint => 3,
            Self::BrowserLoad => 4,
            Self::RuntimeBehavior => 5,
            Self::Compatibility => 6,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::StaticFiles => "Static File Checks",
            Self::ManifestValidation => "Manifest Validation",
            Self::Lint => "Lint & Syntax Check",
            Self::BrowserLoad => "Browser Load Test",
            Self::RuntimeBehavior => "Runtime Behavior Test",
            Self::Compatibility => "Compatibility Analysis",
        }
    }

    pub const fn is_fanned_out(self) -> bool {
        matches!(self, Self::BrowserLoad | Self::RuntimeBehavior)
    }
}

/// What a stage body reports back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutcome {
    pub success: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub details: Map<String, Value>,
}

impl StageOutcome {
    pub fn passed() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![error.into()],
            ..Self::default()
        }
    }

    /// Errors and warnings rendered from findings; succeeds when no errors
    pub fn from_findings<'a, I>(findings: I) -> Self
    where
        I: IntoIterator<Item = &'a Finding>,
    {
        let (errors, warnings) = partition_messages(findings);
        Self {
            success: errors.is_empty(),
            errors,
            warnings,
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Serialize) -> Result<Self> {
        self.details.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }
}

/// Result of one stage execution (or one browser of a fanned-out stage)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage_id: u8,
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub details: Map<String, Value>,
}

#[allow(clippy::cast_possible_truncation)]
fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl StageResult {
    fn from_outcome(stage_id: u8, name: String, outcome: StageOutcome, elapsed: Duration) -> Self {
        Self {
            stage_id,
            name,
            success: outcome.success,
            duration_ms: millis(elapsed),
            errors: outcome.errors,
            warnings: outcome.warnings,
            details: outcome.details,
        }
    }

    fn failed(stage_id: u8, name: String, error: String, elapsed: Duration) -> Self {
        Self::from_outcome(stage_id, name, StageOutcome::failure(error), elapsed)
    }
}

/// A stage as recorded in the pipeline result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageRecord {
    Flat(StageResult),
    FannedOut {
        stage_id: u8,
        name: String,
        /// Wall clock of the whole fan-out
        duration_ms: u64,
        per_browser: BTreeMap<BrowserKind, StageResult>,
    },
}

impl StageRecord {
    pub fn stage_id(&self) -> u8 {
        match self {
            Self::Flat(result) => result.stage_id,
            Self::FannedOut { stage_id, .. } => *stage_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Flat(result) => &result.name,
            Self::FannedOut { name, .. } => name,
        }
    }

    /// A fanned-out stage passes only when every browser passed
    pub fn passed(&self) -> bool {
        self.results().all(|result| result.success)
    }

    /// The flat result, or each per-browser result
    pub fn results(&self) -> Box<dyn Iterator<Item = &StageResult> + '_> {
        match self {
            Self::Flat(result) => Box::new(std::iter::once(result)),
            Self::FannedOut { per_browser, .. } => Box::new(per_browser.values()),
        }
    }

    pub fn browser(&self, browser: BrowserKind) -> Option<&StageResult> {
        match self {
            Self::Flat(_) => None,
            Self::FannedOut { per_browser, .. } => per_browser.get(&browser),
        }
    }

    pub fn error_count(&self) -> usize {
        self.results().map(|result| result.errors.len()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.results().map(|result| result.warnings.len()).sum()
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            Self::Flat(result) => result.duration_ms,
            Self::FannedOut { duration_ms, .. } => *duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub total_stages: usize,
    pub passed_stages: usize,
    pub failed_stages: usize,
    pub total_errors: usize,
    pub total_warnings: usize,
    pub success: bool,
    /// Sum of stage durations
    pub duration_ms: u64,
}

impl PipelineSummary {
    /// Each record counts as one logical stage, whatever its fan-out
    pub fn from_stages(stages: &[StageRecord]) -> Self {
        let total_stages = stages.len();
        let passed_stages = stages.iter().filter(|stage| stage.passed()).count();
        Self {
            total_stages,
            passed_stages,
            failed_stages: total_stages - passed_stages,
            total_errors: stages.iter().map(StageRecord::error_count).sum(),
            total_warnings: stages.iter().map(StageRecord::warning_count).sum(),
            success: passed_stages == total_stages,
            duration_ms: stages.iter().map(StageRecord::duration_ms).sum(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Directory name of the extension
    pub extension_id: String,
    pub extension_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub browsers: Vec<BrowserKind>,
    pub stages: Vec<StageRecord>,
    pub summary: PipelineSummary,
}

impl PipelineResult {
    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|record| record.stage_id() == stage.id())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Inputs shared by every stage body
#[derive(Debug, Clone)]
pub struct StageContext {
    pub root: PathBuf,
    pub browsers: Vec<BrowserKind>,
    pub config: PipelineConfig,
}

/// Body of a non-fanned-out stage. Runs on a blocking thread.
pub type StageFn = Arc<dyn Fn(&StageContext) -> Result<StageOutcome> + Send + Sync>;

pub struct ExtensionPipeline {
    context: Arc<StageContext>,
    automation: Arc<dyn BrowserAutomation>,
    automation_timeout: Duration,
    overrides: HashMap<Stage, StageFn>,
}

impl ExtensionPipeline {
    /// Create a pipeline for one extension. An empty browser list means
    /// [`DEFAULT_BROWSERS`]; duplicates are dropped.
    pub fn new(root: impl AsRef<Path>, browsers: &[BrowserKind], config: PipelineConfig) -> Self {
        config.install_logging();
        let mut unique: Vec<BrowserKind> = Vec::new();
        for browser in if browsers.is_empty() { &DEFAULT_BROWSERS[..] } else { browsers } {
            if !unique.contains(browser) {
                unique.push(*browser);
            }
        }

        Self {
            automation_timeout: config.automation_timeout(),
            context: Arc::new(StageContext {
                root: root.as_ref().to_path_buf(),
                browsers: unique,
                config,
            }),
            automation: Arc::new(StaticLoadCheck),
            overrides: HashMap::new(),
        }
    }

    pub fn with_automation(mut self, automation: Arc<dyn BrowserAutomation>) -> Self {
        self.automation = automation;
        self
    }

    pub fn with_automation_timeout(mut self, limit: Duration) -> Self {
        self.automation_timeout = limit;
        self
    }

    /// Replace the body of a non-fanned-out stage. Fanned-out stages are
    /// driven by the automation collaborator and cannot be replaced.
    pub fn with_stage_override<F>(mut self, stage: Stage, body: F) -> Result<Self>
    where
        F: Fn(&StageContext) -> Result<StageOutcome> + Send + Sync + 'static,
    {
        if stage.is_fanned_out() {
            return Err(Error::Config(format!(
                "stage {} ({}) is fanned out; inject a BrowserAutomation instead",
                stage.id(),
                stage.name()
            )));
        }
        self.overrides.insert(stage, Arc::new(body));
        Ok(self)
    }

    pub fn browsers(&self) -> &[BrowserKind] {
        &self.context.browsers
    }

    /// Run all six stages and aggregate them
    pub async fn run(&self) -> PipelineResult {
        let logger = get_logger("extaudit.pipeline");
        let started_at = Utc::now();
        let root = &self.context.root;

        logger.info(&format!(
            "Starting pipeline for {} ({} browsers)",
            root.display(),
            self.context.browsers.len()
        ));

        let mut stages = Vec::with_capacity(Stage::ALL.len());
        stages.push(self.run_static(Stage::StaticFiles, static_files).await);
        stages.push(self.run_static(Stage::ManifestValidation, manifest_validation).await);
        stages.push(self.run_static(Stage::Lint, lint_and_static_analysis).await);

        let load = self.browser_load().await;
        let resolved_ids = resolved_extension_ids(&load);
        stages.push(load);
        stages.push(self.runtime_behavior(resolved_ids).await);

        stages.push(self.run_static(Stage::Compatibility, compatibility_analysis).await);

        let summary = PipelineSummary::from_stages(&stages);
        logger.info(&format!(
            "Pipeline finished: {}/{} stages passed, {} errors, {} warnings in {}ms",
            summary.passed_stages,
            summary.total_stages,
            summary.total_errors,
            summary.total_warnings,
            summary.duration_ms
        ));

        PipelineResult {
            extension_id: root
                .file_name()
                .map_or_else(|| root.display().to_string(), |name| name.to_string_lossy().into_owned()),
            extension_path: root.clone(),
            started_at,
            browsers: self.context.browsers.clone(),
            stages,
            summary,
        }
    }

    async fn run_static(
        &self,
        stage: Stage,
        default: fn(&StageContext) -> Result<StageOutcome>,
    ) -> StageRecord {
        let logger = get_logger("extaudit.pipeline.stage");
        logger.info(&format!("Stage {}: {}", stage.id(), stage.name()));

        let body: StageFn = self
            .overrides
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| Arc::new(default) as StageFn);
        let context = Arc::clone(&self.context);

        let start = Instant::now();
        let joined = tokio::task::spawn_blocking(move || body(&context)).await;
        let elapsed = start.elapsed();
        let name = stage.name().to_string();

        let result = match joined {
            Ok(Ok(outcome)) => StageResult::from_outcome(stage.id(), name, outcome, elapsed),
            Ok(Err(error)) => {
                logger.exception(&format!("Stage {} failed", stage.id()), &error);
                StageResult::failed(stage.id(), name, error.to_string(), elapsed)
            }
            Err(join_error) => {
                let error = Error::Analysis(format!("stage {} aborted: {join_error}", stage.id()));
                logger.error(&error.to_string());
                StageResult::failed(stage.id(), name, error.to_string(), elapsed)
            }
        };

        logger.info(&format!(
            "Stage {} {} in {}ms ({} errors, {} warnings)",
            stage.id(),
            if result.success { "passed" } else { "failed" },
            result.duration_ms,
            result.errors.len(),
            result.warnings.len()
        ));
        StageRecord::Flat(result)
    }

    async fn browser_load(&self) -> StageRecord {
        let root = self.context.root.clone();
        let headless = self.context.config.headless;

        self.fan_out(Stage::BrowserLoad, move |automation, browser| {
            let request = LaunchRequest::new(root.clone(), browser, headless);
            async move {
                let outcome = automation
                    .load_extension(&request)
                    .await
                    .map_err(|e| Error::Automation(format!("{e:#}")))?;

                let loaded = outcome.success && outcome.extension_loaded;
                let mut errors = outcome.errors;
                if !loaded && errors.is_empty() {
                    errors.push(format!("Extension failed to load in {browser}"));
                }
                StageOutcome {
                    success: loaded,
                    errors,
                    warnings: outcome.console_logs,
                    details: Map::new(),
                }
                .with_detail("extension_loaded", outcome.extension_loaded)?
                .with_detail("extension_id", &outcome.extension_id)?
                .with_detail("screenshots", &outcome.screenshots)
            }
        })
        .await
    }

    async fn runtime_behavior(&self, resolved_ids: BTreeMap<BrowserKind, String>) -> StageRecord {
        let root = self.context.root.clone();
        let headless = self.context.config.headless;

        self.fan_out(Stage::RuntimeBehavior, move |automation, browser| {
            let request = LaunchRequest::new(root.clone(), browser, headless)
                .with_extension_id(resolved_ids.get(&browser).cloned());
            let root = root.clone();
            async move {
                let (checks, findings) = match ManifestStore::new(&root).load() {
                    Ok(manifest) => {
                        let checks = run_runtime_checks(&root, &manifest);
                        let findings: Vec<Finding> =
                            checks.iter().flat_map(|c| c.findings.iter().cloned()).collect();
                        (checks, findings)
                    }
                    Err(e) => (
                        Vec::new(),
                        vec![Finding::error(
                            extaudit_core::FindingCategory::Runtime,
                            "runtime-manifest-unreadable",
                            format!("Cannot read manifest: {e}"),
                        )],
                    ),
                };
                let mut outcome = StageOutcome::from_findings(&findings);

                match automation.exercise(&request).await {
                    Ok(session) => {
                        if !session.success && session.errors.is_empty() {
                            outcome.errors.push(format!("Runtime session failed in {browser}"));
                        }
                        outcome.errors.extend(session.errors);
                        outcome.warnings.extend(session.console_logs);
                        outcome = outcome.with_detail("screenshots", &session.screenshots)?;
                    }
                    Err(e) => outcome
                        .errors
                        .push(Error::Automation(format!("{e:#}")).to_string()),
                }
                outcome.success = outcome.errors.is_empty();

                outcome
                    .with_detail("extension_id", &request.extension_id)?
                    .with_detail("checks", &checks)
            }
        })
        .await
    }

    /// Start one session per browser, then wait for all of them
    async fn fan_out<F, Fut>(&self, stage: Stage, session: F) -> StageRecord
    where
        F: Fn(Arc<dyn BrowserAutomation>, BrowserKind) -> Fut,
        Fut: Future<Output = Result<StageOutcome>> + Send + 'static,
    {
        let logger = get_logger("extaudit.pipeline.fanout");
        logger.info(&format!(
            "Stage {}: {} across {} browsers",
            stage.id(),
            stage.name(),
            self.context.browsers.len()
        ));

        let limit = self.automation_timeout;
        let start = Instant::now();

        let handles: Vec<_> = self
            .context
            .browsers
            .iter()
            .map(|&browser| {
                let work = session(Arc::clone(&self.automation), browser);
                let handle = tokio::spawn(async move {
                    let started = Instant::now();
                    let outcome = timeout(limit, work).await;
                    (outcome, started.elapsed())
                });
                (browser, handle)
            })
            .collect();

        let mut per_browser = BTreeMap::new();
        for (browser, handle) in handles {
            let name = format!("{} ({})", stage.name(), browser.key());
            let result = match handle.await {
                Ok((Ok(Ok(outcome)), elapsed)) => {
                    StageResult::from_outcome(stage.id(), name, outcome, elapsed)
                }
                Ok((Ok(Err(error)), elapsed)) => {
                    logger.warning(&format!("{browser} session failed: {error}"));
                    StageResult::failed(stage.id(), name, error.to_string(), elapsed)
                }
                Ok((Err(_), elapsed)) => {
                    let error = Error::Timeout {
                        seconds: limit.as_secs(),
                    };
                    logger.warning(&format!("{browser} session timed out after {limit:?}"));
                    StageResult::failed(stage.id(), name, error.to_string(), elapsed)
                }
                Err(join_error) => {
                    let error = Error::Analysis(format!("{browser} session aborted: {join_error}"));
                    logger.error(&error.to_string());
                    StageResult::failed(stage.id(), name, error.to_string(), Duration::ZERO)
                }
            };
            per_browser.insert(browser, result);
        }

        let record = StageRecord::FannedOut {
            stage_id: stage.id(),
            name: stage.name().to_string(),
            duration_ms: millis(start.elapsed()),
            per_browser,
        };
        logger.info(&format!(
            "Stage {} {} ({} errors, {} warnings)",
            stage.id(),
            if record.passed() { "passed" } else { "failed" },
            record.error_count(),
            record.warning_count()
        ));
        record
    }
}

/// Extension ids reported by the load stage, per browser
fn resolved_extension_ids(load: &StageRecord) -> BTreeMap<BrowserKind, String> {
    let StageRecord::FannedOut { per_browser, .. } = load else {
        return BTreeMap::new();
    };
    per_browser
        .iter()
        .filter_map(|(browser, result)| {
            let id = result.details.get("extension_id")?.as_str()?;
            Some((*browser, id.to_string()))
        })
        .collect()
}

/// Stage 1: required files
fn static_files(context: &StageContext) -> Result<StageOutcome> {
    if !ManifestStore::new(&context.root).exists() {
        return Ok(StageOutcome::failure("manifest.json missing"));
    }

    let files = collect_all_files(&context.root);
    let icons = files
        .iter()
        .map(|path| extaudit_utils::relative_display(&context.root, path))
        .filter(|file| file.to_lowercase().contains("icon"))
        .count();

    let mut outcome = StageOutcome::passed();
    if icons == 0 {
        outcome
            .warnings
            .push("No icon files found (may be required for stores)".to_string());
    }
    outcome
        .with_detail("files_found", files.len())?
        .with_detail("icons", icons)
}

/// Stage 2: rule validation against the reference browser plus store and
/// privacy readiness
fn manifest_validation(context: &StageContext) -> Result<StageOutcome> {
    let core = &context.config.core;
    let validation = RuleEngine::new(core.clone()).validate(&context.root, context.config.reference_browser);

    let mut scanner =
        StoreComplianceScanner::new(&context.root, core.clone()).with_stores(&context.config.stores);
    if !context.config.check_policy_urls {
        scanner = scanner.without_reachability();
    }
    let report = scanner.scan();

    let mut errors = validation.errors.clone();
    let mut warnings = validation.warnings.clone();
    for (store, result) in &report.stores {
        errors.extend(result.errors.iter().map(|e| format!("{store}: {e}")));
        warnings.extend(result.warnings.iter().map(|w| format!("{store}: {w}")));
    }
    let (privacy_errors, privacy_warnings) = partition_messages(&report.privacy.findings);
    errors.extend(privacy_errors);
    warnings.extend(privacy_warnings);

    let readiness: BTreeMap<&str, f64> = report
        .stores
        .iter()
        .map(|(store, result)| (store.key(), result.score))
        .collect();

    StageOutcome {
        success: validation.is_valid && errors.is_empty(),
        errors,
        warnings,
        details: Map::new(),
    }
    .with_detail("valid", validation.is_valid)?
    .with_detail("compatible_browsers", &validation.compatible_browsers)?
    .with_detail("store_readiness", readiness)?
    .with_detail("store_average_score", report.average_score())?
    .with_detail("privacy", &report.privacy)
}

/// Stage 3: lint plus size, dependency, network and API usage scans
fn lint_and_static_analysis(context: &StageContext) -> Result<StageOutcome> {
    let root = &context.root;
    let core = &context.config.core;

    let lint = LintEngine::new(root, core.clone()).scan();
    let size = SizeScanner::new(root, core.clone()).scan();
    let dependencies = DependencyScanner::new(root, core.clone()).scan();
    let network = NetworkScanner::new(root, core.clone()).scan();
    let api_usage = ApiUsageScanner::new(root, core.clone()).scan();

    let findings = lint
        .issues
        .iter()
        .chain(&size.findings)
        .chain(&dependencies.findings)
        .chain(&network.findings)
        .chain(&api_usage.findings);

    StageOutcome::from_findings(findings)
        .with_detail("lint", &lint.summary)?
        .with_detail("file_graph", &lint.dependencies)?
        .with_detail("size", &size)?
        .with_detail("dependencies", &dependencies)?
        .with_detail("network", &network)?
        .with_detail("api_usage", &api_usage)
}

/// Stage 6: advisory cross-browser API compatibility
fn compatibility_analysis(context: &StageContext) -> Result<StageOutcome> {
    let report =
        ApiCompatibilityChecker::new(&context.root, context.config.core.clone(), &context.browsers).scan();

    let warnings = report
        .per_browser
        .iter()
        .flat_map(|(browser, findings)| findings.iter().map(move |f| format!("{browser}: {f}")))
        .collect();
    let counts: BTreeMap<BrowserKind, usize> = report
        .per_browser
        .iter()
        .map(|(browser, findings)| (*browser, findings.len()))
        .collect();

    StageOutcome {
        success: true,
        errors: Vec::new(),
        warnings,
        details: Map::new(),
    }
    .with_detail("browsers_checked", context.browsers.len())?
    .with_detail("per_browser", counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(id: u8, errors: usize, warnings: usize, success: bool) -> StageResult {
        StageResult {
            stage_id: id,
            name: format!("stage {id}"),
            success,
            duration_ms: 5,
            errors: vec!["e".to_string(); errors],
            warnings: vec!["w".to_string(); warnings],
            details: Map::new(),
        }
    }

    #[test]
    fn test_summary_counts_each_stage_once() {
        let fanned = StageRecord::FannedOut {
            stage_id: 4,
            name: "Browser Load Test".to_string(),
            duration_ms: 7,
            per_browser: [
                (BrowserKind::Chrome, flat(4, 0, 1, true)),
                (BrowserKind::Firefox, flat(4, 2, 0, false)),
            ]
            .into_iter()
            .collect(),
        };
        let stages = vec![
            StageRecord::Flat(flat(1, 0, 1, true)),
            StageRecord::Flat(flat(2, 1, 3, false)),
            fanned,
        ];

        let summary = PipelineSummary::from_stages(&stages);
        assert_eq!(summary.total_stages, 3);
        assert_eq!(summary.passed_stages, 1);
        assert_eq!(summary.failed_stages, 2);
        assert_eq!(summary.total_errors, 3);
        assert_eq!(summary.total_warnings, 5);
        assert_eq!(summary.duration_ms, 17);
        assert!(!summary.success);
    }

    #[test]
    fn test_stage_record_serde_is_tagged() {
        let record = StageRecord::Flat(flat(1, 0, 0, true));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "flat");
        assert_eq!(json["stage_id"], 1);

        let back: StageRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_fanned_out_stage_cannot_be_overridden() {
        let pipeline = ExtensionPipeline::new(".", &[], PipelineConfig::default());
        assert_eq!(pipeline.browsers(), &DEFAULT_BROWSERS);
        let err = pipeline
            .with_stage_override(Stage::BrowserLoad, |_| Ok(StageOutcome::passed()))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_duplicate_browsers_dropped() {
        let pipeline = ExtensionPipeline::new(
            ".",
            &[BrowserKind::Firefox, BrowserKind::Firefox, BrowserKind::Chrome],
            PipelineConfig::default(),
        );
        assert_eq!(pipeline.browsers(), &[BrowserKind::Firefox, BrowserKind::Chrome]);
    }

    #[test]
    fn test_logging_section_loads_and_installs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "headless = false\n\n[logging]\nlevel = \"debug\"\ncolored_output = false\n").unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert!(!config.headless);
        let logging = config.logging.as_ref().unwrap();
        assert_eq!(logging.level, extaudit_utils::logging::LogLevel::Debug);

        // At most one install per process succeeds
        let first = config.install_logging();
        assert!(!(first && config.install_logging()));
        assert_eq!(get_logger("extaudit.pipeline").level(), logging.level);
        assert!(!PipelineConfig::default().install_logging());
    }

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.reference_browser, BrowserKind::Chrome);
        assert_eq!(config.stores.len(), 3);
        assert!(config.headless);
        assert_eq!(config.automation_timeout(), Duration::from_secs(60));
    }
}

//! Assess every extension under a directory in parallel

use crate::pipeline::{PipelineConfig, DEFAULT_BROWSERS};
use crate::record::ExtensionRecord;
use crate::scoring::{FinalScore, ScoringEngine};
use extaudit_core::{BrowserKind, ManifestStore, Result};
use extaudit_utils::logging::get_logger;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Scored record for one extension directory
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub extension: String,
    pub path: PathBuf,
    pub record: ExtensionRecord,
    pub score: FinalScore,
}

/// Immediate subdirectories of `dir` that hold a manifest.json.
/// Hidden directories are skipped. Sorted by path.
pub fn discover_extensions(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(true, |name| name.starts_with('.'));
        if path.is_dir() && !hidden && ManifestStore::new(&path).exists() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

pub fn assess_all(dir: &Path, browsers: &[BrowserKind]) -> Result<Vec<Assessment>> {
    assess_all_with(dir, browsers, &PipelineConfig::default(), &ScoringEngine::default())
}

pub fn assess_all_with(
    dir: &Path,
    browsers: &[BrowserKind],
    config: &PipelineConfig,
    engine: &ScoringEngine,
) -> Result<Vec<Assessment>> {
    config.install_logging();
    let logger = get_logger("extaudit.bulk");
    let browsers = if browsers.is_empty() {
        &DEFAULT_BROWSERS[..]
    } else {
        browsers
    };

    let extensions = discover_extensions(dir)?;
    logger.info(&format!(
        "Assessing {} extensions under {}",
        extensions.len(),
        dir.display()
    ));

    let mut assessments: Vec<Assessment> = extensions
        .par_iter()
        .map(|path| {
            let record = ExtensionRecord::collect(path, browsers, config);
            let score = engine.calculate_final_score(&record);
            Assessment {
                extension: record.extension.clone(),
                path: path.clone(),
                record,
                score,
            }
        })
        .collect();
    assessments.sort_by(|a, b| a.extension.cmp(&b.extension));

    for assessment in &assessments {
        logger.debug(&format!(
            "{}: {} ({})",
            assessment.extension, assessment.score.value, assessment.score.grade
        ));
    }
    Ok(assessments)
}

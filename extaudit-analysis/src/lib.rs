//! extaudit analysis - staged pipeline, scoring and bulk assessment
//!
//! This crate builds on `extaudit-core`:
//! - [`pipeline::ExtensionPipeline`] runs the six audit stages, fanning the
//!   browser-load and runtime stages out per target browser
//! - [`scoring::ScoringEngine`] reduces an [`record::ExtensionRecord`] to a
//!   weighted score and letter grade
//! - [`bulk`] scores every extension in a directory in parallel
//!
//! Real browser control is behind the [`automation::BrowserAutomation`] trait.

#![warn(clippy::all, clippy::pedantic)]

pub mod automation;
pub mod bulk;
pub mod pipeline;
pub mod record;
pub mod runtime;
pub mod scoring;

// Re-export main types for convenience
pub use automation::{AutomationOutcome, BrowserAutomation, LaunchRequest, StaticLoadCheck};
pub use bulk::{assess_all, assess_all_with, discover_extensions, Assessment};
pub use pipeline::{
    ExtensionPipeline, PipelineConfig, PipelineResult, PipelineSummary, Stage, StageOutcome,
    StageRecord, StageResult,
};
pub use record::{ExtensionMeta, ExtensionRecord, PerformanceMetrics};
pub use scoring::{calculate_final_score, FinalScore, Grade, ScoringConfig, ScoringEngine};

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, extaudit_core::Error>;

//! Data models shared by the rule engine, scanners and pipeline

pub mod browser;
pub mod finding;
pub mod manifest;
pub mod validation;

pub use browser::{BrowserKind, Store};
pub use finding::{Finding, FindingCategory, RiskTier, Severity};
pub use manifest::{ActionConfig, Background, ContentScript, ExternallyConnectable, ManifestDocument};
pub use validation::ValidationResult;

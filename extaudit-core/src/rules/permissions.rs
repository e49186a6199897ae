//! Permission risk tiers

use crate::models::RiskTier;
use std::collections::HashMap;

lazy_static::lazy_static! {
    /// API permission -> sensitivity tier. Unlisted permissions carry no tier.
    static ref PERMISSION_RISK: HashMap<&'static str, RiskTier> = {
        let mut table = HashMap::new();
        // Low
        table.insert("storage", RiskTier::Low);
        table.insert("alarms", RiskTier::Low);
        table.insert("contextMenus", RiskTier::Low);
        table.insert("notifications", RiskTier::Low);
        table.insert("activeTab", RiskTier::Low);
        // Medium
        table.insert("tabs", RiskTier::Medium);
        table.insert("bookmarks", RiskTier::Medium);
        table.insert("clipboardRead", RiskTier::Medium);
        table.insert("clipboardWrite", RiskTier::Medium);
        // High
        table.insert("cookies", RiskTier::High);
        table.insert("webRequest", RiskTier::High);
        table.insert("history", RiskTier::High);
        table.insert("downloads", RiskTier::High);
        table.insert("management", RiskTier::High);
        // Critical
        table.insert("webRequestBlocking", RiskTier::Critical);
        table.insert("nativeMessaging", RiskTier::Critical);
        table.insert("proxy", RiskTier::Critical);
        table.insert("debugger", RiskTier::Critical);
        table
    };
}

/// Risk tier of an API permission, if it is one we classify
pub fn permission_risk(permission: &str) -> Option<RiskTier> {
    PERMISSION_RISK.get(permission).copied()
}

/// Highest tier among `permissions`, `Low` when none are classified
pub fn max_permission_risk<'a, I>(permissions: I) -> RiskTier
where
    I: IntoIterator<Item = &'a String>,
{
    permissions
        .into_iter()
        .filter_map(|p| permission_risk(p))
        .max()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_tiers() {
        assert_eq!(permission_risk("tabs"), Some(RiskTier::Medium));
        assert_eq!(permission_risk("cookies"), Some(RiskTier::High));
        assert_eq!(permission_risk("debugger"), Some(RiskTier::Critical));
        assert_eq!(permission_risk("storage"), Some(RiskTier::Low));
        assert_eq!(permission_risk("identity"), None);
    }

    #[test]
    fn test_max_risk() {
        let perms = vec!["storage".to_string(), "history".to_string(), "tabs".to_string()];
        assert_eq!(max_permission_risk(&perms), RiskTier::High);
        assert_eq!(max_permission_risk(&Vec::new()), RiskTier::Low);
    }
}

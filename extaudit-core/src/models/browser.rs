//! Target browsers and extension stores

use serde::{Deserialize, Serialize};

/// A browser an extension can be validated or loaded against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Firefox,
    Edge,
    Opera,
    Safari,
}

impl BrowserKind {
    pub const ALL: [Self; 5] = [
        Self::Chrome,
        Self::Firefox,
        Self::Edge,
        Self::Opera,
        Self::Safari,
    ];

    /// Lowercase identifier, matching the serde representation
    pub const fn key(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
            Self::Edge => "edge",
            Self::Opera => "opera",
            Self::Safari => "safari",
        }
    }

    /// Chromium-based browsers share the `chrome.*` API surface
    pub const fn is_chromium(self) -> bool {
        matches!(self, Self::Chrome | Self::Edge | Self::Opera)
    }
}

impl std::fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Chrome => "Chrome",
            Self::Firefox => "Firefox",
            Self::Edge => "Edge",
            Self::Opera => "Opera",
            Self::Safari => "Safari",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for BrowserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chrome" | "chromium" => Ok(Self::Chrome),
            "firefox" => Ok(Self::Firefox),
            "edge" | "msedge" => Ok(Self::Edge),
            "opera" => Ok(Self::Opera),
            "safari" => Ok(Self::Safari),
            _ => Err(format!(
                "Invalid browser: '{s}'. Valid options: chrome, firefox, edge, opera, safari"
            )),
        }
    }
}

/// Extension stores checked for publication readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Store {
    ChromeWebStore,
    EdgeAddons,
    FirefoxAmo,
}

impl Store {
    pub const ALL: [Self; 3] = [Self::ChromeWebStore, Self::EdgeAddons, Self::FirefoxAmo];

    /// Icon sizes the store listing requires
    pub const fn required_icon_sizes(self) -> &'static [u32] {
        match self {
            Self::ChromeWebStore | Self::EdgeAddons => &[16, 48, 128],
            Self::FirefoxAmo => &[48, 96],
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::ChromeWebStore => "chrome",
            Self::EdgeAddons => "edge",
            Self::FirefoxAmo => "firefox",
        }
    }
}

impl std::fmt::Display for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ChromeWebStore => "Chrome Web Store",
            Self::EdgeAddons => "Edge Add-ons",
            Self::FirefoxAmo => "Firefox Add-ons",
        };
        write!(f, "{name}")
    }
}

//! Browser compatibility detection

use crate::models::{BrowserKind, ManifestDocument};
use std::collections::BTreeSet;

/// Browsers that can load this manifest.
///
/// Pure: depends only on the manifest and never mutates it.
/// - MV2: Chrome, Edge, Opera, Firefox
/// - MV3: Chrome, Edge, Opera; Firefox only with `browser_specific_settings`
/// - Safari: any MV3 manifest, or one that mentions safari
pub fn detect_compatibility(manifest: &ManifestDocument) -> BTreeSet<BrowserKind> {
    let mut browsers = BTreeSet::new();

    match manifest.manifest_version {
        Some(2) => {
            browsers.extend([
                BrowserKind::Chrome,
                BrowserKind::Edge,
                BrowserKind::Opera,
                BrowserKind::Firefox,
            ]);
        }
        Some(3) => {
            browsers.extend([BrowserKind::Chrome, BrowserKind::Edge, BrowserKind::Opera]);
            if manifest.has_browser_specific_settings {
                browsers.insert(BrowserKind::Firefox);
            }
        }
        _ => {}
    }

    if manifest.is_mv3() || manifest.mentions("safari") {
        browsers.insert(BrowserKind::Safari);
    }

    browsers
}

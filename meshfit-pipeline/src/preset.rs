//! Deployment presets
//!
//! A fixed table of face budgets and texture sizes keyed by target platform
//! and quality tier. Resolution is total: unknown platform strings use the
//! `unity` row and unknown quality strings use the `balanced` column of
//! whichever row was picked.

use log::warn;
use meshfit_core::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Unity,
    Blender,
    Web,
    Mobile,
}

/// Quality tier within a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    High,
    Balanced,
    Performance,
}

/// Row used for unrecognized platforms
pub const DEFAULT_PLATFORM: Platform = Platform::Unity;
/// Column used for unrecognized quality tiers
pub const DEFAULT_QUALITY: Quality = Quality::Balanced;

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Unity,
        Platform::Blender,
        Platform::Web,
        Platform::Mobile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Unity => "unity",
            Platform::Blender => "blender",
            Platform::Web => "web",
            Platform::Mobile => "mobile",
        }
    }

    fn row(self) -> usize {
        match self {
            Platform::Unity => 0,
            Platform::Blender => 1,
            Platform::Web => 2,
            Platform::Mobile => 3,
        }
    }

    /// Parse case-insensitively, falling back to [`DEFAULT_PLATFORM`].
    pub fn parse_lossy(s: &str) -> Platform {
        s.parse().unwrap_or_else(|_| {
            warn!("Unknown platform '{}', using '{}'", s, DEFAULT_PLATFORM);
            DEFAULT_PLATFORM
        })
    }
}

impl Quality {
    pub const ALL: [Quality; 3] = [Quality::High, Quality::Balanced, Quality::Performance];

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::High => "high",
            Quality::Balanced => "balanced",
            Quality::Performance => "performance",
        }
    }

    fn column(self) -> usize {
        match self {
            Quality::High => 0,
            Quality::Balanced => 1,
            Quality::Performance => 2,
        }
    }

    /// Parse case-insensitively, falling back to [`DEFAULT_QUALITY`].
    pub fn parse_lossy(s: &str) -> Quality {
        s.parse().unwrap_or_else(|_| {
            warn!("Unknown quality '{}', using '{}'", s, DEFAULT_QUALITY);
            DEFAULT_QUALITY
        })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::InvalidParameter(format!("unknown platform '{}'", s)))
    }
}

impl FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Quality::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::InvalidParameter(format!("unknown quality '{}'", s)))
    }
}

/// Face budget and texture size for one (platform, quality) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Preset {
    pub target_face_count: usize,
    /// Atlas side length in texels
    pub texture_resolution: u32,
}

const fn preset(target_face_count: usize, texture_resolution: u32) -> Preset {
    Preset {
        target_face_count,
        texture_resolution,
    }
}

/// Rows follow [`Platform::ALL`], columns follow [`Quality::ALL`]
const PRESETS: [[Preset; 3]; 4] = [
    [preset(15000, 4096), preset(8000, 2048), preset(3000, 1024)],
    [preset(20000, 4096), preset(10000, 2048), preset(5000, 1024)],
    [preset(10000, 2048), preset(5000, 1024), preset(2000, 512)],
    [preset(5000, 1024), preset(3000, 512), preset(1500, 256)],
];

/// Lookup into the preset table
#[derive(Debug, Clone, Copy, Default)]
pub struct PresetResolver;

impl PresetResolver {
    pub fn resolve(platform: Platform, quality: Quality) -> Preset {
        PRESETS[platform.row()][quality.column()]
    }

    /// Resolve raw configuration strings; never fails.
    pub fn resolve_str(platform: &str, quality: &str) -> Preset {
        Self::resolve(Platform::parse_lossy(platform), Quality::parse_lossy(quality))
    }

    /// Every table entry in row-major order.
    pub fn entries() -> impl Iterator<Item = (Platform, Quality, Preset)> {
        Platform::ALL.into_iter().flat_map(|p| {
            Quality::ALL
                .into_iter()
                .map(move |q| (p, q, Self::resolve(p, q)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_values() {
        assert_eq!(PresetResolver::resolve(Platform::Unity, Quality::High), preset(15000, 4096));
        assert_eq!(PresetResolver::resolve(Platform::Unity, Quality::Balanced), preset(8000, 2048));
        assert_eq!(PresetResolver::resolve(Platform::Blender, Quality::High), preset(20000, 4096));
        assert_eq!(PresetResolver::resolve(Platform::Web, Quality::Performance), preset(2000, 512));
        assert_eq!(PresetResolver::resolve(Platform::Mobile, Quality::Balanced), preset(3000, 512));
        assert_eq!(PresetResolver::resolve(Platform::Mobile, Quality::Performance), preset(1500, 256));
    }

    #[test]
    fn test_all_entries_valid() {
        let entries: Vec<_> = PresetResolver::entries().collect();
        assert_eq!(entries.len(), 12);
        for (platform, quality, preset) in entries {
            assert!(preset.target_face_count > 0, "{}/{}", platform, quality);
            assert!(preset.texture_resolution.is_power_of_two());
        }
    }

    #[test]
    fn test_quality_orders_budgets() {
        for platform in Platform::ALL {
            let high = PresetResolver::resolve(platform, Quality::High);
            let balanced = PresetResolver::resolve(platform, Quality::Balanced);
            let performance = PresetResolver::resolve(platform, Quality::Performance);
            assert!(high.target_face_count > balanced.target_face_count);
            assert!(balanced.target_face_count > performance.target_face_count);
        }
    }

    #[test]
    fn test_parse_strict() {
        assert_eq!("Unity".parse::<Platform>().unwrap(), Platform::Unity);
        assert_eq!(" MOBILE ".parse::<Platform>().unwrap(), Platform::Mobile);
        assert_eq!("performance".parse::<Quality>().unwrap(), Quality::Performance);
        assert!(matches!("spaceship".parse::<Platform>(), Err(Error::InvalidParameter(_))));
        assert!("ultra".parse::<Quality>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for platform in Platform::ALL {
            assert_eq!(platform.to_string().parse::<Platform>().unwrap(), platform);
        }
        for quality in Quality::ALL {
            assert_eq!(quality.to_string().parse::<Quality>().unwrap(), quality);
        }
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(PresetResolver::resolve_str("spaceship", "high"), preset(15000, 4096));
        assert_eq!(PresetResolver::resolve_str("web", "ultra"), preset(5000, 1024));
        assert_eq!(PresetResolver::resolve_str("", ""), preset(8000, 2048));
        assert_eq!(PresetResolver::resolve_str("BLENDER", "Performance"), preset(5000, 1024));
    }

    #[test]
    fn test_parse_lossy() {
        assert_eq!(Platform::parse_lossy("mobile"), Platform::Mobile);
        assert_eq!(Quality::parse_lossy("nonsense"), Quality::Balanced);
    }
}

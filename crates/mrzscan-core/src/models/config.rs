//! Configuration structures for a scan session.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mrzscan_engine::{DocumentType, EngineParams};

use crate::error::{ConfigError, Result};
use crate::geometry::{CameraFacing, ViewfinderSpec};

/// Main configuration for the scan pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Recognition engine tuning.
    pub engine: EngineParams,

    /// What to scan and how.
    pub scan: ScanOptions,

    /// Guide frame geometry.
    pub viewfinder: ViewfinderSpec,
}

/// Which parts of a document complete a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Complete as soon as the MRZ is read.
    #[default]
    MrzOnly,
    /// Read the MRZ, then require the face, flipping the document if the
    /// face is on the other side.
    FaceRequired,
    /// Capture the face side first, then the MRZ side.
    FaceFirst,
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "mrz_only" | "mrz" => Ok(Self::MrzOnly),
            "face_required" | "face" => Ok(Self::FaceRequired),
            "face_first" => Ok(Self::FaceFirst),
            other => Err(format!("unknown scan mode: {}", other)),
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MrzOnly => "mrz_only",
            Self::FaceRequired => "face_required",
            Self::FaceFirst => "face_first",
        })
    }
}

/// Scan session options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Document family hint.
    pub document_type: DocumentType,

    /// Camera to start with.
    pub camera_facing: CameraFacing,

    /// Completion policy.
    pub mode: ScanMode,

    /// Mirror front-camera frames horizontally.
    pub mirror_front_camera: bool,
}

impl ScanConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let engine = &self.engine;
        let percentages = [
            ("engine.blur_percentage", engine.blur_percentage),
            ("engine.face_blur_percentage", engine.face_blur_percentage),
            ("engine.glare_min_percentage", engine.glare_min_percentage),
            ("engine.glare_max_percentage", engine.glare_max_percentage),
            ("engine.low_light_tolerance", engine.low_light_tolerance),
        ];
        if let Some((field, value)) = percentages.into_iter().find(|(_, v)| *v > 100) {
            return Err(ConfigError::Percentage { field, value });
        }
        if engine.glare_min_percentage > engine.glare_max_percentage {
            return Err(ConfigError::GlareRange {
                min: engine.glare_min_percentage,
                max: engine.glare_max_percentage,
            });
        }
        self.viewfinder.validate()
    }

    /// Read a value by dotted key, e.g. `engine.blur_percentage`.
    pub fn get(&self, key: &str) -> std::result::Result<Value, ConfigError> {
        let root = serde_json::to_value(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        key.split('.')
            .try_fold(&root, |node, part| node.get(part))
            .cloned()
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
    }

    /// Set a value by dotted key. The value is read as JSON, falling back
    /// to a plain string.
    pub fn set(&mut self, key: &str, raw: &str) -> std::result::Result<(), ConfigError> {
        let mut root =
            serde_json::to_value(&*self).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let slot = key
            .split('.')
            .try_fold(&mut root, |node, part| node.get_mut(part))
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        if slot.is_object() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        *slot = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        };
        let updated: Self = serde_json::from_value(root).map_err(|_| invalid())?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.engine.blur_percentage, 62);
        assert_eq!(config.engine.motion_threshold, 18);
        assert_eq!(config.scan.mode, ScanMode::MrzOnly);
        assert_eq!(config.scan.document_type, DocumentType::None);
        assert_eq!(config.viewfinder.guide_width, 600);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ScanConfig =
            serde_json::from_str(r#"{"scan": {"mode": "face_first"}}"#).unwrap();
        assert_eq!(config.scan.mode, ScanMode::FaceFirst);
        assert_eq!(config.engine, EngineParams::default());
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = ScanConfig::default();
        config.engine.blur_percentage = 120;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Percentage {
                field: "engine.blur_percentage",
                value: 120
            })
        );

        let mut config = ScanConfig::default();
        config.engine.glare_min_percentage = 90;
        config.engine.glare_max_percentage = 10;
        assert_eq!(
            config.validate(),
            Err(ConfigError::GlareRange { min: 90, max: 10 })
        );
    }

    #[test]
    fn test_get_and_set() {
        let mut config = ScanConfig::default();

        config.set("engine.blur_percentage", "50").unwrap();
        config.set("scan.document_type", "passport").unwrap();
        config.set("scan.mirror_front_camera", "true").unwrap();

        assert_eq!(config.engine.blur_percentage, 50);
        assert_eq!(config.scan.document_type, DocumentType::Passport);
        assert!(config.scan.mirror_front_camera);
        assert_eq!(config.get("engine.blur_percentage").unwrap(), Value::from(50));
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut config = ScanConfig::default();

        assert!(matches!(
            config.set("engine.nope", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            config.set("engine", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            config.set("scan.mode", "sideways"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("engine.low_light_tolerance", "101"),
            Err(ConfigError::Percentage { .. })
        ));
        assert_eq!(config, ScanConfig::default());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = ScanConfig::default();
        config.scan.mode = ScanMode::FaceRequired;
        config.save(&path).unwrap();

        assert_eq!(ScanConfig::from_file(&path).unwrap(), config);
    }
}

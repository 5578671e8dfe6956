//! Composition manifest: scenes, elements, and output parameters.
//!
//! The manifest is the only input the composer needs at construction. It is
//! plain JSON with camelCase keys:
//!
//! ```json
//! {
//!   "scenes": {
//!     "main": {
//!       "elements": {
//!         "camera": { "states": { "full": { "size": [1280, 720] } }, "initialState": "full" }
//!       }
//!     }
//!   },
//!   "initialScene": "main",
//!   "audio": { "channels": 2, "sampleRate": 48000 },
//!   "video": { "frameDuration": { "value": 1000, "scale": 30000 }, "width": 1280, "height": 720 }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use livemix_common::{LivemixError, RationalTime};
use serde::{Deserialize, Serialize};

use crate::state::DeclaredState;

/// Top-level composition description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Scenes keyed by scene id.
    pub scenes: BTreeMap<String, Scene>,

    /// Scene active after construction.
    pub initial_scene: String,

    #[serde(default)]
    pub audio: AudioOutput,

    #[serde(default)]
    pub video: VideoOutput,
}

/// A named arrangement of elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default)]
    pub elements: BTreeMap<String, Element>,
}

/// One slot in a scene, with its own state set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    #[serde(default)]
    pub states: BTreeMap<String, DeclaredState>,

    /// State applied (with zero duration) when the element is connected.
    #[serde(default)]
    pub initial_state: Option<String>,

    /// Parent element id within the same scene.
    #[serde(default)]
    pub parent: Option<String>,
}

/// Audio output parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioOutput {
    pub channels: u32,
    pub sample_rate: u32,
}

/// Picture output parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoOutput {
    /// Duration of one output frame.
    pub frame_duration: RationalTime,
    pub width: u32,
    pub height: u32,
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 48_000,
        }
    }
}

impl Default for VideoOutput {
    fn default() -> Self {
        Self {
            frame_duration: RationalTime::new(1000, 30_000),
            width: 1280,
            height: 720,
        }
    }
}

impl Manifest {
    /// Parse a manifest from JSON text. Does not validate.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json).map_err(|e| ManifestError::ParseError {
            path: None,
            source: e,
        })
    }

    /// Read, parse, and validate a manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ManifestError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let manifest: Manifest =
            serde_json::from_str(&json).map_err(|e| ManifestError::ParseError {
                path: Some(path.to_path_buf()),
                source: e,
            })?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn scene(&self, scene_id: &str) -> Option<&Scene> {
        self.scenes.get(scene_id)
    }

    /// Every element id declared by any scene.
    pub fn element_ids(&self) -> BTreeSet<String> {
        self.scenes
            .values()
            .flat_map(|scene| scene.elements.keys().cloned())
            .collect()
    }

    /// Fail on the first validation problem.
    pub fn validate(&self) -> Result<(), ManifestError> {
        match self.validation_errors().into_iter().next() {
            Some(message) => Err(ManifestError::ValidationError { message }),
            None => Ok(()),
        }
    }

    /// Collect every validation problem.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = vec![];

        if !self.scenes.contains_key(&self.initial_scene) {
            errors.push(format!(
                "initial scene '{}' is not declared",
                self.initial_scene
            ));
        }
        if !self.video.frame_duration.is_positive() {
            errors.push(format!(
                "video frame duration must be positive, got {}",
                self.video.frame_duration
            ));
        }
        if self.video.width == 0 || self.video.height == 0 {
            errors.push(format!(
                "canvas must be non-empty, got {}x{}",
                self.video.width, self.video.height
            ));
        }
        if self.audio.channels == 0 {
            errors.push("audio channel count must be at least 1".to_string());
        }
        if self.audio.sample_rate == 0 {
            errors.push("audio sample rate must be positive".to_string());
        }

        for (scene_id, scene) in &self.scenes {
            for (element_id, element) in &scene.elements {
                if let Some(initial) = &element.initial_state {
                    if !element.states.contains_key(initial) {
                        errors.push(format!(
                            "{scene_id}/{element_id}: initial state '{initial}' is not declared"
                        ));
                    }
                }
                if let Some(parent) = &element.parent {
                    if !scene.elements.contains_key(parent) {
                        errors.push(format!(
                            "{scene_id}/{element_id}: parent '{parent}' is not in the scene"
                        ));
                    }
                }
            }
            if let Some(cycle_at) = first_parent_cycle(scene) {
                errors.push(format!(
                    "{scene_id}: parent cycle through element '{cycle_at}'"
                ));
            }
        }

        errors
    }
}

fn first_parent_cycle(scene: &Scene) -> Option<&str> {
    for start in scene.elements.keys() {
        let mut seen = BTreeSet::new();
        let mut cursor = Some(start.as_str());
        while let Some(id) = cursor {
            if !seen.insert(id) {
                return Some(start.as_str());
            }
            cursor = scene
                .elements
                .get(id)
                .and_then(|element| element.parent.as_deref());
        }
    }
    None
}

/// Errors that can occur when loading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {}: {source}", describe_path(.path))]
    ParseError {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },

    #[error("Invalid manifest: {message}")]
    ValidationError { message: String },
}

fn describe_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "<inline manifest>".to_string(),
    }
}

impl From<ManifestError> for LivemixError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::IoError { source, .. } => LivemixError::Io(source),
            other => LivemixError::manifest(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SCENES: &str = r#"{
        "scenes": {
            "main": {
                "elements": {
                    "frame": { "states": { "a": { "size": [640, 360] } }, "initialState": "a" },
                    "cam": { "states": { "a": {} }, "parent": "frame" }
                }
            },
            "alt": { "elements": { "slide": {} } }
        },
        "initialScene": "main"
    }"#;

    #[test]
    fn test_defaults_for_omitted_output() {
        let manifest = Manifest::from_json(TWO_SCENES).unwrap();
        assert_eq!(manifest.audio.sample_rate, 48_000);
        assert_eq!(manifest.audio.channels, 2);
        assert_eq!(manifest.video.frame_duration, RationalTime::new(1000, 30_000));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_element_ids_are_union_of_scenes() {
        let manifest = Manifest::from_json(TWO_SCENES).unwrap();
        let ids: Vec<_> = manifest.element_ids().into_iter().collect();
        assert_eq!(ids, vec!["cam", "frame", "slide"]);
    }

    #[test]
    fn test_unknown_initial_scene_rejected() {
        let mut manifest = Manifest::from_json(TWO_SCENES).unwrap();
        manifest.initial_scene = "missing".to_string();
        let err = manifest.validate().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_parent_cycle_rejected() {
        let mut manifest = Manifest::from_json(TWO_SCENES).unwrap();
        let main = manifest.scenes.get_mut("main").unwrap();
        main.elements.get_mut("frame").unwrap().parent = Some("cam".to_string());
        let errors = manifest.validation_errors();
        assert!(errors.iter().any(|e| e.contains("parent cycle")));
    }

    #[test]
    fn test_dangling_initial_state_and_parent() {
        let mut manifest = Manifest::from_json(TWO_SCENES).unwrap();
        let main = manifest.scenes.get_mut("main").unwrap();
        main.elements.get_mut("cam").unwrap().initial_state = Some("nope".to_string());
        main.elements.get_mut("cam").unwrap().parent = Some("ghost".to_string());
        let errors = manifest.validation_errors();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_bad_output_parameters() {
        let mut manifest = Manifest::from_json(TWO_SCENES).unwrap();
        manifest.video.frame_duration = RationalTime::new(0, 30_000);
        manifest.video.width = 0;
        manifest.audio.channels = 0;
        manifest.audio.sample_rate = 0;
        assert_eq!(manifest.validation_errors().len(), 4);
    }

    #[test]
    fn test_parse_error_converts_to_livemix_error() {
        let err = Manifest::from_json("{ not json").unwrap_err();
        let err: LivemixError = err.into();
        assert!(matches!(err, LivemixError::Manifest { .. }));
    }
}

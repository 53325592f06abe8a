//! Environment detection for the artifact scanner.
//!
//! Images arrive as data URLs (`data:image/jpeg;base64,...`) or bare base64.
//! An `EnvironmentAnalyzer` turns them into an `EnvironmentDetection` whose
//! suggestions pick the artifact kind to claim. The hosted vision model is
//! not wired here; `OfflineAnalyzer` is the local stand-in.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::ledger::ArtifactKind;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("empty image payload")]
    Empty,
    #[error("malformed data url")]
    MalformedDataUrl,
    #[error("unsupported media type {0}")]
    UnsupportedMime(String),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn from_data_url(input: &str) -> Result<Self, ScanError> {
        let input = input.trim();
        let (mime, encoded) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, body) = rest.split_once(',').ok_or(ScanError::MalformedDataUrl)?;
                let mime = header
                    .strip_suffix(";base64")
                    .ok_or(ScanError::MalformedDataUrl)?;
                if !mime.starts_with("image/") {
                    return Err(ScanError::UnsupportedMime(mime.to_string()));
                }
                (Some(mime.to_string()), body)
            }
            None => (None, input),
        };
        if encoded.is_empty() {
            return Err(ScanError::Empty);
        }
        let bytes = general_purpose::STANDARD.decode(encoded)?;
        if bytes.is_empty() {
            return Err(ScanError::Empty);
        }
        Ok(Self { mime, bytes })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentDetection {
    pub environment: String,
    pub confidence: f64,
    pub description: String,
    pub suggested_artifacts: Vec<String>,
}

impl EnvironmentDetection {
    /// Artifact kind for the first suggestion; mushrooms when nothing matches.
    pub fn suggested_kind(&self) -> ArtifactKind {
        self.suggested_artifacts
            .first()
            .map(|s| ArtifactKind::from_name(s))
            .unwrap_or(ArtifactKind::Mushroom)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EnvironmentDetection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn ok(data: EnvironmentDetection) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

pub trait EnvironmentAnalyzer {
    fn name(&self) -> &'static str;
    fn analyze(&self, image: &ImagePayload) -> AnalysisResult;
}

/// Run `primary`, falling back to `fallback` when it does not succeed.
pub fn analyze_with_fallback(
    primary: &dyn EnvironmentAnalyzer,
    fallback: &dyn EnvironmentAnalyzer,
    image: &ImagePayload,
) -> AnalysisResult {
    let result = primary.analyze(image);
    if result.success {
        return result;
    }
    warn!(
        analyzer = primary.name(),
        error = result.error.as_deref().unwrap_or("unknown"),
        "analysis failed, using fallback"
    );
    fallback.analyze(image)
}

struct Scene {
    environment: &'static str,
    description: &'static str,
    suggestions: &'static [&'static str],
}

const SCENES: [Scene; 6] = [
    Scene {
        environment: "forest",
        description: "Dense vegetation and shaded ground cover",
        suggestions: &["Mushroom", "Fossil"],
    },
    Scene {
        environment: "urban",
        description: "Built surfaces, walls and street furniture",
        suggestions: &["Graffiti", "Pixel Plant"],
    },
    Scene {
        environment: "beach",
        description: "Sand, water line and exposed rock",
        suggestions: &["Fossil"],
    },
    Scene {
        environment: "park",
        description: "Open lawn with scattered trees",
        suggestions: &["Mushroom", "Pixel Plant"],
    },
    Scene {
        environment: "mountain",
        description: "Steep terrain and bare stone",
        suggestions: &["Fossil", "Mushroom"],
    },
    Scene {
        environment: "indoor",
        description: "Enclosed space under artificial light",
        suggestions: &["Pixel Plant"],
    },
];

/// Deterministic analyzer keyed on the image digest. Same bytes, same scene.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineAnalyzer;

impl EnvironmentAnalyzer for OfflineAnalyzer {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn analyze(&self, image: &ImagePayload) -> AnalysisResult {
        if image.bytes.is_empty() {
            return AnalysisResult::failed("empty image");
        }
        let digest = Sha256::digest(&image.bytes);
        let scene = &SCENES[digest[0] as usize % SCENES.len()];
        let confidence = 0.55 + (digest[1] as f64 / 255.0) * 0.4;
        debug!(environment = scene.environment, confidence, "offline analysis");
        AnalysisResult::ok(EnvironmentDetection {
            environment: scene.environment.to_string(),
            confidence,
            description: scene.description.to_string(),
            suggested_artifacts: scene.suggestions.iter().map(|s| s.to_string()).collect(),
        })
    }
}

/// Coarse location key: `floor(lat*1000)_floor(lng*1000)`.
pub fn location_hash(lat: f64, lng: f64) -> String {
    format!(
        "{}_{}",
        (lat * 1000.0).floor() as i64,
        (lng * 1000.0).floor() as i64
    )
}

/// Location string recorded on claimed artifacts.
pub fn format_location(lat: f64, lng: f64) -> String {
    format!("{lat:.6}, {lng:.6}")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unavailable;

    impl EnvironmentAnalyzer for Unavailable {
        fn name(&self) -> &'static str {
            "remote"
        }

        fn analyze(&self, _image: &ImagePayload) -> AnalysisResult {
            AnalysisResult::failed("service unavailable")
        }
    }

    fn payload() -> ImagePayload {
        let encoded = general_purpose::STANDARD.encode(b"not really a jpeg");
        ImagePayload::from_data_url(&format!("data:image/jpeg;base64,{encoded}")).unwrap()
    }

    #[test]
    fn data_url_and_bare_base64_decode_alike() {
        let encoded = general_purpose::STANDARD.encode(b"pixels");
        let url = ImagePayload::from_data_url(&format!("data:image/png;base64,{encoded}")).unwrap();
        let bare = ImagePayload::from_data_url(&encoded).unwrap();
        assert_eq!(url.mime.as_deref(), Some("image/png"));
        assert_eq!(url.bytes, bare.bytes);
    }

    #[test]
    fn rejects_bad_payloads() {
        assert!(matches!(
            ImagePayload::from_data_url(""),
            Err(ScanError::Empty)
        ));
        assert!(matches!(
            ImagePayload::from_data_url("data:text/plain;base64,aGk="),
            Err(ScanError::UnsupportedMime(_))
        ));
        assert!(matches!(
            ImagePayload::from_data_url("data:image/png,raw"),
            Err(ScanError::MalformedDataUrl)
        ));
        assert!(matches!(
            ImagePayload::from_data_url("!!!"),
            Err(ScanError::Base64(_))
        ));
    }

    #[test]
    fn offline_analysis_is_deterministic() {
        let image = payload();
        let a = OfflineAnalyzer.analyze(&image);
        let b = OfflineAnalyzer.analyze(&image);
        assert_eq!(a, b);
        let data = a.data.unwrap();
        assert!((0.55..=0.95).contains(&data.confidence));
        assert!(!data.suggested_artifacts.is_empty());
    }

    #[test]
    fn fallback_kicks_in_on_failure() {
        let result = analyze_with_fallback(&Unavailable, &OfflineAnalyzer, &payload());
        assert!(result.success);
        assert!(result.error.is_none());
    }

    #[test]
    fn suggestions_map_to_kinds() {
        let detection = EnvironmentDetection {
            environment: "urban".into(),
            confidence: 0.8,
            description: String::new(),
            suggested_artifacts: vec!["Graffiti".into()],
        };
        assert_eq!(detection.suggested_kind(), ArtifactKind::Graffiti);
        let empty = EnvironmentDetection {
            suggested_artifacts: vec![],
            ..detection
        };
        assert_eq!(empty.suggested_kind(), ArtifactKind::Mushroom);
        let json = serde_json::to_value(&empty).unwrap();
        assert!(json.get("suggestedArtifacts").is_some());
    }

    #[test]
    fn location_helpers() {
        assert_eq!(location_hash(51.5007, -0.1246), "51500_-125");
        assert_eq!(format_location(1.5, -2.25), "1.500000, -2.250000");
    }
}

//! Stack metadata sidecars.
//!
//! The camera writes one `Stack_<pattern>.json` file per stack into the
//! location's `Images/` directory. Only the `"Camera Info"` object is of
//! interest here; the rest of the sidecar is ignored. Firmware revisions
//! disagree on whether numeric fields are written as JSON numbers or as
//! strings, so the exposure and gain fields accept either form.

use std::path::Path;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use thiserror::Error;

/// Errors reading a stack metadata sidecar.
#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("failed to read sidecar: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse sidecar: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A parsed `Stack_<pattern>.json` sidecar.
#[derive(Debug, Clone, Deserialize)]
pub struct StackSidecar {
    #[serde(rename = "Camera Info")]
    pub camera_info: CameraInfo,
}

/// The `"Camera Info"` object of a sidecar.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraInfo {
    /// Number of frames the camera intended to collect for this stack.
    #[serde(rename = "Stack Count")]
    pub stack_count: u32,

    /// Nominal per-frame exposure time in seconds.
    #[serde(
        rename = "Exposure (seconds)",
        deserialize_with = "number_or_string_f64"
    )]
    pub exposure_seconds: f64,

    /// Gain setting, an opaque token used verbatim in dark-frame filenames.
    #[serde(rename = "Gain Setting", deserialize_with = "opaque_token")]
    pub gain: String,
}

impl StackSidecar {
    /// Load and parse a sidecar from disk.
    pub fn load(path: &Path) -> Result<Self, SidecarError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn number_or_string_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(v) => Ok(v),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid numeric value {s:?}"))),
    }
}

fn opaque_token<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Integer(i64),
        Number(f64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Integer(v) => v.to_string(),
        Raw::Number(v) => v.to_string(),
        Raw::Text(s) => s,
    })
}

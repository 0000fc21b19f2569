//! Stack discovery.
//!
//! Scans a location's `Images/` directory for `Stack_<pattern>.json`
//! metadata sidecars and builds an ordered map of stacks worth processing.
//! Stacks below the minimum declared frame count are skipped; a missing
//! location yields an empty map with a diagnostic rather than an error.

use std::collections::BTreeMap;
use std::path::Path;

use glob::glob;
use tracing::{debug, warn};

use crate::metadata::StackSidecar;

/// Stacks with a declared frame count at or below this are skipped by
/// default; short stacks are not worth a calibration run.
pub const DEFAULT_MIN_STACK_COUNT: u32 = 20;

/// Subdirectory of a location holding the metadata sidecars.
pub const IMAGES_DIR: &str = "Images";

/// Subdirectory of a location holding the raw exposure frames.
pub const RAW_DIR: &str = "Raw";

/// Discovered attributes of one stack, derived from its sidecar.
#[derive(Debug, Clone, PartialEq)]
pub struct StackInfo {
    /// Nominal per-frame exposure time in seconds.
    pub exposure_seconds: f64,
    /// Number of frames the camera declared for this stack.
    pub stack_count: u32,
    /// Declared integration time: exposure × stack count.
    pub total_exposure_seconds: f64,
    /// Gain token, carried through to dark-frame resolution.
    pub gain: String,
}

/// Find all processable stacks under `root`.
///
/// Returns an ordered map from pattern token to [`StackInfo`]. Only stacks
/// whose declared count strictly exceeds `min_stack_count` are admitted.
/// A missing root or `Images/` directory yields an empty map; malformed
/// sidecars are warned about and skipped.
pub fn find_stacks(root: &Path, min_stack_count: u32) -> BTreeMap<String, StackInfo> {
    let mut stacks = BTreeMap::new();

    if !root.exists() {
        warn!("could not find path {}", root.display());
        return stacks;
    }

    let sidecar_glob = root.join(IMAGES_DIR).join("Stack_*.json");
    let entries = match glob(&sidecar_glob.to_string_lossy()) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("invalid sidecar glob {}: {e}", sidecar_glob.display());
            return stacks;
        }
    };

    for path in entries.flatten() {
        let Some(pattern) = pattern_from_sidecar(&path) else {
            continue;
        };
        let sidecar = match StackSidecar::load(&path) {
            Ok(sidecar) => sidecar,
            Err(e) => {
                warn!("skipping malformed sidecar {}: {e}", path.display());
                continue;
            }
        };

        let info = &sidecar.camera_info;
        if info.stack_count <= min_stack_count {
            debug!(
                "skipping {pattern}: stack count {} is at or below minimum {min_stack_count}",
                info.stack_count
            );
            continue;
        }

        stacks.insert(
            pattern,
            StackInfo {
                exposure_seconds: info.exposure_seconds,
                stack_count: info.stack_count,
                total_exposure_seconds: info.exposure_seconds * f64::from(info.stack_count),
                gain: info.gain.clone(),
            },
        );
    }

    stacks
}

/// Extract the pattern token from a `Stack_<pattern>.json` path.
fn pattern_from_sidecar(path: &Path) -> Option<String> {
    path.file_stem()?
        .to_str()?
        .strip_prefix("Stack_")
        .map(str::to_string)
}

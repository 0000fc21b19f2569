//! Master dark frame resolution.
//!
//! The camera ships a library of pre-built master darks under
//! `<location>/DarkLibrary/`, named by the conditions they were collected at:
//!
//! ```text
//! StackDark_<00C|±NC>_<NN>_<gain>.fit
//! ```
//!
//! Temperatures within ±0.1 °C of zero use the literal `00C` token so the
//! sign of a rounded-to-zero reading cannot change the filename. A missing
//! dark is a warning, never an error: calibration proceeds without dark
//! subtraction and the caller must omit the dark argument.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Subdirectory of a location holding the master dark library.
pub const DARK_LIBRARY_DIR: &str = "DarkLibrary";

/// Build the library filename for a dark matching the given conditions.
///
/// `gain` is the sidecar's gain token, used verbatim.
pub fn dark_frame_name(temperature_c: f64, exposure_seconds: i32, gain: &str) -> String {
    if temperature_c > -0.1 && temperature_c < 0.1 {
        format!("StackDark_00C_{exposure_seconds:02}_{gain}.fit")
    } else {
        format!("StackDark_{temperature_c:.0}C_{exposure_seconds:02}_{gain}.fit")
    }
}

/// Resolve a master dark under `<root>/DarkLibrary/`.
///
/// Returns the path when the file exists, or `None` (with a user-visible
/// warning) when it does not. `None` means "calibrate without a dark".
pub fn resolve_dark_frame(
    root: &Path,
    temperature_c: f64,
    exposure_seconds: i32,
    gain: &str,
) -> Option<PathBuf> {
    let path = root
        .join(DARK_LIBRARY_DIR)
        .join(dark_frame_name(temperature_c, exposure_seconds, gain));
    if path.exists() {
        info!("  dark frame: {}", path.display());
        Some(path)
    } else {
        warn!(
            "  dark frame {} does not exist; calibrating without dark subtraction",
            path.display()
        );
        None
    }
}

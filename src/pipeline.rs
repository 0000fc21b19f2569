//! Per-object processing pipeline.
//!
//! Each object runs through a fixed stage sequence:
//!
//! ```text
//! LINK_RAW_FILES -> CONVERT -> CALIBRATE -> REGISTER -> STACK -> DONE
//! ```
//!
//! Linking is pure filesystem work and is always attempted (create-once,
//! no-op when a link already exists). The four Siril stages are gated on
//! their canonical output files: the driver resumes after the furthest
//! completed artifact, so a finished object issues zero commands and an
//! interrupted one retries exactly the stages whose outputs are missing.
//! That existence check doubles as the retry mechanism; there is no other
//! failure tracking.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::siril::{CommandSink, SirilCommand, SirilError};

/// Errors from the pipeline driver.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Siril(#[from] SirilError),
}

/// The Siril-backed stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Convert,
    Calibrate,
    Register,
    Stack,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 4] = [Stage::Convert, Stage::Calibrate, Stage::Register, Stage::Stack];

    /// The stage's name as it appears in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Convert => "convert",
            Stage::Calibrate => "calibrate",
            Stage::Register => "register",
            Stage::Stack => "stack",
        }
    }

    /// Canonical output filename of this stage for an object.
    pub fn output_name(&self, object: &str) -> String {
        match self {
            Stage::Convert => format!("{object}.fit"),
            Stage::Calibrate => format!("pp_{object}.fit"),
            Stage::Register => format!("r_pp_{object}.fit"),
            Stage::Stack => format!("r_pp_{object}_stacked.fit"),
        }
    }

    fn command(&self, object: &str, object_dir: &Path, dark: Option<&Path>) -> SirilCommand {
        match self {
            Stage::Convert => SirilCommand::Convert {
                sequence: object.to_string(),
                out_dir: object_dir.to_path_buf(),
            },
            Stage::Calibrate => SirilCommand::Calibrate {
                sequence: object.to_string(),
                dark: dark.map(Path::to_path_buf),
            },
            Stage::Register => SirilCommand::Register {
                sequence: format!("pp_{object}"),
            },
            Stage::Stack => SirilCommand::Stack {
                sequence: format!("r_pp_{object}"),
            },
        }
    }
}

/// Link raw frames into the object directory under normalized names.
///
/// The variable exposure/temperature suffix is stripped: the link name is
/// the first four `_`-separated components plus the original extension
/// (`exp_M31_0001_10sec_-5C.fit` becomes `exp_M31_0001_10sec.fit`).
/// Existing links are left alone, so re-running is a no-op.
///
/// Returns the number of links created.
pub fn link_raw_files(raw_files: &[PathBuf], object_dir: &Path) -> Result<usize, PipelineError> {
    let mut created = 0;
    for file in raw_files {
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let link = object_dir.join(linked_name(name));
        if link.exists() {
            continue;
        }
        // Absolute target so the link survives being read from any cwd.
        let target = file.canonicalize()?;
        make_link(&target, &link)?;
        created += 1;
    }
    Ok(created)
}

#[cfg(unix)]
fn make_link(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn make_link(target: &Path, link: &Path) -> std::io::Result<()> {
    std::fs::hard_link(target, link)
}

fn linked_name(file_name: &str) -> String {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let base: Vec<&str> = file_name.split('_').take(4).collect();
    let mut name = base.join("_");
    if !extension.is_empty() {
        name.push('.');
        name.push_str(extension);
    }
    name
}

/// Run the Siril stages for one object, skipping completed work.
///
/// The driver resumes after the furthest existing canonical output. When
/// everything is already done, no command is issued at all, including the
/// leading `cd` (pipeline idempotence).
pub fn run_stages(
    sink: &mut dyn CommandSink,
    object: &str,
    object_dir: &Path,
    dark: Option<&Path>,
) -> Result<(), PipelineError> {
    let done_through = Stage::ALL
        .iter()
        .rposition(|stage| object_dir.join(stage.output_name(object)).exists());
    let resume_from = done_through.map_or(0, |i| i + 1);

    for stage in &Stage::ALL[..resume_from] {
        info!(
            "{} exists; skipping {} step",
            stage.output_name(object),
            stage.name()
        );
    }

    let pending = &Stage::ALL[resume_from..];
    if pending.is_empty() {
        info!("all outputs present for {object}; nothing to do");
        return Ok(());
    }

    sink.run(&SirilCommand::Cd {
        dir: object_dir.to_path_buf(),
    })?;
    for stage in pending {
        sink.run(&stage.command(object, object_dir, dark))?;
    }
    Ok(())
}

/// Process one object end to end: create its working directory, link the
/// raw frames in, and run the pending Siril stages.
pub fn process_object(
    sink: &mut dyn CommandSink,
    object: &str,
    object_dir: &Path,
    raw_files: &[PathBuf],
    dark: Option<&Path>,
) -> Result<(), PipelineError> {
    std::fs::create_dir_all(object_dir)?;

    let created = link_raw_files(raw_files, object_dir)?;
    if created > 0 {
        info!(
            "linked {created} raw files into {}",
            object_dir.display()
        );
    }
    if raw_files.is_empty() {
        warn!("no raw files for {object}; running remaining stages anyway");
    }

    run_stages(sink, object, object_dir, dark)
}

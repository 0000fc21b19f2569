//! Siril command boundary.
//!
//! Siril started in pipe mode (`siril -p`) exposes an inbound command pipe;
//! each command is a single space-joined argument list terminated by LF.
//! This module keeps the command vocabulary closed: the rest of the crate
//! builds [`SirilCommand`] values and only this boundary turns them into the
//! wire form.
//!
//! Commands are fire-and-forget. Siril reports progress and failures through
//! its own log; this tool does not inspect responses. A failed stage simply
//! leaves its output file absent, and the next run retries it.
//!
//! [`CommandSink`] decouples the pipeline driver from the transport:
//! [`SirilPipe`] talks to a live session, [`ScriptWriter`] emits the same
//! commands as a Siril script, and [`RecordingSink`] captures them for
//! inspection in tests.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

/// Siril's default inbound command pipe when started with `-p`.
pub const DEFAULT_COMMAND_PIPE: &str = "/tmp/siril_command.in";

/// Errors communicating with Siril.
#[derive(Error, Debug)]
pub enum SirilError {
    /// Write to the command pipe failed (e.g. Siril exited mid-run).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The command pipe could not be opened at startup.
    #[error("failed to connect to Siril command pipe {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The closed set of Siril commands this tool issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SirilCommand {
    /// Change Siril's working directory.
    Cd { dir: PathBuf },
    /// Merge the per-frame files of a sequence into a single FITS sequence.
    Convert { sequence: String, out_dir: PathBuf },
    /// Pre-process a sequence: optional dark subtraction plus CFA handling.
    ///
    /// `dark: None` means no matching master dark was found; the dark
    /// argument is omitted entirely rather than passed as a null path.
    Calibrate {
        sequence: String,
        dark: Option<PathBuf>,
    },
    /// Register (align) a sequence.
    Register { sequence: String },
    /// Stack a sequence with sigma-clipping rejection (3/3), additive
    /// normalization with scaling, and RGB channel equalization.
    Stack { sequence: String },
}

impl SirilCommand {
    /// Serialize to the ordered argument list Siril expects.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            SirilCommand::Cd { dir } => {
                vec!["cd".into(), dir.display().to_string()]
            }
            SirilCommand::Convert { sequence, out_dir } => vec![
                "convert".into(),
                sequence.clone(),
                "-fitseq".into(),
                format!("-out={}", out_dir.display()),
            ],
            SirilCommand::Calibrate { sequence, dark } => {
                let mut args = vec![
                    "calibrate".into(),
                    sequence.clone(),
                    "-fitseq".into(),
                    "-debayer".into(),
                ];
                if let Some(dark) = dark {
                    args.push(format!("-dark={}", dark.display()));
                }
                args.push("-cfa".into());
                args.push("-equalize_cfa".into());
                args
            }
            SirilCommand::Register { sequence } => {
                vec!["register".into(), sequence.clone()]
            }
            SirilCommand::Stack { sequence } => vec![
                "stack".into(),
                sequence.clone(),
                "rej".into(),
                "3".into(),
                "3".into(),
                "-norm=addscale".into(),
                "-rgb_equal".into(),
            ],
        }
    }

    /// The single-line wire form of the command.
    pub fn to_line(&self) -> String {
        self.to_args().join(" ")
    }
}

/// Destination for pipeline commands.
pub trait CommandSink {
    /// Issue one command. Fire-and-forget: success means the command was
    /// delivered, not that Siril liked it.
    fn run(&mut self, command: &SirilCommand) -> Result<(), SirilError>;
}

/// A connected Siril session over its inbound command pipe.
pub struct SirilPipe {
    pipe: File,
}

impl SirilPipe {
    /// Open the inbound command pipe of a running Siril instance.
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<Self, SirilError> {
        let path = path.as_ref();
        let pipe = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| SirilError::ConnectionFailed {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("connected to Siril command pipe {}", path.display());
        Ok(Self { pipe })
    }
}

impl CommandSink for SirilPipe {
    fn run(&mut self, command: &SirilCommand) -> Result<(), SirilError> {
        let line = command.to_line();
        info!("running: {line}");
        self.pipe.write_all(line.as_bytes())?;
        self.pipe.write_all(b"\n")?;
        self.pipe.flush()?;
        Ok(())
    }
}

/// Serializes commands as a Siril script instead of a live session.
pub struct ScriptWriter<W: Write> {
    out: W,
}

impl<W: Write> ScriptWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> CommandSink for ScriptWriter<W> {
    fn run(&mut self, command: &SirilCommand) -> Result<(), SirilError> {
        writeln!(self.out, "{}", command.to_line())?;
        Ok(())
    }
}

/// Accumulates commands in memory. Test seam.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub commands: Vec<SirilCommand>,
}

impl CommandSink for RecordingSink {
    fn run(&mut self, command: &SirilCommand) -> Result<(), SirilError> {
        self.commands.push(command.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cd_serializes_to_directory() {
        let cmd = SirilCommand::Cd {
            dir: PathBuf::from("/data/astro/M31"),
        };
        assert_eq!(cmd.to_line(), "cd /data/astro/M31");
    }

    #[test]
    fn convert_names_the_output_directory() {
        let cmd = SirilCommand::Convert {
            sequence: "M31".into(),
            out_dir: PathBuf::from("/data/astro/M31"),
        };
        assert_eq!(
            cmd.to_args(),
            ["convert", "M31", "-fitseq", "-out=/data/astro/M31"]
        );
    }

    #[test]
    fn calibrate_includes_dark_when_resolved() {
        let cmd = SirilCommand::Calibrate {
            sequence: "M31".into(),
            dark: Some(PathBuf::from("/data/DarkLibrary/StackDark_-5C_10_26.fit")),
        };
        assert_eq!(
            cmd.to_args(),
            [
                "calibrate",
                "M31",
                "-fitseq",
                "-debayer",
                "-dark=/data/DarkLibrary/StackDark_-5C_10_26.fit",
                "-cfa",
                "-equalize_cfa",
            ]
        );
    }

    #[test]
    fn calibrate_omits_dark_when_absent() {
        let cmd = SirilCommand::Calibrate {
            sequence: "M31".into(),
            dark: None,
        };
        let args = cmd.to_args();
        assert!(!args.iter().any(|a| a.starts_with("-dark")));
        assert_eq!(
            args,
            ["calibrate", "M31", "-fitseq", "-debayer", "-cfa", "-equalize_cfa"]
        );
    }

    #[test]
    fn stack_uses_fixed_rejection_and_normalization() {
        let cmd = SirilCommand::Stack {
            sequence: "r_pp_M31".into(),
        };
        assert_eq!(
            cmd.to_line(),
            "stack r_pp_M31 rej 3 3 -norm=addscale -rgb_equal"
        );
    }

    #[test]
    fn script_writer_emits_one_line_per_command() {
        let mut sink = ScriptWriter::new(Vec::new());
        sink.run(&SirilCommand::Cd {
            dir: PathBuf::from("/tmp"),
        })
        .unwrap();
        sink.run(&SirilCommand::Register {
            sequence: "pp_M31".into(),
        })
        .unwrap();
        let script = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(script, "cd /tmp\nregister pp_M31\n");
    }
}

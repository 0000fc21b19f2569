//! Batch organizer and Siril pipeline driver for smart telescope exposure stacks.
//!
//! The camera writes each imaging session to a location directory containing
//! `Raw/` (individual exposure frames), `Images/` (per-stack JSON metadata
//! sidecars) and `DarkLibrary/` (pre-built master darks). This crate turns
//! such a location into finished stacked images:
//!
//! 1. [`discovery`] scans the metadata sidecars and groups exposures into
//!    stacks by filename pattern token.
//! 2. [`classify`] parses the raw filenames and finds each stack's dominant
//!    sensor temperature and exposure time by histogram mode.
//! 3. [`darks`] resolves a matching master dark from the library by naming
//!    convention.
//! 4. [`pipeline`] links the raw frames into a per-object working directory
//!    and drives Siril through convert/calibrate/register/stack, skipping
//!    any stage whose output already exists.
//!
//! All Siril traffic goes through the [`siril::CommandSink`] trait, so the
//! same driver can talk to a live session, emit a script, or be exercised
//! in tests without Siril installed.

pub mod classify;
pub mod config;
pub mod darks;
pub mod discovery;
pub mod metadata;
pub mod pipeline;
pub mod siril;

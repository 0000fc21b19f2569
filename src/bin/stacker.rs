//! Stack organizer CLI.
//!
//! Scans a location directory for exposure stacks, classifies each stack's
//! temperature and exposure time, resolves a matching master dark, links the
//! raw frames into a per-object working directory, and drives Siril through
//! convert/calibrate/register/stack. Completed stages are skipped, so an
//! interrupted run can simply be re-run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use smarteye_stacker::config::LocationConfig;
use smarteye_stacker::discovery::{self, StackInfo};
use smarteye_stacker::siril::{CommandSink, ScriptWriter, SirilPipe, DEFAULT_COMMAND_PIPE};
use smarteye_stacker::{classify, darks, pipeline};

/// Organize raw exposure stacks and drive Siril processing.
#[derive(Parser, Debug)]
#[command(name = "stacker")]
#[command(about = "Organize raw exposure stacks and drive Siril processing")]
#[command(version)]
struct Args {
    /// Location directory to process (defaults to the current directory)
    location: Option<PathBuf>,

    /// Location configuration file (defaults to processing.toml in the location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum declared frame count for a stack to be processed
    #[arg(long, default_value_t = discovery::DEFAULT_MIN_STACK_COUNT)]
    min_stack_count: u32,

    /// Inbound command pipe of the running Siril instance
    #[arg(long, default_value = DEFAULT_COMMAND_PIPE)]
    pipe: PathBuf,

    /// Print the Siril script to stdout instead of driving a live session
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let location = match args.location {
        Some(location) => location,
        None => std::env::current_dir().context("determining current directory")?,
    };
    let config_path = args
        .config
        .unwrap_or_else(|| location.join("processing.toml"));
    let config = LocationConfig::load(&config_path).context("loading location configuration")?;

    if config.has_location(&location) {
        info!("found config for {}", location.display());
    } else {
        warn!(
            "no configuration for {}; using pattern tokens as object names",
            location.display()
        );
    }

    let mut sink: Box<dyn CommandSink> = if args.dry_run {
        Box::new(ScriptWriter::new(std::io::stdout()))
    } else {
        Box::new(
            SirilPipe::connect(&args.pipe)
                .context("connecting to Siril (is it running with -p?)")?,
        )
    };

    let stacks = discovery::find_stacks(&location, args.min_stack_count);
    if stacks.is_empty() {
        warn!("no processable stacks under {}", location.display());
        return Ok(());
    }

    for (pattern, stack) in &stacks {
        let object = config.object_name(&location, pattern);
        info!("processing files {pattern}*: object={object}");
        if let Err(e) = process_pattern(sink.as_mut(), &location, pattern, &object, stack) {
            error!("{pattern}: {e:#}; continuing with next object");
        }
    }

    info!("stack processing complete");
    Ok(())
}

/// Run one pattern/object through classification and the pipeline.
fn process_pattern(
    sink: &mut dyn CommandSink,
    location: &Path,
    pattern: &str,
    object: &str,
    stack: &StackInfo,
) -> Result<()> {
    let frames = classify::find_frames(location, pattern)?;

    let found = frames.files.len();
    if found < stack.stack_count as usize {
        warn!(
            "found only {found} raw files; stack count is {}",
            stack.stack_count
        );
    }
    let total = stack.exposure_seconds * found as f64;
    info!(
        "  found {:.0}s x {found} raw files = {:.1} min",
        stack.exposure_seconds,
        total / 60.0
    );

    let Some(classification) = classify::classify_frames(&frames) else {
        warn!("no raw files matched the filename grammar for {pattern}; skipping");
        return Ok(());
    };

    let dark = darks::resolve_dark_frame(
        location,
        f64::from(classification.temperature_c()),
        classification.exposure_seconds(),
        &stack.gain,
    );

    let object_dir = location.join(object);
    pipeline::process_object(sink, object, &object_dir, &frames.files, dark.as_deref())?;
    Ok(())
}

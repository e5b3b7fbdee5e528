//! End-to-end run: decode the pair, build the sequence, write it out.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use tracing::info;

use crate::error::InterpolateError;
use crate::image_io::{load_frame_pair, write_sequence, OutputFormat};
use crate::interpolator::Interpolator;
use crate::sequence::{expand_doubling, ratio_sequence, RatioTarget};

/// Environment variable naming the output directory.
pub const OUTPUT_DIR_ENV: &str = "TO_PATH";

/// How the in-between frames are chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SequenceMode {
    /// `exp` rounds of midpoint doubling.
    Expand { exp: u32 },
    /// Single frame at a target ratio, found by bisection.
    Ratio(RatioTarget),
}

impl SequenceMode {
    /// A nonzero `ratio` selects bisection; zero falls back to doubling.
    pub fn select(exp: u32, ratio: f64, threshold: f64, max_cycles: u32) -> Self {
        if ratio != 0.0 {
            Self::Ratio(RatioTarget {
                ratio,
                threshold,
                max_cycles,
            })
        } else {
            Self::Expand { exp }
        }
    }
}

#[derive(Debug, Clone)]
pub struct InterpolationRequest {
    pub inputs: [PathBuf; 2],
    pub mode: SequenceMode,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub format: OutputFormat,
    pub written: Vec<PathBuf>,
    pub inference_calls: u32,
    /// Temporal position of the found frame, ratio mode only.
    pub found_position: Option<f64>,
}

/// Read `TO_PATH`; an unset or empty variable is fatal.
pub fn output_dir_from_env() -> Result<PathBuf, InterpolateError> {
    match std::env::var_os(OUTPUT_DIR_ENV) {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => Err(InterpolateError::MissingOutputDir {
            var: OUTPUT_DIR_ENV,
        }),
    }
}

pub fn run_pipeline(
    request: &InterpolationRequest,
    interpolator: &mut dyn Interpolator,
) -> Result<PipelineReport> {
    let started = Instant::now();
    let [first, second] = &request.inputs;
    let (img0, img1, format) = load_frame_pair(first, second)?;

    let (frames, inference_calls, found_position) = match request.mode {
        SequenceMode::Expand { exp } => {
            info!(exp, "Expanding frame pair by midpoint doubling");
            let frames = expand_doubling(interpolator, &img0, &img1, exp)?;
            let calls = (frames.len() - 2) as u32;
            (frames, calls, None)
        }
        SequenceMode::Ratio(target) => {
            info!(
                ratio = target.ratio,
                threshold = target.threshold,
                max_cycles = target.max_cycles,
                "Searching for frame at ratio"
            );
            let (frames, search) = ratio_sequence(interpolator, &img0, &img1, target)?;
            if search.converged {
                info!(
                    position = search.position,
                    cycles = search.cycles,
                    "Ratio search converged"
                );
            } else {
                info!(
                    position = search.position,
                    cycles = search.cycles,
                    "Ratio search hit the cycle cap"
                );
            }
            (frames, search.cycles, Some(search.position))
        }
    };

    let written = write_sequence(&frames, &request.output_dir, format)?;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    info!(
        frames = written.len(),
        inference_calls,
        elapsed_ms = format!("{elapsed_ms:.1}"),
        "Interpolation finished"
    );

    Ok(PipelineReport {
        format,
        written,
        inference_calls,
        found_position,
    })
}

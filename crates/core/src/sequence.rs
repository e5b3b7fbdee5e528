//! Interpolation sequencing: which midpoints to request, and in what order.

use anyhow::{bail, Result};
use tracing::debug;

use crate::interpolator::Interpolator;
use crate::types::Frame;

/// Bisection search parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioTarget {
    /// Target temporal position; 0 is the first frame, 1 the second.
    pub ratio: f64,
    /// Width of the acceptance band centred on `ratio`.
    pub threshold: f64,
    /// Hard cap on inference cycles.
    pub max_cycles: u32,
}

/// Outcome of [`search_ratio`].
#[derive(Debug, Clone)]
pub struct RatioSearch {
    pub frame: Frame,
    /// Temporal position `frame` represents.
    pub position: f64,
    /// Inference calls spent.
    pub cycles: u32,
    /// Whether `position` fell inside the acceptance band.
    pub converged: bool,
}

/// Locate a frame at `target.ratio` between `img0` (0.0) and `img1` (1.0) by bisection.
///
/// Ratios within half a threshold of either end return that endpoint untouched
/// without running inference. Otherwise the bracket is halved until its
/// midpoint lands in the band or `max_cycles` is spent, in which case the last
/// midpoint is returned.
pub fn search_ratio<I>(
    interpolator: &mut I,
    img0: &Frame,
    img1: &Frame,
    target: RatioTarget,
) -> Result<RatioSearch>
where
    I: Interpolator + ?Sized,
{
    let half_band = target.threshold / 2.0;
    let mut low_ratio = 0.0_f64;
    let mut high_ratio = 1.0_f64;

    if target.ratio <= low_ratio + half_band {
        return Ok(RatioSearch {
            frame: img0.clone(),
            position: low_ratio,
            cycles: 0,
            converged: true,
        });
    }
    if target.ratio >= high_ratio - half_band {
        return Ok(RatioSearch {
            frame: img1.clone(),
            position: high_ratio,
            cycles: 0,
            converged: true,
        });
    }
    if target.max_cycles == 0 {
        bail!(
            "ratio {} needs at least one inference cycle, but max cycles is 0",
            target.ratio
        );
    }

    let mut low = img0.clone();
    let mut high = img1.clone();
    let mut found = None;

    for cycle in 1..=target.max_cycles {
        let middle = interpolator.inference(&low, &high)?;
        let middle_ratio = (low_ratio + high_ratio) / 2.0;
        debug!(cycle, middle_ratio, target = target.ratio, "Bisection step");

        let converged =
            target.ratio - half_band <= middle_ratio && middle_ratio <= target.ratio + half_band;
        if converged || cycle == target.max_cycles {
            found = Some(RatioSearch {
                frame: middle,
                position: middle_ratio,
                cycles: cycle,
                converged,
            });
            break;
        }

        if target.ratio > middle_ratio {
            low = middle;
            low_ratio = middle_ratio;
        } else {
            high = middle;
            high_ratio = middle_ratio;
        }
    }

    match found {
        Some(search) => Ok(search),
        None => bail!("bisection ended without producing a frame"),
    }
}

/// The three-frame sequence written for a ratio request: first, found, second.
pub fn ratio_sequence<I>(
    interpolator: &mut I,
    img0: &Frame,
    img1: &Frame,
    target: RatioTarget,
) -> Result<(Vec<Frame>, RatioSearch)>
where
    I: Interpolator + ?Sized,
{
    let search = search_ratio(interpolator, img0, img1, target)?;
    let frames = vec![img0.clone(), search.frame.clone(), img1.clone()];
    Ok((frames, search))
}

/// Expand `[img0, img1]` by `exp` rounds of midpoint insertion into `2^exp + 1` frames.
///
/// Each round keeps every pair's left frame, inserts the pair's midpoint after
/// it, and closes the sequence with the untouched `img1`.
pub fn expand_doubling<I>(
    interpolator: &mut I,
    img0: &Frame,
    img1: &Frame,
    exp: u32,
) -> Result<Vec<Frame>>
where
    I: Interpolator + ?Sized,
{
    let Some(total) = expanded_len(exp) else {
        bail!("exp {exp} is too large: 2^{exp} + 1 frames cannot be addressed");
    };
    debug!(exp, total, "Planned doubling sequence");
    let mut frames = vec![img0.clone(), img1.clone()];

    for round in 0..exp {
        let mut expanded = Vec::with_capacity(frames.len() * 2 - 1);
        let mut pending = frames.into_iter().peekable();

        while let Some(frame) = pending.next() {
            let Some(next) = pending.peek() else {
                break;
            };
            let middle = interpolator.inference(&frame, next)?;
            expanded.push(frame);
            expanded.push(middle);
        }
        expanded.push(img1.clone());

        debug!(round = round + 1, frames = expanded.len(), "Doubling round complete");
        frames = expanded;
    }

    Ok(frames)
}

/// Number of frames [`expand_doubling`] yields for `exp`.
pub fn expanded_len(exp: u32) -> Option<usize> {
    1usize.checked_shl(exp)?.checked_add(1)
}

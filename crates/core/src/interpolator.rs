//! Pairwise midpoint inference over RIFE ONNX exports.
//!
//! Three historical export interfaces are recognised by their input names:
//! - **Two-input**: `img0`, `img1`; the network always produces the midpoint
//! - **Three-input**: `img0`, `img1`, `timestep` (`[1,1,1,1]`)
//! - **Concatenated**: single `input` of shape `[1, 7, H, W]` holding
//!   `[img0_rgb(3) + img1_rgb(3) + timestep_broadcast(1)]`
//!
//! All of them read and write padded `[1, 3, H, W]` tensors.

use std::time::Instant;

use anyhow::{bail, Context, Result};
use ndarray::{s, Array4, ArrayD, Ix4};
use ort::{
    session::Session,
    value::{Tensor, TensorRef},
};
use tracing::debug;

use crate::types::Frame;

const INPUT_IMG0: &str = "img0";
const INPUT_IMG1: &str = "img1";
const INPUT_TIMESTEP: &str = "timestep";
const INPUT_CONCAT: &str = "input";
const OUTPUT_NAME: &str = "output";

/// Temporal position requested from timestep-aware exports.
const MIDPOINT: f32 = 0.5;

/// Anything that can synthesise the temporal midpoint of two frames.
pub trait Interpolator {
    fn inference(&mut self, img0: &Frame, img1: &Frame) -> Result<Frame>;
}

impl<T: Interpolator + ?Sized> Interpolator for Box<T> {
    fn inference(&mut self, img0: &Frame, img1: &Frame) -> Result<Frame> {
        (**self).inference(img0, img1)
    }
}

/// ONNX input signature detected at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    TwoInput,
    ThreeInput,
    Concatenated,
}

impl ModelFormat {
    /// Classify a session by its input names; `None` for anything unrecognised.
    pub fn detect(input_names: &[&str]) -> Option<Self> {
        let has = |name: &str| input_names.contains(&name);
        match input_names.len() {
            1 if has(INPUT_CONCAT) => Some(Self::Concatenated),
            2 if has(INPUT_IMG0) && has(INPUT_IMG1) => Some(Self::TwoInput),
            3 if has(INPUT_IMG0) && has(INPUT_IMG1) && has(INPUT_TIMESTEP) => {
                Some(Self::ThreeInput)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TwoInput => write!(f, "two-input"),
            Self::ThreeInput => write!(f, "three-input"),
            Self::Concatenated => write!(f, "concatenated"),
        }
    }
}

pub fn session_format(session: &Session) -> Option<ModelFormat> {
    let names: Vec<&str> = session.inputs().iter().map(|input| input.name()).collect();
    ModelFormat::detect(&names)
}

/// A loaded RIFE network producing midpoints.
pub struct RifeModel {
    session: Session,
    format: ModelFormat,
    use_iobinding: bool,
    /// Reusable `[1,7,H,W]` buffer for the concatenated format.
    concat_buf: Option<Array4<f32>>,
}

impl RifeModel {
    pub fn new(session: Session, format: ModelFormat, use_iobinding: bool) -> Self {
        Self {
            session,
            format,
            use_iobinding,
            concat_buf: None,
        }
    }

    pub fn format(&self) -> ModelFormat {
        self.format
    }

    fn run_pair(&mut self, img0: &Array4<f32>, img1: &Array4<f32>) -> Result<ArrayD<f32>> {
        let tensor0 = Tensor::from_array(img0.clone())?;
        let tensor1 = Tensor::from_array(img1.clone())?;
        let ts_tensor = Tensor::from_array(Array4::<f32>::from_elem((1, 1, 1, 1), MIDPOINT))?;
        let with_timestep = self.format == ModelFormat::ThreeInput;

        if self.use_iobinding {
            let mut binding = self.session.create_binding()?;
            binding.bind_input(INPUT_IMG0, &tensor0)?;
            binding.bind_input(INPUT_IMG1, &tensor1)?;
            if with_timestep {
                binding.bind_input(INPUT_TIMESTEP, &ts_tensor)?;
            }
            binding.bind_output_to_device(OUTPUT_NAME, &self.session.allocator().memory_info())?;
            let outputs = self.session.run_binding(&binding)?;
            let output_view = outputs[OUTPUT_NAME].try_extract_array::<f32>()?;
            return Ok(output_view.to_owned());
        }

        let outputs = if with_timestep {
            self.session.run(
                ort::inputs![INPUT_IMG0 => &tensor0, INPUT_IMG1 => &tensor1, INPUT_TIMESTEP => &ts_tensor],
            )?
        } else {
            self.session
                .run(ort::inputs![INPUT_IMG0 => &tensor0, INPUT_IMG1 => &tensor1])?
        };
        let output_view = outputs[OUTPUT_NAME].try_extract_array::<f32>()?;
        Ok(output_view.to_owned())
    }

    fn run_concatenated(&mut self, img0: &Array4<f32>, img1: &Array4<f32>) -> Result<ArrayD<f32>> {
        let padded_h = img0.shape()[2];
        let padded_w = img0.shape()[3];
        let target_shape = [1, 7, padded_h, padded_w];

        let mut concat = match self.concat_buf.take() {
            Some(arr) if arr.shape() == target_shape => arr,
            _ => Array4::<f32>::zeros(target_shape),
        };
        concat.slice_mut(s![.., 0..3, .., ..]).assign(img0);
        concat.slice_mut(s![.., 3..6, .., ..]).assign(img1);
        concat.slice_mut(s![.., 6..7, .., ..]).fill(MIDPOINT);

        let result = {
            let tensor = TensorRef::from_array_view(concat.view())?;
            if self.use_iobinding {
                let mut binding = self.session.create_binding()?;
                binding.bind_input(INPUT_CONCAT, &tensor)?;
                binding
                    .bind_output_to_device(OUTPUT_NAME, &self.session.allocator().memory_info())?;
                let outputs = self.session.run_binding(&binding)?;
                let output_view = outputs[OUTPUT_NAME].try_extract_array::<f32>()?;
                output_view.to_owned()
            } else {
                let outputs = self.session.run(ort::inputs![INPUT_CONCAT => tensor])?;
                let output_view = outputs[OUTPUT_NAME].try_extract_array::<f32>()?;
                output_view.to_owned()
            }
        };

        self.concat_buf = Some(concat);
        Ok(result)
    }
}

impl Interpolator for RifeModel {
    fn inference(&mut self, img0: &Frame, img1: &Frame) -> Result<Frame> {
        ensure_pair(img0, img1)?;

        let started = Instant::now();
        let raw = match self.format {
            ModelFormat::Concatenated => self.run_concatenated(img0.tensor(), img1.tensor())?,
            ModelFormat::TwoInput | ModelFormat::ThreeInput => {
                self.run_pair(img0.tensor(), img1.tensor())?
            }
        };
        let output = into_frame_tensor(raw, img0)?;

        debug!(
            format = %self.format,
            session_run_ms = format!("{:.1}", started.elapsed().as_secs_f64() * 1000.0),
            "RIFE midpoint inference"
        );

        Frame::from_padded(output, img0.height(), img0.width(), img0.depth())
    }
}

/// Reject pairs that cannot go through the network together.
pub fn ensure_pair(img0: &Frame, img1: &Frame) -> Result<()> {
    if !img0.is_compatible_with(img1) {
        bail!(
            "frame pair mismatch: {}x{} {:?} vs {}x{} {:?}",
            img0.width(),
            img0.height(),
            img0.depth(),
            img1.width(),
            img1.height(),
            img1.depth()
        );
    }
    Ok(())
}

fn into_frame_tensor(raw: ArrayD<f32>, reference: &Frame) -> Result<Array4<f32>> {
    let output = raw
        .into_dimensionality::<Ix4>()
        .context("RIFE output is not a 4-D tensor")?;
    let expected = reference.tensor().shape();
    if output.shape() != expected {
        bail!(
            "RIFE output shape {:?} does not match input shape {:?}",
            output.shape(),
            expected
        );
    }
    Ok(output)
}

use anyhow::{bail, Result};
use ndarray::{s, Array4, ArrayView4};

/// Spatial dimensions fed to the network must be multiples of this.
pub const PAD_ALIGN: usize = 32;

/// Tensor plane holding each interleaved RGB sample. RIFE weights expect BGR planes.
const PLANE_OF_RGB: [usize; 3] = [2, 1, 0];

/// Sample depth of the source image a frame was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelDepth {
    /// 8-bit source, samples normalised to `[0, 1]`.
    Unorm8,
    /// EXR source, raw high-dynamic-range samples (not normalised).
    HalfFloat,
}

/// A single RGB frame held as a padded `[1, 3, padded_h, padded_w]` tensor.
///
/// The unpadded `height`/`width` are kept so outputs can be cropped back to
/// the input size. Padding cells are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    tensor: Array4<f32>,
    height: usize,
    width: usize,
    depth: PixelDepth,
}

impl Frame {
    /// Scatter interleaved RGB8 samples into a padded NCHW tensor, normalising by 1/255.
    pub fn from_rgb8(data: &[u8], width: usize, height: usize) -> Result<Self> {
        let expected = width * height * 3;
        if data.len() != expected {
            bail!(
                "Data length mismatch: expected {expected} ({height}x{width}x3), got {}",
                data.len()
            );
        }
        Ok(Self::scatter(width, height, PixelDepth::Unorm8, |i| {
            data[i] as f32 / 255.0
        }))
    }

    /// Scatter interleaved RGB float samples into a padded NCHW tensor, values kept as-is.
    pub fn from_rgb_f32(data: &[f32], width: usize, height: usize) -> Result<Self> {
        let expected = width * height * 3;
        if data.len() != expected {
            bail!(
                "Data length mismatch: expected {expected} ({height}x{width}x3), got {}",
                data.len()
            );
        }
        Ok(Self::scatter(width, height, PixelDepth::HalfFloat, |i| data[i]))
    }

    /// Wrap an already padded tensor, e.g. a model output.
    pub fn from_padded(
        tensor: Array4<f32>,
        height: usize,
        width: usize,
        depth: PixelDepth,
    ) -> Result<Self> {
        let expected = [1, 3, height + pad_amount(height), width + pad_amount(width)];
        if tensor.shape() != expected {
            bail!(
                "Tensor shape {:?} does not match padded frame shape {:?} for {width}x{height}",
                tensor.shape(),
                expected
            );
        }
        Ok(Self {
            tensor,
            height,
            width,
            depth,
        })
    }

    fn scatter(
        width: usize,
        height: usize,
        depth: PixelDepth,
        sample: impl Fn(usize) -> f32,
    ) -> Self {
        let padded_h = height + pad_amount(height);
        let padded_w = width + pad_amount(width);
        let mut tensor = Array4::<f32>::zeros((1, 3, padded_h, padded_w));

        for y in 0..height {
            let row_src = y * width * 3;
            for x in 0..width {
                let src = row_src + x * 3;
                for (c, &plane) in PLANE_OF_RGB.iter().enumerate() {
                    tensor[[0, plane, y, x]] = sample(src + c);
                }
            }
        }

        Self {
            tensor,
            height,
            width,
            depth,
        }
    }

    pub fn tensor(&self) -> &Array4<f32> {
        &self.tensor
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn depth(&self) -> PixelDepth {
        self.depth
    }

    pub fn padded_height(&self) -> usize {
        self.tensor.shape()[2]
    }

    pub fn padded_width(&self) -> usize {
        self.tensor.shape()[3]
    }

    /// View of the frame with padding removed.
    pub fn cropped(&self) -> ArrayView4<'_, f32> {
        self.tensor.slice(s![.., .., ..self.height, ..self.width])
    }

    /// Cropped interleaved RGB8, scaled by 255 with round-to-nearest and clamping.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let cropped = self.cropped();
        let mut rgb = Vec::with_capacity(self.height * self.width * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                for plane in PLANE_OF_RGB {
                    let v = cropped[[0, plane, y, x]];
                    rgb.push((v * 255.0 + 0.5).clamp(0.0, 255.0) as u8);
                }
            }
        }
        rgb
    }

    /// Cropped interleaved RGB samples in tensor units.
    pub fn to_rgb_f32(&self) -> Vec<f32> {
        let cropped = self.cropped();
        let mut rgb = Vec::with_capacity(self.height * self.width * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                for plane in PLANE_OF_RGB {
                    rgb.push(cropped[[0, plane, y, x]]);
                }
            }
        }
        rgb
    }

    /// True when both frames can be fed to the network together.
    pub fn is_compatible_with(&self, other: &Frame) -> bool {
        self.height == other.height
            && self.width == other.width
            && self.depth == other.depth
            && self.tensor.shape() == other.tensor.shape()
    }
}

pub fn pad_amount(dim: usize) -> usize {
    (PAD_ALIGN - (dim % PAD_ALIGN)) % PAD_ALIGN
}

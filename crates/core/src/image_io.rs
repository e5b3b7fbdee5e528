//! Decoding input images into padded frames and writing sequences back to disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use half::f16;
use image::{ImageFormat, RgbImage};
use tracing::{debug, info};

use crate::error::InterpolateError;
use crate::types::{Frame, PixelDepth};

/// On-disk format for a written sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// 8-bit RGB PNG.
    Png,
    /// Half-float RGB OpenEXR, high dynamic range preserved.
    Exr,
}

impl OutputFormat {
    /// EXR only when both inputs are EXR files; anything else goes through PNG.
    pub fn for_inputs(first: &Path, second: &Path) -> Self {
        if is_exr(first) && is_exr(second) {
            Self::Exr
        } else {
            Self::Png
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Exr => "exr",
        }
    }
}

fn is_exr(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("exr")
}

/// Decode and pad the two input frames.
pub fn load_frame_pair(first: &Path, second: &Path) -> Result<(Frame, Frame, OutputFormat)> {
    let format = OutputFormat::for_inputs(first, second);
    let img0 = load_frame(first, format)?;
    let img1 = load_frame(second, format)?;

    if img0.width() != img1.width() || img0.height() != img1.height() {
        return Err(InterpolateError::FrameSizeMismatch {
            first_w: img0.width(),
            first_h: img0.height(),
            second_w: img1.width(),
            second_h: img1.height(),
        }
        .into());
    }

    debug!(
        width = img0.width(),
        height = img0.height(),
        padded_width = img0.padded_width(),
        padded_height = img0.padded_height(),
        format = format.extension(),
        "Loaded frame pair"
    );

    Ok((img0, img1, format))
}

/// Decode one image; EXR samples stay raw, everything else is normalised from RGB8.
pub fn load_frame(path: &Path, format: OutputFormat) -> Result<Frame> {
    let decoded = image::open(path)
        .with_context(|| format!("failed to decode image: {}", path.display()))?;
    let width = decoded.width() as usize;
    let height = decoded.height() as usize;

    match format {
        OutputFormat::Exr => {
            let rgb = decoded.into_rgb32f();
            Frame::from_rgb_f32(rgb.as_raw(), width, height)
        }
        OutputFormat::Png => {
            let rgb = decoded.into_rgb8();
            Frame::from_rgb8(rgb.as_raw(), width, height)
        }
    }
    .with_context(|| format!("failed to build frame from {}", path.display()))
}

/// Output path of the `index`-th frame.
pub fn frame_path(dir: &Path, index: usize, format: OutputFormat) -> PathBuf {
    dir.join(format!("img{index}.{}", format.extension()))
}

/// Crop and write every frame as `img{i}.{ext}` under `dir`, in sequence order.
pub fn write_sequence(frames: &[Frame], dir: &Path, format: OutputFormat) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory: {}", dir.display()))?;

    let mut written = Vec::with_capacity(frames.len());
    for (index, frame) in frames.iter().enumerate() {
        let path = frame_path(dir, index, format);
        match format {
            OutputFormat::Png => write_png(frame, &path)?,
            OutputFormat::Exr => write_exr(frame, &path)?,
        }
        debug!(path = %path.display(), "Wrote frame");
        written.push(path);
    }

    info!(
        count = written.len(),
        dir = %dir.display(),
        format = format.extension(),
        "Wrote interpolation sequence"
    );
    Ok(written)
}

fn write_png(frame: &Frame, path: &Path) -> Result<()> {
    let rgb = RgbImage::from_raw(frame.width() as u32, frame.height() as u32, frame.to_rgb8())
        .context("RGB buffer does not match frame dimensions")?;
    rgb.save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write PNG: {}", path.display()))
}

fn write_exr(frame: &Frame, path: &Path) -> Result<()> {
    if frame.depth() != PixelDepth::HalfFloat {
        debug!(path = %path.display(), "Writing 8-bit sourced frame as EXR");
    }
    let width = frame.width();
    let samples = frame.to_rgb_f32();
    exr::prelude::write_rgb_file(path, width, frame.height(), |x, y| {
        let i = (y * width + x) * 3;
        (
            f16::from_f32(samples[i]),
            f16::from_f32(samples[i + 1]),
            f16::from_f32(samples[i + 2]),
        )
    })
    .with_context(|| format!("failed to write EXR: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_test_png(path: &Path, width: u32, height: u32, seed: u8) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([
                (x as u8).wrapping_add(seed),
                (y as u8).wrapping_mul(3),
                seed,
            ])
        });
        img.save_with_format(path, ImageFormat::Png).expect("write png");
    }

    #[test]
    fn test_output_format_requires_both_exr() {
        assert_eq!(
            OutputFormat::for_inputs(Path::new("a.exr"), Path::new("b.exr")),
            OutputFormat::Exr
        );
        assert_eq!(
            OutputFormat::for_inputs(Path::new("a.exr"), Path::new("b.png")),
            OutputFormat::Png
        );
        assert_eq!(
            OutputFormat::for_inputs(Path::new("a.png"), Path::new("b.png")),
            OutputFormat::Png
        );
        assert_eq!(
            OutputFormat::for_inputs(Path::new("a.EXR"), Path::new("b.EXR")),
            OutputFormat::Png
        );
    }

    #[test]
    fn test_frame_path_numbering() {
        let dir = Path::new("/out");
        assert_eq!(
            frame_path(dir, 0, OutputFormat::Png),
            PathBuf::from("/out/img0.png")
        );
        assert_eq!(
            frame_path(dir, 12, OutputFormat::Exr),
            PathBuf::from("/out/img12.exr")
        );
    }

    #[test]
    fn test_png_pair_loads_padded_and_writes_back_identically() {
        let dir = tempdir().expect("tempdir");
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        write_test_png(&a, 100, 60, 1);
        write_test_png(&b, 100, 60, 9);

        let (img0, img1, format) = load_frame_pair(&a, &b).unwrap();
        assert_eq!(format, OutputFormat::Png);
        assert_eq!(img0.tensor().shape(), &[1, 3, 64, 128]);
        assert_eq!(img1.width(), 100);

        let out = dir.path().join("out");
        let written = write_sequence(&[img0, img1], &out, format).unwrap();
        assert_eq!(written, vec![out.join("img0.png"), out.join("img1.png")]);

        let original = image::open(&a).unwrap().into_rgb8();
        let restored = image::open(&written[0]).unwrap().into_rgb8();
        assert_eq!(restored.dimensions(), (100, 60));
        assert_eq!(restored.as_raw(), original.as_raw());
    }

    #[test]
    fn test_bmp_pair_decodes_exactly_and_outputs_png() {
        let dir = tempdir().expect("tempdir");
        let a = dir.path().join("a.bmp");
        let b = dir.path().join("b.bmp");
        let pixels = RgbImage::from_fn(6, 4, |x, y| image::Rgb([x as u8 * 40, y as u8 * 60, 200]));
        pixels.save_with_format(&a, ImageFormat::Bmp).expect("write bmp");
        pixels.save_with_format(&b, ImageFormat::Bmp).expect("write bmp");

        let (img0, img1, format) = load_frame_pair(&a, &b).unwrap();
        assert_eq!(format, OutputFormat::Png);
        assert_eq!((img0.width(), img0.height()), (6, 4));
        assert_eq!(img0.to_rgb8(), pixels.as_raw().clone());
        assert_eq!(img1, img0);
    }

    #[test]
    fn test_jpeg_pair_decodes_to_input_size() {
        let dir = tempdir().expect("tempdir");
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpeg");
        for path in [&a, &b] {
            RgbImage::from_pixel(40, 24, image::Rgb([128, 128, 128]))
                .save_with_format(path, ImageFormat::Jpeg)
                .expect("write jpeg");
        }

        let (img0, _, format) = load_frame_pair(&a, &b).unwrap();
        assert_eq!(format, OutputFormat::Png);
        assert_eq!((img0.width(), img0.height()), (40, 24));
        assert!(img0.to_rgb8().iter().all(|&v| (v as i32 - 128).abs() <= 3));
    }

    #[test]
    fn test_size_mismatch_is_reported() {
        let dir = tempdir().expect("tempdir");
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        write_test_png(&a, 40, 40, 0);
        write_test_png(&b, 41, 40, 0);

        let err = load_frame_pair(&a, &b).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InterpolateError>(),
            Some(InterpolateError::FrameSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_unreadable_input_names_the_path() {
        let dir = tempdir().expect("tempdir");
        let a = dir.path().join("garbage.png");
        std::fs::write(&a, b"not an image").unwrap();

        let err = load_frame(&a, OutputFormat::Png).unwrap_err();
        assert!(format!("{err:#}").contains("garbage.png"));
    }

    #[test]
    fn test_exr_written_as_half_float_and_readable() {
        let dir = tempdir().expect("tempdir");
        let samples: Vec<f32> = (0..5 * 3 * 3).map(|i| i as f32 * 0.5).collect();
        let frame = Frame::from_rgb_f32(&samples, 5, 3).unwrap();

        let written = write_sequence(&[frame], dir.path(), OutputFormat::Exr).unwrap();
        assert_eq!(written[0], dir.path().join("img0.exr"));

        let reloaded = load_frame(&written[0], OutputFormat::Exr).unwrap();
        assert_eq!(reloaded.width(), 5);
        assert_eq!(reloaded.height(), 3);
        assert_eq!(reloaded.depth(), PixelDepth::HalfFloat);
        for (got, want) in reloaded.to_rgb_f32().iter().zip(&samples) {
            assert!((got - want).abs() < 1e-2, "{got} vs {want}");
        }
    }
}

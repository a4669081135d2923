//! Pixel operations and encoding on top of the `image` crate.

use crate::errors::{PipelineError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Fill colour for canvas areas not covered by a rotated image.
pub const ROTATE_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Encoding for a published image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Baseline JPEG at the given quality (1..=100).
    Jpeg {
        /// Encoder quality.
        quality: u8,
    },
    /// Lossless PNG.
    Png,
}

impl OutputFormat {
    /// Picks the format from the extension of the final output path.
    ///
    /// Unknown or missing extensions fall back to JPEG.
    #[must_use]
    pub fn for_path(path: &Path, jpeg_quality: u8) -> Self {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension);

        match format {
            Some(ImageFormat::Png) => Self::Png,
            _ => Self::Jpeg {
                quality: jpeg_quality.clamp(1, 100),
            },
        }
    }
}

/// Dimensions and detected container format of an image on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Detected format, lowercase (`"jpeg"`, `"png"`), if recognised.
    pub format: Option<String>,
}

/// Reads dimensions without decoding pixel data.
pub fn read_metadata(path: &Path) -> Result<ImageMetadata> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader
        .format()
        .map(|f| format!("{f:?}").to_ascii_lowercase());
    let (width, height) = reader.into_dimensions()?;
    Ok(ImageMetadata {
        width,
        height,
        format,
    })
}

/// Decodes an image, detecting the format from content.
pub fn decode(path: &Path) -> Result<DynamicImage> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image)
}

/// Encodes `image` to `path` in `format`.
///
/// JPEG output drops the alpha channel.
pub fn encode(image: &DynamicImage, path: &Path, format: OutputFormat) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    match format {
        OutputFormat::Jpeg { quality } => {
            let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
        }
        OutputFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            image.write_with_encoder(encoder)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Pixelates `image` into square blocks of `block_size` pixels.
///
/// The image is shrunk to `max(1, dim / block_size)` per axis with
/// nearest-neighbour sampling and scaled back to its original size the same
/// way. A block size of 0 or 1 leaves the pixels untouched.
#[must_use]
pub fn pixelate(image: &DynamicImage, block_size: u32) -> DynamicImage {
    if block_size <= 1 {
        return image.clone();
    }

    let (width, height) = (image.width(), image.height());
    let small_width = (width / block_size).max(1);
    let small_height = (height / block_size).max(1);

    image
        .resize_exact(small_width, small_height, FilterType::Nearest)
        .resize_exact(width, height, FilterType::Nearest)
}

/// Rotates `image` clockwise by `angle` degrees.
///
/// Multiples of 90 are exact. Any other angle is rendered onto the bounding
/// canvas of the rotated image with bilinear sampling; uncovered corners are
/// filled with [`ROTATE_BACKGROUND`].
pub fn rotate(image: &DynamicImage, angle: f64) -> Result<DynamicImage> {
    if !angle.is_finite() {
        return Err(PipelineError::invalid_parameter("angle", "must be a finite number"));
    }

    let normalized = angle.rem_euclid(360.0);
    let quarter = normalized / 90.0;
    if (quarter - quarter.round()).abs() < 1e-9 {
        // rounded quarter turns are in 0..=4
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        return Ok(match quarter.round() as u32 % 4 {
            0 => image.clone(),
            1 => image.rotate90(),
            2 => image.rotate180(),
            _ => image.rotate270(),
        });
    }

    Ok(DynamicImage::ImageRgba8(rotate_bilinear(
        &image.to_rgba8(),
        normalized.to_radians(),
    )))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn rotate_bilinear(source: &RgbaImage, radians: f64) -> RgbaImage {
    let (src_w, src_h) = (f64::from(source.width()), f64::from(source.height()));
    let (sin, cos) = radians.sin_cos();

    let out_w = (src_w * cos.abs() + src_h * sin.abs()).round().max(1.0) as u32;
    let out_h = (src_w * sin.abs() + src_h * cos.abs()).round().max(1.0) as u32;

    let (src_cx, src_cy) = (src_w / 2.0, src_h / 2.0);
    let (out_cx, out_cy) = (f64::from(out_w) / 2.0, f64::from(out_h) / 2.0);

    RgbaImage::from_fn(out_w, out_h, |x, y| {
        let dx = f64::from(x) + 0.5 - out_cx;
        let dy = f64::from(y) + 0.5 - out_cy;
        let sx = dx * cos + dy * sin + src_cx - 0.5;
        let sy = -dx * sin + dy * cos + src_cy - 0.5;
        sample_bilinear(source, sx, sy).unwrap_or(ROTATE_BACKGROUND)
    })
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn sample_bilinear(source: &RgbaImage, x: f64, y: f64) -> Option<Rgba<u8>> {
    let (w, h) = (source.width(), source.height());
    if x < -0.5 || y < -0.5 || x > f64::from(w) - 0.5 || y > f64::from(h) - 0.5 {
        return None;
    }

    let x0 = x.floor();
    let y0 = y.floor();
    let (fx, fy) = (x - x0, y - y0);

    let clamp = |v: f64, max: u32| -> u32 { v.max(0.0).min(f64::from(max - 1)) as u32 };
    let (xa, xb) = (clamp(x0, w), clamp(x0 + 1.0, w));
    let (ya, yb) = (clamp(y0, h), clamp(y0 + 1.0, h));

    let p00 = source.get_pixel(xa, ya).0;
    let p10 = source.get_pixel(xb, ya).0;
    let p01 = source.get_pixel(xa, yb).0;
    let p11 = source.get_pixel(xb, yb).0;

    let mut out = [0u8; 4];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = f64::from(p00[c]) * (1.0 - fx) + f64::from(p10[c]) * fx;
        let bottom = f64::from(p01[c]) * (1.0 - fx) + f64::from(p11[c]) * fx;
        *slot = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgba(out))
}

/// Scales and centre-crops `image` to exactly `width` x `height`.
pub fn cover(image: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage> {
    if width == 0 {
        return Err(PipelineError::invalid_parameter("width", "must be greater than zero"));
    }
    if height == 0 {
        return Err(PipelineError::invalid_parameter("height", "must be greater than zero"));
    }
    Ok(image.resize_to_fill(width, height, FilterType::Lanczos3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use pretty_assertions::assert_eq;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn test_output_format_from_final_extension() {
        assert_eq!(
            OutputFormat::for_path(Path::new("out/a_final.jpg"), 90),
            OutputFormat::Jpeg { quality: 90 }
        );
        assert_eq!(
            OutputFormat::for_path(Path::new("out/a_final.JPEG"), 75),
            OutputFormat::Jpeg { quality: 75 }
        );
        assert_eq!(OutputFormat::for_path(Path::new("out/a.png"), 90), OutputFormat::Png);
        assert_eq!(
            OutputFormat::for_path(Path::new("out/no_extension"), 0),
            OutputFormat::Jpeg { quality: 1 }
        );
    }

    #[test]
    fn test_pixelate_small_blocks_are_identity() {
        let image = gradient(37, 21);
        for block in [0, 1] {
            let out = pixelate(&image, block);
            assert_eq!(out.to_rgb8().as_raw(), image.to_rgb8().as_raw());
        }
    }

    #[test]
    fn test_pixelate_keeps_dimensions() {
        let image = gradient(64, 40);
        let out = pixelate(&image, 10);
        assert_eq!((out.width(), out.height()), (64, 40));
    }

    #[test]
    fn test_pixelate_larger_than_image_is_uniform() {
        let image = gradient(8, 8);
        let out = pixelate(&image, 50).to_rgb8();
        let first = *out.get_pixel(0, 0);
        assert!(out.pixels().all(|p| *p == first));
    }

    #[test]
    fn test_pixelate_non_square_keeps_long_axis_blocks() {
        let image = gradient(40, 8);
        let out = pixelate(&image, 8).to_rgb8();
        // 5x1 blocks: each 8px column band is uniform
        assert_eq!(out.get_pixel(0, 0), out.get_pixel(7, 7));
        assert_ne!(out.get_pixel(0, 0), out.get_pixel(39, 0));
    }

    #[test]
    fn test_rotate_quarter_turns_swap_dimensions() {
        let image = gradient(30, 10);
        let out = rotate(&image, 90.0).unwrap();
        assert_eq!((out.width(), out.height()), (10, 30));

        let out = rotate(&image, -90.0).unwrap();
        assert_eq!((out.width(), out.height()), (10, 30));

        let out = rotate(&image, 180.0).unwrap();
        assert_eq!((out.width(), out.height()), (30, 10));
    }

    #[test]
    fn test_rotate_full_turn_keeps_pixels() {
        let image = gradient(12, 9);
        let out = rotate(&image, 360.0).unwrap();
        assert_eq!((out.width(), out.height()), (12, 9));
        assert_eq!(out.to_rgb8().as_raw(), image.to_rgb8().as_raw());
    }

    #[test]
    fn test_rotate_90_is_clockwise() {
        let mut source = image::RgbImage::from_pixel(2, 1, Rgb([0, 0, 0]));
        source.put_pixel(0, 0, Rgb([255, 0, 0]));
        let out = rotate(&DynamicImage::ImageRgb8(source), 90.0).unwrap().to_rgb8();
        // the left pixel ends up on top
        assert_eq!(*out.get_pixel(0, 0), Rgb([255, 0, 0]));
    }

    #[test]
    fn test_rotate_arbitrary_angle_grows_canvas() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(100, 100, Rgb([200, 200, 200])));
        let out = rotate(&image, 45.0).unwrap();

        assert_eq!((out.width(), out.height()), (141, 141));
        let rgba = out.to_rgba8();
        assert_eq!(*rgba.get_pixel(0, 0), ROTATE_BACKGROUND);
        assert_eq!(*rgba.get_pixel(70, 70), Rgba([200, 200, 200, 255]));
    }

    #[test]
    fn test_rotate_rejects_non_finite_angle() {
        assert!(rotate(&gradient(2, 2), f64::NAN).is_err());
    }

    #[test]
    fn test_cover_yields_exact_dimensions() {
        for (w, h) in [(300, 300), (120, 40), (17, 90)] {
            let out = cover(&gradient(64, 48), w, h).unwrap();
            assert_eq!((out.width(), out.height()), (w, h));
        }
    }

    #[test]
    fn test_cover_rejects_zero_dimension() {
        let err = cover(&gradient(4, 4), 0, 10).unwrap_err();
        assert!(err.to_string().contains("width"));
    }

    #[test]
    fn test_encode_and_read_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let image = gradient(40, 30);

        let jpg = dir.path().join("a.jpg");
        encode(&image, &jpg, OutputFormat::Jpeg { quality: 90 }).unwrap();
        let meta = read_metadata(&jpg).unwrap();
        assert_eq!((meta.width, meta.height), (40, 30));
        assert_eq!(meta.format.as_deref(), Some("jpeg"));

        // content sniffing does not depend on the extension
        let png = dir.path().join("b.tmp123");
        encode(&image, &png, OutputFormat::Png).unwrap();
        let meta = read_metadata(&png).unwrap();
        assert_eq!(meta.format.as_deref(), Some("png"));
        assert_eq!(decode(&png).unwrap().to_rgb8().as_raw(), image.to_rgb8().as_raw());
    }
}

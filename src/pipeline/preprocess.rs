//! Image normalization for model transmission
//!
//! Any input is reduced to an opaque RGB JPEG bounded by the configured
//! maximum dimension: alpha and palette images are composited onto a white
//! background, other color modes converted directly, and the result
//! re-encoded at the configured quality. Pure with respect to shared state,
//! safe to run in parallel across requests.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, RgbImage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("failed to read image: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Decode(ImageError),

    #[error("failed to encode image: {0}")]
    Encode(ImageError),
}

#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    max_dimension: u32,
    jpeg_quality: u8,
}

impl ImagePreprocessor {
    pub fn new(max_dimension: u32, jpeg_quality: u8) -> Self {
        Self {
            max_dimension,
            jpeg_quality,
        }
    }

    /// Normalize raw image bytes into a compact JPEG for the model call
    pub fn normalize(&self, raw: &[u8]) -> Result<Vec<u8>, PreprocessError> {
        let decoded = image::load_from_memory(raw).map_err(PreprocessError::Decode)?;

        let rgb = flatten_to_rgb(decoded);
        let resized = self.bound_dimensions(rgb);

        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, self.jpeg_quality);
        resized
            .write_with_encoder(encoder)
            .map_err(PreprocessError::Encode)?;

        Ok(out)
    }

    /// Shrink so the longer side fits `max_dimension`, keeping aspect ratio.
    /// Images already within bounds pass through untouched (no upscaling).
    fn bound_dimensions(&self, img: DynamicImage) -> DynamicImage {
        let (w, h) = (img.width(), img.height());
        if w <= self.max_dimension && h <= self.max_dimension {
            return img;
        }
        img.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3)
    }
}

/// Composite transparent pixels onto white and drop the alpha channel.
/// The decoder already expands palette images (with their transparency)
/// to RGB/RGBA, so a single alpha check covers both cases.
fn flatten_to_rgb(img: DynamicImage) -> DynamicImage {
    if !img.color().has_alpha() {
        return DynamicImage::ImageRgb8(img.to_rgb8());
    }

    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut flat = RgbImage::new(w, h);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u16;
        let blend = |c: u8| -> u8 { ((c as u16 * alpha + 255 * (255 - alpha)) / 255) as u8 };
        flat.put_pixel(x, y, image::Rgb([blend(r), blend(g), blend(b)]));
    }

    DynamicImage::ImageRgb8(flat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};

    fn encode_png(img: &DynamicImage) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn preprocessor() -> ImagePreprocessor {
        ImagePreprocessor::new(1024, 85)
    }

    #[test]
    fn output_is_jpeg_without_alpha() {
        let mut rgba = RgbaImage::new(8, 8);
        for pixel in rgba.pixels_mut() {
            *pixel = Rgba([200, 100, 50, 128]);
        }
        let raw = encode_png(&DynamicImage::ImageRgba8(rgba));

        let jpeg = preprocessor().normalize(&raw).unwrap();

        let reloaded = image::load_from_memory(&jpeg).unwrap();
        assert!(!reloaded.color().has_alpha());
        assert_eq!(
            image::guess_format(&jpeg).unwrap(),
            image::ImageFormat::Jpeg
        );
    }

    #[test]
    fn fully_transparent_pixels_become_white() {
        let mut rgba = RgbaImage::new(4, 4);
        for pixel in rgba.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }

        let flat = flatten_to_rgb(DynamicImage::ImageRgba8(rgba));
        let rgb = flat.to_rgb8();
        assert_eq!(*rgb.get_pixel(0, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn opaque_pixels_keep_their_color() {
        let mut rgba = RgbaImage::new(4, 4);
        for pixel in rgba.pixels_mut() {
            *pixel = Rgba([10, 20, 30, 255]);
        }

        let flat = flatten_to_rgb(DynamicImage::ImageRgba8(rgba));
        let rgb = flat.to_rgb8();
        assert_eq!(*rgb.get_pixel(2, 2), Rgb([10, 20, 30]));
    }

    #[test]
    fn oversized_image_is_bounded_preserving_aspect() {
        let wide = DynamicImage::ImageRgb8(image::RgbImage::new(2048, 512));
        let raw = encode_png(&wide);

        let jpeg = ImagePreprocessor::new(1024, 85).normalize(&raw).unwrap();
        let reloaded = image::load_from_memory(&jpeg).unwrap();

        assert_eq!(reloaded.width(), 1024);
        assert_eq!(reloaded.height(), 256);
    }

    #[test]
    fn small_image_is_not_upscaled() {
        let small = DynamicImage::ImageRgb8(image::RgbImage::new(300, 200));
        let raw = encode_png(&small);

        let jpeg = preprocessor().normalize(&raw).unwrap();
        let reloaded = image::load_from_memory(&jpeg).unwrap();

        assert_eq!(reloaded.width(), 300);
        assert_eq!(reloaded.height(), 200);
    }

    #[test]
    fn garbage_bytes_fail_with_decode_error() {
        let result = preprocessor().normalize(b"definitely not an image");
        assert!(matches!(result, Err(PreprocessError::Decode(_))));
    }
}

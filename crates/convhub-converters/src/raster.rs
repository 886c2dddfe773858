//! In-process raster image conversion.

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tracing::debug;

use convhub_core::traits::{Converter, ConverterError};
use convhub_core::types::{ConversionOptions, Format};

/// Raster formats this converter reads and writes.
const RASTER_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "tiff", "gif", "ico"];

/// JPEG quality when the `quality` option is absent.
const DEFAULT_JPEG_QUALITY: u8 = 95;

/// ICO images cannot exceed this edge length.
const ICO_MAX_EDGE: u32 = 256;

/// Converts between raster formats with the `image` crate.
///
/// Options:
/// - `quality`: JPEG quality, 1..=100.
/// - `width` / `height`: resize to exactly these dimensions; when only one
///   is given the other follows the aspect ratio.
/// - `max_width` / `max_height`: shrink to fit, preserving aspect ratio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageConverter;

impl ImageConverter {
    /// Create the converter.
    pub fn new() -> Self {
        Self
    }
}

fn image_format(format: &Format) -> Option<ImageFormat> {
    if !RASTER_FORMATS.contains(&format.as_str()) {
        return None;
    }
    ImageFormat::from_extension(format.as_str())
}

fn option_u32(options: &ConversionOptions, key: &str) -> Result<Option<u32>, ConverterError> {
    match options.get_u32(key) {
        Ok(Some(0)) => Err(ConverterError::Unsupported(format!("Option '{key}' must be > 0"))),
        Ok(value) => Ok(value),
        Err(e) => Err(ConverterError::Unsupported(e.message)),
    }
}

/// Composite an image with alpha onto a white background.
fn flatten_on_white(img: &DynamicImage) -> DynamicImage {
    if !img.color().has_alpha() {
        return DynamicImage::ImageRgb8(img.to_rgb8());
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let a = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * a + 255 * (255 - a)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    DynamicImage::ImageRgb8(out)
}

fn resize(img: DynamicImage, options: &ConversionOptions) -> Result<DynamicImage, ConverterError> {
    let (w, h) = (img.width(), img.height());
    let img = match (option_u32(options, "width")?, option_u32(options, "height")?) {
        (Some(tw), Some(th)) => img.resize_exact(tw, th, FilterType::Lanczos3),
        (Some(tw), None) => {
            let th = ((u64::from(h) * u64::from(tw)) / u64::from(w.max(1))).max(1) as u32;
            img.resize_exact(tw, th, FilterType::Lanczos3)
        }
        (None, Some(th)) => {
            let tw = ((u64::from(w) * u64::from(th)) / u64::from(h.max(1))).max(1) as u32;
            img.resize_exact(tw, th, FilterType::Lanczos3)
        }
        (None, None) => img,
    };

    let max_w = option_u32(options, "max_width")?.unwrap_or(u32::MAX);
    let max_h = option_u32(options, "max_height")?.unwrap_or(u32::MAX);
    if img.width() > max_w || img.height() > max_h {
        return Ok(img.resize(max_w.min(img.width()), max_h.min(img.height()), FilterType::Lanczos3));
    }
    Ok(img)
}

fn encode(
    img: DynamicImage,
    format: ImageFormat,
    options: &ConversionOptions,
) -> Result<Vec<u8>, ConverterError> {
    let mut buf = Cursor::new(Vec::new());
    let encode_err = |e: image::ImageError| ConverterError::Other(format!("encoding failed: {e}"));

    match format {
        ImageFormat::Jpeg => {
            let quality = match option_u32(options, "quality")? {
                None => DEFAULT_JPEG_QUALITY,
                Some(q) if q <= 100 => q as u8,
                Some(q) => {
                    return Err(ConverterError::Unsupported(format!(
                        "JPEG quality {q} is out of range 1..=100"
                    )));
                }
            };
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            flatten_on_white(&img)
                .write_with_encoder(encoder)
                .map_err(encode_err)?;
        }
        ImageFormat::Bmp => flatten_on_white(&img)
            .write_to(&mut buf, format)
            .map_err(encode_err)?,
        ImageFormat::Ico => {
            let img = if img.width() > ICO_MAX_EDGE || img.height() > ICO_MAX_EDGE {
                img.resize(ICO_MAX_EDGE, ICO_MAX_EDGE, FilterType::Lanczos3)
            } else {
                img
            };
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_to(&mut buf, format)
                .map_err(encode_err)?
        }
        ImageFormat::WebP | ImageFormat::Gif | ImageFormat::Png => {
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_to(&mut buf, format)
                .map_err(encode_err)?
        }
        _ => img.write_to(&mut buf, format).map_err(encode_err)?,
    }
    Ok(buf.into_inner())
}

fn convert_blocking(
    input: &[u8],
    source: ImageFormat,
    target: ImageFormat,
    options: &ConversionOptions,
) -> Result<Vec<u8>, ConverterError> {
    let img = image::load_from_memory_with_format(input, source)
        .map_err(|e| ConverterError::MalformedInput(format!("cannot decode image: {e}")))?;
    let img = resize(img, options)?;
    encode(img, target, options)
}

#[async_trait]
impl Converter for ImageConverter {
    fn name(&self) -> &str {
        "image"
    }

    fn supports(&self, source: &Format, target: &Format) -> bool {
        image_format(source).is_some() && image_format(target).is_some()
    }

    async fn convert(
        &self,
        source: &Format,
        target: &Format,
        input: Bytes,
        options: &ConversionOptions,
    ) -> Result<Bytes, ConverterError> {
        let (Some(src), Some(dst)) = (image_format(source), image_format(target)) else {
            return Err(ConverterError::Unsupported(format!(
                "{source} -> {target} is not a raster conversion"
            )));
        };
        let options = options.clone();
        let out = tokio::task::spawn_blocking(move || convert_blocking(&input, src, dst, &options))
            .await
            .map_err(|e| ConverterError::Other(format!("image task failed: {e}")))??;
        debug!(%source, %target, bytes = out.len(), "Converted image");
        Ok(Bytes::from(out))
    }
}

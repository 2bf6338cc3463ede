//! Image processor - decoding and JPEG normalisation

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageReader, Rgb, RgbImage};

use crate::traits::CodecError;

const JPEG_QUALITY: u8 = 90;

/// A decoded image re-encoded as baseline RGB JPEG.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub width: u32,
    pub height: u32,
    pub jpeg: Vec<u8>,
}

pub struct ImageProcessor;

impl ImageProcessor {
    pub fn decode(data: &[u8]) -> Result<DynamicImage, CodecError> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        reader.decode().map_err(|e| CodecError::Decode(e.to_string()))
    }

    /// Decodes any supported format and re-encodes it as RGB JPEG.
    ///
    /// Transparent pixels are composited onto white, so signatures drawn on
    /// a transparent canvas stay legible.
    pub fn normalize(data: &[u8]) -> Result<NormalizedImage, CodecError> {
        let img = Self::decode(data)?;
        let (width, height) = img.dimensions();
        let rgb = flatten_on_white(&img);

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode_image(&rgb)
            .map_err(|e| CodecError::Encode(e.to_string()))?;

        Ok(NormalizedImage {
            width,
            height,
            jpeg,
        })
    }
}

fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

//! Binary PPM (P6, 8-bit) codec.

use std::io::Write;

use tracing::debug;

use crate::image_bundle::codec::decoder::{ImageDecoder, raster_from_samples};
use crate::image_bundle::codec::encoder::ImageEncoder;
use crate::image_bundle::common::error::{BundleError, Result};
use crate::image_bundle::raster::{
    ColorSpace, ImageFormat, ImageHeader, PixelType, RasterImage,
};

const MAGIC: &[u8; 2] = b"P6";
const MAX_VALUE: usize = 255;

pub struct PpmDecoder;

pub struct PpmEncoder;

/// Parsed ASCII header plus the offset of the first raster byte.
struct PpmHeader {
    width: usize,
    height: usize,
    data_offset: usize,
}

/// Returns the next whitespace-delimited token, skipping `#` comments.
fn next_token(data: &[u8], pos: &mut usize) -> Result<usize> {
    loop {
        match data.get(*pos) {
            Some(b'#') => {
                while *pos < data.len() && data[*pos] != b'\n' {
                    *pos += 1;
                }
            }
            Some(b) if b.is_ascii_whitespace() => *pos += 1,
            Some(_) => break,
            None => return Err(BundleError::Decode("truncated PPM header".to_string())),
        }
    }
    let start = *pos;
    while *pos < data.len() && data[*pos].is_ascii_digit() {
        *pos += 1;
    }
    if start == *pos {
        return Err(BundleError::Decode(format!(
            "expected a number in PPM header at byte {}",
            start
        )));
    }
    std::str::from_utf8(&data[start..*pos])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| BundleError::Decode("PPM header value out of range".to_string()))
}

fn parse_header(data: &[u8]) -> Result<PpmHeader> {
    if data.len() < 2 || &data[..2] != MAGIC {
        return Err(BundleError::Decode("missing P6 magic".to_string()));
    }
    let mut pos = 2;
    let width = next_token(data, &mut pos)?;
    let height = next_token(data, &mut pos)?;
    let max_value = next_token(data, &mut pos)?;
    if max_value != MAX_VALUE {
        return Err(BundleError::UnsupportedFormat(format!(
            "PPM max value {} (only {} is supported)",
            max_value, MAX_VALUE
        )));
    }
    // exactly one whitespace byte separates the header from the raster
    match data.get(pos) {
        Some(b) if b.is_ascii_whitespace() => pos += 1,
        _ => return Err(BundleError::Decode("truncated PPM header".to_string())),
    }
    Ok(PpmHeader {
        width,
        height,
        data_offset: pos,
    })
}

impl ImageDecoder for PpmDecoder {
    fn decode_header(&self, data: &[u8]) -> Result<ImageHeader> {
        let parsed = parse_header(data)?;
        ImageHeader::new(ImageFormat::Ppm, ColorSpace::Rgb, parsed.width, parsed.height, 3)
    }

    fn decode_image(
        &self,
        data: &[u8],
        header: &ImageHeader,
        pixel_type: PixelType,
    ) -> Result<RasterImage> {
        let parsed = parse_header(data)?;
        let expected = parsed
            .width
            .checked_mul(parsed.height)
            .and_then(|pixels| pixels.checked_mul(3))
            .ok_or_else(|| {
                BundleError::Decode(format!(
                    "PPM dimensions {}x{} overflow",
                    parsed.width, parsed.height
                ))
            })?;
        let samples = parsed
            .data_offset
            .checked_add(expected)
            .and_then(|end| data.get(parsed.data_offset..end))
            .ok_or_else(|| {
                BundleError::Decode(format!(
                    "PPM raster truncated: {} bytes available, {} required",
                    data.len().saturating_sub(parsed.data_offset),
                    expected
                ))
            })?;
        debug!("Decoded PPM {}x{}", parsed.width, parsed.height);
        raster_from_samples(header, parsed.width, parsed.height, 3, samples, pixel_type)
    }
}

impl ImageEncoder for PpmEncoder {
    fn encode_image(&self, image: &RasterImage, output: &mut dyn Write) -> Result<()> {
        if image.color_space() != ColorSpace::Rgb {
            return Err(BundleError::IllegalArgument(format!(
                "PPM encoder requires an RGB raster, got {:?}",
                image.color_space()
            )));
        }
        write!(output, "P6\n{} {}\n{}\n", image.width(), image.height(), MAX_VALUE)?;
        output.write_all(&image.pixels().to_u8_vec())?;
        Ok(())
    }
}

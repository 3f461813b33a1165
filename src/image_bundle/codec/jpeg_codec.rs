//! JPEG codec.
//!
//! Headers are recovered by walking marker segments up to the start-of-frame
//! marker, so culling never pays for entropy decoding. Pixel decode uses
//! `jpeg-decoder` with its color transform disabled; the YCbCr to RGB step is
//! done here so the conversion coefficients stay fixed.

use std::io::{Cursor, Write};

use image::ExtendedColorType;
use tracing::debug;

use crate::image_bundle::codec::decoder::{ImageDecoder, raster_from_samples};
use crate::image_bundle::codec::encoder::ImageEncoder;
use crate::image_bundle::common::error::{BundleError, Result};
use crate::image_bundle::raster::{
    ColorSpace, ImageFormat, ImageHeader, PixelType, RasterImage,
};

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const SOF_BASELINE: u8 = 0xC0;
const SOF_PROGRESSIVE: u8 = 0xC2;
/// Markers that carry no length field.
const TEM: u8 = 0x01;
const RST_FIRST: u8 = 0xD0;
const RST_LAST: u8 = 0xD7;

pub struct JpegDecoder;

pub struct JpegEncoder {
    quality: u8,
}

impl JpegEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

/// Frame parameters from a SOF segment.
#[derive(Debug, Clone, Copy)]
struct FrameInfo {
    precision: u8,
    height: usize,
    width: usize,
    components: u8,
}

fn is_sof(marker: u8) -> bool {
    // C4 (DHT), C8 (JPG) and CC (DAC) share the range but are not frames
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

fn is_standalone(marker: u8) -> bool {
    marker == TEM || (RST_FIRST..=RST_LAST).contains(&marker)
}

fn read_u16(data: &[u8], pos: usize) -> Result<usize> {
    match data.get(pos..pos + 2) {
        Some(b) => Ok(u16::from_be_bytes([b[0], b[1]]) as usize),
        None => Err(BundleError::Decode("truncated JPEG marker segment".to_string())),
    }
}

/// Skips entropy-coded data following a scan header. Stops at the next marker
/// that is neither a stuffed zero nor a restart marker.
fn skip_entropy_coded(data: &[u8], mut pos: usize) -> usize {
    while pos + 1 < data.len() {
        if data[pos] == 0xFF {
            let next = data[pos + 1];
            if next != 0x00 && next != 0xFF && !(RST_FIRST..=RST_LAST).contains(&next) {
                return pos;
            }
        }
        pos += 1;
    }
    data.len()
}

fn find_frame(data: &[u8]) -> Result<FrameInfo> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
        return Err(BundleError::Decode("missing JPEG SOI marker".to_string()));
    }

    let mut pos = 2;
    loop {
        // markers may be preceded by any number of 0xFF fill bytes
        while pos < data.len() && data[pos] != 0xFF {
            pos += 1;
        }
        while pos < data.len() && data[pos] == 0xFF {
            pos += 1;
        }
        let Some(&marker) = data.get(pos) else {
            return Err(BundleError::Decode(
                "no start-of-frame marker before end of data".to_string(),
            ));
        };
        pos += 1;

        if is_standalone(marker) {
            continue;
        }
        if marker == EOI {
            return Err(BundleError::Decode(
                "end of image reached before start-of-frame".to_string(),
            ));
        }

        let length = read_u16(data, pos)?;
        if length < 2 {
            return Err(BundleError::Decode(format!(
                "invalid JPEG segment length {} for marker 0x{:02X}",
                length, marker
            )));
        }

        if is_sof(marker) {
            if marker != SOF_BASELINE && marker != SOF_PROGRESSIVE {
                return Err(BundleError::UnsupportedFormat(format!(
                    "JPEG frame type 0x{:02X}",
                    marker
                )));
            }
            let segment = data
                .get(pos + 2..pos + length)
                .filter(|s| s.len() >= 6)
                .ok_or_else(|| BundleError::Decode("truncated JPEG SOF segment".to_string()))?;
            return Ok(FrameInfo {
                precision: segment[0],
                height: u16::from_be_bytes([segment[1], segment[2]]) as usize,
                width: u16::from_be_bytes([segment[3], segment[4]]) as usize,
                components: segment[5],
            });
        }

        pos += length;
        if marker == SOS {
            pos = skip_entropy_coded(data, pos);
        }
    }
}

/// YCbCr to RGB with fixed coefficients, each channel clamped to `[0, 255]`.
pub(super) fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let y = y as f32;
    let cb = cb as f32 - 128.0;
    let cr = cr as f32 - 128.0;
    let r = y + 1.402 * cr;
    let g = y - 0.344136 * cb - 0.714136 * cr;
    let b = y + 1.772 * cb;
    [clamp_channel(r), clamp_channel(g), clamp_channel(b)]
}

fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

impl ImageDecoder for JpegDecoder {
    fn decode_header(&self, data: &[u8]) -> Result<ImageHeader> {
        let frame = find_frame(data)?;
        if frame.precision != 8 {
            return Err(BundleError::UnsupportedFormat(format!(
                "JPEG bit depth {} (only 8 is supported)",
                frame.precision
            )));
        }
        let color_space = match frame.components {
            1 => ColorSpace::Lum,
            3 => ColorSpace::Rgb,
            n => {
                return Err(BundleError::UnsupportedFormat(format!(
                    "JPEG with {} components",
                    n
                )));
            }
        };
        ImageHeader::new(
            ImageFormat::Jpeg,
            color_space,
            frame.width,
            frame.height,
            color_space.num_bands(),
        )
    }

    fn decode_image(
        &self,
        data: &[u8],
        header: &ImageHeader,
        pixel_type: PixelType,
    ) -> Result<RasterImage> {
        let mut decoder = jpeg_decoder::Decoder::new(Cursor::new(data));
        decoder.set_color_transform(jpeg_decoder::ColorTransform::None);
        let mut samples = decoder
            .decode()
            .map_err(|e| BundleError::Decode(e.to_string()))?;
        let info = decoder
            .info()
            .ok_or_else(|| BundleError::Decode("JPEG decoder returned no frame info".to_string()))?;

        let bands = match info.pixel_format {
            jpeg_decoder::PixelFormat::L8 => 1,
            jpeg_decoder::PixelFormat::RGB24 => {
                for px in samples.chunks_exact_mut(3) {
                    px.copy_from_slice(&ycbcr_to_rgb(px[0], px[1], px[2]));
                }
                3
            }
            other => {
                return Err(BundleError::UnsupportedFormat(format!(
                    "JPEG pixel format {:?}",
                    other
                )));
            }
        };

        debug!("Decoded JPEG {}x{}x{}", info.width, info.height, bands);
        raster_from_samples(
            header,
            info.width as usize,
            info.height as usize,
            bands,
            &samples,
            pixel_type,
        )
    }
}

impl ImageEncoder for JpegEncoder {
    fn encode_image(&self, image: &RasterImage, output: &mut dyn Write) -> Result<()> {
        let color_type = match image.color_space() {
            ColorSpace::Rgb => ExtendedColorType::Rgb8,
            ColorSpace::Lum => ExtendedColorType::L8,
        };
        let width = u32::try_from(image.width())
            .map_err(|_| BundleError::IllegalArgument("image too wide for JPEG".to_string()))?;
        let height = u32::try_from(image.height())
            .map_err(|_| BundleError::IllegalArgument("image too tall for JPEG".to_string()))?;
        if width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(BundleError::IllegalArgument(format!(
                "{}x{} exceeds the JPEG dimension limit",
                width, height
            )));
        }

        let samples = image.pixels().to_u8_vec();
        let mut buffer = Vec::new();
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, self.quality);
        encoder
            .encode(&samples, width, height, color_type)
            .map_err(|e| BundleError::Encode(e.to_string()))?;

        output.write_all(&buffer)?;
        debug!("Encoded JPEG {}x{}, {} bytes", width, height, buffer.len());
        Ok(())
    }
}

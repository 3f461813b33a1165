//! PNG codec backed by the `image` crate.

use std::io::Write;

use image::ExtendedColorType;
use image::ImageEncoder as _;
use tracing::debug;

use crate::image_bundle::codec::decoder::{ImageDecoder, raster_from_samples};
use crate::image_bundle::codec::encoder::ImageEncoder;
use crate::image_bundle::common::error::{BundleError, Result};
use crate::image_bundle::raster::{
    ColorSpace, ImageFormat, ImageHeader, PixelType, RasterImage,
};

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Grayscale and grayscale + alpha.
const GRAY_COLOR_TYPES: [u8; 2] = [0, 4];

pub struct PngDecoder;

pub struct PngEncoder;

impl ImageDecoder for PngDecoder {
    /// Reads the signature and the IHDR chunk only.
    fn decode_header(&self, data: &[u8]) -> Result<ImageHeader> {
        if data.len() < 8 || data[..8] != SIGNATURE {
            return Err(BundleError::Decode("missing PNG signature".to_string()));
        }
        // length(4) type(4) width(4) height(4) depth(1) color type(1)
        let ihdr = data
            .get(8..26)
            .ok_or_else(|| BundleError::Decode("truncated PNG IHDR chunk".to_string()))?;
        if &ihdr[4..8] != b"IHDR" {
            return Err(BundleError::Decode(
                "first PNG chunk is not IHDR".to_string(),
            ));
        }
        let width = u32::from_be_bytes([ihdr[8], ihdr[9], ihdr[10], ihdr[11]]) as usize;
        let height = u32::from_be_bytes([ihdr[12], ihdr[13], ihdr[14], ihdr[15]]) as usize;
        let color_type = ihdr[17];

        let color_space = if GRAY_COLOR_TYPES.contains(&color_type) {
            ColorSpace::Lum
        } else {
            ColorSpace::Rgb
        };
        ImageHeader::new(
            ImageFormat::Png,
            color_space,
            width,
            height,
            color_space.num_bands(),
        )
    }

    fn decode_image(
        &self,
        data: &[u8],
        header: &ImageHeader,
        pixel_type: PixelType,
    ) -> Result<RasterImage> {
        let decoded = image::load_from_memory_with_format(data, image::ImageFormat::Png)
            .map_err(|e| BundleError::Decode(e.to_string()))?;
        let width = decoded.width() as usize;
        let height = decoded.height() as usize;

        // alpha is dropped and 16-bit samples are reduced to 8 bits
        let (bands, samples) = if decoded.color().has_color() {
            (3, decoded.to_rgb8().into_raw())
        } else {
            (1, decoded.to_luma8().into_raw())
        };
        debug!("Decoded PNG {}x{}x{}", width, height, bands);
        raster_from_samples(header, width, height, bands, &samples, pixel_type)
    }
}

impl ImageEncoder for PngEncoder {
    fn encode_image(&self, image: &RasterImage, output: &mut dyn Write) -> Result<()> {
        let color_type = match image.color_space() {
            ColorSpace::Rgb => ExtendedColorType::Rgb8,
            ColorSpace::Lum => ExtendedColorType::L8,
        };
        let width = u32::try_from(image.width())
            .map_err(|_| BundleError::IllegalArgument("image too wide for PNG".to_string()))?;
        let height = u32::try_from(image.height())
            .map_err(|_| BundleError::IllegalArgument("image too tall for PNG".to_string()))?;

        let samples = image.pixels().to_u8_vec();
        let mut buffer = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buffer)
            .write_image(&samples, width, height, color_type)
            .map_err(|e| BundleError::Encode(e.to_string()))?;

        output.write_all(&buffer)?;
        debug!("Encoded PNG {}x{}, {} bytes", width, height, buffer.len());
        Ok(())
    }
}

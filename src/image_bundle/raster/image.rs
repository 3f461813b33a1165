//! Decoded raster images

use std::io::{Read, Write};

use crate::image_bundle::common::error::{BundleError, Result};
use crate::image_bundle::raster::header::{ColorSpace, ImageHeader};
use crate::image_bundle::raster::pixel_array::{PixelArray, PixelType, Sample};

/// Luminance weights used by [`RasterImage::to_luminance`].
const LUM_WEIGHTS: [f32; 3] = [0.30, 0.59, 0.11];

/// A decoded image: a header plus exactly `width * height * bands` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    header: ImageHeader,
    pixels: PixelArray,
}

impl RasterImage {
    /// Zero-filled raster shaped by `header`.
    pub fn new(header: ImageHeader, pixel_type: PixelType) -> Self {
        let pixels = PixelArray::new(pixel_type, header.sample_count());
        Self { header, pixels }
    }

    pub fn from_parts(header: ImageHeader, pixels: PixelArray) -> Result<Self> {
        if pixels.len() != header.sample_count() {
            return Err(BundleError::IllegalArgument(format!(
                "pixel array holds {} samples, header {}x{}x{} requires {}",
                pixels.len(),
                header.width(),
                header.height(),
                header.num_bands(),
                header.sample_count()
            )));
        }
        Ok(Self { header, pixels })
    }

    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut ImageHeader {
        &mut self.header
    }

    pub fn pixels(&self) -> &PixelArray {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut PixelArray {
        &mut self.pixels
    }

    pub fn into_parts(self) -> (ImageHeader, PixelArray) {
        (self.header, self.pixels)
    }

    pub fn width(&self) -> usize {
        self.header.width()
    }

    pub fn height(&self) -> usize {
        self.header.height()
    }

    pub fn num_bands(&self) -> usize {
        self.header.num_bands()
    }

    pub fn color_space(&self) -> ColorSpace {
        self.header.color_space()
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixels.pixel_type()
    }

    /// Compares shape and normalized samples; `max_difference` is in `[0, 1]`
    /// units regardless of storage type.
    pub fn equals_with_tolerance(&self, other: &RasterImage, max_difference: f32) -> bool {
        if !self.header.same_shape(&other.header) {
            return false;
        }
        (0..self.pixels.len()).all(|i| {
            (self.pixels.get_normalized(i) - other.pixels.get_normalized(i)).abs()
                <= max_difference
        })
    }

    /// Copies the `width` x `height` region at (`x`, `y`) into a new raster of
    /// the same storage type.
    pub fn crop(&self, x: usize, y: usize, width: usize, height: usize) -> Result<RasterImage> {
        let w = self.width();
        let h = self.height();
        let b = self.num_bands();
        if width == 0 || height == 0 || x + width > w || y + height > h {
            return Err(BundleError::IllegalArgument(format!(
                "invalid crop region {}x{} at ({}, {}) in {}x{} image",
                width, height, x, y, w, h
            )));
        }

        let header = ImageHeader::new(
            self.header.format(),
            self.color_space(),
            width,
            height,
            b,
        )?;
        let mut output = RasterImage::new(header, self.pixel_type());
        for row in 0..height {
            for col in 0..width {
                for band in 0..b {
                    let src = ((row + y) * w + (col + x)) * b + band;
                    let dst = (row * width + col) * b + band;
                    output.pixels.set(dst, self.pixels.get(src));
                }
            }
        }
        Ok(output)
    }

    /// RGB to single-band luminance. LUM input is rejected.
    pub fn to_luminance(&self) -> Result<RasterImage> {
        if self.color_space() != ColorSpace::Rgb {
            return Err(BundleError::IllegalArgument(
                "luminance conversion requires an RGB image".to_string(),
            ));
        }
        let header = ImageHeader::new(
            self.header.format(),
            ColorSpace::Lum,
            self.width(),
            self.height(),
            1,
        )?;
        let mut output = RasterImage::new(header, self.pixel_type());
        for i in 0..self.width() * self.height() {
            let lum: f32 = LUM_WEIGHTS
                .iter()
                .enumerate()
                .map(|(band, weight)| self.pixels.get_normalized(i * 3 + band) * weight)
                .sum();
            output.pixels.set_normalized(i, lum);
        }
        Ok(output)
    }

    /// Elementwise in-place addition of another float raster of the same shape.
    pub fn add(&mut self, other: &RasterImage) -> Result<()> {
        self.check_compatible(other)?;
        let rhs = float_samples(other)?.to_vec();
        for (lhs, rhs) in float_samples_mut(self)?.iter_mut().zip(rhs) {
            *lhs += rhs;
        }
        Ok(())
    }

    /// Elementwise in-place multiplication of another float raster of the same shape.
    pub fn multiply(&mut self, other: &RasterImage) -> Result<()> {
        self.check_compatible(other)?;
        let rhs = float_samples(other)?.to_vec();
        for (lhs, rhs) in float_samples_mut(self)?.iter_mut().zip(rhs) {
            *lhs *= rhs;
        }
        Ok(())
    }

    pub fn add_scalar(&mut self, value: f32) -> Result<()> {
        float_samples_mut(self)?.iter_mut().for_each(|v| *v += value);
        Ok(())
    }

    pub fn scale(&mut self, factor: f32) -> Result<()> {
        float_samples_mut(self)?.iter_mut().for_each(|v| *v *= factor);
        Ok(())
    }

    fn check_compatible(&self, other: &RasterImage) -> Result<()> {
        if !self.header.same_shape(&other.header) {
            return Err(BundleError::IllegalArgument(
                "color space and/or image dimensions do not match".to_string(),
            ));
        }
        Ok(())
    }

    /// Serializes the header followed by the raw samples (bytes, or
    /// big-endian `f32` for float storage).
    pub fn write_to(&self, out: &mut dyn Write) -> Result<()> {
        self.header.write_to(out)?;
        match &self.pixels {
            PixelArray::Byte(data) => out.write_all(data)?,
            PixelArray::Float(data) => {
                let mut buf = Vec::with_capacity(data.len() * 4);
                for v in data {
                    buf.extend_from_slice(&v.to_be_bytes());
                }
                out.write_all(&buf)?;
            }
        }
        Ok(())
    }

    /// Inverse of [`RasterImage::write_to`]; the caller names the storage type
    /// since it is not recorded in the stream.
    pub fn read_from(input: &mut dyn Read, pixel_type: PixelType) -> Result<RasterImage> {
        let header = ImageHeader::read_from(input)?;
        let count = header.sample_count();
        let pixels = match pixel_type {
            PixelType::Byte => {
                let mut data = vec![0u8; count];
                input.read_exact(&mut data)?;
                PixelArray::Byte(data)
            }
            PixelType::Float => {
                let mut raw = vec![0u8; count * 4];
                input.read_exact(&mut raw)?;
                PixelArray::Float(
                    raw.chunks_exact(4)
                        .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                        .collect(),
                )
            }
        };
        RasterImage::from_parts(header, pixels)
    }
}

impl std::fmt::Display for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.pixel_type() {
            PixelType::Float => "FloatImage",
            PixelType::Byte => "ByteImage",
        };
        let b = self.num_bands();
        write!(f, "{}: {} x {} x {} [", kind, self.width(), self.height(), b)?;
        let n = 10.min(self.width() * self.height());
        for i in 0..n {
            write!(f, "(")?;
            for band in 0..b {
                match self.pixels.get(i * b + band) {
                    Sample::Float(v) => write!(f, "{:.2}", v)?,
                    Sample::Byte(v) => write!(f, "{}", v)?,
                }
                if band + 1 < b {
                    write!(f, " ")?;
                }
            }
            write!(f, ")")?;
            if i + 1 < n {
                write!(f, " ")?;
            }
        }
        write!(f, "]")
    }
}

fn float_samples(image: &RasterImage) -> Result<&[f32]> {
    image.pixels.as_float().ok_or_else(|| {
        BundleError::IllegalArgument("arithmetic requires float pixel storage".to_string())
    })
}

fn float_samples_mut(image: &mut RasterImage) -> Result<&mut [f32]> {
    image.pixels.as_float_mut().ok_or_else(|| {
        BundleError::IllegalArgument("arithmetic requires float pixel storage".to_string())
    })
}

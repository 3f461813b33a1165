//! Pixel storage
//!
//! A [`PixelArray`] is a flat, band-interleaved sample buffer. Codecs only
//! talk to it through the 8-bit and normalized accessors, so switching a
//! raster between float and byte storage never touches codec code.

/// Sample representation requested by the caller of a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelType {
    /// Normalized 32-bit float in `[0, 1]`.
    #[default]
    Float,
    /// Raw 8-bit unsigned.
    Byte,
}

/// A single sample in its native representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Float(f32),
    Byte(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PixelArray {
    Float(Vec<f32>),
    Byte(Vec<u8>),
}

impl PixelArray {
    /// Zero-filled array of `len` samples.
    pub fn new(pixel_type: PixelType, len: usize) -> Self {
        match pixel_type {
            PixelType::Float => PixelArray::Float(vec![0.0; len]),
            PixelType::Byte => PixelArray::Byte(vec![0; len]),
        }
    }

    pub fn pixel_type(&self) -> PixelType {
        match self {
            PixelArray::Float(_) => PixelType::Float,
            PixelArray::Byte(_) => PixelType::Byte,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PixelArray::Float(data) => data.len(),
            PixelArray::Byte(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes per sample in the native representation.
    pub fn sample_size(&self) -> usize {
        match self {
            PixelArray::Float(_) => 4,
            PixelArray::Byte(_) => 1,
        }
    }

    pub fn get(&self, i: usize) -> Sample {
        match self {
            PixelArray::Float(data) => Sample::Float(data[i]),
            PixelArray::Byte(data) => Sample::Byte(data[i]),
        }
    }

    /// Stores a native sample, converting if the representations differ.
    /// A float sample into float storage is kept as is.
    pub fn set(&mut self, i: usize, sample: Sample) {
        match (self, sample) {
            (PixelArray::Float(data), Sample::Float(v)) => data[i] = v,
            (array, Sample::Float(v)) => array.set_normalized(i, v),
            (array, Sample::Byte(v)) => array.set_u8(i, v),
        }
    }

    pub fn get_normalized(&self, i: usize) -> f32 {
        match self {
            PixelArray::Float(data) => data[i],
            PixelArray::Byte(data) => data[i] as f32 / 255.0,
        }
    }

    /// Clamps to `[0, 1]`; byte storage then quantizes. The float arithmetic
    /// on [`RasterImage`](crate::image_bundle::raster::RasterImage) writes the
    /// slice directly and is not clamped.
    pub fn set_normalized(&mut self, i: usize, value: f32) {
        match self {
            PixelArray::Float(data) => data[i] = value.clamp(0.0, 1.0),
            PixelArray::Byte(data) => data[i] = quantize(value),
        }
    }

    /// 8-bit view of a sample; float samples are clamped and rounded.
    pub fn get_u8(&self, i: usize) -> u8 {
        match self {
            PixelArray::Float(data) => quantize(data[i]),
            PixelArray::Byte(data) => data[i],
        }
    }

    pub fn set_u8(&mut self, i: usize, value: u8) {
        match self {
            PixelArray::Float(data) => data[i] = value as f32 / 255.0,
            PixelArray::Byte(data) => data[i] = value,
        }
    }

    pub fn as_float(&self) -> Option<&[f32]> {
        match self {
            PixelArray::Float(data) => Some(data),
            PixelArray::Byte(_) => None,
        }
    }

    pub fn as_float_mut(&mut self) -> Option<&mut [f32]> {
        match self {
            PixelArray::Float(data) => Some(data),
            PixelArray::Byte(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PixelArray::Byte(data) => Some(data),
            PixelArray::Float(_) => None,
        }
    }

    /// Collects every sample through the 8-bit accessor.
    pub fn to_u8_vec(&self) -> Vec<u8> {
        match self {
            PixelArray::Byte(data) => data.clone(),
            PixelArray::Float(data) => data.iter().map(|&v| quantize(v)).collect(),
        }
    }

    /// Builds an array of the requested type from 8-bit samples.
    pub fn from_u8(pixel_type: PixelType, samples: &[u8]) -> Self {
        match pixel_type {
            PixelType::Byte => PixelArray::Byte(samples.to_vec()),
            PixelType::Float => {
                PixelArray::Float(samples.iter().map(|&v| v as f32 / 255.0).collect())
            }
        }
    }
}

fn quantize(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

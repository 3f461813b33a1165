//! Image header types
//!
//! The header is the part of an image every codec can recover without
//! decoding pixels: storage format, color space, dimensions and band count,
//! plus free-form string metadata.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::image_bundle::common::error::{BundleError, Result};

/// Storage format of an encoded image, with its on-disk tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Ppm,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 3] = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Ppm];

    pub fn tag(self) -> i32 {
        match self {
            ImageFormat::Jpeg => 1,
            ImageFormat::Png => 2,
            ImageFormat::Ppm => 3,
        }
    }

    /// Tag `0` is the "undefined" format and is rejected like any unknown tag.
    pub fn from_tag(tag: i32) -> Result<Self> {
        match tag {
            1 => Ok(ImageFormat::Jpeg),
            2 => Ok(ImageFormat::Png),
            3 => Ok(ImageFormat::Ppm),
            other => Err(BundleError::UnsupportedFormat(format!(
                "unknown image format tag {}",
                other
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
            ImageFormat::Ppm => "PPM",
        }
    }

    /// Guess a format from a file extension (`jpg`, `jpeg`, `png`, `ppm`).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "ppm" => Some(ImageFormat::Ppm),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Color space of decoded pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    /// Three interleaved bands.
    Rgb,
    /// Single luminance band.
    Lum,
}

impl ColorSpace {
    pub fn num_bands(self) -> usize {
        match self {
            ColorSpace::Rgb => 3,
            ColorSpace::Lum => 1,
        }
    }

    pub fn tag(self) -> i32 {
        match self {
            ColorSpace::Rgb => 1,
            ColorSpace::Lum => 2,
        }
    }

    pub fn from_tag(tag: i32) -> Result<Self> {
        match tag {
            1 => Ok(ColorSpace::Rgb),
            2 => Ok(ColorSpace::Lum),
            other => Err(BundleError::Format(format!(
                "unknown color space tag {}",
                other
            ))),
        }
    }
}

/// Header of a single image.
///
/// Construct through [`ImageHeader::new`], which enforces that the band count
/// agrees with the color space, that both dimensions are positive and that
/// the sample count fits in `usize`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHeader {
    format: ImageFormat,
    color_space: ColorSpace,
    width: usize,
    height: usize,
    num_bands: usize,
    metadata: BTreeMap<String, String>,
    exif: Option<BTreeMap<String, String>>,
}

impl ImageHeader {
    pub fn new(
        format: ImageFormat,
        color_space: ColorSpace,
        width: usize,
        height: usize,
        num_bands: usize,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BundleError::InvalidDimensions(width, height));
        }
        if width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(num_bands))
            .is_none()
        {
            return Err(BundleError::InvalidDimensions(width, height));
        }
        if num_bands != color_space.num_bands() {
            return Err(BundleError::IllegalArgument(format!(
                "{:?} color space requires {} band(s), got {}",
                color_space,
                color_space.num_bands(),
                num_bands
            )));
        }
        Ok(Self {
            format,
            color_space,
            width,
            height,
            num_bands,
            metadata: BTreeMap::new(),
            exif: None,
        })
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    /// Number of samples a raster with this header holds.
    pub fn sample_count(&self) -> usize {
        self.width * self.height * self.num_bands
    }

    /// Same dimensions and band layout, ignoring format and metadata.
    pub fn same_shape(&self, other: &ImageHeader) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.num_bands == other.num_bands
            && self.color_space == other.color_space
    }

    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn set_metadata(&mut self, metadata: BTreeMap<String, String>) {
        self.metadata = metadata;
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn all_metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn set_exif_data(&mut self, exif: BTreeMap<String, String>) {
        self.exif = Some(exif);
    }

    pub fn exif(&self) -> Option<&BTreeMap<String, String>> {
        self.exif.as_ref()
    }

    /// Writes the header as big-endian integers followed by the metadata map
    /// encoded as JSON. EXIF data is not serialized.
    pub fn write_to(&self, out: &mut dyn Write) -> Result<()> {
        out.write_all(&self.format.tag().to_be_bytes())?;
        out.write_all(&self.color_space.tag().to_be_bytes())?;
        out.write_all(&dimension_to_i32(self.width)?.to_be_bytes())?;
        out.write_all(&dimension_to_i32(self.height)?.to_be_bytes())?;
        out.write_all(&dimension_to_i32(self.num_bands)?.to_be_bytes())?;

        if self.metadata.is_empty() {
            out.write_all(&0i32.to_be_bytes())?;
        } else {
            let json = serde_json::to_vec(&self.metadata)
                .map_err(|e| BundleError::Encode(format!("metadata: {}", e)))?;
            let len = i32::try_from(json.len()).map_err(|_| {
                BundleError::IllegalArgument("metadata too large to serialize".to_string())
            })?;
            out.write_all(&len.to_be_bytes())?;
            out.write_all(&json)?;
        }
        Ok(())
    }

    pub fn read_from(input: &mut dyn Read) -> Result<Self> {
        let format = ImageFormat::from_tag(read_i32(input)?)?;
        let color_space = ColorSpace::from_tag(read_i32(input)?)?;
        let width = read_dimension(input)?;
        let height = read_dimension(input)?;
        let bands = read_dimension(input)?;
        let mut header = ImageHeader::new(format, color_space, width, height, bands)?;

        let meta_len = read_i32(input)?;
        if meta_len < 0 {
            return Err(BundleError::Format(format!(
                "negative metadata length {}",
                meta_len
            )));
        }
        if meta_len > 0 {
            let mut json = vec![0u8; meta_len as usize];
            input.read_exact(&mut json)?;
            header.metadata = serde_json::from_slice(&json)
                .map_err(|e| BundleError::Format(format!("metadata: {}", e)))?;
        }
        Ok(header)
    }
}

impl std::fmt::Display for ImageHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:?} {}x{}x{}",
            self.format, self.color_space, self.width, self.height, self.num_bands
        )?;
        if !self.metadata.is_empty() {
            write!(f, " meta: {:?}", self.metadata)?;
        }
        Ok(())
    }
}

fn dimension_to_i32(value: usize) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| BundleError::IllegalArgument(format!("dimension {} out of range", value)))
}

fn read_i32(input: &mut dyn Read) -> Result<i32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_dimension(input: &mut dyn Read) -> Result<usize> {
    let value = read_i32(input)?;
    usize::try_from(value)
        .map_err(|_| BundleError::Format(format!("negative dimension {}", value)))
}

//! Bundle session configuration types

use crate::image_bundle::raster::PixelType;

/// Configuration shared by bundle readers and writers
#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// Sample representation for decoded images
    pub pixel_type: PixelType,
    /// Buffer size for the index and data streams
    pub buffer_capacity: usize,
    /// Appended to the index path to name the data file
    pub data_suffix: String,
    /// Reject offset indexes whose entries grow by less than a segment header when opening for read
    pub validate_offsets: bool,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            pixel_type: PixelType::Float,
            buffer_capacity: 64 * 1024,
            data_suffix: ".dat".to_string(),
            validate_offsets: true,
        }
    }
}

impl BundleConfig {
    pub fn builder() -> BundleConfigBuilder {
        BundleConfigBuilder::default()
    }
}

/// Builder for BundleConfig
#[derive(Default)]
pub struct BundleConfigBuilder {
    pixel_type: Option<PixelType>,
    buffer_capacity: Option<usize>,
    data_suffix: Option<String>,
    validate_offsets: Option<bool>,
}

impl BundleConfigBuilder {
    pub fn pixel_type(mut self, pixel_type: PixelType) -> Self {
        self.pixel_type = Some(pixel_type);
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = Some(capacity);
        self
    }

    pub fn data_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.data_suffix = Some(suffix.into());
        self
    }

    pub fn validate_offsets(mut self, validate: bool) -> Self {
        self.validate_offsets = Some(validate);
        self
    }

    pub fn build(self) -> BundleConfig {
        let default = BundleConfig::default();
        BundleConfig {
            pixel_type: self.pixel_type.unwrap_or(default.pixel_type),
            buffer_capacity: self.buffer_capacity.unwrap_or(default.buffer_capacity).max(1),
            data_suffix: self.data_suffix.unwrap_or(default.data_suffix),
            validate_offsets: self.validate_offsets.unwrap_or(default.validate_offsets),
        }
    }
}

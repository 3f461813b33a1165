//! Codec configuration types

/// Configuration for the default codec table
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// JPEG encoder quality, 1..=100
    pub jpeg_quality: u8,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self { jpeg_quality: 95 }
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::image_bundle::codec::decoder::ImageDecoder;
use crate::image_bundle::codec::encoder::ImageEncoder;
use crate::image_bundle::codec::jpeg_codec::{JpegDecoder, JpegEncoder};
use crate::image_bundle::codec::png_codec::{PngDecoder, PngEncoder};
use crate::image_bundle::codec::ppm_codec::{PpmDecoder, PpmEncoder};
use crate::image_bundle::codec::types::CodecConfig;
use crate::image_bundle::common::error::{BundleError, Result};
use crate::image_bundle::raster::ImageFormat;

struct CodecPair {
    decoder: Arc<dyn ImageDecoder>,
    encoder: Arc<dyn ImageEncoder>,
}

/// Format to codec lookup table.
///
/// Built once and shared as `Arc<CodecRegistry>`; lookups never mutate it.
#[derive(Default)]
pub struct CodecRegistry {
    codecs: HashMap<ImageFormat, CodecPair>,
}

impl CodecRegistry {
    /// An empty registry. Every lookup fails until codecs are registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// JPEG, PNG and PPM codecs.
    pub fn with_defaults(config: CodecConfig) -> Self {
        let mut registry = Self::new();
        registry.register(
            ImageFormat::Jpeg,
            Arc::new(JpegDecoder),
            Arc::new(JpegEncoder::new(config.jpeg_quality)),
        );
        registry.register(ImageFormat::Png, Arc::new(PngDecoder), Arc::new(PngEncoder));
        registry.register(ImageFormat::Ppm, Arc::new(PpmDecoder), Arc::new(PpmEncoder));
        registry
    }

    /// Installs a codec pair, replacing any previous mapping for `format`.
    pub fn register(
        &mut self,
        format: ImageFormat,
        decoder: Arc<dyn ImageDecoder>,
        encoder: Arc<dyn ImageEncoder>,
    ) {
        debug!("Registering codec for {}", format);
        self.codecs.insert(format, CodecPair { decoder, encoder });
    }

    pub fn decoder(&self, format: ImageFormat) -> Result<&dyn ImageDecoder> {
        self.codecs
            .get(&format)
            .map(|pair| pair.decoder.as_ref())
            .ok_or_else(|| BundleError::UnsupportedFormat(format!("no decoder for {}", format)))
    }

    pub fn encoder(&self, format: ImageFormat) -> Result<&dyn ImageEncoder> {
        self.codecs
            .get(&format)
            .map(|pair| pair.encoder.as_ref())
            .ok_or_else(|| BundleError::UnsupportedFormat(format!("no encoder for {}", format)))
    }

    pub fn supports(&self, format: ImageFormat) -> bool {
        self.codecs.contains_key(&format)
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut formats: Vec<_> = self.codecs.keys().collect();
        formats.sort();
        f.debug_struct("CodecRegistry").field("formats", &formats).finish()
    }
}

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::image_bundle::bundle::format::{self, IndexHeader, SegmentHeader};
use crate::image_bundle::bundle::types::BundleConfig;
use crate::image_bundle::codec::CodecRegistry;
use crate::image_bundle::common::error::{BundleError, Result};
use crate::image_bundle::raster::{ImageFormat, ImageHeader, RasterImage};

struct OpenStreams {
    index: BufWriter<File>,
    data: BufWriter<File>,
}

/// Sequential append writer for one bundle.
///
/// A writer is open from [`BundleWriter::open`] until [`BundleWriter::close`];
/// every append after that is a `BundleError::State`. Only one writer may
/// target a bundle at a time and nothing here enforces that.
pub struct BundleWriter {
    index_path: PathBuf,
    data_path: PathBuf,
    registry: Arc<CodecRegistry>,
    streams: Option<OpenStreams>,
    buffer_capacity: usize,
    image_count: usize,
    current_offset: u64,
}

impl BundleWriter {
    /// Creates (or with `overwrite`, truncates) the index and data files and
    /// writes the index header.
    #[instrument(skip(path, registry, config), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(
        path: P,
        overwrite: bool,
        registry: Arc<CodecRegistry>,
        config: &BundleConfig,
    ) -> Result<Self> {
        let index_path = path.as_ref().to_path_buf();
        let data_path = format::data_path_for(&index_path, &config.data_suffix);

        if !overwrite {
            for existing in [&index_path, &data_path] {
                if existing.exists() {
                    return Err(BundleError::AlreadyExists(existing.clone()));
                }
            }
        }

        let data_file_name = data_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                BundleError::IllegalArgument(format!(
                    "data file path {} has no UTF-8 file name",
                    data_path.display()
                ))
            })?
            .to_string();

        let mut index = BufWriter::with_capacity(config.buffer_capacity, create(&index_path)?);
        let data = BufWriter::with_capacity(config.buffer_capacity, create(&data_path)?);
        IndexHeader::new(data_file_name).write_to(&mut index)?;
        index.flush()?;

        info!("Opened bundle {} for writing", index_path.display());
        Ok(Self {
            index_path,
            data_path,
            registry,
            streams: Some(OpenStreams { index, data }),
            buffer_capacity: config.buffer_capacity,
            image_count: 0,
            current_offset: 0,
        })
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn is_open(&self) -> bool {
        self.streams.is_some()
    }

    pub fn image_count(&self) -> usize {
        self.image_count
    }

    /// Size of the data file written so far, equal to the last offset.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    fn streams(&mut self) -> Result<&mut OpenStreams> {
        self.streams.as_mut().ok_or_else(|| {
            BundleError::State(format!(
                "bundle {} is not open for writing",
                self.index_path.display()
            ))
        })
    }

    /// Appends one segment and its offset entry. Both streams are flushed
    /// before returning.
    pub fn add_image(&mut self, header: &ImageHeader, encoded: &[u8]) -> Result<()> {
        let payload_len = i32::try_from(encoded.len())
            .map(|len| len as u32)
            .map_err(|_| {
                BundleError::IllegalArgument(format!(
                    "encoded image of {} bytes exceeds the segment size limit",
                    encoded.len()
                ))
            })?;
        let segment = SegmentHeader {
            payload_len,
            format_tag: header.format().tag(),
        };
        let next_offset = self.current_offset + segment.segment_len();

        let streams = self.streams()?;
        streams.data.write_all(&segment.to_bytes())?;
        streams.data.write_all(encoded)?;
        streams.data.flush()?;
        streams.index.write_all(&(next_offset as i64).to_be_bytes())?;
        streams.index.flush()?;

        self.current_offset = next_offset;
        self.image_count += 1;
        debug!(
            "Appended {} image {} ({} bytes), offset {}",
            header.format(),
            self.image_count - 1,
            encoded.len(),
            next_offset
        );
        Ok(())
    }

    /// Appends already-encoded bytes, recovering the header through the
    /// registry. Nothing is written if the header cannot be decoded.
    pub fn add_encoded(&mut self, encoded: &[u8], format: ImageFormat) -> Result<ImageHeader> {
        self.streams()?;
        let header = self.registry.decoder(format)?.decode_header(encoded)?;
        self.add_image(&header, encoded)?;
        Ok(header)
    }

    /// Encodes `image` as `format` and appends it.
    pub fn add_raster(&mut self, image: &RasterImage, format: ImageFormat) -> Result<()> {
        self.streams()?;
        let mut encoded = Vec::new();
        self.registry
            .encoder(format)?
            .encode_image(image, &mut encoded)?;
        let header = image.header().clone().with_format(format);
        self.add_image(&header, &encoded)
    }

    /// Copies every segment of another closed bundle onto this one, rebasing
    /// its offsets. Returns the number of images appended.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn append_bundle<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let other_index = path.as_ref();
        if same_file(other_index, &self.index_path) {
            return Err(BundleError::IllegalArgument(
                "cannot append a bundle to itself".to_string(),
            ));
        }
        self.streams()?;

        let (header, offsets) = format::load_index(other_index, self.buffer_capacity)?;
        format::validate_offsets(&offsets)?;
        let other_data = format::resolve_data_path(other_index, &header.data_file_name);
        if same_file(&other_data, &self.data_path) {
            return Err(BundleError::IllegalArgument(format!(
                "bundle {} shares this writer's data file",
                other_index.display()
            )));
        }
        let data_len = offsets.last().copied().unwrap_or(0);

        let file = File::open(&other_data)?;
        let available = file.metadata()?.len();
        if available < data_len {
            return Err(BundleError::Format(format!(
                "data file {} holds {} bytes, index requires {}",
                other_data.display(),
                available,
                data_len
            )));
        }

        let base = self.current_offset;
        let streams = self.streams()?;
        let copied = std::io::copy(&mut file.take(data_len), &mut streams.data)?;
        if copied != data_len {
            return Err(BundleError::Format(format!(
                "data file {} ended after {} of {} bytes",
                other_data.display(),
                copied,
                data_len
            )));
        }
        for offset in &offsets {
            streams.index.write_all(&((base + offset) as i64).to_be_bytes())?;
        }
        streams.data.flush()?;
        streams.index.flush()?;

        self.current_offset = base + data_len;
        self.image_count += offsets.len();
        info!(
            "Appended {} images from {}",
            offsets.len(),
            other_index.display()
        );
        Ok(offsets.len())
    }

    /// Flushes and releases both files. The image count in the index header
    /// stays `-1`.
    #[instrument(skip(self), fields(path = %self.index_path.display()))]
    pub fn close(&mut self) -> Result<()> {
        let mut streams = self.streams.take().ok_or_else(|| {
            BundleError::State(format!(
                "bundle {} is already closed",
                self.index_path.display()
            ))
        })?;
        streams.data.flush()?;
        streams.index.flush()?;
        info!(
            images = self.image_count,
            bytes = self.current_offset,
            "Closed bundle writer"
        );
        Ok(())
    }
}

impl std::fmt::Debug for BundleWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleWriter")
            .field("index_path", &self.index_path)
            .field("open", &self.is_open())
            .field("image_count", &self.image_count)
            .field("current_offset", &self.current_offset)
            .finish()
    }
}

fn create(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?)
}

/// Compares resolved paths so `a.hib`, `./a.hib` and `sub/../a.hib` match.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

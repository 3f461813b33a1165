use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::image_bundle::bundle::format::{
    self, SEGMENT_HEADER_LEN, SegmentHeader, first_segment_at_or_after, segment_start,
};
use crate::image_bundle::bundle::types::BundleConfig;
use crate::image_bundle::codec::CodecRegistry;
use crate::image_bundle::common::error::{BundleError, Result};
use crate::image_bundle::raster::{ImageFormat, ImageHeader, PixelType, RasterImage};

/// Returns `false` for headers whose pixels should not be decoded.
pub type CullPredicate = Box<dyn Fn(&ImageHeader) -> bool + Send>;

/// Per-reader counters, logged when the reader is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub records_read: usize,
    pub headers_decoded: usize,
    pub images_decoded: usize,
    pub culled: usize,
    pub failed: usize,
    /// Wall time spent inside pixel decoders.
    pub decode_time: Duration,
}

enum HeaderSlot {
    Pending,
    Ready(ImageHeader),
    Failed(String),
}

enum ImageSlot {
    Pending,
    Decoded(RasterImage),
    Culled,
    Failed(String),
}

/// The segment under the cursor. Header and pixels are decoded on first
/// access and kept until the next advance.
struct Record {
    index: usize,
    format: Option<ImageFormat>,
    bytes: Vec<u8>,
    header: HeaderSlot,
    image: ImageSlot,
}

impl Record {
    fn failed(index: usize, format: Option<ImageFormat>, reason: String) -> Self {
        Self {
            index,
            format,
            bytes: Vec::new(),
            header: HeaderSlot::Failed(reason.clone()),
            image: ImageSlot::Failed(reason),
        }
    }
}

/// Cursor over the segments of one bundle, optionally limited to a byte range
/// of the data file.
///
/// Every segment start is taken from the offset index rather than from the
/// previous segment's length prefix, so one corrupt segment never shifts the
/// records after it.
pub struct BundleReader {
    index_path: PathBuf,
    data_path: PathBuf,
    registry: Arc<CodecRegistry>,
    pixel_type: PixelType,
    declared_image_count: i64,
    offsets: Vec<u64>,
    range_start: u64,
    range_end: u64,
    first_index: usize,
    end_index: usize,
    data: Option<BufReader<File>>,
    stream_pos: u64,
    next_index: usize,
    record: Option<Record>,
    cull: Option<CullPredicate>,
    stats: ScanStats,
}

impl BundleReader {
    /// Opens the whole bundle for a sequential scan.
    pub fn open<P: AsRef<Path>>(
        path: P,
        registry: Arc<CodecRegistry>,
        config: &BundleConfig,
    ) -> Result<Self> {
        Self::open_with(path.as_ref(), registry, config, |offsets| {
            Ok((0, offsets.last().copied().unwrap_or(0)))
        })
    }

    /// Opens the segments whose start byte `s` satisfies `start <= s < end`.
    pub fn open_range<P: AsRef<Path>>(
        path: P,
        start: u64,
        end: u64,
        registry: Arc<CodecRegistry>,
        config: &BundleConfig,
    ) -> Result<Self> {
        if end < start {
            return Err(BundleError::IllegalArgument(format!(
                "range end {} precedes start {}",
                end, start
            )));
        }
        Self::open_with(path.as_ref(), registry, config, |_| Ok((start, end)))
    }

    /// Opens the bundle positioned before image `index`. `index` equal to the
    /// image count yields an empty scan.
    pub fn open_at_index<P: AsRef<Path>>(
        path: P,
        index: usize,
        registry: Arc<CodecRegistry>,
        config: &BundleConfig,
    ) -> Result<Self> {
        Self::open_with(path.as_ref(), registry, config, |offsets| {
            if index > offsets.len() {
                return Err(BundleError::State(format!(
                    "cannot seek to image {}, bundle holds {}",
                    index,
                    offsets.len()
                )));
            }
            let start = segment_start(offsets, index);
            Ok((start, offsets.last().copied().unwrap_or(0)))
        })
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn open_with<F>(
        path: &Path,
        registry: Arc<CodecRegistry>,
        config: &BundleConfig,
        range: F,
    ) -> Result<Self>
    where
        F: FnOnce(&[u64]) -> Result<(u64, u64)>,
    {
        let (header, offsets) = format::load_index(path, config.buffer_capacity)?;
        if config.validate_offsets {
            format::validate_offsets(&offsets)?;
        }
        let data_path = format::resolve_data_path(path, &header.data_file_name);
        let file = File::open(&data_path)?;
        let data_len = file.metadata()?.len();
        let required = offsets.last().copied().unwrap_or(0);
        if data_len < required {
            return Err(BundleError::Format(format!(
                "data file {} holds {} bytes, index requires {}",
                data_path.display(),
                data_len,
                required
            )));
        }

        let (range_start, range_end) = range(&offsets)?;
        let first_index = first_segment_at_or_after(&offsets, range_start);
        let end_index = first_segment_at_or_after(&offsets, range_end).max(first_index);

        info!(
            images = offsets.len(),
            first = first_index,
            end = end_index,
            "Opened bundle {} for reading",
            path.display()
        );
        Ok(Self {
            index_path: path.to_path_buf(),
            data_path,
            registry,
            pixel_type: config.pixel_type,
            declared_image_count: header.image_count,
            offsets,
            range_start,
            range_end,
            first_index,
            end_index,
            data: Some(BufReader::with_capacity(config.buffer_capacity, file)),
            stream_pos: 0,
            next_index: first_index,
            record: None,
            cull: None,
            stats: ScanStats::default(),
        })
    }

    /// Installs a predicate consulted before each pixel decode.
    pub fn set_cull_predicate<F>(&mut self, predicate: F)
    where
        F: Fn(&ImageHeader) -> bool + Send + 'static,
    {
        self.cull = Some(Box::new(predicate));
    }

    pub fn with_cull_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ImageHeader) -> bool + Send + 'static,
    {
        self.set_cull_predicate(predicate);
        self
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn data_file_path(&self) -> &Path {
        &self.data_path
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Image count recorded in the index header; `-1` when the writer did not
    /// know it.
    pub fn declared_image_count(&self) -> i64 {
        self.declared_image_count
    }

    /// Number of images in the bundle, from the offset index.
    pub fn image_count(&self) -> usize {
        self.offsets.len()
    }

    /// Index of the record under the cursor.
    pub fn position(&self) -> Option<usize> {
        self.record.as_ref().map(|record| record.index)
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn is_open(&self) -> bool {
        self.data.is_some()
    }

    /// Moves to the next segment in range. Returns `false` once the range is
    /// exhausted. Per-record corruption does not fail the call; it surfaces
    /// through [`BundleReader::current_error`].
    pub fn advance(&mut self) -> Result<bool> {
        if self.data.is_none() {
            return Err(BundleError::State(format!(
                "bundle {} is closed",
                self.index_path.display()
            )));
        }
        self.record = None;
        if self.next_index >= self.end_index {
            return Ok(false);
        }

        let index = self.next_index;
        self.next_index += 1;
        self.stats.records_read += 1;

        let record = self.read_segment(index)?;
        if let HeaderSlot::Failed(reason) = &record.header {
            warn!("Skipping corrupt segment {}: {}", index, reason);
            self.stats.failed += 1;
        }
        self.record = Some(record);
        Ok(true)
    }

    fn read_segment(&mut self, index: usize) -> Result<Record> {
        let start = segment_start(&self.offsets, index);
        let end = self.offsets[index];
        let Some(data) = self.data.as_mut() else {
            return Err(BundleError::State("bundle is closed".to_string()));
        };

        if self.stream_pos != start {
            data.seek(SeekFrom::Start(start))?;
            self.stream_pos = start;
        }

        let mut prefix = [0u8; SEGMENT_HEADER_LEN as usize];
        if let Err(e) = read_record_bytes(data, &mut prefix, &mut self.stream_pos)? {
            return Ok(Record::failed(index, None, e));
        }
        let segment = match SegmentHeader::from_bytes(&prefix) {
            Ok(segment) => segment,
            Err(e) => return Ok(Record::failed(index, None, e.to_string())),
        };
        if start + segment.segment_len() != end {
            return Ok(Record::failed(
                index,
                None,
                format!(
                    "segment length {} disagrees with index span {}",
                    segment.segment_len(),
                    end.saturating_sub(start)
                ),
            ));
        }
        let format = match ImageFormat::from_tag(segment.format_tag) {
            Ok(format) => format,
            Err(e) => return Ok(Record::failed(index, None, e.to_string())),
        };

        let mut bytes = vec![0u8; segment.payload_len as usize];
        if let Err(e) = read_record_bytes(data, &mut bytes, &mut self.stream_pos)? {
            return Ok(Record::failed(index, Some(format), e));
        }
        debug!("Read {} segment {} ({} bytes)", format, index, bytes.len());

        Ok(Record {
            index,
            format: Some(format),
            bytes,
            header: HeaderSlot::Pending,
            image: ImageSlot::Pending,
        })
    }

    fn record(&self) -> Result<&Record> {
        self.record.as_ref().ok_or_else(|| {
            BundleError::State("no current record; call advance() first".to_string())
        })
    }

    fn ensure_header(&mut self) -> Result<()> {
        let Some(record) = self.record.as_mut() else {
            return Err(BundleError::State(
                "no current record; call advance() first".to_string(),
            ));
        };
        if !matches!(record.header, HeaderSlot::Pending) {
            return Ok(());
        }
        let decoded = match record.format {
            Some(format) => self
                .registry
                .decoder(format)
                .and_then(|decoder| decoder.decode_header(&record.bytes)),
            None => Err(BundleError::Decode("segment has no format".to_string())),
        };
        match decoded {
            Ok(header) => {
                self.stats.headers_decoded += 1;
                record.header = HeaderSlot::Ready(header);
            }
            Err(e) if e.is_record_local() => {
                warn!("Failed to decode header of image {}: {}", record.index, e);
                self.stats.failed += 1;
                record.header = HeaderSlot::Failed(e.to_string());
                record.image = ImageSlot::Failed(e.to_string());
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Header of the current record, decoded on first access.
    pub fn current_header(&mut self) -> Result<&ImageHeader> {
        self.ensure_header()?;
        match &self.record()?.header {
            HeaderSlot::Ready(header) => Ok(header),
            HeaderSlot::Failed(reason) => Err(BundleError::Decode(reason.clone())),
            HeaderSlot::Pending => Err(BundleError::State("header not decoded".to_string())),
        }
    }

    /// Pixels of the current record, decoded on first access. `None` when the
    /// cull predicate rejected the header or the record failed to decode.
    pub fn current_image(&mut self) -> Result<Option<&RasterImage>> {
        self.ensure_header()?;
        let Some(record) = self.record.as_mut() else {
            return Err(BundleError::State(
                "no current record; call advance() first".to_string(),
            ));
        };

        if matches!(record.image, ImageSlot::Pending) {
            if let (HeaderSlot::Ready(header), Some(format)) = (&record.header, record.format) {
                if self.cull.as_ref().is_some_and(|keep| !keep(header)) {
                    debug!("Culled image {}", record.index);
                    self.stats.culled += 1;
                    record.image = ImageSlot::Culled;
                } else {
                    let started = Instant::now();
                    let decoded = self.registry.decoder(format).and_then(|decoder| {
                        decoder.decode_image(&record.bytes, header, self.pixel_type)
                    });
                    self.stats.decode_time += started.elapsed();
                    record.image = match decoded {
                        Ok(image) => {
                            self.stats.images_decoded += 1;
                            ImageSlot::Decoded(image)
                        }
                        Err(e) if e.is_record_local() => {
                            warn!("Failed to decode image {}: {}", record.index, e);
                            self.stats.failed += 1;
                            ImageSlot::Failed(e.to_string())
                        }
                        Err(e) => return Err(e),
                    };
                }
            }
        }

        match &record.image {
            ImageSlot::Decoded(image) => Ok(Some(image)),
            _ => Ok(None),
        }
    }

    /// Encoded payload of the current record.
    pub fn current_bytes(&self) -> Result<&[u8]> {
        Ok(&self.record()?.bytes)
    }

    /// Storage format from the segment prefix, `None` for an unknown tag.
    pub fn current_format(&self) -> Result<Option<ImageFormat>> {
        Ok(self.record()?.format)
    }

    /// Why the current record has no header or image, if it failed.
    pub fn current_error(&self) -> Option<&str> {
        let record = self.record.as_ref()?;
        match (&record.header, &record.image) {
            (HeaderSlot::Failed(reason), _) | (_, ImageSlot::Failed(reason)) => Some(reason),
            _ => None,
        }
    }

    /// Fraction of the assigned byte range consumed, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.range_end <= self.range_start {
            return 0.0;
        }
        let consumed = if self.next_index > self.first_index {
            self.offsets[self.next_index - 1]
        } else {
            self.range_start
        };
        let fraction =
            consumed.saturating_sub(self.range_start) as f64 / (self.range_end - self.range_start) as f64;
        fraction.clamp(0.0, 1.0) as f32
    }

    /// Releases the data file. Further advances fail with a state error.
    #[instrument(skip(self), fields(path = %self.index_path.display()))]
    pub fn close(&mut self) -> Result<()> {
        if self.data.take().is_none() {
            return Err(BundleError::State(format!(
                "bundle {} is already closed",
                self.index_path.display()
            )));
        }
        self.record = None;
        info!(
            records = self.stats.records_read,
            headers = self.stats.headers_decoded,
            images = self.stats.images_decoded,
            culled = self.stats.culled,
            failed = self.stats.failed,
            decode_ms = self.stats.decode_time.as_millis() as u64,
            "Closed bundle reader"
        );
        Ok(())
    }
}

impl std::fmt::Debug for BundleReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleReader")
            .field("index_path", &self.index_path)
            .field("images", &self.offsets.len())
            .field("range", &(self.range_start..self.range_end))
            .field("position", &self.position())
            .field("stats", &self.stats)
            .finish()
    }
}

/// Fills `buf` from the data stream. A short read is a record-level failure
/// returned as `Ok(Err(reason))`; any other I/O error propagates.
fn read_record_bytes(
    data: &mut BufReader<File>,
    buf: &mut [u8],
    stream_pos: &mut u64,
) -> Result<std::result::Result<(), String>> {
    match data.read_exact(buf) {
        Ok(()) => {
            *stream_pos += buf.len() as u64;
            Ok(Ok(()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            // position is unknown after a short read
            *stream_pos = u64::MAX;
            Ok(Err("data file ends inside segment".to_string()))
        }
        Err(e) => {
            *stream_pos = u64::MAX;
            Err(BundleError::Io(e))
        }
    }
}

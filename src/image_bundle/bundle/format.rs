//! On-disk layout shared by the bundle reader, writer and split planner.
//!
//! Index file, all integers big-endian:
//!
//! ```text
//! u32    magic = 0x81911B18
//! i16    data file name length
//! [u8]   data file name (UTF-8)
//! i64    image count (-1, never patched)
//! i64    reserved = 0
//! i64    reserved = 0
//! i32    bytes to skip before the first offset
//! [i64]  cumulative segment end offsets, until EOF
//! ```
//!
//! Data file: back-to-back segments of `i32 payload length, i32 format tag,
//! payload`.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::image_bundle::common::error::{BundleError, Result};

pub const MAGIC: u32 = 0x81911B18;

/// Length prefix plus format tag.
pub const SEGMENT_HEADER_LEN: u64 = 8;

/// Image count written at open time. Readers derive the real count from the
/// offset index.
pub const UNKNOWN_IMAGE_COUNT: i64 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexHeader {
    pub data_file_name: String,
    pub image_count: i64,
}

impl IndexHeader {
    pub fn new(data_file_name: impl Into<String>) -> Self {
        Self {
            data_file_name: data_file_name.into(),
            image_count: UNKNOWN_IMAGE_COUNT,
        }
    }

    pub fn write_to(&self, out: &mut dyn Write) -> Result<()> {
        let name = self.data_file_name.as_bytes();
        let name_len = i16::try_from(name.len()).map_err(|_| {
            BundleError::IllegalArgument(format!(
                "data file name is {} bytes, limit is {}",
                name.len(),
                i16::MAX
            ))
        })?;

        out.write_all(&MAGIC.to_be_bytes())?;
        out.write_all(&name_len.to_be_bytes())?;
        out.write_all(name)?;
        out.write_all(&self.image_count.to_be_bytes())?;
        out.write_all(&0i64.to_be_bytes())?;
        out.write_all(&0i64.to_be_bytes())?;
        out.write_all(&0i32.to_be_bytes())?;
        Ok(())
    }

    /// Reads and validates the header, leaving `input` at the first offset.
    pub fn read_from(input: &mut dyn Read) -> Result<Self> {
        let mut magic = [0u8; 4];
        read_header_bytes(input, &mut magic)?;
        if u32::from_be_bytes(magic) != MAGIC {
            return Err(BundleError::Format("not a bundle".to_string()));
        }

        let mut len = [0u8; 2];
        read_header_bytes(input, &mut len)?;
        let name_len = i16::from_be_bytes(len);
        if name_len < 0 {
            return Err(BundleError::Format(format!(
                "negative data file name length {}",
                name_len
            )));
        }
        let mut name = vec![0u8; name_len as usize];
        read_header_bytes(input, &mut name)?;
        let data_file_name = String::from_utf8(name)
            .map_err(|_| BundleError::Format("data file name is not UTF-8".to_string()))?;

        let mut buf8 = [0u8; 8];
        read_header_bytes(input, &mut buf8)?;
        let image_count = i64::from_be_bytes(buf8);
        read_header_bytes(input, &mut buf8)?;
        read_header_bytes(input, &mut buf8)?;

        let mut buf4 = [0u8; 4];
        read_header_bytes(input, &mut buf4)?;
        let skip = i32::from_be_bytes(buf4);
        if skip < 0 {
            return Err(BundleError::Format(format!("negative skip length {}", skip)));
        }
        if skip > 0 {
            let mut skipped = vec![0u8; skip as usize];
            read_header_bytes(input, &mut skipped)?;
        }

        Ok(Self {
            data_file_name,
            image_count,
        })
    }
}

/// A truncated header is a format problem, not an I/O failure.
fn read_header_bytes(input: &mut dyn Read, buf: &mut [u8]) -> Result<()> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            BundleError::Format("truncated bundle index header".to_string())
        }
        _ => BundleError::Io(e),
    })
}

/// Per-segment prefix in the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub payload_len: u32,
    pub format_tag: i32,
}

impl SegmentHeader {
    pub fn to_bytes(self) -> [u8; SEGMENT_HEADER_LEN as usize] {
        let mut buf = [0u8; SEGMENT_HEADER_LEN as usize];
        buf[..4].copy_from_slice(&(self.payload_len as i32).to_be_bytes());
        buf[4..].copy_from_slice(&self.format_tag.to_be_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; SEGMENT_HEADER_LEN as usize]) -> Result<Self> {
        let len = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let format_tag = i32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        if len < 0 {
            return Err(BundleError::Format(format!("negative segment length {}", len)));
        }
        Ok(Self {
            payload_len: len as u32,
            format_tag,
        })
    }

    /// Bytes the segment occupies in the data file.
    pub fn segment_len(self) -> u64 {
        SEGMENT_HEADER_LEN + self.payload_len as u64
    }
}

/// Reads offsets until EOF. A partial trailing entry is rejected.
pub fn read_offsets(input: &mut dyn Read) -> Result<Vec<u64>> {
    let mut raw = Vec::new();
    input.read_to_end(&mut raw)?;
    if raw.len() % 8 != 0 {
        return Err(BundleError::Format(format!(
            "offset index has {} trailing bytes",
            raw.len() % 8
        )));
    }
    raw.chunks_exact(8)
        .map(|c| {
            let value = i64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]);
            u64::try_from(value)
                .map_err(|_| BundleError::Format(format!("negative offset {}", value)))
        })
        .collect()
}

/// Every segment is at least a header long, so offsets must grow by at least
/// [`SEGMENT_HEADER_LEN`] per entry.
pub fn validate_offsets(offsets: &[u64]) -> Result<()> {
    let mut previous = 0u64;
    for (i, &offset) in offsets.iter().enumerate() {
        if offset < previous + SEGMENT_HEADER_LEN {
            return Err(BundleError::Format(format!(
                "offset {} at index {} does not follow {}",
                offset, i, previous
            )));
        }
        previous = offset;
    }
    Ok(())
}

/// Byte position where segment `index` begins.
pub fn segment_start(offsets: &[u64], index: usize) -> u64 {
    if index == 0 { 0 } else { offsets[index - 1] }
}

/// First segment index whose start byte is `>= byte`, or `offsets.len()`.
pub fn first_segment_at_or_after(offsets: &[u64], byte: u64) -> usize {
    if byte == 0 {
        return 0;
    }
    // segment i + 1 starts at offsets[i]
    (offsets.partition_point(|&end| end < byte) + 1).min(offsets.len())
}

/// Data file path used by the writer: the index path plus `suffix`.
pub fn data_path_for(index_path: &Path, suffix: &str) -> PathBuf {
    let mut name = index_path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// The data file named in an index header lives next to the index.
pub fn resolve_data_path(index_path: &Path, data_file_name: &str) -> PathBuf {
    match index_path.parent() {
        Some(parent) => parent.join(data_file_name),
        None => PathBuf::from(data_file_name),
    }
}

/// Loads an index file: header plus the full offset list.
pub fn load_index(index_path: &Path, buffer_capacity: usize) -> Result<(IndexHeader, Vec<u64>)> {
    let file = File::open(index_path)?;
    let mut input = BufReader::with_capacity(buffer_capacity, file);
    let header = IndexHeader::read_from(&mut input)?;
    let offsets = read_offsets(&mut input)?;
    debug!(
        "Loaded index {} with {} offsets",
        index_path.display(),
        offsets.len()
    );
    Ok((header, offsets))
}

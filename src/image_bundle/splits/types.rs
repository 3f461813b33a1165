//! Split planner input and output types

use std::fs;
use std::path::{Path, PathBuf};

use crate::image_bundle::bundle::{BundleConfig, format};
use crate::image_bundle::common::error::{BundleError, Result};

/// A contiguous byte range of a data file stored on a set of hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageBlock {
    pub offset: u64,
    pub length: u64,
    pub hosts: Vec<String>,
}

impl StorageBlock {
    pub fn new(offset: u64, length: u64, hosts: Vec<String>) -> Self {
        Self {
            offset,
            length,
            hosts,
        }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// True if the block shares at least one byte with `[start, end)`.
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        self.offset < end && self.end() > start
    }
}

/// Byte range `[start, start + length)` of a data file assigned to one reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub path: PathBuf,
    pub start: u64,
    pub length: u64,
    pub hosts: Vec<String>,
}

impl Split {
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Everything the planner needs to know about one bundle.
#[derive(Debug, Clone)]
pub struct BundleLayout {
    pub data_path: PathBuf,
    pub offsets: Vec<u64>,
    pub blocks: Vec<StorageBlock>,
}

impl BundleLayout {
    pub fn new(data_path: impl Into<PathBuf>, offsets: Vec<u64>, blocks: Vec<StorageBlock>) -> Self {
        Self {
            data_path: data_path.into(),
            offsets,
            blocks,
        }
    }

    /// Reads the offset index of the bundle at `index_path`. The data file is
    /// only stat'ed, never opened.
    pub fn load<P: AsRef<Path>>(index_path: P, blocks: Vec<StorageBlock>) -> Result<Self> {
        let index_path = index_path.as_ref();
        let (header, offsets) = format::load_index(index_path, BundleConfig::default().buffer_capacity)?;
        format::validate_offsets(&offsets)?;
        let data_path = format::resolve_data_path(index_path, &header.data_file_name);

        let data_len = fs::metadata(&data_path)?.len();
        let required = offsets.last().copied().unwrap_or(0);
        if data_len < required {
            return Err(BundleError::Format(format!(
                "data file {} holds {} bytes, index requires {}",
                data_path.display(),
                data_len,
                required
            )));
        }
        Ok(Self::new(data_path, offsets, blocks))
    }

    /// [`BundleLayout::load`] with a block map from [`uniform_blocks`].
    pub fn load_uniform<P: AsRef<Path>>(
        index_path: P,
        block_size: u64,
        hosts: &[String],
    ) -> Result<Self> {
        let mut layout = Self::load(index_path, Vec::new())?;
        layout.blocks = uniform_blocks(layout.data_len(), block_size, hosts);
        Ok(layout)
    }

    /// Bytes covered by the offset index.
    pub fn data_len(&self) -> u64 {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub fn image_count(&self) -> usize {
        self.offsets.len()
    }
}

/// Fixed-size blocks all placed on `hosts`, for storage without its own
/// block map. A `block_size` of zero yields one block spanning the data.
pub fn uniform_blocks(data_len: u64, block_size: u64, hosts: &[String]) -> Vec<StorageBlock> {
    if data_len == 0 {
        return Vec::new();
    }
    let block_size = if block_size == 0 { data_len } else { block_size };
    (0..data_len)
        .step_by(block_size as usize)
        .map(|offset| StorageBlock::new(offset, block_size.min(data_len - offset), hosts.to_vec()))
        .collect()
}
